/// 核心枚举定义模块
pub mod enums;
/// 字段模式注册表模块
pub mod registry;
/// 流程步实体模块
pub mod step;
/// 协议模板模块
pub mod template;

// 重新导出所有类型，方便其他模块使用
pub use enums::*;
pub use step::*;
pub use template::{
    builtin_templates, FieldDtype, FieldRole, ProtocolTemplate, TemplateField, TemplateKind,
    TemplateRegistry,
};
