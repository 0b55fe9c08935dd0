/// 测试流程配置工具核心库
///
/// 提供协议字段编码、帧序列化、流程步XML持久化与协议文本导出能力；
/// 宿主程序持有流程步列表并通过这里暴露的服务完成解析/保存/导出。
pub mod models;
pub mod utils;
pub mod domain;
pub mod infrastructure;

// 重新导出常用类型，方便使用
pub use models::*;
pub use utils::{AppConfig, AppError, AppResult};

pub use domain::services::data_region::{
    normalize_data_region, normalize_data_region_value, NormalizedRegion,
};
pub use domain::services::periodic::{expand_periodic, merge_periodic};
pub use domain::services::template_engine::{encode_step_protocol, FrameEncoding};
pub use domain::services::value_codec::EndianMode;
pub use infrastructure::export::export_protocol_texts;
pub use infrastructure::persistence::xml_codec::{
    load_steps_from_file, parse_steps, save_steps_to_file, serialize_steps, StepDocument,
};
