//! 基础设施层模块
//!
//! 包含流程步XML持久化与协议文本导出

pub mod export;
pub mod persistence;

// 重新导出基础设施组件
pub use export::export_protocol_texts;
pub use persistence::xml_codec::{
    load_steps_from_file, parse_steps, save_steps_to_file, serialize_steps, StepDocument,
};
