//! 领域层模块
//!
//! 包含编码/归一化/模板引擎等领域服务

pub mod services;

// 重新导出领域服务
pub use services::*;
