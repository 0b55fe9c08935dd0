/// 工具模块，包含错误处理、配置管理等通用功能

/// 统一错误处理模块
pub mod error;

/// 配置管理模块
pub mod config;

/// 宽容数值文本解析模块
pub mod numeric;


// 重新导出常用类型，方便使用
pub use config::{
    get_global_config, init_global_config, update_global_config, AppConfig, ConfigManager,
    ProtocolPathConfig,
};
pub use error::{AppError, AppResult};
