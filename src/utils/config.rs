use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::utils::error::{AppError, AppResult};

/// 提供给 serde 的默认协议键列表
fn default_protocol_keys() -> Vec<String> {
    ["glink", "uart", "bc", "interrupt", "switch"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// 单个协议的路径设置
///
/// GLINK/串口/1553-BC 协议各有输入、输出、配置三条路径；
/// 中断协议只使用输出路径（port.config 的写出目录）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtocolPathConfig {
    /// 输入目录（打开流程配置的默认目录）
    #[serde(default)]
    pub input_path: String,
    /// 输出目录（协议文本导出目录）
    #[serde(default)]
    pub output_path: String,
    /// 配置目录
    #[serde(default)]
    pub config_path: String,
}

/// 应用程序主配置结构
/// 包含核心库运行所需的所有配置信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 各协议的路径设置，键为协议名（glink/uart/bc/interrupt/switch）
    pub protocols: BTreeMap<String, ProtocolPathConfig>,
    /// 协议模板配置文件路径（为空时使用内置模板表）
    pub template_config_path: Option<PathBuf>,
    /// 日志级别 (debug, info, warn, error)
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut protocols = BTreeMap::new();
        for key in default_protocol_keys() {
            protocols.insert(key, ProtocolPathConfig::default());
        }
        Self {
            protocols,
            template_config_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// 获取指定协议的路径设置
    pub fn protocol(&self, key: &str) -> Option<&ProtocolPathConfig> {
        self.protocols.get(key)
    }

    /// 获取指定协议的路径设置（缺失时插入默认值）
    pub fn protocol_mut(&mut self, key: &str) -> &mut ProtocolPathConfig {
        self.protocols.entry(key.to_string()).or_default()
    }

    /// 中断协议是否只保留输出路径
    pub fn persisted_path_keys(protocol: &str) -> &'static [&'static str] {
        if protocol == "interrupt" {
            &["output_path"]
        } else {
            &["input_path", "output_path", "config_path"]
        }
    }
}

/// 配置管理器
/// 负责加载、保存和管理应用程序配置
pub struct ConfigManager {
    config: AppConfig,
    config_file_path: PathBuf,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new(config_file_path: PathBuf) -> Self {
        Self {
            config: AppConfig::default(),
            config_file_path,
        }
    }

    /// 从文件加载配置
    pub fn load_from_file(&mut self) -> AppResult<()> {
        if !self.config_file_path.exists() {
            // 如果配置文件不存在，创建默认配置文件
            self.save_to_file()?;
            return Ok(());
        }

        let content = std::fs::read_to_string(&self.config_file_path).map_err(|e| {
            AppError::io_error(format!("读取配置文件失败: {}", e), e.kind().to_string())
        })?;

        self.config = serde_json::from_str(&content)
            .map_err(|e| AppError::configuration_error(format!("解析配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 将配置保存到文件
    pub fn save_to_file(&self) -> AppResult<()> {
        // 确保目录存在
        if let Some(parent) = self.config_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::io_error(format!("创建配置目录失败: {}", e), e.kind().to_string())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(&self.config)
            .map_err(|e| AppError::json_error(format!("序列化配置失败: {}", e)))?;

        std::fs::write(&self.config_file_path, content).map_err(|e| {
            AppError::io_error(format!("写入配置文件失败: {}", e), e.kind().to_string())
        })?;

        Ok(())
    }

    /// 从环境变量覆盖配置
    pub fn override_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            self.config.log_level = log_level;
        }
        if let Ok(template_path) = std::env::var("TEMPLATE_CONFIG_PATH") {
            self.config.template_config_path = Some(PathBuf::from(template_path));
        }
        // 形如 GLINK_OUTPUT_PATH 的协议路径覆盖
        for key in default_protocol_keys() {
            let upper = key.to_uppercase();
            if let Ok(v) = std::env::var(format!("{}_INPUT_PATH", upper)) {
                self.config.protocol_mut(&key).input_path = v;
            }
            if let Ok(v) = std::env::var(format!("{}_OUTPUT_PATH", upper)) {
                self.config.protocol_mut(&key).output_path = v;
            }
            if let Ok(v) = std::env::var(format!("{}_CONFIG_PATH", upper)) {
                self.config.protocol_mut(&key).config_path = v;
            }
        }
    }

    /// 获取配置的只读引用
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取配置的可变引用
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }
}

/// 全局配置实例
static GLOBAL_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| RwLock::new(AppConfig::default()));

/// 初始化全局配置
pub fn init_global_config(config: AppConfig) {
    if let Ok(mut guard) = GLOBAL_CONFIG.write() {
        *guard = config;
    }
}

/// 获取全局配置的克隆
pub fn get_global_config() -> AppConfig {
    GLOBAL_CONFIG
        .read()
        .map(|guard| guard.clone())
        .unwrap_or_default()
}

/// 更新全局配置
pub fn update_global_config<F>(updater: F)
where
    F: FnOnce(&mut AppConfig),
{
    if let Ok(mut guard) = GLOBAL_CONFIG.write() {
        updater(&mut guard);
    }
}
