//! 协议模板模块
//!
//! 协议模板是声明式的有序字段表，定义一种协议帧的线上布局。
//! 模板在启动时从配置加载一次，之后进程全程只读；
//! 加载阶段把模板id与特殊字段名解析为封闭枚举
//! （[`TemplateKind`]/[`FieldRole`]），运行期按枚举分发。

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::models::enums::{DataTypeTag, StepType};
use crate::utils::error::{AppError, AppResult};

/// 时间字段名
pub const ELEM_TIME: &str = "时间";
/// 消息控制字字段名
pub const ELEM_CONTROL_WORD: &str = "消息控制字";
/// 消息ID字段名
pub const ELEM_MESSAGE_ID: &str = "消息ID";
/// 帧计数字段名
pub const ELEM_FRAME_COUNT: &str = "帧计数";
/// 数据区字段名
pub const ELEM_DATA_REGION: &str = "数据区";
/// 数据区CRC校验和字段名
pub const ELEM_DATA_CRC: &str = "数据区crc校验和";
/// 数据区累加和字段名
pub const ELEM_DATA_CHECKSUM: &str = "数据区累加和";
/// 数据区长度字段名
pub const ELEM_DATA_LENGTH: &str = "数据区长度";

/// 模板的计算字段类别（由模板id在加载时解析）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// 无特殊后处理
    Plain,
    /// 串口标准帧：转义插入 + 累加和/长度
    SerialStandard,
    /// 串口扩展帧：转义插入 + CRC-16/CCITT，长度与CRC拆为高低8位
    SerialExtended,
    /// CRC尾校验帧：按16位字计算CRC后缀
    CrcTail,
}

/// 模板字段的角色（由字段名在加载时解析）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Time,
    ControlWord,
    MessageId,
    FrameCount,
    DataRegion,
    DataCrc,
    DataChecksum,
    DataLength,
    Plain,
}

impl FieldRole {
    fn resolve(element: &str) -> Self {
        match element {
            ELEM_TIME => FieldRole::Time,
            ELEM_CONTROL_WORD => FieldRole::ControlWord,
            ELEM_MESSAGE_ID => FieldRole::MessageId,
            ELEM_FRAME_COUNT => FieldRole::FrameCount,
            ELEM_DATA_REGION => FieldRole::DataRegion,
            ELEM_DATA_CRC => FieldRole::DataCrc,
            ELEM_DATA_CHECKSUM => FieldRole::DataChecksum,
            ELEM_DATA_LENGTH => FieldRole::DataLength,
            _ => FieldRole::Plain,
        }
    }
}

/// 模板字段的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDtype {
    /// 单个标量
    Scalar(DataTypeTag),
    /// 以空白/逗号分隔的标量数组
    Array(DataTypeTag),
    /// 数据区联合体
    Union,
}

impl FieldDtype {
    fn resolve(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered == "union" {
            return FieldDtype::Union;
        }
        let (base, is_array) = match lowered.strip_suffix("_array") {
            Some(base) => (base, true),
            None => (lowered.as_str(), false),
        };
        let tag = base.parse::<DataTypeTag>().unwrap_or_else(|_| {
            // 未知数据类型默认按16位标量处理
            log::warn!("模板字段数据类型未知: {}，按UINT16处理", raw);
            DataTypeTag::Uint16
        });
        if is_array {
            FieldDtype::Array(tag)
        } else {
            FieldDtype::Scalar(tag)
        }
    }
}

/// 模板中的单个字段定义
#[derive(Debug, Clone)]
pub struct TemplateField {
    pub seq: u32,
    pub element: String,
    pub dtype: FieldDtype,
    pub editable: bool,
    pub auto_calc: bool,
    /// 字段默认值（流程步未覆盖时使用）
    pub default_value: String,
    pub role: FieldRole,
}

/// 协议模板：一种协议帧的有序字段表
///
/// 字段顺序即输出字节顺序，不允许重排
#[derive(Debug, Clone)]
pub struct ProtocolTemplate {
    pub id: String,
    pub name: String,
    pub protocol_value: i64,
    pub step_types: Vec<StepType>,
    pub merge_8bit_to_16bit: bool,
    pub kind: TemplateKind,
    pub fields: Vec<TemplateField>,
}

#[derive(Debug, Deserialize)]
struct RawNoneOption {
    #[serde(default = "default_none_value")]
    value: i64,
    #[serde(default = "default_none_label")]
    label: String,
}

fn default_none_value() -> i64 {
    -1
}

fn default_none_label() -> String {
    "无".to_string()
}

impl Default for RawNoneOption {
    fn default() -> Self {
        Self {
            value: default_none_value(),
            label: default_none_label(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawField {
    seq: u32,
    element: String,
    dtype: String,
    #[serde(default)]
    editable: bool,
    #[serde(default)]
    auto_calc: bool,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct RawTemplate {
    id: String,
    name: String,
    protocol_value: i64,
    #[serde(default)]
    step_types: Vec<i64>,
    /// 缺省时按true处理
    merge_8bit_to_16bit: Option<bool>,
    #[serde(default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawTemplateFile {
    #[serde(default)]
    none_option: RawNoneOption,
    #[serde(default)]
    templates: Vec<RawTemplate>,
}

/// 协议模板注册表
///
/// 按`(流程步类型, 协议类型值)`索引模板；加载后不再变更，
/// 无需加锁即可在各服务间共享
#[derive(Debug)]
pub struct TemplateRegistry {
    templates: Vec<ProtocolTemplate>,
    by_key: HashMap<(usize, i64), usize>,
    by_step: HashMap<usize, Vec<usize>>,
    none_value: i64,
    none_label: String,
}

impl TemplateRegistry {
    /// 从JSON文本构建注册表
    pub fn from_json_str(content: &str) -> AppResult<Self> {
        let raw: RawTemplateFile = serde_json::from_str(content)
            .map_err(|e| AppError::configuration_error(format!("加载协议模板失败: {}", e)))?;

        let mut templates = Vec::with_capacity(raw.templates.len());
        for raw_tpl in raw.templates {
            let kind = match raw_tpl.id.as_str() {
                "serial_std" => TemplateKind::SerialStandard,
                "serial_ext" => TemplateKind::SerialExtended,
                "crc_tail" => TemplateKind::CrcTail,
                _ => TemplateKind::Plain,
            };
            let mut step_types = Vec::new();
            for idx in &raw_tpl.step_types {
                match StepType::from_index(*idx) {
                    Ok(step_type) => step_types.push(step_type),
                    Err(_) => {
                        log::warn!("模板{}引用了未知流程步类型索引{}", raw_tpl.id, idx);
                    }
                }
            }
            let mut fields: Vec<TemplateField> = raw_tpl
                .fields
                .into_iter()
                .map(|f| TemplateField {
                    role: FieldRole::resolve(&f.element),
                    dtype: FieldDtype::resolve(&f.dtype),
                    seq: f.seq,
                    element: f.element,
                    editable: f.editable,
                    auto_calc: f.auto_calc,
                    default_value: f.value,
                })
                .collect();
            // 字段顺序即输出顺序，加载时按seq排定
            fields.sort_by_key(|f| f.seq);

            templates.push(ProtocolTemplate {
                id: raw_tpl.id,
                name: raw_tpl.name,
                protocol_value: raw_tpl.protocol_value,
                step_types,
                merge_8bit_to_16bit: raw_tpl.merge_8bit_to_16bit.unwrap_or(true),
                kind,
                fields,
            });
        }

        let mut by_key = HashMap::new();
        let mut by_step: HashMap<usize, Vec<usize>> = HashMap::new();
        for (tpl_idx, tpl) in templates.iter().enumerate() {
            for step_type in &tpl.step_types {
                by_step.entry(step_type.index()).or_default().push(tpl_idx);
                by_key.insert((step_type.index(), tpl.protocol_value), tpl_idx);
            }
        }

        Ok(Self {
            templates,
            by_key,
            by_step,
            none_value: raw.none_option.value,
            none_label: raw.none_option.label,
        })
    }

    /// 从模板配置文件加载注册表
    pub fn load_from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::io_error(
                format!("读取协议模板文件失败: {}", e),
                e.kind().to_string(),
            )
        })?;
        Self::from_json_str(&content)
    }

    /// "无协议"的协议类型值
    pub fn none_value(&self) -> i64 {
        self.none_value
    }

    /// 按(流程步类型, 协议类型值)查找模板；协议类型为"无"时返回None
    pub fn template_for(
        &self,
        step_type: StepType,
        protocol_type: i64,
    ) -> Option<&ProtocolTemplate> {
        if protocol_type == self.none_value {
            return None;
        }
        self.by_key
            .get(&(step_type.index(), protocol_type))
            .map(|idx| &self.templates[*idx])
    }

    /// 按模板id查找模板
    pub fn template_by_id(&self, template_id: &str) -> Option<&ProtocolTemplate> {
        self.templates.iter().find(|t| t.id == template_id)
    }

    /// 指定流程步类型是否存在可用模板
    pub fn has_templates_for(&self, step_type: StepType) -> bool {
        self.by_step
            .get(&step_type.index())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    /// 协议类型下拉框的可选项（含"无"）
    ///
    /// GLINK/1553的普通流程步不提供各自的扩展模板
    pub fn protocol_options_for_step(&self, step_type: StepType) -> Vec<(i64, String)> {
        let mut options = vec![(self.none_value, self.none_label.clone())];
        let step_idx = step_type.index();
        if let Some(indices) = self.by_step.get(&step_idx) {
            for tpl_idx in indices {
                let tpl = &self.templates[*tpl_idx];
                // GLINK流程步：过滤GLINK扩展模板
                if (step_idx == 0 || step_idx == 1) && tpl.protocol_value == 1 {
                    continue;
                }
                // 1553流程步：过滤1553扩展模板
                if (step_idx == 4 || step_idx == 5) && tpl.protocol_value == 5 {
                    continue;
                }
                options.push((tpl.protocol_value, tpl.name.clone()));
            }
        }
        options
    }
}

/// 内置协议模板表（随库打包，宿主可用配置文件覆盖）
static BUILTIN_TEMPLATES: Lazy<TemplateRegistry> = Lazy::new(|| {
    TemplateRegistry::from_json_str(include_str!("../../config/protocol_templates.json"))
        .expect("内置协议模板表必须可解析")
});

/// 获取内置协议模板注册表
pub fn builtin_templates() -> &'static TemplateRegistry {
    &BUILTIN_TEMPLATES
}
