//! 流程步实体模块
//!
//! 流程步是配置的基本单元，由四个互不重叠的子结构组成：
//! - `base`: 仿真时间、名称、流程步类型、字节序、忽略标志
//! - `type_fields`: 与流程步类型绑定的协议字段（站点/地址/消息长度/数据区等）
//! - `expand`: 非协议簿记字段（周期分组联结、临时多行文件数据）
//! - `protocol`: 已选协议模板各字段的解析值（含自动计算字段）
//!
//! 站点/地址字段的原始输入文本（如"0x11"）作为字段本体的一部分保存，
//! 保证16进制字面量在保存/加载往返中逐字保留。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::models::enums::{DataTypeTag, Endianness, StepType};
use crate::models::registry;
use crate::utils::numeric;

/// 数据区联合体中的单个标记值
///
/// `data_type`保存持久化索引而不是枚举本身，未知索引在编码阶段
/// 按UINT8降级处理而不是在解析阶段报错
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedValue {
    pub data_type: i64,
    pub value: Value,
}

impl TaggedValue {
    pub fn new(tag: DataTypeTag, value: Value) -> Self {
        Self {
            data_type: tag.index() as i64,
            value,
        }
    }

    /// 解析数据类型索引，超出范围返回None
    pub fn tag(&self) -> Option<DataTypeTag> {
        DataTypeTag::from_index(self.data_type).ok()
    }

    /// 值的文本形式（字符串原样返回，其他JSON标量转文本）
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// 数据区：一条消息的变长类型化载荷
///
/// 有序，编码时按列表顺序输出；不去重、无键唯一性要求
#[derive(Debug, Clone, PartialEq)]
pub enum DataRegion {
    /// 无数据
    None,
    /// 标记值列表（联合体形式）
    Values(Vec<TaggedValue>),
    /// 已是0x..形式的裸十六进制标记列表（不再按数据类型编码）
    Tokens(Vec<String>),
    /// 未解析的原始文本（JSON/裸HEX串/任意字符串）
    Text(String),
}

impl Default for DataRegion {
    fn default() -> Self {
        DataRegion::Values(Vec::new())
    }
}

impl DataRegion {
    /// 是否等价于空数据区
    pub fn is_effectively_empty(&self) -> bool {
        match self {
            DataRegion::None => true,
            DataRegion::Values(v) => v.is_empty(),
            DataRegion::Tokens(t) => t.is_empty(),
            DataRegion::Text(s) => s.trim().is_empty(),
        }
    }

    /// 持久化文本：非空列表JSON编码，空列表为"[]"，无数据为"None"
    pub fn to_xml_text(&self) -> String {
        match self {
            DataRegion::None => "None".to_string(),
            DataRegion::Values(v) => {
                if v.is_empty() {
                    "[]".to_string()
                } else {
                    serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string())
                }
            }
            DataRegion::Tokens(t) => {
                if t.is_empty() {
                    "[]".to_string()
                } else {
                    serde_json::to_string(t).unwrap_or_else(|_| "[]".to_string())
                }
            }
            DataRegion::Text(s) => s.clone(),
        }
    }

    /// 由持久化文本还原数据区
    ///
    /// 空文本/"None"/非列表JSON一律还原为空列表；
    /// JSON解析失败的非空文本按原始文本保留，交由归一化器解释
    pub fn from_xml_text(text: &str) -> DataRegion {
        let raw = text.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
            return DataRegion::Values(Vec::new());
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => {
                if items.iter().all(|i| i.is_string()) {
                    let tokens = items
                        .into_iter()
                        .filter_map(|i| i.as_str().map(|s| s.to_string()))
                        .collect();
                    return DataRegion::Tokens(tokens);
                }
                let mut values = Vec::new();
                for item in items {
                    match item {
                        Value::Object(map) => {
                            let data_type = map
                                .get("data_type")
                                .and_then(|v| v.as_i64())
                                .unwrap_or(0);
                            let value = map.get("value").cloned().unwrap_or(Value::Null);
                            values.push(TaggedValue { data_type, value });
                        }
                        other => {
                            log::warn!("数据区列表中出现非对象项，已跳过: {}", other);
                        }
                    }
                }
                DataRegion::Values(values)
            }
            Ok(_) => DataRegion::Values(Vec::new()),
            Err(_) => DataRegion::Text(raw.to_string()),
        }
    }
}

/// 保留原始输入文本的站点/地址字段
///
/// 文本形式（含"0x11"这类16进制字面量）是持久化的权威形式，
/// 数值解释按需计算
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HexLiteral {
    raw: Option<String>,
}

impl HexLiteral {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        let mut field = Self::default();
        field.set_text(&text.into());
        field
    }

    /// 设置原始输入文本，空白文本视为未填写
    pub fn set_text(&mut self, text: &str) {
        if text.trim().is_empty() {
            self.raw = None;
        } else {
            self.raw = Some(text.to_string());
        }
    }

    /// 原始输入文本
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// 原始文本（未填写时返回空串）
    pub fn text(&self) -> &str {
        self.raw.as_deref().unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_none()
    }

    /// 数值解释（支持0x前缀与全角笔误，解析失败为0）
    pub fn value(&self) -> i64 {
        self.value_or(0)
    }

    pub fn value_or(&self, default: i64) -> i64 {
        match &self.raw {
            Some(text) => numeric::parse_hex_or_int(text, default),
            None => default,
        }
    }
}

/// base子字典：所有流程步类型共有的基础字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseFields {
    /// 仿真时间（秒）
    pub time: f64,
    /// 流程步名称
    pub name: String,
    /// 流程步类型
    pub step_type: StepType,
    /// 字节序
    pub endian: Endianness,
    /// 是否忽略（忽略的流程步不参与导出）
    pub is_ignore: bool,
}

impl Default for BaseFields {
    fn default() -> Self {
        Self {
            time: 0.0,
            name: String::new(),
            step_type: StepType::default(),
            endian: Endianness::default(),
            is_ignore: false,
        }
    }
}

/// type子字典：与流程步类型绑定的协议字段
///
/// 哪些成员对当前流程步类型有效由字段注册表决定，
/// [`TypeFields::retain_for`]在类型切换时清除不兼容字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeFields {
    /// 站点类型（0=NC主站点，1=NT从站点）
    pub site_type: Option<i64>,
    pub local_site: HexLiteral,
    pub recip_site: HexLiteral,
    pub sub_address: HexLiteral,
    pub base_address: HexLiteral,
    pub address: HexLiteral,
    /// 消息长度（16位字数）
    pub msg_len: Option<i64>,
    /// 协议类型（-1表示"无"，不输出协议数据）
    pub protocol_type: Option<i64>,
    pub serial_id: Option<i64>,
    /// 开关量位宽（8/16/32）
    pub switch_type: Option<i64>,
    pub switch_value: Option<i64>,
    pub interrupt_num: Option<String>,
    /// 周期（秒）
    pub period: Option<f64>,
    /// 周期数据文件路径（可用;或,分隔多个）
    pub file_path: Option<String>,
    pub data_region: DataRegion,
}

/// type子字典全部成员名
const ALL_TYPE_FIELDS: [&str; 15] = [
    "site_type",
    "local_site",
    "recip_site",
    "sub_address",
    "base_address",
    "address",
    "msg_len",
    "protocol_type",
    "serial_id",
    "switch_type",
    "switch_value",
    "interrupt_num",
    "period",
    "file_path",
    "data_region",
];

impl TypeFields {
    pub fn protocol_type(&self) -> i64 {
        self.protocol_type.unwrap_or(-1)
    }

    pub fn msg_len(&self) -> i64 {
        self.msg_len.unwrap_or(0)
    }

    pub fn site_type(&self) -> i64 {
        self.site_type.unwrap_or(0)
    }

    pub fn serial_id(&self) -> i64 {
        self.serial_id.unwrap_or(0)
    }

    pub fn switch_type(&self) -> i64 {
        self.switch_type.unwrap_or(8)
    }

    pub fn switch_value(&self) -> i64 {
        self.switch_value.unwrap_or(0)
    }

    pub fn period(&self) -> f64 {
        self.period.unwrap_or(0.0)
    }

    /// 清除单个字段
    pub fn clear_field(&mut self, field_name: &str) {
        match field_name {
            "site_type" => self.site_type = None,
            "local_site" => self.local_site = HexLiteral::new(),
            "recip_site" => self.recip_site = HexLiteral::new(),
            "sub_address" => self.sub_address = HexLiteral::new(),
            "base_address" => self.base_address = HexLiteral::new(),
            "address" => self.address = HexLiteral::new(),
            "msg_len" => self.msg_len = None,
            "protocol_type" => self.protocol_type = None,
            "serial_id" => self.serial_id = None,
            "switch_type" => self.switch_type = None,
            "switch_value" => self.switch_value = None,
            "interrupt_num" => self.interrupt_num = None,
            "period" => self.period = None,
            "file_path" => self.file_path = None,
            "data_region" => self.data_region = DataRegion::default(),
            _ => {}
        }
    }

    /// 流程步类型切换：清除新类型不支持的字段，兼容字段（含数据区）保留
    pub fn retain_for(&mut self, new_type: StepType) {
        for field_name in ALL_TYPE_FIELDS {
            if !registry::step_type_has_field(new_type, field_name) {
                self.clear_field(field_name);
            }
        }
    }
}

/// expand子字典：非协议簿记字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandFields {
    /// 周期分组ID（主流程步与其展开行共享）
    pub periodic_group_id: Option<String>,
    /// 行在分组内的序号
    pub periodic_group_index: Option<i64>,
    /// 是否分组首行（主流程步）
    pub periodic_group_first: Option<bool>,
    /// 周期数据文件路径备份
    pub periodic_file_path: Option<String>,
    /// 多行文件数据（临时数据，不持久化到expand子字典）
    pub periodic_file_data: Vec<DataRegion>,
    /// 其余透传字段（原样保存/还原）
    pub extras: BTreeMap<String, String>,
}

impl ExpandFields {
    /// 清除周期分组联结字段
    pub fn clear_group_links(&mut self) {
        self.periodic_group_id = None;
        self.periodic_group_index = None;
        self.periodic_group_first = None;
    }
}

/// protocol子字典：协议模板字段的解析值，保持模板字段顺序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolFields {
    entries: Vec<(String, String)>,
}

impl ProtocolFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, element: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == element)
            .map(|(_, value)| value.as_str())
    }

    /// 写入字段值；已存在则原地更新，否则追加到尾部
    pub fn set(&mut self, element: impl Into<String>, value: impl Into<String>) {
        let element = element.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(name, _)| *name == element) {
            entry.1 = value;
        } else {
            self.entries.push((element, value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// 流程步实体：配置的基本单元
///
/// 由宿主程序的流程步列表独占持有，按索引寻址，不跨流程步共享
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub base: BaseFields,
    pub type_fields: TypeFields,
    pub expand: ExpandFields,
    pub protocol: ProtocolFields,
}

impl Step {
    /// 创建指定类型的空流程步
    pub fn new(step_type: StepType) -> Self {
        let mut step = Self::default();
        step.base.step_type = step_type;
        step
    }

    pub fn step_type(&self) -> StepType {
        self.base.step_type
    }

    /// 切换流程步类型，清除与新类型不兼容的type字段
    pub fn set_step_type(&mut self, step_type: StepType) {
        if step_type != self.base.step_type {
            self.type_fields.retain_for(step_type);
            self.base.step_type = step_type;
        }
    }

    pub fn protocol_type(&self) -> i64 {
        self.type_fields.protocol_type()
    }

    pub fn is_big_endian(&self) -> bool {
        self.base.endian.is_big()
    }

    /// 站点/地址字段的原始输入文本
    pub fn raw_literal(&self, field_name: &str) -> Option<&str> {
        self.literal_field(field_name).and_then(|f| f.raw())
    }

    /// 设置站点/地址字段的原始输入文本
    pub fn set_raw_literal(&mut self, field_name: &str, text: &str) {
        match field_name {
            "local_site" => self.type_fields.local_site.set_text(text),
            "recip_site" => self.type_fields.recip_site.set_text(text),
            "sub_address" => self.type_fields.sub_address.set_text(text),
            "base_address" => self.type_fields.base_address.set_text(text),
            "address" => self.type_fields.address.set_text(text),
            _ => {}
        }
    }

    /// 站点/地址字段的数值解释
    pub fn literal_value(&self, field_name: &str) -> i64 {
        self.literal_field(field_name).map(|f| f.value()).unwrap_or(0)
    }

    fn literal_field(&self, field_name: &str) -> Option<&HexLiteral> {
        match field_name {
            "local_site" => Some(&self.type_fields.local_site),
            "recip_site" => Some(&self.type_fields.recip_site),
            "sub_address" => Some(&self.type_fields.sub_address),
            "base_address" => Some(&self.type_fields.base_address),
            "address" => Some(&self.type_fields.address),
            _ => None,
        }
    }
}
