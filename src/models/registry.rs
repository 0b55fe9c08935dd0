//! 字段模式注册表
//!
//! 静态模式表：字段的数据种类、默认值、中文标签、下拉选项，
//! 以及每种流程步类型合法的type子字典字段列表。
//! 纯查询，无状态；查询未知字段/索引返回模式错误，
//! 调用方应视为配置缺陷向上传播，而不是当作可恢复的输入错误。

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::enums::StepType;
use crate::utils::error::{AppError, AppResult};

/// 字段的数据种类（决定持久化文本的解析方式）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 字符串字段（站点/地址字段按原文保存）
    Str,
    /// 无符号整数字段
    Uint,
    /// 有符号整数字段
    Int,
    /// 浮点字段
    Double,
    /// 下拉选项字段（以整数值保存）
    Combo,
    /// 数据区联合体字段
    Union,
}

/// 单个字段的模式定义
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub label: &'static str,
    pub default_text: &'static str,
}

/// base子字典的字段列表（所有流程步类型共有）
pub const BASE_FIELDS: [&str; 5] = ["time", "name", "step_type", "endian", "is_ignore"];

/// 需要保留原始输入文本（如"0x11"）的站点/地址字段
pub const RAW_LITERAL_FIELDS: [&str; 5] = [
    "local_site",
    "recip_site",
    "sub_address",
    "base_address",
    "address",
];

static FIELD_SPECS: Lazy<HashMap<&'static str, FieldSpec>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let mut put = |name, kind, label, default_text| {
        m.insert(
            name,
            FieldSpec {
                kind,
                label,
                default_text,
            },
        );
    };
    // base字段
    put("time", FieldKind::Double, "仿真时间(s)", "0.0");
    put("name", FieldKind::Str, "名称", "");
    put("step_type", FieldKind::Combo, "流程步类型", "0");
    put("endian", FieldKind::Combo, "字节序", "0");
    put("is_ignore", FieldKind::Combo, "是否忽略", "0");
    // type字段
    put("site_type", FieldKind::Combo, "站点类型", "0");
    put("local_site", FieldKind::Str, "自身站点号", "");
    put("recip_site", FieldKind::Str, "对方站点号", "");
    put("sub_address", FieldKind::Str, "子地址", "");
    put("base_address", FieldKind::Str, "基地址", "");
    put("address", FieldKind::Str, "地址", "");
    put("msg_len", FieldKind::Uint, "消息长度", "0");
    put("protocol_type", FieldKind::Combo, "协议类型", "-1");
    put("serial_id", FieldKind::Uint, "串口号", "0");
    put("switch_type", FieldKind::Combo, "开关量位宽", "8");
    put("switch_value", FieldKind::Uint, "开关量值", "0");
    put("interrupt_num", FieldKind::Str, "中断号", "");
    put("period", FieldKind::Double, "周期(s)", "0.0");
    put("file_path", FieldKind::Str, "数据文件", "");
    put("data_region", FieldKind::Union, "数据区", "");
    m
});

/// 下拉选项表：字段名 -> [(值, 标签)]
static COMBO_OPTIONS: Lazy<HashMap<&'static str, &'static [(i64, &'static str)]>> =
    Lazy::new(|| {
        let mut m: HashMap<&'static str, &'static [(i64, &'static str)]> = HashMap::new();
        m.insert("endian", &[(0, "大端"), (1, "小端")]);
        m.insert("is_ignore", &[(0, "否"), (1, "是")]);
        m.insert("site_type", &[(0, "NC站点"), (1, "NT站点")]);
        m.insert("switch_type", &[(8, "8位"), (16, "16位"), (32, "32位")]);
        m
    });

/// 每种流程步类型合法的type子字典字段列表（顺序即持久化顺序）
static STEP_TYPE_FIELDS: Lazy<HashMap<StepType, &'static [&'static str]>> = Lazy::new(|| {
    const GLINK_NON: &[&str] = &[
        "site_type",
        "local_site",
        "recip_site",
        "sub_address",
        "msg_len",
        "protocol_type",
        "data_region",
    ];
    const GLINK_PER: &[&str] = &[
        "site_type",
        "local_site",
        "recip_site",
        "sub_address",
        "msg_len",
        "protocol_type",
        "period",
        "file_path",
        "data_region",
    ];
    const UART_NON: &[&str] = &[
        "serial_id",
        "base_address",
        "msg_len",
        "protocol_type",
        "data_region",
    ];
    const UART_PER: &[&str] = &[
        "serial_id",
        "base_address",
        "msg_len",
        "protocol_type",
        "period",
        "file_path",
        "data_region",
    ];
    const SWITCH: &[&str] = &["address", "switch_type", "switch_value"];
    const INT_NON: &[&str] = &["interrupt_num"];
    const INT_PER: &[&str] = &["interrupt_num", "period"];

    let mut m: HashMap<StepType, &'static [&'static str]> = HashMap::new();
    m.insert(StepType::GlinkNonPeriodic, GLINK_NON);
    m.insert(StepType::GlinkPeriodic, GLINK_PER);
    m.insert(StepType::UartNonPeriodic, UART_NON);
    m.insert(StepType::UartPeriodic, UART_PER);
    // 1553-BC与GLINK共用同一组站点/子地址字段
    m.insert(StepType::Bus1553NonPeriodic, GLINK_NON);
    m.insert(StepType::Bus1553Periodic, GLINK_PER);
    m.insert(StepType::SwitchQuantity, SWITCH);
    m.insert(StepType::InterruptNonPeriodic, INT_NON);
    m.insert(StepType::InterruptPeriodic, INT_PER);
    m
});

/// 获取字段的数据种类
pub fn field_kind(field_name: &str) -> AppResult<FieldKind> {
    FIELD_SPECS
        .get(field_name)
        .map(|spec| spec.kind)
        .ok_or_else(|| AppError::schema_error(format!("未知字段: {}", field_name)))
}

/// 获取字段的默认值文本
pub fn field_default(field_name: &str) -> AppResult<&'static str> {
    FIELD_SPECS
        .get(field_name)
        .map(|spec| spec.default_text)
        .ok_or_else(|| AppError::schema_error(format!("未知字段: {}", field_name)))
}

/// 获取字段的中文标签
pub fn field_label(field_name: &str) -> AppResult<&'static str> {
    FIELD_SPECS
        .get(field_name)
        .map(|spec| spec.label)
        .ok_or_else(|| AppError::schema_error(format!("未知字段: {}", field_name)))
}

/// 获取下拉字段的选项列表
pub fn combo_options(field_name: &str) -> AppResult<&'static [(i64, &'static str)]> {
    COMBO_OPTIONS
        .get(field_name)
        .copied()
        .ok_or_else(|| AppError::schema_error(format!("未知下拉字段: {}", field_name)))
}

/// 获取指定流程步类型的type字段列表
pub fn step_type_field_list(step_type: StepType) -> &'static [&'static str] {
    STEP_TYPE_FIELDS
        .get(&step_type)
        .copied()
        .unwrap_or(&[])
}

/// 字段是否属于指定流程步类型
pub fn step_type_has_field(step_type: StepType, field_name: &str) -> bool {
    step_type_field_list(step_type).contains(&field_name)
}

/// 字段是否需要保留原始输入文本
pub fn is_raw_literal_field(field_name: &str) -> bool {
    RAW_LITERAL_FIELDS.contains(&field_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_field_lookups() {
        assert_eq!(field_kind("time").unwrap(), FieldKind::Double);
        assert_eq!(field_kind("data_region").unwrap(), FieldKind::Union);
        assert_eq!(field_kind("local_site").unwrap(), FieldKind::Str);
        assert_eq!(field_default("protocol_type").unwrap(), "-1");
        assert_eq!(field_label("msg_len").unwrap(), "消息长度");
    }

    #[test]
    fn test_unknown_field_is_schema_error() {
        let err = field_kind("no_such_field").unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
        assert!(field_default("no_such_field").is_err());
    }

    #[test]
    fn test_step_type_field_lists() {
        let glink = step_type_field_list(StepType::GlinkNonPeriodic);
        assert!(glink.contains(&"local_site"));
        assert!(glink.contains(&"data_region"));
        assert!(!glink.contains(&"period"));

        let glink_per = step_type_field_list(StepType::GlinkPeriodic);
        assert!(glink_per.contains(&"period"));
        assert!(glink_per.contains(&"file_path"));

        let switch = step_type_field_list(StepType::SwitchQuantity);
        assert!(switch.contains(&"address"));
        assert!(!switch.contains(&"data_region"));

        assert!(step_type_has_field(StepType::UartPeriodic, "serial_id"));
        assert!(!step_type_has_field(StepType::InterruptNonPeriodic, "period"));
    }

    #[test]
    fn test_raw_literal_fields() {
        assert!(is_raw_literal_field("local_site"));
        assert!(is_raw_literal_field("address"));
        assert!(!is_raw_literal_field("msg_len"));
    }
}
