//! 协议模板引擎
//!
//! 按模板字段顺序把一个流程步编码为帧的十六进制标记流：
//! 数据区角色字段按模板类别走串口/CRC度量或通用归一化器，
//! `*_ARRAY`类型逐元素编码，其余标量字段走类型化值编解码器。
//! 编码调用之间无共享状态；`(流程步类型, 协议类型)`没有注册模板时
//! 返回空载荷而不是报错——协议类型"无"是一等合法状态。

use crate::domain::services::data_region;
use crate::domain::services::serial_metrics::{self, SerialMetrics};
use crate::domain::services::value_codec::{self, EndianMode};
use crate::models::step::{DataRegion, Step};
use crate::models::template::{
    FieldDtype, FieldRole, ProtocolTemplate, TemplateKind, TemplateRegistry,
};
use crate::utils::numeric;

/// 一帧的编码结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameEncoding {
    /// 16位/8位十六进制标记，模板字段顺序
    pub hex_items: Vec<String>,
    /// 总字节数
    pub total_bytes: usize,
    /// 连续HEX串（大写，无0x前缀）
    pub raw_hex: String,
    /// 每个标记的分段长度（合并后恒为1）
    pub segment_lengths: Vec<usize>,
}

impl FrameEncoding {
    pub fn is_empty(&self) -> bool {
        self.hex_items.is_empty()
    }
}

/// 数组字段文本拆分为标量元素
///
/// 接受JSON数组或以空白/逗号/分号/方括号分隔的文本
pub fn split_array_values(value: &str) -> Vec<String> {
    let text = value.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(text) {
        return items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
    }
    text.chars()
        .map(|c| {
            if matches!(c, '[' | ']' | ',' | '，' | ';' | '；') {
                ' '
            } else {
                c
            }
        })
        .collect::<String>()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// 标量文本按数据类型编码为字节并生成显示标记
fn encode_scalar_chunk(
    tag: crate::models::enums::DataTypeTag,
    text: &str,
    endian: EndianMode,
) -> Vec<String> {
    let display_big_endian = endian.display_big_endian();
    let chunk = value_codec::scalar_to_bytes(tag, text, display_big_endian);
    let chunk = if endian.is_little() && tag.little_endian_word_swap() {
        value_codec::swap_16bit_words(&chunk)
    } else {
        chunk
    };
    value_codec::bytes_to_hex_words(&chunk, display_big_endian)
}

/// 数据区角色字段的来源（type数据区优先，协议值与模板默认兜底）
fn effective_data_region(step: &Step, protocol_text: Option<&str>, default_value: &str) -> DataRegion {
    if !step.type_fields.data_region.is_effectively_empty() {
        return step.type_fields.data_region.clone();
    }
    if let Some(text) = protocol_text {
        if !text.trim().is_empty() {
            return DataRegion::Text(text.to_string());
        }
    }
    if default_value.trim().is_empty() {
        DataRegion::None
    } else {
        DataRegion::Text(default_value.to_string())
    }
}

/// 用选定模板编码一个流程步的协议帧
pub fn encode_step_frame(
    step: &Step,
    template: &ProtocolTemplate,
    endian: EndianMode,
) -> FrameEncoding {
    let display_big_endian = endian.display_big_endian();

    // 串口/CRC类模板的度量在字段循环前统一计算
    let metrics: Option<SerialMetrics> = match template.kind {
        TemplateKind::Plain => None,
        kind => {
            let region_text =
                data_region::normalize_data_region_value(&step.type_fields.data_region);
            Some(match kind {
                TemplateKind::SerialStandard => {
                    serial_metrics::calc_serial_standard_metrics(&region_text)
                }
                TemplateKind::SerialExtended => {
                    serial_metrics::calc_serial_extended_metrics(&region_text)
                }
                TemplateKind::CrcTail => serial_metrics::calc_crc_tail_metrics(&region_text),
                TemplateKind::Plain => unreachable!(),
            })
        }
    };

    let mut hex_items: Vec<String> = Vec::new();
    // 时间字段的标记区间，供小端显示的半段交换使用
    let mut time_span: Option<(usize, usize)> = None;

    for field in &template.fields {
        let mut field_hex: Vec<String> = Vec::new();

        if field.role == FieldRole::DataRegion {
            if let Some(metrics) = &metrics {
                field_hex = metrics.data_hex_items.clone();
            } else {
                let region = effective_data_region(
                    step,
                    step.protocol.get(&field.element),
                    &field.default_value,
                );
                field_hex = data_region::normalize_data_region(&region, endian).hex_items;
            }
        } else {
            // 度量覆盖值优先，其次流程步的协议值，最后模板默认值
            let raw_value = metrics
                .as_ref()
                .and_then(|m| m.override_for(&field.element))
                .or_else(|| step.protocol.get(&field.element).filter(|v| !v.is_empty()))
                .unwrap_or(&field.default_value)
                .to_string();

            match field.dtype {
                FieldDtype::Array(tag) => {
                    for element in split_array_values(&raw_value) {
                        field_hex.extend(encode_scalar_chunk(tag, &element, endian));
                    }
                }
                FieldDtype::Scalar(tag) => {
                    field_hex.extend(encode_scalar_chunk(tag, &raw_value, endian));
                }
                FieldDtype::Union => {
                    // 非数据区角色不应声明union类型，按原文标记透传
                    log::warn!("模板{}字段{}声明为union但非数据区角色", template.id, field.element);
                    let normalized =
                        data_region::normalize_data_region(&DataRegion::Text(raw_value), endian);
                    field_hex.extend(normalized.hex_items);
                }
            }
        }

        if field.role == FieldRole::Time && !field_hex.is_empty() {
            time_span = Some((hex_items.len(), field_hex.len()));
        }
        hex_items.extend(field_hex);
    }

    // 小端显示时对时间字段的标记段做对称半段交换
    if !display_big_endian {
        if let Some((start, len)) = time_span {
            let half = len / 2;
            for i in 0..half {
                let left = start + i;
                let right = start + len - 1 - i;
                if right < hex_items.len() {
                    hex_items.swap(left, right);
                }
            }
        }
    }

    if template.merge_8bit_to_16bit && !hex_items.is_empty() {
        hex_items = data_region::merge_adjacent_byte_tokens(&hex_items);
    }

    // 合并后按最终标记重算字节数与分段表
    let raw_hex: String = hex_items
        .iter()
        .map(|t| numeric::strip_hex_prefix(t).to_uppercase())
        .collect();
    FrameEncoding {
        total_bytes: raw_hex.len() / 2,
        segment_lengths: vec![1; hex_items.len()],
        raw_hex,
        hex_items,
    }
}

/// 按注册表查模板并编码；无模板（含协议类型"无"）返回空载荷
pub fn encode_step_protocol(
    step: &Step,
    registry: &TemplateRegistry,
    endian: EndianMode,
) -> FrameEncoding {
    match registry.template_for(step.step_type(), step.protocol_type()) {
        Some(template) => encode_step_frame(step, template, endian),
        None => FrameEncoding::default(),
    }
}
