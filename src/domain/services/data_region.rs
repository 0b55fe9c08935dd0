//! 数据区归一化器
//!
//! 把数据区的各种来源形态（联合体列表、JSON文本、裸HEX标记串、
//! 任意字符串、无数据）归一化为同一组结果：16位十六进制显示标记、
//! 总字节数、来源种类、连续HEX串与分段长度表。
//!
//! 单个非法标记跳过不致命；空数据区返回空结果不报错。

use crate::domain::services::value_codec::{self, EndianMode};
use crate::models::enums::DataTypeTag;
use crate::models::step::{DataRegion, TaggedValue};
use crate::utils::numeric;

/// 归一化结果的来源种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// 按数据类型逐项编码得到
    Normalized,
    /// 输入本身已是HEX标记，只拼接不再编码
    RawHex,
}

/// 数据区归一化结果
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRegion {
    /// 16位/8位十六进制显示标记
    pub hex_items: Vec<String>,
    /// 总字节数
    pub total_bytes: usize,
    /// 来源种类
    pub source: SourceKind,
    /// 连续HEX串（大写，无0x前缀）
    pub raw_hex: String,
    /// 每个输入项产出的标记个数
    pub segment_lengths: Vec<usize>,
}

impl NormalizedRegion {
    fn empty() -> Self {
        Self {
            hex_items: Vec::new(),
            total_bytes: 0,
            source: SourceKind::Normalized,
            raw_hex: String::new(),
            segment_lengths: Vec::new(),
        }
    }

    fn raw_tokens(tokens: Vec<String>) -> Self {
        let raw_hex: String = tokens
            .iter()
            .map(|t| numeric::strip_hex_prefix(t).to_uppercase())
            .collect();
        Self {
            total_bytes: raw_hex.len() / 2,
            segment_lengths: vec![1; tokens.len()],
            source: SourceKind::RawHex,
            hex_items: tokens,
            raw_hex,
        }
    }
}

/// 显式的字节累加器：字节流、显示标记与分段长度一起推进
#[derive(Debug)]
pub struct ByteAccumulator {
    bytes: Vec<u8>,
    hex_items: Vec<String>,
    segment_lengths: Vec<usize>,
    display_big_endian: bool,
}

impl ByteAccumulator {
    pub fn new(display_big_endian: bool) -> Self {
        Self {
            bytes: Vec::new(),
            hex_items: Vec::new(),
            segment_lengths: Vec::new(),
            display_big_endian,
        }
    }

    /// 追加一段字节并记录其显示标记
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.bytes.extend_from_slice(chunk);
        let words = value_codec::bytes_to_hex_words(chunk, self.display_big_endian);
        if !words.is_empty() {
            self.segment_lengths.push(words.len());
            self.hex_items.extend(words);
        }
    }

    pub fn total_bytes(&self) -> usize {
        self.bytes.len()
    }

    fn into_region(self) -> NormalizedRegion {
        let raw_hex: String = self.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        NormalizedRegion {
            total_bytes: self.bytes.len(),
            source: SourceKind::Normalized,
            hex_items: self.hex_items,
            segment_lengths: self.segment_lengths,
            raw_hex,
        }
    }
}

/// 还原XML文本里残留的基本HTML实体
fn unescape_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// 文本的所有标记是否都带0x前缀
fn all_hex_prefixed(parts: &[&str]) -> bool {
    !parts.is_empty()
        && parts
            .iter()
            .all(|p| p.len() >= 2 && p[..2].eq_ignore_ascii_case("0x"))
}

/// 把数据区归一化为统一的标记/字节结果
pub fn normalize_data_region(region: &DataRegion, endian: EndianMode) -> NormalizedRegion {
    match region {
        DataRegion::None => NormalizedRegion::empty(),
        DataRegion::Tokens(tokens) => {
            if tokens.is_empty() {
                NormalizedRegion::empty()
            } else {
                NormalizedRegion::raw_tokens(tokens.clone())
            }
        }
        DataRegion::Text(text) => normalize_text(text, endian),
        DataRegion::Values(values) => {
            if values.is_empty() {
                NormalizedRegion::empty()
            } else {
                normalize_values(values, endian)
            }
        }
    }
}

fn normalize_text(text: &str, endian: EndianMode) -> NormalizedRegion {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return NormalizedRegion::empty();
    }
    // 可能是JSON编码的联合体列表
    let decoded = unescape_entities(trimmed);
    if let Ok(serde_json::Value::Array(items)) = serde_json::from_str::<serde_json::Value>(&decoded)
    {
        let mut values = Vec::new();
        for item in items {
            match item {
                serde_json::Value::Object(map) => {
                    let data_type = map.get("data_type").and_then(|v| v.as_i64()).unwrap_or(0);
                    let value = map.get("value").cloned().unwrap_or(serde_json::Value::Null);
                    values.push(TaggedValue { data_type, value });
                }
                other => {
                    log::warn!("数据区JSON列表中出现非对象项，已跳过: {}", other);
                }
            }
        }
        if values.is_empty() {
            return NormalizedRegion::empty();
        }
        return normalize_values(&values, endian);
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if all_hex_prefixed(&parts) {
        return NormalizedRegion::raw_tokens(parts.iter().map(|p| p.to_string()).collect());
    }
    // 任意字符串按UTF-8字节输出
    let mut acc = ByteAccumulator::new(endian.display_big_endian());
    acc.push_chunk(trimmed.as_bytes());
    acc.into_region()
}

/// 字符串型联合体项的编码：全0x标记串按字节值解析，否则UTF-8
fn string_item_bytes(text: &str) -> Vec<u8> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if all_hex_prefixed(&parts) {
        let mut bytes = Vec::new();
        for part in parts {
            match numeric::token_to_int(part) {
                Some(v) if (0..=0xFF).contains(&v) => bytes.push(v as u8),
                Some(v) => {
                    // 大于255的值按16位高字节在前输出
                    bytes.push(((v >> 8) & 0xFF) as u8);
                    bytes.push((v & 0xFF) as u8);
                }
                None => {
                    log::warn!("数据区字符串标记非法，已跳过: {}", part);
                }
            }
        }
        bytes
    } else {
        text.as_bytes().to_vec()
    }
}

fn normalize_values(values: &[TaggedValue], endian: EndianMode) -> NormalizedRegion {
    let display_big_endian = endian.display_big_endian();
    let mut acc = ByteAccumulator::new(display_big_endian);
    for item in values {
        let tag = match item.tag() {
            Some(tag) => tag,
            None => {
                log::warn!("数据区项数据类型索引{}未知，按UINT8处理", item.data_type);
                DataTypeTag::Uint8
            }
        };
        let text = item.value_text();
        let chunk = if tag == DataTypeTag::Str {
            string_item_bytes(&text)
        } else {
            value_codec::scalar_to_bytes(tag, &text, display_big_endian)
        };
        let chunk = if endian.is_little() && tag.little_endian_word_swap() {
            value_codec::swap_16bit_words(&chunk)
        } else {
            chunk
        };
        if chunk.is_empty() {
            // 编码失败退化为单个零字节
            acc.push_chunk(&[0]);
        } else {
            acc.push_chunk(&chunk);
        }
    }
    acc.into_region()
}

/// 将数据区统一渲染为以空格分隔的十六进制字符串
///
/// UINT8按2位、UINT16按4位输出，其余类型按最短形式输出；
/// 供串口/CRC类计算字段的度量函数消费
pub fn normalize_data_region_value(region: &DataRegion) -> String {
    match region {
        DataRegion::None => String::new(),
        DataRegion::Text(s) => s.trim().to_string(),
        DataRegion::Tokens(tokens) => tokens.join(" "),
        DataRegion::Values(values) => {
            let mut parts = Vec::with_capacity(values.len());
            for item in values {
                let int_value = numeric::token_to_int(&item.value_text()).unwrap_or(0);
                let rendered = match item.tag() {
                    Some(DataTypeTag::Uint8) => format!("0x{:02X}", int_value & 0xFF),
                    Some(DataTypeTag::Uint16) => format!("0x{:04X}", int_value & 0xFFFF),
                    _ => format!("0x{:X}", int_value),
                };
                parts.push(rendered);
            }
            parts.join(" ")
        }
    }
}

/// 数据区的总字节数估算
///
/// 联合体按类型宽度累计，未知类型按2字节计
/// （与归一化失败时的1字节退化刻意不同，兼容既有数据）
pub fn region_byte_length(region: &DataRegion) -> usize {
    match region {
        DataRegion::None => 0,
        DataRegion::Values(values) => values
            .iter()
            .map(|item| match item.tag() {
                Some(DataTypeTag::Str) => item.value_text().as_bytes().len(),
                Some(tag) => tag.byte_width().unwrap_or(2),
                None => 2,
            })
            .sum(),
        DataRegion::Tokens(tokens) => tokens
            .iter()
            .map(|t| (numeric::strip_hex_prefix(t).len() + 1) / 2)
            .sum(),
        DataRegion::Text(text) => numeric::split_tokens(text)
            .iter()
            .map(|t| (numeric::strip_hex_prefix(t).len() + 1) / 2)
            .sum(),
    }
}

/// 拼接所有标记后按16位（4个hex字符）重新切片输出
pub fn format_hex_items_for_output(hex_items: &[String]) -> Vec<String> {
    if hex_items.is_empty() {
        return Vec::new();
    }
    let hex_stream: String = hex_items
        .iter()
        .map(|t| numeric::strip_hex_prefix(t).to_uppercase())
        .collect();
    if hex_stream.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = hex_stream.chars().collect();
    chars
        .chunks(4)
        .map(|chunk| format!("0x{}", chunk.iter().collect::<String>()))
        .collect()
}

/// 将相邻的8位标记组合成16位输出
///
/// 两个相邻的≤2位标记合成一个4位标记；≤2位标记后跟>2位标记时，
/// 拆出后者的高字节与前者合并（0x12 0x3456 -> 0x1234 0x56）
pub fn merge_adjacent_byte_tokens(hex_items: &[String]) -> Vec<String> {
    let mut merged = Vec::with_capacity(hex_items.len());
    let mut i = 0;
    while i < hex_items.len() {
        let stripped = numeric::strip_hex_prefix(&hex_items[i]);
        if stripped.is_empty() {
            i += 1;
            continue;
        }
        if stripped.len() <= 2 {
            let val1 = i64::from_str_radix(&stripped, 16).unwrap_or(0);
            if i + 1 < hex_items.len() {
                let next_stripped = numeric::strip_hex_prefix(&hex_items[i + 1]);
                if !next_stripped.is_empty() && next_stripped.len() <= 2 {
                    let val2 = i64::from_str_radix(&next_stripped, 16).unwrap_or(0);
                    merged.push(format!("0x{:04X}", (val1 << 8) | val2));
                    i += 2;
                    continue;
                } else if next_stripped.len() > 2 {
                    if let Ok(next_val) = i64::from_str_radix(&next_stripped, 16) {
                        let high_byte = (next_val >> 8) & 0xFF;
                        let low_byte = next_val & 0xFF;
                        merged.push(format!("0x{:04X}", (val1 << 8) | high_byte));
                        merged.push(format!("0x{:02X}", low_byte));
                        i += 2;
                        continue;
                    }
                }
            }
            merged.push(format!("0x{:04X}", val1));
            i += 1;
        } else {
            merged.push(hex_items[i].clone());
            i += 1;
        }
    }
    merged
}
