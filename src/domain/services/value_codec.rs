//! 类型化值编解码器
//!
//! 把单个标记值（数据类型 + 文本/数值）编码为字节序列，
//! 按声明的字节序与类型相关的字交换规则输出。
//!
//! 小端模式有两种形态：
//! - 普通小端：字节序列按小端排列，16位分组也按小端解释
//! - 延迟小端（导出路径）：字节按大端排列供显示，32/64位类型
//!   仍按16位字交换，复现硬件"低16位字在前"的传输顺序

use crate::models::enums::DataTypeTag;
use crate::utils::numeric;

/// 编码用的字节序模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndianMode {
    /// 流程步声明的字节序是否为大端
    pub big_endian: bool,
    /// 小端时是否延迟到16位字层面处理（导出路径固定开启）
    pub defer_little_endian: bool,
}

impl EndianMode {
    pub fn big() -> Self {
        Self {
            big_endian: true,
            defer_little_endian: false,
        }
    }

    pub fn little() -> Self {
        Self {
            big_endian: false,
            defer_little_endian: false,
        }
    }

    /// 导出路径使用的模式：小端流程步按延迟小端处理
    pub fn for_export(big_endian: bool) -> Self {
        Self {
            big_endian,
            defer_little_endian: !big_endian,
        }
    }

    /// 字节排列用的显示字节序
    pub fn display_big_endian(&self) -> bool {
        if self.defer_little_endian {
            true
        } else {
            self.big_endian
        }
    }

    /// 是否为小端流程步（决定32/64位类型的字交换）
    pub fn is_little(&self) -> bool {
        !self.big_endian
    }
}

/// 布尔文本的真值集合
fn bool_truthy(text: &str) -> bool {
    matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on" | "是"
    )
}

/// 按16位（2字节）为单位反转顺序，实现小端输出
///
/// 不足4字节或奇数长度的序列原样返回
pub fn swap_16bit_words(chunk: &[u8]) -> Vec<u8> {
    if chunk.len() < 4 || chunk.len() % 2 != 0 {
        return chunk.to_vec();
    }
    let mut result = Vec::with_capacity(chunk.len());
    for pair in chunk.chunks(2).rev() {
        result.extend_from_slice(pair);
    }
    result
}

/// 将字节序列按16位对齐转换为十六进制标记
///
/// 成对字节合成0xWWWW标记，字内字节序随显示字节序；
/// 末尾落单的字节输出0xBB标记
pub fn bytes_to_hex_words(bytes: &[u8], display_big_endian: bool) -> Vec<String> {
    let mut result = Vec::with_capacity((bytes.len() + 1) / 2);
    let mut i = 0;
    while i < bytes.len() {
        if i + 1 < bytes.len() {
            let word = if display_big_endian {
                ((bytes[i] as u16) << 8) | bytes[i + 1] as u16
            } else {
                bytes[i] as u16 | ((bytes[i + 1] as u16) << 8)
            };
            result.push(format!("0x{:04X}", word));
        } else {
            result.push(format!("0x{:02X}", bytes[i]));
        }
        i += 2;
    }
    result
}

/// 浮点文本若带0x前缀则按位模式解释，返回位值
fn float_bits_from_text(text: &str, bits: u32) -> Option<u64> {
    let lowered = numeric::normalize_fullwidth(text.trim()).to_ascii_lowercase();
    let hex = lowered.strip_prefix("0x")?;
    u64::from_str_radix(hex, 16)
        .ok()
        .map(|v| if bits >= 64 { v } else { v & ((1u64 << bits) - 1) })
}

/// 根据数据类型将值文本编码为字节序列
///
/// 数值解析失败按0编码，不报错，保证半损坏的配置仍可导出核对
pub fn scalar_to_bytes(tag: DataTypeTag, value_text: &str, big_endian: bool) -> Vec<u8> {
    match tag {
        DataTypeTag::Uint8 | DataTypeTag::Int8 => {
            let val = numeric::parse_int_lenient(value_text, 0) as u64;
            vec![(val & 0xFF) as u8]
        }
        DataTypeTag::Uint16 | DataTypeTag::Int16 => {
            let val = (numeric::parse_int_lenient(value_text, 0) as u64 & 0xFFFF) as u16;
            if big_endian {
                val.to_be_bytes().to_vec()
            } else {
                val.to_le_bytes().to_vec()
            }
        }
        DataTypeTag::Uint32 | DataTypeTag::Int32 => {
            let val = (numeric::parse_int_lenient(value_text, 0) as u64 & 0xFFFF_FFFF) as u32;
            if big_endian {
                val.to_be_bytes().to_vec()
            } else {
                val.to_le_bytes().to_vec()
            }
        }
        DataTypeTag::Float32 => {
            let bits = match float_bits_from_text(value_text, 32) {
                Some(bits) => bits as u32,
                None => (numeric::parse_float_lenient(value_text, 0.0) as f32).to_bits(),
            };
            if big_endian {
                bits.to_be_bytes().to_vec()
            } else {
                bits.to_le_bytes().to_vec()
            }
        }
        DataTypeTag::Float64 => {
            let bits = match float_bits_from_text(value_text, 64) {
                Some(bits) => bits,
                None => numeric::parse_float_lenient(value_text, 0.0).to_bits(),
            };
            if big_endian {
                bits.to_be_bytes().to_vec()
            } else {
                bits.to_le_bytes().to_vec()
            }
        }
        DataTypeTag::Bool => {
            vec![if bool_truthy(value_text) { 1 } else { 0 }]
        }
        DataTypeTag::Str => value_text.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint16_always_two_bytes() {
        for text in ["0", "1", "0xFFFF", "258", "garbage"] {
            assert_eq!(scalar_to_bytes(DataTypeTag::Uint16, text, true).len(), 2);
            assert_eq!(scalar_to_bytes(DataTypeTag::Uint16, text, false).len(), 2);
        }
        assert_eq!(
            scalar_to_bytes(DataTypeTag::Uint16, "0x0102", true),
            vec![0x01, 0x02]
        );
        assert_eq!(
            scalar_to_bytes(DataTypeTag::Uint16, "0x0102", false),
            vec![0x02, 0x01]
        );
    }

    #[test]
    fn test_scalar_widths() {
        assert_eq!(scalar_to_bytes(DataTypeTag::Uint8, "0xAB", true), vec![0xAB]);
        assert_eq!(
            scalar_to_bytes(DataTypeTag::Uint32, "1", true),
            vec![0, 0, 0, 1]
        );
        assert_eq!(scalar_to_bytes(DataTypeTag::Float64, "0", true).len(), 8);
        assert_eq!(scalar_to_bytes(DataTypeTag::Bool, "是", true), vec![1]);
        assert_eq!(scalar_to_bytes(DataTypeTag::Bool, "no", true), vec![0]);
        assert_eq!(
            scalar_to_bytes(DataTypeTag::Str, "AB", true),
            vec![0x41, 0x42]
        );
    }

    #[test]
    fn test_float_ieee754_big_endian() {
        assert_eq!(
            scalar_to_bytes(DataTypeTag::Float32, "1.5", true),
            vec![0x3F, 0xC0, 0x00, 0x00]
        );
        assert_eq!(
            scalar_to_bytes(DataTypeTag::Float64, "2.25", true),
            vec![0x40, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_float_hex_literal_is_raw_bit_pattern() {
        // 0x前缀的浮点文本按位模式注入，不按十进制浮点解释
        assert_eq!(
            scalar_to_bytes(DataTypeTag::Float32, "0x3FC00000", true),
            vec![0x3F, 0xC0, 0x00, 0x00]
        );
        assert_eq!(
            scalar_to_bytes(DataTypeTag::Float32, "0x3FC00000", false),
            vec![0x00, 0x00, 0xC0, 0x3F]
        );
    }

    #[test]
    fn test_word_swap() {
        assert_eq!(
            swap_16bit_words(&[0x00, 0x00, 0x00, 0x01]),
            vec![0x00, 0x01, 0x00, 0x00]
        );
        // 不足4字节不交换
        assert_eq!(swap_16bit_words(&[0x01, 0x02]), vec![0x01, 0x02]);
        // 奇数长度不交换
        assert_eq!(swap_16bit_words(&[1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn test_bytes_to_hex_words_grouping() {
        assert_eq!(
            bytes_to_hex_words(&[0x01, 0x02, 0x03], true),
            vec!["0x0102", "0x03"]
        );
        assert_eq!(
            bytes_to_hex_words(&[0x01, 0x02], false),
            vec!["0x0201"]
        );
    }
}
