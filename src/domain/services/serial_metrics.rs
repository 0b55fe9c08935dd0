//! 串口/CRC类计算字段度量
//!
//! 三种模板级后处理共用同一份CRC-16/CCITT实现
//! （多项式0x1021，初值0xFFFF，高位先行，无输入/输出反转）：
//! - 串口标准帧：转义插入 + 累加和 + 长度
//! - 串口扩展帧：转义插入 + CRC，长度与CRC拆为高低8位
//! - CRC尾校验帧：按16位字展开后计算CRC后缀

use crate::utils::numeric;

/// 转义标记序列：连续0x5A 0xFE前插入0x00
const ESCAPE_LEAD: u8 = 0x5A;
const ESCAPE_TAIL: u8 = 0xFE;

/// 计算字段的覆盖值集合（字段名 -> 渲染文本）
pub type Overrides = Vec<(String, String)>;

/// 串口/CRC度量结果
#[derive(Debug, Clone, PartialEq)]
pub struct SerialMetrics {
    /// 处理后的数据区字节（转义已插入）
    pub data_bytes: Vec<u8>,
    /// 数据区显示标记
    pub data_hex_items: Vec<String>,
    /// 计算字段的覆盖值
    pub overrides: Overrides,
}

impl SerialMetrics {
    /// 按字段名查覆盖值
    pub fn override_for(&self, element: &str) -> Option<&str> {
        self.overrides
            .iter()
            .find(|(name, _)| name == element)
            .map(|(_, value)| value.as_str())
    }
}

/// 解析十六进制字符串为字节列表
///
/// 超出0xFF的标记拆成高字节在前的字节序列，非法标记跳过
pub fn parse_hex_string_to_bytes(text: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    for token in numeric::split_tokens(text) {
        let Some(value) = numeric::token_to_int(token) else {
            continue;
        };
        let value = value as u64;
        if value == 0 {
            bytes.push(0);
            continue;
        }
        let mut temp = Vec::new();
        let mut v = value;
        while v > 0 {
            temp.push((v & 0xFF) as u8);
            v >>= 8;
        }
        temp.reverse();
        bytes.extend(temp);
    }
    bytes
}

/// 解析十六进制字符串为16位字列表，非法标记跳过
pub fn parse_hex_string_to_words(text: &str) -> Vec<u16> {
    numeric::split_tokens(text)
        .iter()
        .filter_map(|token| numeric::token_to_int(token))
        .map(|v| (v as u64 & 0xFFFF) as u16)
        .collect()
}

/// 字节列表渲染为以空格分隔的0xXX串
pub fn format_bytes_to_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 16位字列表渲染为以空格分隔的0xXXXX串
pub fn format_words_to_hex_string(words: &[u16]) -> String {
    words
        .iter()
        .map(|w| format!("0x{:04X}", w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 转义插入：每处连续0x5A 0xFE之前插入一个0x00
///
/// 插入的字节参与后续长度/校验计算
pub fn apply_serial_escape(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len());
    for (i, byte) in bytes.iter().enumerate() {
        if *byte == ESCAPE_LEAD && bytes.get(i + 1) == Some(&ESCAPE_TAIL) {
            result.push(0x00);
        }
        result.push(*byte);
    }
    result
}

/// CRC-16/CCITT单字节推进
pub fn crc16_ccitt_update(mut crc: u16, byte: u8) -> u16 {
    crc ^= (byte as u16) << 8;
    for _ in 0..8 {
        if crc & 0x8000 != 0 {
            crc = (crc << 1) ^ 0x1021;
        } else {
            crc <<= 1;
        }
    }
    crc
}

/// CRC-16/CCITT（XModem变体：初值0xFFFF）
pub fn crc16_ccitt(data: &[u8], initial: u16) -> u16 {
    data.iter()
        .fold(initial, |crc, byte| crc16_ccitt_update(crc, *byte))
}

/// 把一个多字节值按高字节在前推进CRC
pub fn crc16_accumulate_value(mut crc: u16, value: u64, byte_count: usize) -> u16 {
    for i in 0..byte_count {
        let byte = ((value >> (8 * (byte_count - 1 - i))) & 0xFF) as u8;
        crc = crc16_ccitt_update(crc, byte);
    }
    crc
}

/// 串口标准帧度量：转义 + 累加和(mod 256) + 长度(mod 256)
pub fn calc_serial_standard_metrics(data_value: &str) -> SerialMetrics {
    let raw_bytes = parse_hex_string_to_bytes(data_value);
    let processed = apply_serial_escape(&raw_bytes);
    let checksum = processed
        .iter()
        .fold(0u32, |sum, b| (sum + *b as u32) & 0xFF) as u8;
    let length = (processed.len() & 0xFF) as u8;
    SerialMetrics {
        data_hex_items: processed.iter().map(|b| format!("0x{:02X}", b)).collect(),
        overrides: vec![
            ("数据区".to_string(), format_bytes_to_hex_string(&processed)),
            ("数据区累加和".to_string(), format!("0x{:02X}", checksum)),
            ("数据区长度".to_string(), format!("0x{:02X}", length)),
        ],
        data_bytes: processed,
    }
}

/// 串口扩展帧度量：转义 + CRC-16/CCITT，长度与CRC拆为高低8位
pub fn calc_serial_extended_metrics(data_value: &str) -> SerialMetrics {
    let raw_bytes = parse_hex_string_to_bytes(data_value);
    let processed = apply_serial_escape(&raw_bytes);
    let crc = crc16_ccitt(&processed, 0xFFFF);
    let length = (processed.len() & 0xFFFF) as u16;
    SerialMetrics {
        data_hex_items: processed.iter().map(|b| format!("0x{:02X}", b)).collect(),
        overrides: vec![
            ("数据区".to_string(), format_bytes_to_hex_string(&processed)),
            (
                "数据区crc校验和低8位".to_string(),
                format!("0x{:02X}", crc & 0xFF),
            ),
            (
                "数据区crc校验和高8位".to_string(),
                format!("0x{:02X}", (crc >> 8) & 0xFF),
            ),
            (
                "数据区长度低8位".to_string(),
                format!("0x{:02X}", length & 0xFF),
            ),
            (
                "数据区长度高8位".to_string(),
                format!("0x{:02X}", (length >> 8) & 0xFF),
            ),
        ],
        data_bytes: processed,
    }
}

/// CRC尾校验帧度量：数据区按16位字展开，对大端字节序列计算CRC
///
/// 无转义插入
pub fn calc_crc_tail_metrics(data_value: &str) -> SerialMetrics {
    let words = parse_hex_string_to_words(data_value);
    let mut data_bytes = Vec::with_capacity(words.len() * 2);
    for w in &words {
        data_bytes.push((w >> 8) as u8);
        data_bytes.push((w & 0xFF) as u8);
    }
    let crc = crc16_ccitt(&data_bytes, 0xFFFF);
    SerialMetrics {
        data_hex_items: words.iter().map(|w| format!("0x{:04X}", w)).collect(),
        overrides: vec![
            ("数据区".to_string(), format_words_to_hex_string(&words)),
            ("数据区crc校验和".to_string(), format!("0x{:04X}", crc)),
        ],
        data_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_self_check() {
        // CRC-16/CCITT-FALSE的标准自检值
        assert_eq!(crc16_ccitt(b"123456789", 0xFFFF), 0x29B1);
    }

    #[test]
    fn test_escape_insertion() {
        assert_eq!(
            apply_serial_escape(&[0x5A, 0xFE]),
            vec![0x00, 0x5A, 0xFE]
        );
        assert_eq!(
            apply_serial_escape(&[0x01, 0x5A, 0xFE, 0x02]),
            vec![0x01, 0x00, 0x5A, 0xFE, 0x02]
        );
        // 不相邻不转义
        assert_eq!(
            apply_serial_escape(&[0x5A, 0x00, 0xFE]),
            vec![0x5A, 0x00, 0xFE]
        );
        assert_eq!(apply_serial_escape(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_serial_standard_metrics() {
        let metrics = calc_serial_standard_metrics("0x5A 0xFE");
        assert_eq!(metrics.data_bytes, vec![0x00, 0x5A, 0xFE]);
        assert_eq!(metrics.override_for("数据区累加和"), Some("0x58"));
        assert_eq!(metrics.override_for("数据区长度"), Some("0x03"));
        assert_eq!(
            metrics.override_for("数据区"),
            Some("0x00 0x5A 0xFE")
        );
    }

    #[test]
    fn test_serial_extended_metrics() {
        let metrics = calc_serial_extended_metrics("0x5A 0xFE 0x01");
        // 转义后为 00 5A FE 01，CRC=0x3D20
        assert_eq!(metrics.data_bytes, vec![0x00, 0x5A, 0xFE, 0x01]);
        assert_eq!(metrics.override_for("数据区crc校验和低8位"), Some("0x20"));
        assert_eq!(metrics.override_for("数据区crc校验和高8位"), Some("0x3D"));
        assert_eq!(metrics.override_for("数据区长度低8位"), Some("0x04"));
        assert_eq!(metrics.override_for("数据区长度高8位"), Some("0x00"));
    }

    #[test]
    fn test_crc_tail_metrics_pinned_constant() {
        // 参考运行固定值：0x0102展开为[0x01,0x02]，CRC=0x0E7C
        let metrics = calc_crc_tail_metrics("0x0102");
        assert_eq!(metrics.data_bytes, vec![0x01, 0x02]);
        assert_eq!(metrics.override_for("数据区crc校验和"), Some("0x0E7C"));
        // 相同输入重复计算结果一致
        let again = calc_crc_tail_metrics("0x0102");
        assert_eq!(metrics, again);
    }

    #[test]
    fn test_parse_hex_string_wide_token_split() {
        // 超过0xFF的标记拆为高字节在前的字节序列
        assert_eq!(parse_hex_string_to_bytes("0x010203"), vec![1, 2, 3]);
        assert_eq!(parse_hex_string_to_bytes("0x00"), vec![0]);
        assert_eq!(parse_hex_string_to_bytes("bad 0x01"), vec![0xBA, 0xD0, 1]);
        assert_eq!(parse_hex_string_to_words("0x12 0x3456"), vec![0x12, 0x3456]);
    }
}
