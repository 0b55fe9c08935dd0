//! 宽容数值文本解析
//!
//! 流程步配置中的数值既可能来自程序写出，也可能来自人工粘贴，
//! 因此解析必须容忍：0x/0b/0o前缀、小数文本、全角乘号×/Ｘ、
//! 全角数字０等中文输入法常见笔误。
//!
//! 这里保留了三个行为不同的解析入口，它们对"无前缀文本默认按
//! 什么进制解析"的取舍各不相同，与既有数据文件的兼容性绑定，
//! 不能合并：
//! - [`token_to_int`]: 无前缀时先试16进制，再退回十进制（数据区标记）
//! - [`parse_int_lenient`]: 无前缀时按十进制/浮点解析（通用数值字段）
//! - [`parse_hex_or_int`]: 在`parse_int_lenient`基础上修复"有x无0x"的残缺前缀

/// 将全角字符笔误归一化为ASCII形式
pub fn normalize_fullwidth(text: &str) -> String {
    text.replace('×', "x")
        .replace('Ｘ', "x")
        .replace("０x", "0x")
        .replace("０X", "0x")
        .replace('０', "0")
}

/// 去掉0x前缀并移除空格，返回纯十六进制数字串
pub fn strip_hex_prefix(token: &str) -> String {
    let token = token.trim();
    let token = if token.len() >= 2 && token[..2].eq_ignore_ascii_case("0x") {
        &token[2..]
    } else {
        token
    };
    token.replace(' ', "")
}

/// 按空白/逗号切分数据区文本为标记列表
pub fn split_tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect()
}

/// 数据区标记解析：无前缀文本先按16进制解析，失败再按十进制
///
/// 空文本或非法文本返回None，调用方自行决定默认值
pub fn token_to_int(token: &str) -> Option<i64> {
    let text = normalize_fullwidth(token.trim());
    if text.is_empty() {
        return None;
    }
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok();
    }
    // 包含x但没有0x前缀时，补齐后按16进制解析
    if lower.contains('x') {
        let hex_part: String = lower.chars().filter(|c| *c != 'x').collect();
        return i64::from_str_radix(&hex_part, 16).ok();
    }
    // 默认先试16进制，否则按十进制（允许小数文本截断）
    if let Ok(v) = i64::from_str_radix(&lower, 16) {
        return Some(v);
    }
    lower.parse::<f64>().ok().map(|f| f as i64)
}

/// 通用数值字段解析：识别0x/0b/0o前缀与正负号，无前缀按十进制
///
/// 解析失败返回给定的默认值
pub fn parse_int_lenient(value: &str, default: i64) -> i64 {
    let text = normalize_fullwidth(value.trim());
    if text.is_empty() {
        return default;
    }
    let (sign, text) = match text.strip_prefix('-') {
        Some(rest) => (-1i64, rest.trim().to_string()),
        None => (1i64, text),
    };
    let lowered = text.to_ascii_lowercase();
    let parsed = if let Some(hex) = lowered.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lowered.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lowered.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if lowered.contains('.') {
        lowered.parse::<f64>().ok().map(|f| f as i64)
    } else {
        lowered.parse::<i64>().ok()
    };
    match parsed {
        Some(v) => sign * v,
        None => default,
    }
}

/// 站点/地址字段解析：在[`parse_int_lenient`]基础上修复残缺的16进制前缀
///
/// 形如"×15"/"0×15"的输入（全角乘号笔误）归一化后若仍带x但无0x前缀，
/// 剥掉x与多余的前导0重组为0x形式再解析
pub fn parse_hex_or_int(value: &str, default: i64) -> i64 {
    let text = normalize_fullwidth(value.trim());
    if text.is_empty() {
        return default;
    }
    let lowered = text.to_ascii_lowercase();
    if lowered.starts_with("0x") {
        return i64::from_str_radix(&lowered[2..], 16).unwrap_or(default);
    }
    if lowered.contains('x') {
        let mut hex_part: String = lowered.chars().filter(|c| *c != 'x').collect();
        if hex_part.starts_with('0') {
            hex_part.remove(0);
        }
        return i64::from_str_radix(&hex_part, 16).unwrap_or(default);
    }
    lowered.parse::<i64>().unwrap_or(default)
}

/// 浮点字段解析，失败返回默认值
pub fn parse_float_lenient(value: &str, default: f64) -> f64 {
    let text = normalize_fullwidth(value.trim());
    if text.is_empty() {
        return default;
    }
    text.parse::<f64>().unwrap_or(default)
}

/// 按Python风格格式化浮点（整数值保留一位小数，如"2.0"）
///
/// 持久化文本与既有配置文件保持一致
pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
