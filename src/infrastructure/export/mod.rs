//! 协议文本导出
//!
//! 把流程步列表按协议族写出为外部测试装置消费的文本文件：
//! - GLINK/1553-BC：主站点按`(对方站点, 子地址, 字节长度)`分文件，
//!   从站点非周期汇总为描述行文件，从站点周期同主站点分文件
//! - 串口：按串口号分文件
//! - 开关量：按地址分文件
//! - 中断：生成port.config（周期中断周期表 + 单次触发表）
//!
//! 每行格式：`仿真时间(%.3f)\t标记0\t标记1…`。
//! 周期分组的行在写出时逐行重算时间戳/帧计数/尾部CRC，
//! 保证展开后的人工修改仍被覆盖为一致值。
//!
//! 单个文件写失败记录日志后继续，不中断其余文件。

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::services::data_region;
use crate::domain::services::frame_fields;
use crate::domain::services::serial_metrics;
use crate::domain::services::template_engine;
use crate::domain::services::value_codec::EndianMode;
use crate::models::enums::StepType;
use crate::models::step::Step;
use crate::models::template::{TemplateRegistry, ELEM_DATA_CRC};
use crate::utils::config::AppConfig;
use crate::utils::error::{AppError, AppResult};

/// 协议族的导出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportMode {
    Bus,
    Uart,
    Switch,
}

/// 一个协议族的导出规格
struct ProtocolSpec {
    key: &'static str,
    display_name: &'static str,
    non_types: &'static [StepType],
    per_types: &'static [StepType],
    primary_prefix: &'static str,
    secondary_prefix: &'static str,
    secondary_non_filename: &'static str,
    mode: ExportMode,
}

const PROTOCOL_SPECS: [ProtocolSpec; 4] = [
    ProtocolSpec {
        key: "glink",
        display_name: "GLINK",
        non_types: &[StepType::GlinkNonPeriodic],
        per_types: &[StepType::GlinkPeriodic],
        primary_prefix: "Nc",
        secondary_prefix: "Nt",
        secondary_non_filename: "NtRecv_NonPeriod.txt",
        mode: ExportMode::Bus,
    },
    ProtocolSpec {
        key: "bc",
        display_name: "1553-BC",
        non_types: &[StepType::Bus1553NonPeriodic],
        per_types: &[StepType::Bus1553Periodic],
        primary_prefix: "Bc",
        secondary_prefix: "Bt",
        secondary_non_filename: "BtRecv_NonPeriod.txt",
        mode: ExportMode::Bus,
    },
    ProtocolSpec {
        key: "uart",
        display_name: "串口",
        non_types: &[StepType::UartNonPeriodic],
        per_types: &[StepType::UartPeriodic],
        primary_prefix: "",
        secondary_prefix: "",
        secondary_non_filename: "",
        mode: ExportMode::Uart,
    },
    ProtocolSpec {
        key: "switch",
        display_name: "开关量",
        non_types: &[StepType::SwitchQuantity],
        per_types: &[],
        primary_prefix: "",
        secondary_prefix: "",
        secondary_non_filename: "",
        mode: ExportMode::Switch,
    },
];

/// 一个流程步准备好的导出载荷
struct StepPayload {
    is_periodic: bool,
    site_type: i64,
    recip: i64,
    sub_addr: i64,
    byte_len: usize,
    hex_items: Vec<String>,
    /// 多行文件数据（已重分组为16位标记）
    file_sequences: Option<Vec<Vec<String>>>,
    base_time: f64,
    period: f64,
    serial_id: i64,
    address: Option<i64>,
    switch_type: i64,
    switch_value: i64,
}

/// 非周期行：(时间, 标记)
type PlainRow = (f64, Vec<String>);
/// 周期行：(首行时间, 默认标记, 周期, 文件数据行)
type PeriodRow = (f64, Vec<String>, f64, Option<Vec<Vec<String>>>);

/// 从数据文件读取多行HEX序列
///
/// 路径字段可用逗号/分号/换行分隔多个文件；每个非空行解析为一行
/// 16位标记序列，超过消息长度的行截断到消息长度
fn read_hex_sequences_from_files(path_field: &str, msg_len: usize) -> Vec<Vec<String>> {
    let mut sequences = Vec::new();
    let parts: Vec<String> = path_field
        .replace(['\n', ';'], ",")
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    for part in parts {
        let content = match fs::read_to_string(&part) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("周期数据文件不可读，已跳过: {} ({})", part, e);
                continue;
            }
        };
        for line in content.lines() {
            let stream: String = line
                .replace(['\t', ','], " ")
                .replace("0x", "")
                .replace("0X", "")
                .split_whitespace()
                .collect();
            if stream.is_empty() {
                continue;
            }
            let chars: Vec<char> = stream.chars().collect();
            let mut row: Vec<String> = chars
                .chunks(4)
                .map(|chunk| format!("0x{}", chunk.iter().collect::<String>().to_uppercase()))
                .collect();
            if msg_len > 0 && row.len() > msg_len {
                row.truncate(msg_len);
            }
            if !row.is_empty() {
                sequences.push(row);
            }
        }
    }
    sequences
}

/// 清空导出目录下的旧txt文件
fn clear_txt_files(target_dir: &Path) {
    let Ok(entries) = fs::read_dir(target_dir) else {
        return;
    };
    let mut removed = 0usize;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_txt = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if path.is_file() && is_txt {
            match fs::remove_file(&path) {
                Ok(_) => removed += 1,
                Err(e) => log::warn!("删除旧TXT失败: {} ({})", path.display(), e),
            }
        }
    }
    if removed > 0 {
        log::info!("清空目录{}下{}个txt文件", target_dir.display(), removed);
    }
}

/// 为一个流程步准备导出载荷；不属于该协议族或被忽略时返回None
fn prepare_step_payload(
    step: &Step,
    spec: &ProtocolSpec,
    registry: &TemplateRegistry,
) -> Option<StepPayload> {
    let step_type = step.step_type();
    let is_non = spec.non_types.contains(&step_type);
    let is_per = spec.per_types.contains(&step_type);
    if !(is_non || is_per) || step.base.is_ignore {
        return None;
    }

    let mut payload = StepPayload {
        is_periodic: is_per,
        site_type: step.type_fields.site_type(),
        recip: step.literal_value("recip_site"),
        sub_addr: step.literal_value("sub_address"),
        byte_len: 0,
        hex_items: Vec::new(),
        file_sequences: None,
        base_time: step.base.time,
        period: step.type_fields.period(),
        serial_id: step.type_fields.serial_id(),
        address: if step.type_fields.address.is_empty() {
            None
        } else {
            Some(step.literal_value("address"))
        },
        switch_type: step.type_fields.switch_type(),
        switch_value: step.type_fields.switch_value(),
    };

    // 开关量不携带HEX数据
    if step_type == StepType::SwitchQuantity {
        return Some(payload);
    }

    let endian = EndianMode::for_export(step.is_big_endian());
    let msg_len = step.type_fields.msg_len().max(0) as usize;

    let normalized = data_region::normalize_data_region(&step.type_fields.data_region, endian);
    let mut hex_items = normalized.hex_items;
    let mut byte_len = normalized.total_bytes;

    // 数据区为空时回退到数据文件
    if hex_items.is_empty() {
        if let Some(path_field) = &step.type_fields.file_path {
            let sequences = read_hex_sequences_from_files(path_field, msg_len);
            if !sequences.is_empty() {
                hex_items = sequences[0].clone();
                byte_len = hex_items.len() * 2;
                payload.file_sequences = Some(sequences);
            }
        }
    }

    // 协议模板优先于裸数据区
    if step.protocol_type() >= 0 {
        let encoding = template_engine::encode_step_protocol(step, registry, endian);
        if !encoding.is_empty() {
            hex_items = encoding.hex_items;
            byte_len = encoding.total_bytes;
        }
    }

    // 无任何数据时按消息长度补零字
    if hex_items.is_empty() && msg_len > 0 {
        hex_items = vec!["0x0000".to_string(); msg_len];
        byte_len = msg_len * 2;
    }

    payload.byte_len = byte_len;
    payload.hex_items = data_region::format_hex_items_for_output(&hex_items);
    if let Some(sequences) = payload.file_sequences.take() {
        payload.file_sequences = Some(
            sequences
                .iter()
                .map(|seq| data_region::format_hex_items_for_output(seq))
                .collect(),
        );
    }
    Some(payload)
}

fn write_lines_file(protocol_name: &str, path: &Path, lines: &[String]) {
    let content = format!("{}\n", lines.join("\n"));
    match fs::write(path, content) {
        Ok(_) => log::info!("[{}] 写入文件: {}", protocol_name, path.display()),
        Err(e) => log::error!("[{}] 写入文件{}失败: {}", protocol_name, path.display(), e),
    }
}

fn format_row(time_val: f64, tokens: &[String]) -> String {
    let mut line = format!("{:.3}", time_val);
    for token in tokens {
        line.push('\t');
        line.push_str(token);
    }
    line
}

/// 周期行写出前的逐行重算：时间戳(高/低16位)、帧计数、尾部CRC
fn recompute_periodic_row(seq: &mut Vec<String>, time_val: f64, line_idx: usize) {
    if seq.len() > 1 {
        let timestamp_ms = (time_val * 1000.0).round() as i64 as u32;
        seq[0] = format!("0x{:04X}", (timestamp_ms >> 16) & 0xFFFF);
        seq[1] = format!("0x{:04X}", timestamp_ms & 0xFFFF);
    }
    if seq.len() > 4 {
        seq[4] = format!("0x{:04X}", (line_idx + 1) & 0xFFFF);
    }
    if seq.len() > 5 {
        let data_text = if seq.len() > 6 {
            seq[5..seq.len() - 1].join(" ")
        } else {
            String::new()
        };
        let metrics = serial_metrics::calc_crc_tail_metrics(&data_text);
        if let Some(crc) = metrics.override_for(ELEM_DATA_CRC) {
            let last = seq.len() - 1;
            seq[last] = crc.to_string();
        }
    }
}

fn sort_by_time<T>(rows: &mut [(f64, T)])
where
    T: Sized,
{
    rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
}

/// 总线主站点文件名
fn bus_file_name(prefix: &str, recip: i64, sub_addr: i64, byte_len: usize) -> String {
    format!(
        "{}Recv_ID0x{:03X}_SA{:02}_Len{}.txt",
        prefix, recip, sub_addr, byte_len
    )
}

fn write_bus_plain_files(
    protocol_name: &str,
    prefix: &str,
    container: BTreeMap<(i64, i64, usize), Vec<PlainRow>>,
    out_dir: &Path,
) {
    for ((recip, sub_addr, byte_len), mut rows) in container {
        rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let lines: Vec<String> = rows.iter().map(|(t, seq)| format_row(*t, seq)).collect();
        let path = out_dir.join(bus_file_name(prefix, recip, sub_addr, byte_len));
        write_lines_file(protocol_name, &path, &lines);
    }
}

fn write_bus_period_files(
    protocol_name: &str,
    prefix: &str,
    container: BTreeMap<(i64, i64, usize), Vec<PeriodRow>>,
    out_dir: &Path,
) {
    for ((recip, sub_addr, byte_len), mut rows) in container {
        rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut lines = Vec::new();
        for (base_time, default_hex, period, sequences) in rows.drain(..) {
            let expanded: Vec<(f64, Vec<String>, usize)> = match &sequences {
                Some(seqs) if !seqs.is_empty() => seqs
                    .iter()
                    .enumerate()
                    .map(|(idx, seq)| (base_time + period * idx as f64, seq.clone(), idx))
                    .collect(),
                _ => vec![(base_time, default_hex, 0)],
            };
            for (time_val, mut seq, line_idx) in expanded {
                recompute_periodic_row(&mut seq, time_val, line_idx);
                lines.push(format_row(time_val, &seq));
            }
        }
        let path = out_dir.join(bus_file_name(prefix, recip, sub_addr, byte_len));
        write_lines_file(protocol_name, &path, &lines);
    }
}

fn process_bus_protocol(spec: &ProtocolSpec, payloads: Vec<StepPayload>, out_dir: &Path) {
    let mut primary_non: BTreeMap<(i64, i64, usize), Vec<PlainRow>> = BTreeMap::new();
    let mut primary_period: BTreeMap<(i64, i64, usize), Vec<PeriodRow>> = BTreeMap::new();
    let mut secondary_non: Vec<(f64, String, Vec<String>)> = Vec::new();
    let mut secondary_period: BTreeMap<(i64, i64, usize), Vec<PeriodRow>> = BTreeMap::new();

    for payload in payloads {
        let key = (payload.recip, payload.sub_addr, payload.byte_len);
        if !payload.is_periodic {
            if payload.site_type == 0 {
                primary_non
                    .entry(key)
                    .or_default()
                    .push((payload.base_time, payload.hex_items));
            } else {
                let desc = format!(
                    "ID0x{:03X}_SA{:02}_Len{}",
                    payload.recip, payload.sub_addr, payload.byte_len
                );
                secondary_non.push((payload.base_time, desc, payload.hex_items));
            }
        } else {
            let target = if payload.site_type == 0 {
                &mut primary_period
            } else {
                &mut secondary_period
            };
            target.entry(key).or_default().push((
                payload.base_time,
                payload.hex_items,
                payload.period,
                payload.file_sequences,
            ));
        }
    }

    log::info!(
        "[{}] 分类结果: {}非周期{}组, {}周期{}组, {}非周期{}行, {}周期{}组",
        spec.display_name,
        spec.primary_prefix,
        primary_non.len(),
        spec.primary_prefix,
        primary_period.len(),
        spec.secondary_prefix,
        secondary_non.len(),
        spec.secondary_prefix,
        secondary_period.len()
    );

    write_bus_plain_files(spec.display_name, spec.primary_prefix, primary_non, out_dir);
    write_bus_period_files(spec.display_name, spec.primary_prefix, primary_period, out_dir);

    if !secondary_non.is_empty() {
        secondary_non.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let lines: Vec<String> = secondary_non
            .iter()
            .map(|(t, desc, seq)| {
                let mut line = format!("{:.3}\t{}", t, desc);
                for token in seq {
                    line.push('\t');
                    line.push_str(token);
                }
                line
            })
            .collect();
        let path = out_dir.join(spec.secondary_non_filename);
        write_lines_file(spec.display_name, &path, &lines);
    }

    if !secondary_period.is_empty() {
        write_bus_period_files(
            spec.display_name,
            spec.secondary_prefix,
            secondary_period,
            out_dir,
        );
    }
}

fn process_uart_protocol(spec: &ProtocolSpec, payloads: Vec<StepPayload>, out_dir: &Path) {
    let mut group_non: BTreeMap<String, Vec<PlainRow>> = BTreeMap::new();
    let mut group_period: BTreeMap<String, Vec<PeriodRow>> = BTreeMap::new();

    for payload in payloads {
        let addr = format!("{:02}", payload.serial_id);
        if !payload.is_periodic {
            group_non
                .entry(addr)
                .or_default()
                .push((payload.base_time, payload.hex_items));
        } else {
            group_period.entry(addr).or_default().push((
                payload.base_time,
                payload.hex_items,
                payload.period,
                payload.file_sequences,
            ));
        }
    }

    for (addr, mut rows) in group_non {
        sort_by_time(&mut rows);
        let lines: Vec<String> = rows.iter().map(|(t, seq)| format_row(*t, seq)).collect();
        let path = out_dir.join(format!("Uart_NonPeriod_recv_Com_ADD_{}.txt", addr));
        write_lines_file(spec.display_name, &path, &lines);
    }

    for (addr, mut rows) in group_period {
        rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut lines = Vec::new();
        for (base_time, default_hex, period, sequences) in rows.drain(..) {
            match &sequences {
                Some(seqs) if !seqs.is_empty() => {
                    for (idx, seq) in seqs.iter().enumerate() {
                        lines.push(format_row(base_time + period * idx as f64, seq));
                    }
                }
                _ => lines.push(format_row(base_time, &default_hex)),
            }
        }
        let path = out_dir.join(format!("Uart_Period_recv_Com_ADD_{}.txt", addr));
        write_lines_file(spec.display_name, &path, &lines);
    }
}

fn process_switch_protocol(spec: &ProtocolSpec, payloads: Vec<StepPayload>, out_dir: &Path) {
    let mut group_non: BTreeMap<String, Vec<(f64, i64, i64)>> = BTreeMap::new();

    for payload in payloads {
        let Some(address) = payload.address else {
            log::warn!("[{}] 流程步缺少地址，已跳过", spec.display_name);
            continue;
        };
        group_non.entry(format!("{:02x}", address)).or_default().push((
            payload.base_time,
            payload.switch_value,
            payload.switch_type,
        ));
    }

    for (addr, mut rows) in group_non {
        rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let lines: Vec<String> = rows
            .iter()
            .map(|(t, switch_value, switch_type)| {
                // 开关量值按位宽输出定宽十六进制（无0x前缀）
                let hex_value = match switch_type {
                    8 => format!("{:02x}", switch_value),
                    16 => format!("{:04x}", switch_value),
                    32 => format!("{:08x}", switch_value),
                    _ => format!("{:x}", switch_value),
                };
                format!("{:.3}\t{}", t, hex_value)
            })
            .collect();
        let path = out_dir.join(format!("Switch_NonPeriod_{}.txt", addr));
        write_lines_file(spec.display_name, &path, &lines);
    }
}

/// 中断号显示文本（原文保留，空白按"0"）
fn interrupt_display(raw: Option<&str>) -> String {
    let text = raw.unwrap_or("").trim();
    if text.is_empty() {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// 生成中断port.config；无中断流程步时返回None
fn process_interrupt_steps(steps: &[Step], out_dir: &Path) -> AppResult<Option<PathBuf>> {
    let relevant: Vec<&Step> = steps
        .iter()
        .filter(|s| {
            matches!(
                s.step_type(),
                StepType::InterruptNonPeriodic | StepType::InterruptPeriodic
            ) && !s.base.is_ignore
        })
        .collect();
    if relevant.is_empty() {
        return Ok(None);
    }
    fs::create_dir_all(out_dir).map_err(|e| {
        AppError::io_error(format!("创建中断输出目录失败: {}", e), e.kind().to_string())
    })?;

    // 键为(中断号数值, 显示文本)，排序先按数值再按文本
    let mut periodic_map: BTreeMap<(i64, String), i64> = BTreeMap::new();
    let mut non_periodic_map: BTreeMap<(i64, String), Vec<i64>> = BTreeMap::new();

    for step in relevant {
        let display = interrupt_display(step.type_fields.interrupt_num.as_deref());
        let int_value = crate::utils::numeric::parse_hex_or_int(&display, 0);
        if step.step_type() == StepType::InterruptPeriodic {
            let period_ms = ((step.type_fields.period() * 1000.0).round() as i64).max(0);
            periodic_map.insert((int_value, display), period_ms);
        } else {
            let time_ms = ((step.base.time * 1000.0).round() as i64).max(0);
            non_periodic_map
                .entry((int_value, display))
                .or_default()
                .push(time_ms);
        }
    }

    let mut lines: Vec<String> = vec![
        "#对中断周期的配置,注意此处只需要配周期性中断，其余均认为是非周期中断".to_string(),
        String::new(),
        "#中断号=周期值(ms)".to_string(),
        String::new(),
        "[INT_PERIOD]".to_string(),
    ];
    for ((_, display), period_ms) in &periodic_map {
        lines.push(format!("{}={}", display, period_ms));
    }
    lines.push(String::new());
    lines.push("#忽略的中断号".to_string());
    lines.push(String::new());
    lines.push("[IGNORE_INT]".to_string());
    lines.push(String::new());
    lines.push("；核间通信中断".to_string());
    lines.push(String::new());
    lines.push(
        "#单次触发中断配置#对于数据触发的中断可在底层驱动中通过读文件控制数据何时到来，不在此处配置"
            .to_string(),
    );
    lines.push(String::new());
    lines.push("#中断号=触发时间(ms)".to_string());
    lines.push(String::new());
    lines.push("[ISINGLE_TRIGGER_INTJ]".to_string());

    let comment = match non_periodic_map.iter().next() {
        Some(((_, display), times)) if !times.is_empty() => {
            let first_ms = *times.iter().min().unwrap_or(&0);
            format!(
                "；仿真时间{}s时触发{}号中断",
                first_ms as f64 / 1000.0,
                display
            )
        }
        _ => "；仿真时间10s时触发90号中断".to_string(),
    };
    lines.push(comment);

    if non_periodic_map.is_empty() {
        lines.push("中断：".to_string());
    } else {
        for ((_, display), times) in &non_periodic_map {
            let mut times = times.clone();
            times.sort_unstable();
            times.dedup();
            let joined = times
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(",");
            lines.push(format!("中断：{}={}", display, joined));
        }
    }

    let content = format!("{}\n", lines.join("\n").trim_end());
    let config_path = out_dir.join("port.config");
    fs::write(&config_path, content).map_err(|e| {
        AppError::io_error(format!("写入port.config失败: {}", e), e.kind().to_string())
    })?;
    Ok(Some(config_path))
}

/// 按协议族导出全部流程步文本
///
/// 返回`(协议名, 输出目录)`列表；未配置输出目录或没有匹配
/// 流程步的协议族跳过。导出前统一刷新协议自动字段。
pub fn export_protocol_texts(
    steps: &[Step],
    config: &AppConfig,
    registry: &TemplateRegistry,
) -> AppResult<Vec<(String, PathBuf)>> {
    let mut steps: Vec<Step> = steps.to_vec();
    frame_fields::refresh_auto_fields(&mut steps);

    let mut exported: Vec<(String, PathBuf)> = Vec::new();
    for spec in &PROTOCOL_SPECS {
        let out_dir = config
            .protocol(spec.key)
            .map(|c| c.output_path.trim().to_string())
            .unwrap_or_default();
        if out_dir.is_empty() {
            log::warn!("{}未配置输出目录，跳过导出", spec.display_name);
            continue;
        }
        let out_dir = PathBuf::from(out_dir);
        if let Err(e) = fs::create_dir_all(&out_dir) {
            log::error!("创建{}输出目录失败: {}", spec.display_name, e);
            continue;
        }
        clear_txt_files(&out_dir);

        let payloads: Vec<StepPayload> = steps
            .iter()
            .filter_map(|step| prepare_step_payload(step, spec, registry))
            .collect();
        if payloads.is_empty() {
            log::info!("{}: 无匹配流程步，跳过导出", spec.display_name);
            continue;
        }

        match spec.mode {
            ExportMode::Bus => process_bus_protocol(spec, payloads, &out_dir),
            ExportMode::Uart => process_uart_protocol(spec, payloads, &out_dir),
            ExportMode::Switch => process_switch_protocol(spec, payloads, &out_dir),
        }
        exported.push((spec.display_name.to_string(), out_dir));
    }

    let interrupt_dir = config
        .protocol("interrupt")
        .map(|c| c.output_path.trim().to_string())
        .unwrap_or_default();
    if interrupt_dir.is_empty() {
        log::warn!("中断协议未配置输出目录，跳过port.config生成");
    } else {
        let dir = PathBuf::from(interrupt_dir);
        if process_interrupt_steps(&steps, &dir)?.is_some() {
            exported.push(("中断".to_string(), dir));
        }
    }

    Ok(exported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::DataTypeTag;
    use crate::models::step::{DataRegion, TaggedValue};
    use crate::models::template::builtin_templates;
    use serde_json::json;
    use tempfile::tempdir;

    fn config_with_output(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        for key in ["glink", "uart", "bc", "interrupt", "switch"] {
            config.protocol_mut(key).output_path = dir.join(key).to_string_lossy().to_string();
        }
        config
    }

    fn glink_step() -> Step {
        let mut step = Step::new(StepType::GlinkNonPeriodic);
        step.base.time = 2.5;
        step.type_fields.protocol_type = Some(0);
        step.set_raw_literal("local_site", "0x11");
        step.set_raw_literal("recip_site", "0x22");
        step.set_raw_literal("sub_address", "0x03");
        step.type_fields.data_region = DataRegion::Values(vec![
            TaggedValue::new(DataTypeTag::Uint16, json!("0x0102")),
            TaggedValue::new(DataTypeTag::Uint16, json!("0x0304")),
        ]);
        step.protocol.set("时间", "0");
        step.protocol.set("消息控制字", "0x0003");
        step.protocol.set("消息ID", "0x0010");
        step.protocol.set("帧计数", "0x0000");
        step.protocol.set("数据区crc校验和", "0x0000");
        step
    }

    #[test]
    fn test_glink_export_writes_full_frame() {
        let temp = tempdir().unwrap();
        let config = config_with_output(temp.path());
        let exported =
            export_protocol_texts(&[glink_step()], &config, builtin_templates()).unwrap();
        assert!(exported.iter().any(|(name, _)| name == "GLINK"));

        let file = temp
            .path()
            .join("glink")
            .join("NcRecv_ID0x022_SA03_Len16.txt");
        let content = fs::read_to_string(&file).unwrap();
        // 自动字段在导出前刷新：时间2500ms、帧计数1、CRC 0x7D6E
        assert_eq!(
            content,
            "2.500\t0x0000\t0x09C4\t0x0003\t0x0010\t0x0001\t0x0102\t0x0304\t0x7D6E\n"
        );
    }

    #[test]
    fn test_secondary_site_goes_to_descriptor_file() {
        let temp = tempdir().unwrap();
        let config = config_with_output(temp.path());
        let mut step = glink_step();
        step.type_fields.site_type = Some(1);
        export_protocol_texts(&[step], &config, builtin_templates()).unwrap();

        let file = temp.path().join("glink").join("NtRecv_NonPeriod.txt");
        let content = fs::read_to_string(&file).unwrap();
        assert!(content.starts_with("2.500\tID0x022_SA03_Len16\t0x0000"));
    }

    #[test]
    fn test_uart_serial_standard_export() {
        let temp = tempdir().unwrap();
        let config = config_with_output(temp.path());
        let mut step = Step::new(StepType::UartNonPeriodic);
        step.base.time = 1.0;
        step.type_fields.serial_id = Some(1);
        step.type_fields.protocol_type = Some(2);
        step.type_fields.data_region = DataRegion::Values(vec![
            TaggedValue::new(DataTypeTag::Uint8, json!("0x5A")),
            TaggedValue::new(DataTypeTag::Uint8, json!("0xFE")),
        ]);
        export_protocol_texts(&[step], &config, builtin_templates()).unwrap();

        let file = temp
            .path()
            .join("uart")
            .join("Uart_NonPeriod_recv_Com_ADD_01.txt");
        let content = fs::read_to_string(&file).unwrap();
        assert_eq!(content, "1.000\t0x5AFE\t0x0300\t0x5AFE\t0x0058\n");
    }

    #[test]
    fn test_switch_export_formats_value_by_width() {
        let temp = tempdir().unwrap();
        let config = config_with_output(temp.path());
        let mut step = Step::new(StepType::SwitchQuantity);
        step.base.time = 0.5;
        step.set_raw_literal("address", "0x1A");
        step.type_fields.switch_type = Some(16);
        step.type_fields.switch_value = Some(0x0203);
        export_protocol_texts(&[step], &config, builtin_templates()).unwrap();

        let file = temp.path().join("switch").join("Switch_NonPeriod_1a.txt");
        let content = fs::read_to_string(&file).unwrap();
        assert_eq!(content, "0.500\t0203\n");
    }

    #[test]
    fn test_interrupt_port_config_sections() {
        let temp = tempdir().unwrap();
        let config = config_with_output(temp.path());

        let mut periodic = Step::new(StepType::InterruptPeriodic);
        periodic.type_fields.interrupt_num = Some("20".to_string());
        periodic.type_fields.period = Some(0.1);
        let mut single = Step::new(StepType::InterruptNonPeriodic);
        single.base.time = 10.0;
        single.type_fields.interrupt_num = Some("90".to_string());

        let exported =
            export_protocol_texts(&[periodic, single], &config, builtin_templates()).unwrap();
        assert!(exported.iter().any(|(name, _)| name == "中断"));

        let content =
            fs::read_to_string(temp.path().join("interrupt").join("port.config")).unwrap();
        assert!(content.contains("[INT_PERIOD]\n20=100"));
        assert!(content.contains("[ISINGLE_TRIGGER_INTJ]"));
        assert!(content.contains("；仿真时间10s时触发90号中断"));
        assert!(content.contains("中断：90=10000"));
    }

    #[test]
    fn test_periodic_file_rows_advance_time() {
        let temp = tempdir().unwrap();
        let config = config_with_output(temp.path());
        let data_file = temp.path().join("rows.txt");
        fs::write(&data_file, "0x0101\n0x0202\n").unwrap();

        let mut step = Step::new(StepType::GlinkPeriodic);
        step.base.time = 1.0;
        step.type_fields.protocol_type = Some(-1);
        step.type_fields.period = Some(0.5);
        step.type_fields.file_path = Some(data_file.to_string_lossy().to_string());
        export_protocol_texts(&[step], &config, builtin_templates()).unwrap();

        let file = temp.path().join("glink").join("NcRecv_ID0x000_SA00_Len2.txt");
        let content = fs::read_to_string(&file).unwrap();
        assert_eq!(content, "1.000\t0x0101\n1.500\t0x0202\n");
    }

    #[test]
    fn test_missing_data_pads_to_msg_len() {
        let temp = tempdir().unwrap();
        let config = config_with_output(temp.path());
        let mut step = Step::new(StepType::GlinkNonPeriodic);
        step.base.time = 0.0;
        step.type_fields.protocol_type = Some(-1);
        step.type_fields.msg_len = Some(3);
        export_protocol_texts(&[step], &config, builtin_templates()).unwrap();

        let file = temp.path().join("glink").join("NcRecv_ID0x000_SA00_Len6.txt");
        let content = fs::read_to_string(&file).unwrap();
        assert_eq!(content, "0.000\t0x0000\t0x0000\t0x0000\n");
    }

    #[test]
    fn test_stale_txt_files_cleared() {
        let temp = tempdir().unwrap();
        let config = config_with_output(temp.path());
        let glink_dir = temp.path().join("glink");
        fs::create_dir_all(&glink_dir).unwrap();
        let stale = glink_dir.join("stale.txt");
        fs::write(&stale, "old").unwrap();

        export_protocol_texts(&[glink_step()], &config, builtin_templates()).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn test_ignored_steps_are_skipped() {
        let temp = tempdir().unwrap();
        let config = config_with_output(temp.path());
        let mut step = glink_step();
        step.base.is_ignore = true;
        let exported = export_protocol_texts(&[step], &config, builtin_templates()).unwrap();
        assert!(!exported.iter().any(|(name, _)| name == "GLINK"));
    }

    #[test]
    fn test_recompute_periodic_row_rewrites_auto_tokens() {
        let mut seq: Vec<String> = vec![
            "0xFFFF", "0xFFFF", "0x0003", "0x0010", "0xFFFF", "0x0102", "0x0304", "0xFFFF",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        recompute_periodic_row(&mut seq, 2.5, 1);
        assert_eq!(seq[0], "0x0000");
        assert_eq!(seq[1], "0x09C4");
        assert_eq!(seq[4], "0x0002");
        // 尾部CRC按数据区[0x0102, 0x0304]重算
        let metrics = serial_metrics::calc_crc_tail_metrics("0x0102 0x0304");
        assert_eq!(Some(seq[7].as_str()), metrics.override_for(ELEM_DATA_CRC));
    }
}
