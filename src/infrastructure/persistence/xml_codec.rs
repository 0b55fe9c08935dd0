//! 流程步XML持久化编解码器
//!
//! 文档结构：
//! `<config><path_settings>…</path_settings><steps><step>
//! <base/><type/><expand/><protocol/></step>…</steps></config>`，
//! 字段为扁平的`<tag>文本</tag>`子元素。
//!
//! 写出规则：
//! - 数据区非空列表JSON编码，空列表写`[]`，无数据写字面量`None`
//! - 站点/地址字段写原始输入文本（"0x11"逐字保留）
//! - 消息控制字位0为1时`<protocol>`加`帧计数="true"`属性；
//!   协议类型为"无"时写空`<protocol/>`
//! - 携带多行文件数据的周期流程步写出前展开为N条物理记录
//!
//! 读入规则：逐字段宽容解析（非法值退化为模式默认值），
//! 文档结构非法对该文件整体致命；读入后按分组ID合并周期流程步。

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::domain::services::{frame_fields, periodic};
use crate::models::enums::{Endianness, StepType};
use crate::models::registry;
use crate::models::step::{DataRegion, Step};
use crate::utils::config::ProtocolPathConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::numeric;

/// 路径设置中持久化的协议键顺序
const PATH_PROTOCOL_KEYS: [&str; 5] = ["glink", "uart", "bc", "interrupt", "switch"];

/// 一个流程配置文件的解析结果
#[derive(Debug, Default)]
pub struct StepDocument {
    pub steps: Vec<Step>,
    /// 文件内嵌的各协议路径设置（可能为空）
    pub path_settings: BTreeMap<String, ProtocolPathConfig>,
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> AppResult<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    if !text.is_empty() {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// 写出路径设置节点（中断协议只保留输出路径）
fn write_path_settings<W: std::io::Write>(
    writer: &mut Writer<W>,
    path_settings: &BTreeMap<String, ProtocolPathConfig>,
) -> AppResult<()> {
    if path_settings.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new("path_settings")))?;
    for key in PATH_PROTOCOL_KEYS {
        let Some(config) = path_settings.get(key) else {
            continue;
        };
        let mut proto_elem = BytesStart::new("protocol");
        proto_elem.push_attribute(("name", key));
        writer.write_event(Event::Start(proto_elem))?;
        for path_key in crate::utils::config::AppConfig::persisted_path_keys(key) {
            let value = match *path_key {
                "input_path" => config.input_path.as_str(),
                "output_path" => config.output_path.as_str(),
                _ => config.config_path.as_str(),
            };
            write_text_element(writer, path_key, value)?;
        }
        writer.write_event(Event::End(BytesEnd::new("protocol")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("path_settings")))?;
    Ok(())
}

/// 写出base子字典（枚举按持久化索引）
fn write_base_fields<W: std::io::Write>(writer: &mut Writer<W>, step: &Step) -> AppResult<()> {
    writer.write_event(Event::Start(BytesStart::new("base")))?;
    write_text_element(writer, "time", &numeric::format_float(step.base.time))?;
    write_text_element(writer, "name", &step.base.name)?;
    write_text_element(writer, "step_type", &step.base.step_type.index().to_string())?;
    write_text_element(writer, "endian", &step.base.endian.index().to_string())?;
    write_text_element(writer, "is_ignore", if step.base.is_ignore { "1" } else { "0" })?;
    writer.write_event(Event::End(BytesEnd::new("base")))?;
    Ok(())
}

/// 写出type子字典，字段顺序来自注册表的流程步类型字段表
fn write_type_fields<W: std::io::Write>(writer: &mut Writer<W>, step: &Step) -> AppResult<()> {
    writer.write_event(Event::Start(BytesStart::new("type")))?;
    let fields = &step.type_fields;
    for field_name in registry::step_type_field_list(step.step_type()) {
        let text = match *field_name {
            "site_type" => fields.site_type().to_string(),
            "local_site" => fields.local_site.text().to_string(),
            "recip_site" => fields.recip_site.text().to_string(),
            "sub_address" => fields.sub_address.text().to_string(),
            "base_address" => fields.base_address.text().to_string(),
            "address" => fields.address.text().to_string(),
            "msg_len" => fields.msg_len().to_string(),
            "protocol_type" => fields.protocol_type().to_string(),
            "serial_id" => fields.serial_id().to_string(),
            "switch_type" => fields.switch_type().to_string(),
            "switch_value" => fields.switch_value().to_string(),
            "interrupt_num" => fields.interrupt_num.clone().unwrap_or_default(),
            "period" => numeric::format_float(fields.period()),
            "file_path" => fields.file_path.clone().unwrap_or_default(),
            "data_region" => fields.data_region.to_xml_text(),
            other => {
                log::warn!("流程步类型字段表中出现未知字段: {}", other);
                continue;
            }
        };
        write_text_element(writer, field_name, &text)?;
    }
    writer.write_event(Event::End(BytesEnd::new("type")))?;
    Ok(())
}

/// 写出expand子字典（临时的多行文件数据不持久化）
fn write_expand_fields<W: std::io::Write>(writer: &mut Writer<W>, step: &Step) -> AppResult<()> {
    writer.write_event(Event::Start(BytesStart::new("expand")))?;
    let expand = &step.expand;
    for (key, value) in &expand.extras {
        write_text_element(writer, key, value)?;
    }
    if let Some(group_id) = &expand.periodic_group_id {
        write_text_element(writer, "periodic_group_id", group_id)?;
        write_text_element(
            writer,
            "periodic_group_index",
            &expand.periodic_group_index.unwrap_or(0).to_string(),
        )?;
        write_text_element(
            writer,
            "periodic_group_first",
            if expand.periodic_group_first.unwrap_or(false) {
                "1"
            } else {
                "0"
            },
        )?;
        if let Some(path) = &expand.periodic_file_path {
            if !path.is_empty() {
                write_text_element(writer, "periodic_file_path", path)?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new("expand")))?;
    Ok(())
}

/// 写出protocol子字典，保持模板字段顺序
fn write_protocol_fields<W: std::io::Write>(writer: &mut Writer<W>, step: &Step) -> AppResult<()> {
    if step.protocol_type() == -1 || step.protocol.is_empty() {
        // 协议类型为"无"只保留空的protocol元素
        writer.write_event(Event::Empty(BytesStart::new("protocol")))?;
        return Ok(());
    }
    let mut protocol_elem = BytesStart::new("protocol");
    if frame_fields::frame_counting_enabled(frame_fields::control_word(step)) {
        protocol_elem.push_attribute(("帧计数", "true"));
    }
    writer.write_event(Event::Start(protocol_elem))?;
    for (element, value) in step.protocol.iter() {
        write_text_element(writer, element, value)?;
    }
    writer.write_event(Event::End(BytesEnd::new("protocol")))?;
    Ok(())
}

fn write_step<W: std::io::Write>(writer: &mut Writer<W>, step: &Step) -> AppResult<()> {
    writer.write_event(Event::Start(BytesStart::new("step")))?;
    write_base_fields(writer, step)?;
    write_type_fields(writer, step)?;
    write_expand_fields(writer, step)?;
    write_protocol_fields(writer, step)?;
    writer.write_event(Event::End(BytesEnd::new("step")))?;
    Ok(())
}

/// 序列化流程步列表为XML文本（2空格缩进）
///
/// 携带多行文件数据的周期流程步先展开为物理记录再写出
pub fn serialize_steps(
    steps: &[Step],
    path_settings: &BTreeMap<String, ProtocolPathConfig>,
) -> AppResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("config")))?;

    write_path_settings(&mut writer, path_settings)?;

    writer.write_event(Event::Start(BytesStart::new("steps")))?;
    for step in steps {
        if step.step_type().is_periodic() && !step.expand.periodic_file_data.is_empty() {
            let rows = step.expand.periodic_file_data.clone();
            log::info!(
                "周期流程步\"{}\"携带{}行文件数据，展开后写出",
                step.base.name,
                rows.len()
            );
            for expanded in periodic::expand_periodic(step, &rows) {
                write_step(&mut writer, &expanded)?;
            }
        } else {
            write_step(&mut writer, step)?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new("steps")))?;
    writer.write_event(Event::End(BytesEnd::new("config")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| AppError::xml_error(format!("XML输出非UTF-8: {}", e)))
}

/// 保存流程步列表到XML文件
pub fn save_steps_to_file(
    path: impl AsRef<Path>,
    steps: &[Step],
    path_settings: &BTreeMap<String, ProtocolPathConfig>,
) -> AppResult<()> {
    let content = serialize_steps(steps, path_settings)?;
    std::fs::write(path.as_ref(), content).map_err(|e| {
        AppError::io_error(
            format!("写入流程配置文件失败: {}", e),
            e.kind().to_string(),
        )
    })
}

/// 正在收集的流程步原始字段
#[derive(Debug, Default)]
struct RawStep {
    base: Vec<(String, String)>,
    type_fields: Vec<(String, String)>,
    expand: Vec<(String, String)>,
    protocol: Vec<(String, String)>,
}

/// 宽容解析布尔文本（"1"/"true"为真）
fn parse_bool_text(text: &str) -> bool {
    let lowered = text.trim().to_ascii_lowercase();
    lowered == "1" || lowered == "true"
}

/// 把收集到的原始字段装配为流程步实体
///
/// 单个字段非法退化为模式默认值，不中断整个文件的解析
fn build_step(raw: RawStep) -> Step {
    let mut step = Step::default();

    for (tag, text) in &raw.base {
        match tag.as_str() {
            "time" => step.base.time = numeric::parse_float_lenient(text, 0.0),
            "name" => step.base.name = text.clone(),
            "step_type" => {
                let index = numeric::parse_int_lenient(text, 0);
                step.base.step_type = StepType::from_index(index).unwrap_or_else(|_| {
                    log::warn!("流程步类型索引{}非法，按默认类型处理", text);
                    StepType::default()
                });
            }
            "endian" => step.base.endian = Endianness::from_index(numeric::parse_int_lenient(text, 0)),
            "is_ignore" => step.base.is_ignore = parse_bool_text(text),
            other => log::debug!("base子字典中跳过未知字段: {}", other),
        }
    }

    for (tag, text) in &raw.type_fields {
        if registry::is_raw_literal_field(tag) {
            // 站点/地址字段保留原始文本，数值解释按需计算
            step.set_raw_literal(tag, text);
            continue;
        }
        match tag.as_str() {
            "site_type" => step.type_fields.site_type = Some(numeric::parse_int_lenient(text, 0)),
            "msg_len" => step.type_fields.msg_len = Some(numeric::parse_int_lenient(text, 0)),
            "protocol_type" => {
                step.type_fields.protocol_type = Some(numeric::parse_int_lenient(text, -1))
            }
            "serial_id" => step.type_fields.serial_id = Some(numeric::parse_int_lenient(text, 0)),
            "switch_type" => {
                step.type_fields.switch_type = Some(numeric::parse_int_lenient(text, 8))
            }
            "switch_value" => {
                step.type_fields.switch_value = Some(numeric::parse_int_lenient(text, 0))
            }
            "interrupt_num" => step.type_fields.interrupt_num = Some(text.clone()),
            "period" => step.type_fields.period = Some(numeric::parse_float_lenient(text, 0.0)),
            "file_path" => {
                if !text.is_empty() {
                    step.type_fields.file_path = Some(text.clone());
                }
            }
            "data_region" => step.type_fields.data_region = DataRegion::from_xml_text(text),
            other => log::debug!("type子字典中跳过未知字段: {}", other),
        }
    }

    for (tag, text) in &raw.expand {
        match tag.as_str() {
            "periodic_group_id" => {
                if !text.is_empty() {
                    step.expand.periodic_group_id = Some(text.clone());
                }
            }
            "periodic_group_index" => {
                step.expand.periodic_group_index = Some(numeric::parse_int_lenient(text, 0))
            }
            "periodic_group_first" => {
                step.expand.periodic_group_first = Some(parse_bool_text(text))
            }
            "periodic_file_path" => {
                if !text.is_empty() {
                    step.expand.periodic_file_path = Some(text.clone());
                }
            }
            other => {
                step.expand.extras.insert(other.to_string(), text.clone());
            }
        }
    }

    for (element, value) in raw.protocol {
        step.protocol.set(element, value);
    }

    step
}

/// 解析XML文本为流程步文档
///
/// 结构非法对整个文件致命；解析完成后合并周期分组
pub fn parse_steps(content: &str) -> AppResult<StepDocument> {
    let mut reader = Reader::from_str(content);
    let mut document = StepDocument::default();
    let mut stack: Vec<String> = Vec::new();
    let mut current_step: Option<RawStep> = None;
    let mut current_protocol_key: Option<String> = None;
    let mut pending_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
                // 根属性形式的路径设置（旧格式兼容）
                if name == "config" {
                    read_legacy_root_paths(&start, &mut document.path_settings);
                }
                if name == "step" && stack.last().map(String::as_str) == Some("steps") {
                    current_step = Some(RawStep::default());
                }
                if name == "protocol" && stack.last().map(String::as_str) == Some("path_settings")
                {
                    current_protocol_key = start
                        .try_get_attribute("name")
                        .ok()
                        .flatten()
                        .and_then(|attr| attr.unescape_value().ok())
                        .map(|v| v.to_string());
                }
                stack.push(name);
                pending_text.clear();
            }
            Event::Empty(start) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
                if let Some(raw) = current_step.as_mut() {
                    record_step_field(raw, &stack, &name, "");
                }
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| AppError::xml_error(format!("文本解码失败: {}", e)))?;
                pending_text.push_str(&value);
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                let text = pending_text.trim().to_string();
                pending_text.clear();
                match name.as_str() {
                    "step" => {
                        if let Some(raw) = current_step.take() {
                            document.steps.push(build_step(raw));
                        }
                    }
                    "protocol" if stack.last().map(String::as_str) == Some("path_settings") => {
                        current_protocol_key = None;
                    }
                    _ => {
                        if let Some(raw) = current_step.as_mut() {
                            record_step_field(raw, &stack, &name, &text);
                        } else if let Some(protocol_key) = &current_protocol_key {
                            let entry = document
                                .path_settings
                                .entry(protocol_key.clone())
                                .or_default();
                            match name.as_str() {
                                "input_path" => entry.input_path = text,
                                "output_path" => entry.output_path = text,
                                "config_path" => entry.config_path = text,
                                _ => {}
                            }
                        }
                    }
                }
            }
            Event::Eof => {
                if !stack.is_empty() {
                    return Err(AppError::xml_error(format!(
                        "文档在元素{}未闭合处截断",
                        stack.join("/")
                    )));
                }
                break;
            }
            _ => {}
        }
    }

    document.steps = periodic::merge_periodic(std::mem::take(&mut document.steps));
    Ok(document)
}

/// 把叶子字段归档到当前流程步对应的子字典
fn record_step_field(raw: &mut RawStep, stack: &[String], tag: &str, text: &str) {
    // 栈形如 [config, steps, step, base]，末位是该字段所属的子字典
    let Some(section) = stack.last() else {
        return;
    };
    let entry = (tag.to_string(), text.to_string());
    match section.as_str() {
        "base" => raw.base.push(entry),
        "type" => raw.type_fields.push(entry),
        "expand" => raw.expand.push(entry),
        "protocol" => raw.protocol.push(entry),
        _ => {}
    }
}

/// 旧格式兼容：根节点上形如`glink_input_path`的路径属性
fn read_legacy_root_paths(
    start: &BytesStart<'_>,
    path_settings: &mut BTreeMap<String, ProtocolPathConfig>,
) {
    for attr in start.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let Ok(value) = attr.unescape_value() else {
            continue;
        };
        for protocol in PATH_PROTOCOL_KEYS {
            let Some(path_key) = key.strip_prefix(&format!("{}_", protocol)) else {
                continue;
            };
            let entry = path_settings.entry(protocol.to_string()).or_default();
            match path_key {
                "input_path" => entry.input_path = value.to_string(),
                "output_path" => entry.output_path = value.to_string(),
                "config_path" => entry.config_path = value.to_string(),
                _ => {}
            }
        }
    }
}

/// 从文件加载流程步文档
///
/// 文件不可读或XML非法对该文件致命；批量导出的调用方跳过
/// 这一个文件继续处理其余文件
pub fn load_steps_from_file(path: impl AsRef<Path>) -> AppResult<StepDocument> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        AppError::io_error(
            format!("读取流程配置文件失败: {}", e),
            e.kind().to_string(),
        )
    })?;
    parse_steps(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::DataTypeTag;
    use crate::models::step::TaggedValue;
    use serde_json::json;

    fn glink_step() -> Step {
        let mut step = Step::new(StepType::GlinkNonPeriodic);
        step.base.time = 2.5;
        step.base.name = "下发指令".to_string();
        step.type_fields.protocol_type = Some(0);
        step.type_fields.msg_len = Some(4);
        step.set_raw_literal("local_site", "0x11");
        step.set_raw_literal("recip_site", "0x22");
        step.set_raw_literal("sub_address", "0x03");
        step.type_fields.data_region = DataRegion::Values(vec![
            TaggedValue::new(DataTypeTag::Uint16, json!("0x0102")),
            TaggedValue::new(DataTypeTag::Uint16, json!("0x0304")),
        ]);
        step.protocol.set("时间", "2500");
        step.protocol.set("消息控制字", "0x0003");
        step.protocol.set("消息ID", "0x0010");
        step.protocol.set("帧计数", "0x0001");
        step.protocol.set("数据区crc校验和", "0x7D6E");
        step
    }

    #[test]
    fn test_hex_literal_round_trip() {
        let steps = vec![glink_step()];
        let xml = serialize_steps(&steps, &BTreeMap::new()).unwrap();
        assert!(xml.contains("<local_site>0x11</local_site>"));

        let document = parse_steps(&xml).unwrap();
        assert_eq!(document.steps.len(), 1);
        let restored = &document.steps[0];
        // 16进制字面量逐字保留，不退化为十进制
        assert_eq!(restored.raw_literal("local_site"), Some("0x11"));
        assert_eq!(restored.raw_literal("recip_site"), Some("0x22"));
        assert_eq!(restored.literal_value("local_site"), 0x11);
        assert_eq!(restored.base.time, 2.5);
        assert_eq!(restored.base.name, "下发指令");
        assert_eq!(
            restored.type_fields.data_region,
            steps[0].type_fields.data_region
        );
        assert_eq!(restored.protocol.get("消息控制字"), Some("0x0003"));
    }

    #[test]
    fn test_frame_count_attribute_written() {
        let xml = serialize_steps(&[glink_step()], &BTreeMap::new()).unwrap();
        assert!(xml.contains("帧计数=\"true\""));

        let mut no_count = glink_step();
        no_count.protocol.set("消息控制字", "0x0002");
        let xml = serialize_steps(&[no_count], &BTreeMap::new()).unwrap();
        assert!(!xml.contains("帧计数=\"true\""));
    }

    #[test]
    fn test_none_protocol_writes_empty_element() {
        let mut step = glink_step();
        step.type_fields.protocol_type = Some(-1);
        let xml = serialize_steps(&[step], &BTreeMap::new()).unwrap();
        assert!(xml.contains("<protocol/>"));
        assert!(!xml.contains("消息控制字"));

        let document = parse_steps(&xml).unwrap();
        assert!(document.steps[0].protocol.is_empty());
    }

    #[test]
    fn test_empty_and_none_data_region_text() {
        let mut step = Step::new(StepType::GlinkNonPeriodic);
        step.type_fields.data_region = DataRegion::Values(Vec::new());
        let xml = serialize_steps(&[step.clone()], &BTreeMap::new()).unwrap();
        assert!(xml.contains("<data_region>[]</data_region>"));

        step.type_fields.data_region = DataRegion::None;
        let xml = serialize_steps(&[step], &BTreeMap::new()).unwrap();
        assert!(xml.contains("<data_region>None</data_region>"));
        let document = parse_steps(&xml).unwrap();
        assert!(document.steps[0]
            .type_fields
            .data_region
            .is_effectively_empty());
    }

    #[test]
    fn test_periodic_expand_on_write_merge_on_read() {
        let mut master = Step::new(StepType::GlinkPeriodic);
        master.base.time = 1.0;
        master.base.name = "周期下发".to_string();
        master.type_fields.protocol_type = Some(-1);
        master.type_fields.period = Some(0.5);
        master.type_fields.file_path = Some("rows.txt".to_string());
        let rows = vec![
            DataRegion::Tokens(vec!["0x0101".to_string()]),
            DataRegion::Tokens(vec!["0x0202".to_string()]),
            DataRegion::Tokens(vec!["0x0303".to_string()]),
        ];
        master.type_fields.data_region = rows[0].clone();
        master.expand.periodic_file_data = rows.clone();

        let xml = serialize_steps(&[master.clone()], &BTreeMap::new()).unwrap();
        // 展开为3条物理记录
        assert_eq!(xml.matches("<step>").count(), 3);
        assert!(xml.contains("<periodic_group_index>2</periodic_group_index>"));

        let document = parse_steps(&xml).unwrap();
        assert_eq!(document.steps.len(), 1);
        let restored = &document.steps[0];
        assert_eq!(restored.base.time, master.base.time);
        assert_eq!(restored.base.name, master.base.name);
        assert_eq!(restored.type_fields.period, master.type_fields.period);
        assert_eq!(restored.type_fields.data_region, rows[0]);
        assert_eq!(restored.expand.periodic_file_data, rows);
    }

    #[test]
    fn test_path_settings_round_trip() {
        let mut path_settings = BTreeMap::new();
        path_settings.insert(
            "glink".to_string(),
            ProtocolPathConfig {
                input_path: "/data/in".to_string(),
                output_path: "/data/out".to_string(),
                config_path: "/data/cfg".to_string(),
            },
        );
        path_settings.insert(
            "interrupt".to_string(),
            ProtocolPathConfig {
                input_path: "/ignored".to_string(),
                output_path: "/data/int".to_string(),
                config_path: String::new(),
            },
        );
        let xml = serialize_steps(&[], &path_settings).unwrap();
        // 中断协议只持久化输出路径
        assert!(xml.contains("/data/int"));
        assert!(!xml.contains("/ignored"));

        let document = parse_steps(&xml).unwrap();
        let glink = document.path_settings.get("glink").unwrap();
        assert_eq!(glink.input_path, "/data/in");
        assert_eq!(glink.output_path, "/data/out");
        let interrupt = document.path_settings.get("interrupt").unwrap();
        assert_eq!(interrupt.output_path, "/data/int");
        assert!(interrupt.input_path.is_empty());
    }

    #[test]
    fn test_legacy_root_attributes_read() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<config glink_output_path="/legacy/out"><steps></steps></config>"#;
        let document = parse_steps(xml).unwrap();
        assert_eq!(
            document.path_settings.get("glink").unwrap().output_path,
            "/legacy/out"
        );
    }

    #[test]
    fn test_malformed_field_degrades_to_default() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<config><steps><step>
  <base><time>abc</time><name>坏字段</name><step_type>99</step_type></base>
  <type><msg_len>zz</msg_len><data_region>not json</data_region></type>
  <expand></expand><protocol/>
</step></steps></config>"#;
        let document = parse_steps(xml).unwrap();
        let step = &document.steps[0];
        assert_eq!(step.base.time, 0.0);
        assert_eq!(step.base.step_type, StepType::default());
        assert_eq!(step.type_fields.msg_len, Some(0));
        // 非JSON文本按原始文本保留，交由归一化器解释
        assert_eq!(
            step.type_fields.data_region,
            DataRegion::Text("not json".to_string())
        );
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        assert!(parse_steps("<config><steps>").is_err());
        assert!(parse_steps("<config></steps>").is_err());
    }
}
