//! 周期流程步的展开与合并
//!
//! 一个携带多行文件数据的周期流程步在持久化前展开为N条物理流程步
//! （时间=首行时间+行号×周期），读回时按分组ID合并回单条逻辑流程步。
//! 展开与合并互为精确逆运算：`merge(expand(S, rows))`还原S的
//! base/type字段，并把rows装回`expand.periodic_file_data`。
//!
//! 展开不是廉价拷贝：每行重新计算协议自动字段
//! （帧计数=行号+1，时间戳与CRC按该行数据重算）。

use uuid::Uuid;

use crate::domain::services::frame_fields;
use crate::models::step::{DataRegion, Step};

/// 生成周期分组ID
fn new_group_id() -> String {
    format!("periodic_{}", Uuid::new_v4().simple())
}

/// 把主流程步与数据行展开为N条带时间戳的流程步
///
/// 行号0为分组首行；主流程步已有分组ID时沿用，否则生成一次
pub fn expand_periodic(master: &Step, rows: &[DataRegion]) -> Vec<Step> {
    let group_id = master
        .expand
        .periodic_group_id
        .clone()
        .unwrap_or_else(new_group_id);
    let first_time = master.base.time;
    let period = master.type_fields.period();

    rows.iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let mut step = master.clone();
            step.base.time = first_time + row_idx as f64 * period;
            step.type_fields.data_region = row.clone();
            step.expand.periodic_file_data = Vec::new();
            step.expand.periodic_group_id = Some(group_id.clone());
            step.expand.periodic_group_index = Some(row_idx as i64);
            step.expand.periodic_group_first = Some(row_idx == 0);
            if step.expand.periodic_file_path.is_none() {
                step.expand.periodic_file_path = step.type_fields.file_path.clone();
            }

            let frame_count = ((row_idx + 1) & 0xFFFF) as u16;
            frame_fields::apply_auto_fields(&mut step, frame_count);
            step
        })
        .collect()
}

/// 把展开的周期流程步按分组ID合并回逻辑流程步
///
/// 组内按`periodic_group_index`排序，带首行标记（或缺省时索引最小）
/// 的成员作为主流程步；全部成员的数据区按序装入
/// `expand.periodic_file_data`。无分组的流程步原样保留。
pub fn merge_periodic(steps: Vec<Step>) -> Vec<Step> {
    let mut merged: Vec<Step> = Vec::new();
    let mut groups: Vec<(String, Vec<Step>)> = Vec::new();

    for step in steps {
        match step.expand.periodic_group_id.clone() {
            Some(group_id) => match groups.iter_mut().find(|(id, _)| *id == group_id) {
                Some((_, members)) => members.push(step),
                None => groups.push((group_id, vec![step])),
            },
            None => merged.push(step),
        }
    }

    for (group_id, mut members) in groups {
        members.sort_by_key(|s| s.expand.periodic_group_index.unwrap_or(0));
        let master_pos = members
            .iter()
            .position(|s| s.expand.periodic_group_first == Some(true))
            .unwrap_or(0);

        let data_rows: Vec<DataRegion> = members
            .iter()
            .map(|s| s.type_fields.data_region.clone())
            .filter(|region| !matches!(region, DataRegion::None))
            .collect();
        let file_path = members.iter().find_map(|s| {
            s.type_fields
                .file_path
                .clone()
                .filter(|p| !p.is_empty())
                .or_else(|| {
                    s.expand
                        .periodic_file_path
                        .clone()
                        .filter(|p| !p.is_empty())
                })
        });

        let mut master = members.swap_remove(master_pos);
        if let Some(path) = file_path {
            master.expand.periodic_file_path = Some(path.clone());
            master.type_fields.file_path = Some(path);
        }
        if let Some(first_row) = data_rows.first() {
            master.type_fields.data_region = first_row.clone();
        }
        master.expand.periodic_file_data = data_rows;
        log::debug!(
            "周期分组{}合并完成，共{}行",
            group_id,
            master.expand.periodic_file_data.len()
        );
        merged.push(master);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{DataTypeTag, StepType};
    use crate::models::step::TaggedValue;
    use serde_json::json;

    fn row(value: u16) -> DataRegion {
        DataRegion::Values(vec![TaggedValue::new(
            DataTypeTag::Uint16,
            json!(format!("0x{:04X}", value)),
        )])
    }

    fn periodic_master() -> Step {
        let mut step = Step::new(StepType::GlinkPeriodic);
        step.base.time = 2.0;
        step.base.name = "周期下发".to_string();
        step.type_fields.protocol_type = Some(0);
        step.type_fields.period = Some(0.5);
        step.type_fields.file_path = Some("rows.txt".to_string());
        step.type_fields.msg_len = Some(4);
        step.set_raw_literal("local_site", "0x11");
        step.set_raw_literal("recip_site", "0x22");
        step.set_raw_literal("sub_address", "0x03");
        step.type_fields.data_region = row(0x0101);
        step.protocol.set("时间", "2000");
        step.protocol.set("消息控制字", "0x0003");
        step.protocol.set("消息ID", "0x0010");
        step.protocol.set("帧计数", "0x0001");
        step.protocol.set("数据区crc校验和", "0x0000");
        step
    }

    #[test]
    fn test_expand_assigns_time_and_group_links() {
        let master = periodic_master();
        let rows = vec![row(0x0101), row(0x0202), row(0x0303)];
        let expanded = expand_periodic(&master, &rows);

        assert_eq!(expanded.len(), 3);
        assert_eq!(expanded[0].base.time, 2.0);
        assert_eq!(expanded[1].base.time, 2.5);
        assert_eq!(expanded[2].base.time, 3.0);

        let group_id = expanded[0].expand.periodic_group_id.clone().unwrap();
        assert!(group_id.starts_with("periodic_"));
        for (idx, step) in expanded.iter().enumerate() {
            assert_eq!(step.expand.periodic_group_id.as_deref(), Some(group_id.as_str()));
            assert_eq!(step.expand.periodic_group_index, Some(idx as i64));
            assert_eq!(step.expand.periodic_group_first, Some(idx == 0));
            assert_eq!(step.type_fields.data_region, rows[idx]);
            assert!(step.expand.periodic_file_data.is_empty());
        }
    }

    #[test]
    fn test_expand_recomputes_auto_fields_per_row() {
        let master = periodic_master();
        let expanded = expand_periodic(&master, &[row(0x0101), row(0x0202)]);

        // 帧计数=行号+1，协议时间随行时间推进
        assert_eq!(expanded[0].protocol.get("帧计数"), Some("0x0001"));
        assert_eq!(expanded[1].protocol.get("帧计数"), Some("0x0002"));
        assert_eq!(expanded[0].protocol.get("时间"), Some("2000"));
        assert_eq!(expanded[1].protocol.get("时间"), Some("2500"));
        // 数据不同的两行CRC不同
        assert_ne!(
            expanded[0].protocol.get("数据区crc校验和"),
            expanded[1].protocol.get("数据区crc校验和")
        );
    }

    #[test]
    fn test_merge_restores_master_and_rows() {
        let master = periodic_master();
        let rows = vec![row(0x0101), row(0x0202), row(0x0303)];
        let expanded = expand_periodic(&master, &rows);
        let merged = merge_periodic(expanded);

        assert_eq!(merged.len(), 1);
        let restored = &merged[0];
        assert_eq!(restored.base.time, master.base.time);
        assert_eq!(restored.base.name, master.base.name);
        assert_eq!(restored.base.step_type, master.base.step_type);
        assert_eq!(restored.type_fields.period, master.type_fields.period);
        assert_eq!(restored.type_fields.file_path, master.type_fields.file_path);
        assert_eq!(restored.type_fields.local_site, master.type_fields.local_site);
        assert_eq!(restored.type_fields.data_region, master.type_fields.data_region);
        assert_eq!(restored.expand.periodic_file_data, rows);
    }

    #[test]
    fn test_merge_without_first_marker_uses_lowest_index() {
        let master = periodic_master();
        let mut expanded = expand_periodic(&master, &[row(0x0101), row(0x0202)]);
        for step in expanded.iter_mut() {
            step.expand.periodic_group_first = None;
        }
        // 乱序送入也按索引还原
        expanded.swap(0, 1);
        let merged = merge_periodic(expanded);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].expand.periodic_group_index, Some(0));
        assert_eq!(merged[0].base.time, 2.0);
    }

    #[test]
    fn test_merge_keeps_ungrouped_steps() {
        let plain = Step::new(StepType::SwitchQuantity);
        let merged = merge_periodic(vec![plain.clone()]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0], plain);
    }
}
