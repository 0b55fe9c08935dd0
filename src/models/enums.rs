//! # 模型枚举类型模块
//!
//! 定义流程步配置中使用的核心枚举类型：
//! - **流程步类型枚举**: GLINK/串口/1553-BC/开关量/中断各自的非周期与周期变体
//! - **数据类型枚举**: 数据区联合体项支持的标量数据类型
//! - **字节序枚举**: 流程步级的大小端声明
//!
//! 枚举到索引的映射是持久化格式的一部分（XML中以索引保存），
//! 顺序固定，不允许调整。

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::utils::error::{AppError, AppResult};

/// 流程步类型枚举
/// 索引顺序与持久化格式一致，固定不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    /// GLINK非周期
    GlinkNonPeriodic,
    /// GLINK周期
    GlinkPeriodic,
    /// 串口非周期
    UartNonPeriodic,
    /// 串口周期
    UartPeriodic,
    /// 1553-BC非周期
    Bus1553NonPeriodic,
    /// 1553-BC周期
    Bus1553Periodic,
    /// 开关量
    SwitchQuantity,
    /// 中断非周期
    InterruptNonPeriodic,
    /// 中断周期
    InterruptPeriodic,
}

/// 全部流程步类型，按索引顺序
pub const STEP_TYPES: [StepType; 9] = [
    StepType::GlinkNonPeriodic,
    StepType::GlinkPeriodic,
    StepType::UartNonPeriodic,
    StepType::UartPeriodic,
    StepType::Bus1553NonPeriodic,
    StepType::Bus1553Periodic,
    StepType::SwitchQuantity,
    StepType::InterruptNonPeriodic,
    StepType::InterruptPeriodic,
];

impl StepType {
    /// 流程步类型的持久化索引
    pub fn index(self) -> usize {
        self as usize
    }

    /// 由持久化索引还原流程步类型
    pub fn from_index(index: i64) -> AppResult<Self> {
        STEP_TYPES
            .get(usize::try_from(index).map_err(|_| {
                AppError::schema_error(format!("{}超出流程步类型范围", index))
            })?)
            .copied()
            .ok_or_else(|| AppError::schema_error(format!("{}超出流程步类型范围", index)))
    }

    /// 配置表中的类型名
    pub fn config_name(self) -> &'static str {
        match self {
            StepType::GlinkNonPeriodic => "glink_fields_non_periodic",
            StepType::GlinkPeriodic => "glink_fields_periodic",
            StepType::UartNonPeriodic => "serial_fields_non_periodic",
            StepType::UartPeriodic => "serial_fields_periodic",
            StepType::Bus1553NonPeriodic => "bus1553_fields_non_periodic",
            StepType::Bus1553Periodic => "bus1553_fields_periodic",
            StepType::SwitchQuantity => "switch_quantity_fields",
            StepType::InterruptNonPeriodic => "interrupt_fields",
            StepType::InterruptPeriodic => "interrupt_fields_periodic",
        }
    }

    /// 中文标签
    pub fn label(self) -> &'static str {
        match self {
            StepType::GlinkNonPeriodic => "GLINK非周期",
            StepType::GlinkPeriodic => "GLINK周期",
            StepType::UartNonPeriodic => "串口非周期",
            StepType::UartPeriodic => "串口周期",
            StepType::Bus1553NonPeriodic => "1553B非周期",
            StepType::Bus1553Periodic => "1553B周期",
            StepType::SwitchQuantity => "开关量",
            StepType::InterruptNonPeriodic => "中断非周期",
            StepType::InterruptPeriodic => "中断周期",
        }
    }

    /// 是否为周期流程步
    pub fn is_periodic(self) -> bool {
        matches!(
            self,
            StepType::GlinkPeriodic
                | StepType::UartPeriodic
                | StepType::Bus1553Periodic
                | StepType::InterruptPeriodic
        )
    }

    /// 是否为GLINK/1553总线帧协议（帧计数/帧CRC自动字段只对这两族有效）
    pub fn uses_frame_protocol(self) -> bool {
        matches!(
            self,
            StepType::GlinkNonPeriodic
                | StepType::GlinkPeriodic
                | StepType::Bus1553NonPeriodic
                | StepType::Bus1553Periodic
        )
    }
}

impl Default for StepType {
    fn default() -> Self {
        Self::GlinkNonPeriodic
    }
}

impl Display for StepType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.config_name())
    }
}

impl FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STEP_TYPES
            .iter()
            .find(|t| t.config_name() == s)
            .copied()
            .ok_or_else(|| format!("Invalid StepType: {}", s))
    }
}

/// 数据区联合体项的数据类型枚举
/// 索引顺序与持久化格式一致，固定不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataTypeTag {
    Uint8,
    Uint16,
    Uint32,
    Int8,
    Int16,
    Int32,
    Float32,
    Float64,
    Bool,
    Str,
}

/// 全部数据类型，按索引顺序
pub const DATA_TYPES: [DataTypeTag; 10] = [
    DataTypeTag::Uint8,
    DataTypeTag::Uint16,
    DataTypeTag::Uint32,
    DataTypeTag::Int8,
    DataTypeTag::Int16,
    DataTypeTag::Int32,
    DataTypeTag::Float32,
    DataTypeTag::Float64,
    DataTypeTag::Bool,
    DataTypeTag::Str,
];

impl DataTypeTag {
    /// 数据类型的持久化索引
    pub fn index(self) -> usize {
        self as usize
    }

    /// 由持久化索引还原数据类型
    pub fn from_index(index: i64) -> AppResult<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| DATA_TYPES.get(i))
            .copied()
            .ok_or_else(|| AppError::schema_error(format!("{}超出数据类型范围", index)))
    }

    /// 配置表中的类型名（大写）
    pub fn name(self) -> &'static str {
        match self {
            DataTypeTag::Uint8 => "UINT8",
            DataTypeTag::Uint16 => "UINT16",
            DataTypeTag::Uint32 => "UINT32",
            DataTypeTag::Int8 => "INT8",
            DataTypeTag::Int16 => "INT16",
            DataTypeTag::Int32 => "INT32",
            DataTypeTag::Float32 => "FLOAT32",
            DataTypeTag::Float64 => "FLOAT64",
            DataTypeTag::Bool => "BOOL",
            DataTypeTag::Str => "STRING",
        }
    }

    /// 标量编码后的字节宽度（STRING为变长，返回None）
    pub fn byte_width(self) -> Option<usize> {
        match self {
            DataTypeTag::Uint8 | DataTypeTag::Int8 | DataTypeTag::Bool => Some(1),
            DataTypeTag::Uint16 | DataTypeTag::Int16 => Some(2),
            DataTypeTag::Uint32 | DataTypeTag::Int32 | DataTypeTag::Float32 => Some(4),
            DataTypeTag::Float64 => Some(8),
            DataTypeTag::Str => None,
        }
    }

    /// 小端输出时是否需要按16位字交换
    ///
    /// 硬件将32/64位小端值按"大端排列的16位字序列"传输，
    /// 交换集合固定为 UINT32/FLOAT32/FLOAT64，其余类型不参与
    pub fn little_endian_word_swap(self) -> bool {
        matches!(
            self,
            DataTypeTag::Uint32 | DataTypeTag::Float32 | DataTypeTag::Float64
        )
    }

    /// 是否为浮点类型
    pub fn is_float(self) -> bool {
        matches!(self, DataTypeTag::Float32 | DataTypeTag::Float64)
    }
}

impl Default for DataTypeTag {
    fn default() -> Self {
        Self::Uint8
    }
}

impl Display for DataTypeTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DataTypeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // 模板配置沿用了若干别名（REAL32/DOUBLE等），一并接受
        match s.to_ascii_uppercase().as_str() {
            "UINT8" => Ok(DataTypeTag::Uint8),
            "UINT16" | "UINT" => Ok(DataTypeTag::Uint16),
            "UINT32" => Ok(DataTypeTag::Uint32),
            "INT8" => Ok(DataTypeTag::Int8),
            "INT16" => Ok(DataTypeTag::Int16),
            "INT32" => Ok(DataTypeTag::Int32),
            "FLOAT32" | "REAL32" | "FLOAT" | "REAL" => Ok(DataTypeTag::Float32),
            "FLOAT64" | "REAL64" | "DOUBLE" => Ok(DataTypeTag::Float64),
            "BOOL" | "BOOLEAN" => Ok(DataTypeTag::Bool),
            "STR" | "STRING" => Ok(DataTypeTag::Str),
            _ => Err(format!("Invalid DataTypeTag: {}", s)),
        }
    }
}

/// 字节序枚举
/// 流程步base子字典中endian字段的取值（0=大端，1=小端）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endianness {
    /// 大端
    Big,
    /// 小端
    Little,
}

impl Endianness {
    pub fn index(self) -> usize {
        self as usize
    }

    /// 由持久化索引还原字节序（非0一律视为小端）
    pub fn from_index(index: i64) -> Self {
        if index == 0 {
            Self::Big
        } else {
            Self::Little
        }
    }

    pub fn is_big(self) -> bool {
        matches!(self, Self::Big)
    }
}

impl Default for Endianness {
    fn default() -> Self {
        Self::Big
    }
}

impl Display for Endianness {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Endianness::Big => "big",
            Endianness::Little => "little",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_type_index_round_trip() {
        for (idx, step_type) in STEP_TYPES.iter().enumerate() {
            assert_eq!(step_type.index(), idx);
            assert_eq!(StepType::from_index(idx as i64).unwrap(), *step_type);
        }
        assert!(StepType::from_index(9).is_err());
        assert!(StepType::from_index(-1).is_err());
    }

    #[test]
    fn test_data_type_index_round_trip() {
        assert_eq!(DataTypeTag::from_index(0).unwrap(), DataTypeTag::Uint8);
        assert_eq!(DataTypeTag::from_index(1).unwrap(), DataTypeTag::Uint16);
        assert_eq!(DataTypeTag::from_index(7).unwrap(), DataTypeTag::Float64);
        assert!(DataTypeTag::from_index(10).is_err());
    }

    #[test]
    fn test_data_type_aliases() {
        assert_eq!("REAL32".parse::<DataTypeTag>().unwrap(), DataTypeTag::Float32);
        assert_eq!("double".parse::<DataTypeTag>().unwrap(), DataTypeTag::Float64);
        assert_eq!("boolean".parse::<DataTypeTag>().unwrap(), DataTypeTag::Bool);
    }

    #[test]
    fn test_word_swap_set() {
        assert!(DataTypeTag::Uint32.little_endian_word_swap());
        assert!(DataTypeTag::Float32.little_endian_word_swap());
        assert!(DataTypeTag::Float64.little_endian_word_swap());
        assert!(!DataTypeTag::Uint16.little_endian_word_swap());
        assert!(!DataTypeTag::Int32.little_endian_word_swap());
        assert!(!DataTypeTag::Bool.little_endian_word_swap());
    }

    #[test]
    fn test_periodic_classification() {
        assert!(StepType::GlinkPeriodic.is_periodic());
        assert!(StepType::InterruptPeriodic.is_periodic());
        assert!(!StepType::SwitchQuantity.is_periodic());
        assert!(!StepType::GlinkNonPeriodic.is_periodic());
    }
}
