//! 持久化模块
//!
//! 流程步配置的XML读写

pub mod xml_codec;
