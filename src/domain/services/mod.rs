/// 领域服务模块
///
/// 业务说明：
/// 本模块承载协议编码的全部业务算法，服务间只通过函数参数传递数据，
/// 编码调用之间不保留共享状态；唯一的共享资源是只读的协议模板注册表
/// （见`models::template`），加载后全程不变，无需加锁。
///
/// 模块组织：
/// - 叶子服务在前（值编解码、归一化），组合服务在后（模板引擎、周期展开）
/// - 每个服务一个独立模块文件

/// 类型化值编解码器
///
/// 业务说明：单个标记值按数据类型/字节序编码为字节序列
/// 支持：全部标量数据类型、浮点位模式注入、小端16位字交换
pub mod value_codec;

/// 数据区归一化器
///
/// 业务说明：把数据区的各种来源形态归一化为标记/字节统一结果
/// 支持：联合体列表、JSON文本、裸HEX标记、任意字符串、空数据
pub mod data_region;

/// 串口/CRC计算字段度量
///
/// 业务说明：串口标准/扩展帧与CRC尾校验帧的模板级后处理
/// 支持：转义插入、CRC-16/CCITT、累加和、长度拆分
pub mod serial_metrics;

/// GLINK/1553帧自动字段
///
/// 业务说明：协议时间戳、跨流程步帧计数排名、帧CRC累加
/// 支持：批量刷新与单步重算两种入口
pub mod frame_fields;

/// 协议模板引擎
///
/// 业务说明：按模板字段顺序把流程步编码为帧的十六进制标记流
/// 支持：数据区替换、数组字段、时间段小端交换、8位标记合并
pub mod template_engine;

/// 周期流程步展开与合并
///
/// 业务说明：主流程步+数据行 ↔ N条带时间戳的物理流程步
/// 支持：展开时逐行重算自动字段、合并时按分组还原
pub mod periodic;

// 重新导出所有服务接口
pub use data_region::{
    merge_adjacent_byte_tokens, normalize_data_region, normalize_data_region_value,
    NormalizedRegion, SourceKind,
};
pub use frame_fields::{compute_frame_counts, frame_count_rank, refresh_auto_fields};
pub use periodic::{expand_periodic, merge_periodic};
pub use serial_metrics::{
    calc_crc_tail_metrics, calc_serial_extended_metrics, calc_serial_standard_metrics,
    crc16_ccitt, SerialMetrics,
};
pub use template_engine::{encode_step_frame, encode_step_protocol, FrameEncoding};
pub use value_codec::{scalar_to_bytes, EndianMode};
