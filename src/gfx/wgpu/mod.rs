//! wgpu 后端模块
//!
//! - `context`：无窗口设备与队列
//! - `timestamp`：基于时间戳查询的 `TimestampBackend` 实现
//! - `workload`：被计时的缓冲区拷贝命令序列

pub mod context;
pub mod timestamp;
pub mod workload;

pub use context::HeadlessContext;
pub use timestamp::WgpuTimestampBackend;
pub use workload::{CopyWorkload, FramePacer};
