//! GPU 计时模块
//!
//! - `query`：查询句柄与后端抽象 `TimestampBackend`
//! - `gpu_timer`：查询对池与非阻塞的 `start()`/`elapsed()` 协议
//! - `stats`：固定窗口滚动统计 `RollingStats`
//!
//! 两个组件都只在单个渲染线程上使用，每帧按
//! `start → 提交命令 → elapsed → add` 的固定顺序调用，内部没有任何锁。

pub mod query;
pub mod gpu_timer;
pub mod stats;

#[cfg(test)]
pub(crate) mod fake;

pub use query::{QueryHandle, QueryPair, TimestampBackend};
pub use gpu_timer::GpuTimer;
pub use stats::{RollingStats, Sample, Summary};
