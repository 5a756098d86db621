//! gpu_timer - 非阻塞 GPU 计时器
//!
//! 在不阻塞 CPU 和 GPU 流水线的前提下测量一段 GPU 命令的执行时间，
//! 并用固定窗口的滚动统计汇总重复测量的结果。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理）
//! - `timing`: 计时器 `GpuTimer`、查询后端抽象和滚动统计 `RollingStats`
//! - `gfx`: 基于 wgpu 的时间戳查询后端和示例工作负载
//!
//! # 使用示例
//!
//! ```no_run
//! use gpu_timer::core::config::GraphicsConfig;
//! use gpu_timer::gfx::{CopyWorkload, HeadlessContext, WgpuTimestampBackend};
//! use gpu_timer::timing::{GpuTimer, RollingStats};
//!
//! # fn main() -> gpu_timer::core::Result<()> {
//! let context = HeadlessContext::new(&GraphicsConfig::default())?;
//! let backend = WgpuTimestampBackend::new(context.device.clone(), context.queue.clone())?;
//! let workload = CopyWorkload::new(context.device.clone(), context.queue.clone(), 1 << 20, 4)?;
//!
//! let mut timer = GpuTimer::new(backend);
//! let mut stats = RollingStats::new(100);
//! for _ in 0..100 {
//!     timer.start()?;
//!     workload.submit();
//!     stats.add(timer.elapsed());
//! }
//! println!("average: {:.3} ms", stats.average());
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod timing;
pub mod gfx;
