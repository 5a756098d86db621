//! 图形后端模块
//!
//! 封装计时器所需的图形 API 能力。目前只有 wgpu 实现，
//! 它覆盖 Vulkan、Metal、DX12 和 OpenGL；后端通过
//! [`TimestampBackend`](crate::timing::TimestampBackend) trait 注入计时器。

pub mod wgpu;

pub use self::wgpu::{CopyWorkload, FramePacer, HeadlessContext, WgpuTimestampBackend};
