//! 被计时的固定工作负载
//!
//! 每帧把源缓冲区完整拷贝到目标缓冲区若干次。
//! 命令序列每帧完全相同，满足计时器对"同一段命令"的要求。
//!
//! 无窗口运行时没有呈现操作来限制 CPU 领先 GPU 的帧数，
//! 由 `FramePacer` 按提交序号做等价的限制。

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::core::error::{GraphicsError, Result};

/// 缓冲区拷贝工作负载
pub struct CopyWorkload {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    source: wgpu::Buffer,
    destination: wgpu::Buffer,
    size: u64,
    copies: u32,
}

impl CopyWorkload {
    /// 创建工作负载
    ///
    /// # 参数
    ///
    /// * `size` - 每次拷贝的字节数，必须是 4 的倍数且不超过设备的 `max_buffer_size`
    /// * `copies` - 每帧拷贝次数
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        size: u64,
        copies: u32,
    ) -> Result<Self> {
        let max = device.limits().max_buffer_size;
        if size == 0 || size > max || size % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GraphicsError::ResourceCreation(format!(
                "copy size {} must be a non-zero multiple of {} and at most {}",
                size,
                wgpu::COPY_BUFFER_ALIGNMENT,
                max
            ))
            .into());
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let source = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("workload source"),
            size,
            usage: wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let destination = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("workload destination"),
            size,
            usage: wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(GraphicsError::ResourceCreation(format!("workload buffers: {}", e)).into());
        }

        debug!(size, copies, "Created copy workload");
        Ok(Self {
            device,
            queue,
            source,
            destination,
            size,
            copies,
        })
    }

    /// 编码并提交一帧的拷贝命令，不等待完成
    pub fn submit(&self) -> wgpu::SubmissionIndex {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("workload"),
        });
        for _ in 0..self.copies {
            encoder.copy_buffer_to_buffer(&self.source, 0, &self.destination, 0, self.size);
        }
        self.queue.submit(Some(encoder.finish()))
    }

    /// 每帧传输的总字节数
    pub fn bytes_per_frame(&self) -> u64 {
        self.size * self.copies as u64
    }
}

/// 帧节奏控制
///
/// 记录每帧的提交序号，在途帧数超过上限时等待最旧的一帧完成，
/// 相当于交换链在呈现时施加的背压。
pub struct FramePacer {
    device: Arc<wgpu::Device>,
    pending: VecDeque<wgpu::SubmissionIndex>,
    max_frames_in_flight: usize,
}

impl FramePacer {
    /// 创建帧节奏控制器
    pub fn new(device: Arc<wgpu::Device>, max_frames_in_flight: usize) -> Self {
        Self {
            device,
            pending: VecDeque::with_capacity(max_frames_in_flight + 1),
            max_frames_in_flight,
        }
    }

    /// 登记一帧的提交，必要时等待最旧的帧
    pub fn frame_submitted(&mut self, index: wgpu::SubmissionIndex) {
        self.pending.push_back(index);
        while self.pending.len() > self.max_frames_in_flight {
            if let Some(oldest) = self.pending.pop_front() {
                trace!("Frame limit reached, waiting for oldest submission");
                let _ = self.device.poll(wgpu::Maintain::WaitForSubmissionIndex(oldest));
            }
        }
    }

    /// 当前在途帧数
    pub fn frames_in_flight(&self) -> usize {
        self.pending.len()
    }
}
