//! 基于 wgpu 时间戳查询的 `TimestampBackend`
//!
//! 每个查询句柄对应一个独立的槽位：容量为 1 的时间戳查询集、
//! 一个解析缓冲区和一个可映射的回读缓冲区。
//!
//! 写入时间戳时在同一个命令缓冲中依次记录：
//! 1. 一个空的计算通道，在通道开始处写入时间戳
//! 2. 把查询解析到解析缓冲区
//! 3. 拷贝到回读缓冲区
//!
//! 提交后立即请求异步映射。映射回调只会在 `device.poll` 中触发，
//! 因此检查就绪状态时只做一次 `Maintain::Poll`，从不阻塞。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{error, trace, warn};

use crate::core::error::{GraphicsError, Result};
use crate::timing::{QueryHandle, TimestampBackend};

/// 单个时间戳的字节数
const QUERY_SIZE: u64 = wgpu::QUERY_SIZE as u64;

// 映射状态，由映射回调写入
const MAP_PENDING: u8 = 0;
const MAP_OK: u8 = 1;
const MAP_FAILED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// 从未写入
    Idle,
    /// 已提交，等待回读映射完成
    Pending,
    /// 已回读，单位为 GPU tick
    Resolved(u64),
    /// 回读映射失败
    Failed,
}

struct QuerySlot {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    readback_buffer: wgpu::Buffer,
    map_status: Arc<AtomicU8>,
    state: SlotState,
}

impl QuerySlot {
    fn new(device: &wgpu::Device, index: usize) -> Self {
        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some(&format!("gpu_timer query {}", index)),
            ty: wgpu::QueryType::Timestamp,
            count: 1,
        });

        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("gpu_timer resolve {}", index)),
            size: QUERY_SIZE,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("gpu_timer readback {}", index)),
            size: QUERY_SIZE,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            query_set,
            resolve_buffer,
            readback_buffer,
            map_status: Arc::new(AtomicU8::new(MAP_PENDING)),
            state: SlotState::Idle,
        }
    }

    /// 映射完成时把结果取出并解除映射，返回结果是否可读
    fn collect(&mut self) -> bool {
        if self.state != SlotState::Pending {
            return matches!(self.state, SlotState::Resolved(_) | SlotState::Failed);
        }

        match self.map_status.load(Ordering::Acquire) {
            MAP_OK => {
                let ticks = {
                    let view = self.readback_buffer.slice(..).get_mapped_range();
                    bytemuck::pod_read_unaligned::<u64>(&view[..QUERY_SIZE as usize])
                };
                self.readback_buffer.unmap();
                self.state = SlotState::Resolved(ticks);
                true
            }
            MAP_FAILED => {
                self.state = SlotState::Failed;
                true
            }
            _ => false,
        }
    }
}

/// wgpu 时间戳后端
///
/// 查询槽位随后端一起释放。
pub struct WgpuTimestampBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    slots: Vec<QuerySlot>,
    /// 每个 GPU tick 的纳秒数
    timestamp_period: f64,
}

impl WgpuTimestampBackend {
    /// 创建后端
    ///
    /// 设备必须启用了 `Features::TIMESTAMP_QUERY`。
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Result<Self> {
        if !device.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            return Err(GraphicsError::UnsupportedFeature(
                "device was created without TIMESTAMP_QUERY".to_string(),
            )
            .into());
        }

        let timestamp_period = queue.get_timestamp_period() as f64;
        Ok(Self {
            device,
            queue,
            slots: Vec::new(),
            timestamp_period,
        })
    }

    /// 已创建的查询数量
    pub fn query_count(&self) -> usize {
        self.slots.len()
    }

    fn poll(&self, maintain: wgpu::Maintain) {
        let _ = self.device.poll(maintain);
    }
}

impl TimestampBackend for WgpuTimestampBackend {
    fn create_query(&mut self) -> Result<QueryHandle> {
        let index = self.slots.len();
        let handle = u32::try_from(index)
            .map(QueryHandle::new)
            .map_err(|_| GraphicsError::ResourceCreation("query table is full".to_string()))?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let slot = QuerySlot::new(&self.device, index);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        if let Some(e) = validation.or(out_of_memory) {
            return Err(GraphicsError::ResourceCreation(format!(
                "timestamp query {}: {}",
                index, e
            ))
            .into());
        }

        self.slots.push(slot);
        trace!(query = index, "Created timestamp query");
        Ok(handle)
    }

    fn insert_execution_barrier(&mut self) {
        // wgpu 没有 GPU 侧等待原语；同一队列上的提交按顺序执行，
        // 这里提交一个空批次，把此前 write_buffer 等暂存的工作刷到计时区间之前。
        self.queue.submit(std::iter::empty());
    }

    fn write_timestamp(&mut self, query: QueryHandle) {
        let Some(slot) = self.slots.get_mut(query.index()) else {
            warn!(query = query.index(), "Timestamp write for unknown query");
            return;
        };

        if slot.state == SlotState::Pending {
            // 回读缓冲区仍在映射中，覆盖会触发验证错误
            warn!(query = query.index(), "Query rewritten before its result was consumed, skipping");
            return;
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gpu_timer timestamp"),
        });
        {
            let _pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("gpu_timer timestamp pass"),
                timestamp_writes: Some(wgpu::ComputePassTimestampWrites {
                    query_set: &slot.query_set,
                    beginning_of_pass_write_index: Some(0),
                    end_of_pass_write_index: None,
                }),
            });
        }
        encoder.resolve_query_set(&slot.query_set, 0..1, &slot.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(&slot.resolve_buffer, 0, &slot.readback_buffer, 0, QUERY_SIZE);
        self.queue.submit(Some(encoder.finish()));

        slot.map_status.store(MAP_PENDING, Ordering::Release);
        slot.state = SlotState::Pending;

        let status = Arc::clone(&slot.map_status);
        let index = query.index();
        slot.readback_buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let value = match result {
                    Ok(()) => MAP_OK,
                    Err(e) => {
                        error!(query = index, "Timestamp readback mapping failed: {:?}", e);
                        MAP_FAILED
                    }
                };
                status.store(value, Ordering::Release);
            });
    }

    fn is_result_available(&mut self, query: QueryHandle) -> bool {
        self.poll(wgpu::Maintain::Poll);
        self.slots
            .get_mut(query.index())
            .is_some_and(|slot| slot.collect())
    }

    fn read_timestamp(&mut self, query: QueryHandle) -> u64 {
        let index = query.index();
        if index >= self.slots.len() {
            warn!(query = index, "Timestamp read for unknown query");
            return 0;
        }

        if !self.slots[index].collect() {
            self.poll(wgpu::Maintain::Poll);
        }
        if !self.slots[index].collect() {
            // 结束查询已就绪时，更早提交的起始查询必然已经完成，这里的等待不会真正停顿
            trace!(query = index, "Waiting on readback for an already completed query");
            self.poll(wgpu::Maintain::Wait);
            self.slots[index].collect();
        }

        match self.slots[index].state {
            SlotState::Resolved(ticks) => (ticks as f64 * self.timestamp_period) as u64,
            SlotState::Failed => {
                let err = GraphicsError::Readback(format!("query {} has no result", index));
                warn!("{}", err);
                0
            }
            SlotState::Idle | SlotState::Pending => 0,
        }
    }
}
