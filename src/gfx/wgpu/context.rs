//! wgpu 无窗口设备管理
//!
//! 计时只需要设备和队列，不需要表面和交换链。本模块负责：
//! - 创建 wgpu 实例
//! - 选择支持时间戳查询的适配器
//! - 创建逻辑设备和命令队列

use std::sync::Arc;
use tracing::{debug, info};

use crate::core::config::{BackendSelection, GraphicsConfig, PowerPreference};
use crate::core::error::{GraphicsError, Result};

/// 无窗口的 wgpu 设备
///
/// 设备和队列以 `Arc` 共享给时间戳后端和工作负载。
pub struct HeadlessContext {
    /// 图形适配器（GPU）
    pub adapter: wgpu::Adapter,
    /// 逻辑设备
    pub device: Arc<wgpu::Device>,
    /// 命令队列
    pub queue: Arc<wgpu::Queue>,
}

impl HeadlessContext {
    /// 创建无窗口设备
    ///
    /// # 错误
    ///
    /// - 找不到适配器时返回 `AdapterNotFound`
    /// - 适配器不支持 `TIMESTAMP_QUERY` 时返回 `UnsupportedFeature`
    /// - 设备创建失败时返回 `DeviceCreation`
    pub fn new(config: &GraphicsConfig) -> Result<Self> {
        info!(backend = config.backend.name(), "Initializing headless wgpu device");

        debug!("Creating wgpu instance");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: backends_for(config.backend),
            dx12_shader_compiler: Default::default(),
            flags: wgpu::InstanceFlags::default(),
            gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
        });

        debug!("Requesting adapter");
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: match config.power_preference {
                PowerPreference::High => wgpu::PowerPreference::HighPerformance,
                PowerPreference::Low => wgpu::PowerPreference::LowPower,
            },
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| GraphicsError::AdapterNotFound(config.backend.name().to_string()))?;

        let adapter_info = adapter.get_info();
        info!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "Selected adapter"
        );

        if !adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY) {
            return Err(GraphicsError::UnsupportedFeature(format!(
                "TIMESTAMP_QUERY is not supported by {}",
                adapter_info.name
            ))
            .into());
        }

        debug!("Requesting device and queue");
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("gpu_timer device"),
                required_features: wgpu::Features::TIMESTAMP_QUERY,
                required_limits: wgpu::Limits::default(),
            },
            None,
        ))
        .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create device: {}", e)))?;

        info!(
            timestamp_period_ns = queue.get_timestamp_period(),
            "Headless wgpu device initialized"
        );

        Ok(Self {
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }
}

fn backends_for(selection: BackendSelection) -> wgpu::Backends {
    match selection {
        BackendSelection::Auto => wgpu::Backends::all(),
        BackendSelection::Vulkan => wgpu::Backends::VULKAN,
        BackendSelection::Metal => wgpu::Backends::METAL,
        BackendSelection::Dx12 => wgpu::Backends::DX12,
        BackendSelection::Gl => wgpu::Backends::GL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_selection_mapping() {
        assert_eq!(backends_for(BackendSelection::Auto), wgpu::Backends::all());
        assert_eq!(backends_for(BackendSelection::Vulkan), wgpu::Backends::VULKAN);
        assert_eq!(backends_for(BackendSelection::Gl), wgpu::Backends::GL);
    }
}
