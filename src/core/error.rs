//! 错误处理模块
//!
//! 定义了计时器与驱动程序使用的统一错误类型。
//!
//! 计时协议本身没有错误分类："结果尚未就绪"由 `elapsed()` 的 0 返回值表达。
//! 这里的错误只覆盖配置加载、设备创建和查询资源分配等真正会失败的环节。

use std::fmt;

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, GpuTimerError>;

/// gpu_timer 的错误类型
#[derive(Debug)]
pub enum GpuTimerError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// IO 错误
    Io(std::io::Error),

    /// 初始化错误
    Initialization(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 没有可用的适配器
    AdapterNotFound(String),

    /// 设备创建失败
    DeviceCreation(String),

    /// 适配器不支持所需特性
    UnsupportedFeature(String),

    /// 查询集或缓冲区创建失败
    ResourceCreation(String),

    /// 时间戳回读失败
    Readback(String),
}

impl fmt::Display for GpuTimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuTimerError::Config(e) => write!(f, "Configuration error: {}", e),
            GpuTimerError::Graphics(e) => write!(f, "Graphics error: {}", e),
            GpuTimerError::Io(e) => write!(f, "IO error: {}", e),
            GpuTimerError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::AdapterNotFound(msg) => write!(f, "No suitable adapter: {}", msg),
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::UnsupportedFeature(msg) => write!(f, "Unsupported feature: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::Readback(msg) => write!(f, "Timestamp readback failed: {}", msg),
        }
    }
}

impl std::error::Error for GpuTimerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuTimerError::Config(e) => Some(e),
            GpuTimerError::Graphics(e) => Some(e),
            GpuTimerError::Io(e) => Some(e),
            GpuTimerError::Initialization(_) => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for GpuTimerError {
    fn from(err: std::io::Error) -> Self {
        GpuTimerError::Io(err)
    }
}

impl From<ConfigError> for GpuTimerError {
    fn from(err: ConfigError) -> Self {
        GpuTimerError::Config(err)
    }
}

impl From<GraphicsError> for GpuTimerError {
    fn from(err: GraphicsError) -> Self {
        GpuTimerError::Graphics(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err: GpuTimerError = ConfigError::InvalidValue {
            field: "stats.window".to_string(),
            reason: "must be greater than 0".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value for 'stats.window': must be greater than 0"
        );

        let err: GpuTimerError =
            GraphicsError::UnsupportedFeature("TIMESTAMP_QUERY".to_string()).into();
        assert_eq!(err.to_string(), "Graphics error: Unsupported feature: TIMESTAMP_QUERY");
    }

    #[test]
    fn test_error_source() {
        let err: GpuTimerError = GraphicsError::Readback("map failed".to_string()).into();
        assert!(err.source().is_some());

        let err = GpuTimerError::Initialization("no device".to_string());
        assert!(err.source().is_none());
    }
}
