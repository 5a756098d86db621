//! 配置管理模块
//!
//! 提供驱动程序配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持命令行参数覆盖。
//!
//! # 配置文件格式 (gpu_timer.toml)
//!
//! ```toml
//! [graphics]
//! backend = "auto"           # auto, vulkan, metal, dx12, gl
//! power_preference = "high"  # high, low
//!
//! [timer]
//! inflight_warning_threshold = 16
//!
//! [stats]
//! window = 1000
//! report_interval = 1000
//!
//! [workload]
//! frames = 5000
//! copy_size_mb = 64
//! copies_per_frame = 4
//! max_frames_in_flight = 3
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result};

/// 驱动程序配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 计时器配置
    #[serde(default)]
    pub timer: TimerConfig,

    /// 统计窗口配置
    #[serde(default)]
    pub stats: StatsConfig,

    /// 被计时的工作负载
    #[serde(default)]
    pub workload: WorkloadConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 图形后端选择
    #[serde(default = "default_backend")]
    pub backend: BackendSelection,

    /// 适配器功耗偏好
    #[serde(default = "default_power_preference")]
    pub power_preference: PowerPreference,
}

/// 图形后端选择
///
/// `Auto` 交给 wgpu 在所有可用后端中挑选。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendSelection {
    Auto,
    Vulkan,
    Metal,
    Dx12,
    Gl,
}

/// 适配器功耗偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerPreference {
    High,
    Low,
}

/// 计时器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// 在途查询对数量超过该值时输出一次警告
    ///
    /// 正常使用下在途数量等于 GPU 流水线深度（通常 2~4），
    /// 持续增长说明 `start()`/`elapsed()` 没有一一配对。
    #[serde(default = "default_inflight_warning_threshold")]
    pub inflight_warning_threshold: usize,
}

/// 统计窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// 滚动窗口大小（样本数）
    #[serde(default = "default_window")]
    pub window: usize,

    /// 每隔多少帧输出一次统计
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
}

/// 工作负载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// 总帧数
    #[serde(default = "default_frames")]
    pub frames: u64,

    /// 每次拷贝的大小（MiB）
    #[serde(default = "default_copy_size_mb")]
    pub copy_size_mb: u64,

    /// 每帧拷贝次数
    #[serde(default = "default_copies_per_frame")]
    pub copies_per_frame: u32,

    /// CPU 最多领先 GPU 的帧数
    #[serde(default = "default_max_frames_in_flight")]
    pub max_frames_in_flight: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_backend() -> BackendSelection { BackendSelection::Auto }
fn default_power_preference() -> PowerPreference { PowerPreference::High }
fn default_inflight_warning_threshold() -> usize { 16 }
fn default_window() -> usize { 1000 }
fn default_report_interval() -> u64 { 1000 }
fn default_frames() -> u64 { 5000 }
fn default_copy_size_mb() -> u64 { 64 }
fn default_copies_per_frame() -> u32 { 4 }
fn default_max_frames_in_flight() -> usize { 3 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "gpu_timer.log".to_string() }

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            power_preference: default_power_preference(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            inflight_warning_threshold: default_inflight_warning_threshold(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            report_interval: default_report_interval(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            frames: default_frames(),
            copy_size_mb: default_copy_size_mb(),
            copies_per_frame: default_copies_per_frame(),
            max_frames_in_flight: default_max_frames_in_flight(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Config` 实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    #[allow(dead_code)]
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 从命令行参数覆盖配置
    ///
    /// 支持的参数：
    /// - `--vulkan` / `--metal` / `--dx12` / `--gl`: 强制使用指定后端
    /// - `--frames <value>`: 总帧数
    /// - `--window <value>`: 统计窗口大小
    /// - `--report-interval <value>`: 统计输出间隔（帧）
    /// - `--copy-size-mb <value>`: 每次拷贝大小
    /// - `--copies <value>`: 每帧拷贝次数
    ///
    /// 无法解析的值会被忽略，保留原配置。
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

        for (flag, backend) in [
            ("--vulkan", BackendSelection::Vulkan),
            ("--metal", BackendSelection::Metal),
            ("--dx12", BackendSelection::Dx12),
            ("--gl", BackendSelection::Gl),
        ] {
            if args.iter().any(|a| a == flag) {
                self.graphics.backend = backend;
            }
        }

        if let Some(frames) = flag_value(&args, "--frames") {
            self.workload.frames = frames;
        }
        if let Some(window) = flag_value(&args, "--window") {
            self.stats.window = window;
        }
        if let Some(interval) = flag_value(&args, "--report-interval") {
            self.stats.report_interval = interval;
        }
        if let Some(size) = flag_value(&args, "--copy-size-mb") {
            self.workload.copy_size_mb = size;
        }
        if let Some(copies) = flag_value(&args, "--copies") {
            self.workload.copies_per_frame = copies;
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        let positive: [(&str, bool); 7] = [
            ("stats.window", self.stats.window > 0),
            ("stats.report_interval", self.stats.report_interval > 0),
            ("workload.frames", self.workload.frames > 0),
            ("workload.copy_size_mb", self.workload.copy_size_mb > 0),
            ("workload.copies_per_frame", self.workload.copies_per_frame > 0),
            ("workload.max_frames_in_flight", self.workload.max_frames_in_flight > 0),
            (
                "timer.inflight_warning_threshold",
                self.timer.inflight_warning_threshold > 0,
            ),
        ];

        if let Some((field, _)) = positive.iter().find(|(_, ok)| !ok) {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// 读取 `--flag <value>` 形式的参数
fn flag_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let idx = args.iter().position(|a| a == flag)?;
    args.get(idx + 1)?.parse().ok()
}

impl BackendSelection {
    /// 获取后端名称
    pub fn name(&self) -> &'static str {
        match self {
            BackendSelection::Auto => "auto",
            BackendSelection::Vulkan => "Vulkan",
            BackendSelection::Metal => "Metal",
            BackendSelection::Dx12 => "DirectX 12",
            BackendSelection::Gl => "OpenGL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.graphics.backend, BackendSelection::Auto);
        assert_eq!(config.stats.window, 1000);
        assert_eq!(config.stats.report_interval, 1000);
        assert_eq!(config.timer.inflight_warning_threshold, 16);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.stats.window = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workload.copies_per_frame = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_args([
            "gpu_timer", "--gl", "--frames", "120", "--window", "60", "--report-interval", "30",
        ]);

        assert_eq!(config.graphics.backend, BackendSelection::Gl);
        assert_eq!(config.workload.frames, 120);
        assert_eq!(config.stats.window, 60);
        assert_eq!(config.stats.report_interval, 30);
    }

    #[test]
    fn test_apply_args_ignores_bad_values() {
        let mut config = Config::default();
        config.apply_args(["gpu_timer", "--frames", "many", "--window"]);

        assert_eq!(config.workload.frames, 5000);
        assert_eq!(config.stats.window, 1000);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str("[stats]\nwindow = 50\n").unwrap();
        assert_eq!(config.stats.window, 50);
        assert_eq!(config.stats.report_interval, 1000);
        assert_eq!(config.workload.copies_per_frame, 4);
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = Config::from_toml_str(include_str!("../../gpu_timer.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.graphics.power_preference, PowerPreference::High);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml_str("[stats]\nwindow = \"big\"\n").is_err());
    }
}
