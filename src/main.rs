//! gpu_timer - 计时驱动程序
//!
//! 在无窗口的 wgpu 设备上重复提交固定的缓冲区拷贝序列，
//! 用 `GpuTimer` 测量每帧的 GPU 执行时间，并定期输出滚动统计。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用配置文件（默认 gpu_timer.toml）
//! cargo run
//!
//! # 命令行覆盖
//! cargo run -- --vulkan --frames 3000 --window 500 --report-interval 500
//! ```
//!
//! # 每帧流程
//!
//! ```text
//! start() ──▶ 提交拷贝命令 ──▶ elapsed() ──▶ stats.add() ──▶ 帧节奏限制
//!                                              │
//!                      每 report_interval 帧 ◀─┘ 输出 average/min/max
//! ```

use anyhow::Context;
use tracing::{info, warn};

use gpu_timer::core::{log, Config};
use gpu_timer::gfx::{CopyWorkload, FramePacer, HeadlessContext, WgpuTimestampBackend};
use gpu_timer::timing::{GpuTimer, RollingStats, TimestampBackend};

const DEFAULT_CONFIG_PATH: &str = "gpu_timer.toml";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// 应用程序入口点
///
/// # 初始化流程
///
/// 1. 加载配置文件（`--config <path>`，默认 gpu_timer.toml）
/// 2. 应用命令行参数覆盖并验证
/// 3. 初始化日志系统
/// 4. 创建设备、时间戳后端和工作负载
/// 5. 运行计时循环
fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // 1. 加载配置（在初始化日志之前）
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|idx| args.get(idx + 1))
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_PATH);
    let mut config = Config::from_file_or_default(config_path);

    // 2. 应用命令行参数并验证
    config.apply_args(&args);
    config.validate().context("invalid configuration")?;

    // 3. 初始化日志系统
    let log_file = config
        .logging
        .file_output
        .then_some(config.logging.log_file.as_str());
    log::init_logger(config.logging.level, config.logging.file_output, log_file)
        .context("failed to initialize logging")?;
    info!(version = env!("CARGO_PKG_VERSION"), config = config_path, "gpu_timer starting");

    // 4. 创建设备和计时器
    let context = HeadlessContext::new(&config.graphics).context("failed to initialize GPU")?;
    let backend = WgpuTimestampBackend::new(context.device.clone(), context.queue.clone())?;
    let workload = CopyWorkload::new(
        context.device.clone(),
        context.queue.clone(),
        config.workload.copy_size_mb * BYTES_PER_MB,
        config.workload.copies_per_frame,
    )
    .context("failed to create workload")?;

    let mut timer =
        GpuTimer::with_inflight_warning_threshold(backend, config.timer.inflight_warning_threshold);
    let mut stats = RollingStats::<f64>::new(config.stats.window);
    let mut pacer = FramePacer::new(context.device.clone(), config.workload.max_frames_in_flight);

    info!(
        frames = config.workload.frames,
        window = config.stats.window,
        report_interval = config.stats.report_interval,
        bytes_per_frame = workload.bytes_per_frame(),
        "Entering timing loop"
    );

    // 5. 计时循环
    for frame in 1..=config.workload.frames {
        timer.start()?;
        let submission = workload.submit();
        stats.add(timer.elapsed());
        pacer.frame_submitted(submission);

        if frame % config.stats.report_interval == 0 {
            report(frame, &stats, &timer, workload.bytes_per_frame());
        }
    }

    info!(
        allocated_pairs = timer.allocated_pairs(),
        inflight = timer.inflight_len(),
        frames_in_flight = pacer.frames_in_flight(),
        "Timing loop finished"
    );
    Ok(())
}

/// 输出一次滚动统计
fn report<B: TimestampBackend>(
    frame: u64,
    stats: &RollingStats<f64>,
    timer: &GpuTimer<B>,
    bytes_per_frame: u64,
) {
    if !stats.is_filled() {
        warn!(
            frame,
            samples = stats.samples_written(),
            window = stats.capacity(),
            "Statistics window not yet filled, values are biased toward zero"
        );
    }

    let summary = stats.summary();
    let throughput_gib_s = if summary.average > 0.0 {
        bytes_per_frame as f64 / (summary.average * 1e-3) / (1u64 << 30) as f64
    } else {
        0.0
    };

    info!(
        frame,
        average_ms = format_args!("{:.4}", summary.average),
        min_ms = format_args!("{:.4}", summary.min),
        max_ms = format_args!("{:.4}", summary.max),
        throughput_gib_s = format_args!("{:.2}", throughput_gib_s),
        inflight = timer.inflight_len(),
        "GPU timing"
    );
}
