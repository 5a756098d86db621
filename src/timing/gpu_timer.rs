//! 非阻塞 GPU 计时器
//!
//! `GpuTimer` 维护一个可复用的时间戳查询对池，并把 GPU 侧异步就绪的结果
//! 转换成每帧同步轮询的接口。
//!
//! # 使用方式
//!
//! 启动时创建一次，之后每帧在同一段命令前后调用 `start()` / `elapsed()`：
//!
//! ```ignore
//! timer.start()?;
//! workload.submit();
//! stats.add(timer.elapsed());
//! ```
//!
//! `elapsed()` 返回的是**最早可用**的测量结果，通常落后 1~3 帧；
//! 返回 0 表示本次没有新结果（刚启动或结果尚未就绪）。
//! 要计时不同的命令序列时请使用多个计时器实例：交错使用会破坏先进先出的前提。

use std::collections::VecDeque;
use tracing::{debug, trace, warn};

use crate::core::error::Result;
use super::query::{QueryPair, TimestampBackend};

/// 纳秒到毫秒
const NS_TO_MS: f64 = 1e-6;

/// 默认的在途数量警告阈值
pub const DEFAULT_INFLIGHT_WARNING_THRESHOLD: usize = 16;

/// 非阻塞 GPU 计时器
///
/// 每个查询对要么在 `inflight`（已发出起始时间戳、结果未被消费），
/// 要么在 `available`（可被下一次 `start()` 复用），二者互斥。
/// `inflight` 按提交顺序排列，只有队首有资格被报告。
#[derive(Debug)]
pub struct GpuTimer<B: TimestampBackend> {
    backend: B,
    inflight: VecDeque<QueryPair>,
    available: VecDeque<QueryPair>,
    allocated_pairs: usize,
    inflight_warning_threshold: usize,
    growth_warned: bool,
}

impl<B: TimestampBackend> GpuTimer<B> {
    /// 创建计时器，查询对在首次 `start()` 时才分配
    pub fn new(backend: B) -> Self {
        Self::with_inflight_warning_threshold(backend, DEFAULT_INFLIGHT_WARNING_THRESHOLD)
    }

    /// 创建计时器并指定在途数量警告阈值
    pub fn with_inflight_warning_threshold(backend: B, threshold: usize) -> Self {
        Self {
            backend,
            inflight: VecDeque::new(),
            available: VecDeque::new(),
            allocated_pairs: 0,
            inflight_warning_threshold: threshold,
            growth_warned: false,
        }
    }

    /// 开始计时，下一条提交的 GPU 命令是第一条被计时的命令
    ///
    /// 优先复用空闲查询对，池为空时才向后端申请新的查询。
    /// 在写入起始时间戳之前插入 GPU 侧执行屏障，调用线程不会被阻塞。
    ///
    /// # 错误
    ///
    /// 后端无法分配查询对象时返回其错误。
    pub fn start(&mut self) -> Result<()> {
        let pair = match self.available.pop_front() {
            Some(pair) => {
                trace!(start = pair.start.index(), end = pair.end.index(), "Reusing query pair");
                pair
            }
            None => self.allocate_pair()?,
        };

        self.inflight.push_back(pair);
        self.check_inflight_growth();

        self.backend.insert_execution_barrier();
        self.backend.write_timestamp(pair.start);
        Ok(())
    }

    /// 结束计时并返回最早可用的测量结果（毫秒）
    ///
    /// 返回 0 有两种含义：刚启动、只有一个在途测量；或者最早的测量尚未就绪。
    /// 与真实的零时长测量无法区分，需要区分时使用 [`GpuTimer::poll_elapsed`]。
    pub fn elapsed(&mut self) -> f64 {
        self.poll_elapsed().unwrap_or(0.0)
    }

    /// 与 `elapsed()` 协议相同，但没有新结果时返回 `None`
    pub fn poll_elapsed(&mut self) -> Option<f64> {
        let Some(newest) = self.inflight.back().copied() else {
            warn!("elapsed() called without a matching start(), ignoring");
            return None;
        };
        self.backend.write_timestamp(newest.end);

        // 刚写入的查询不可能已经就绪
        if self.inflight.len() == 1 {
            return None;
        }

        // 起始时间戳先于结束时间戳提交，只需检查结束查询
        let oldest = *self.inflight.front()?;
        if !self.backend.is_result_available(oldest.end) {
            return None;
        }

        self.inflight.pop_front();
        self.available.push_back(oldest);
        if self.inflight.len() <= self.inflight_warning_threshold {
            self.growth_warned = false;
        }

        let start_ns = self.backend.read_timestamp(oldest.start);
        let end_ns = self.backend.read_timestamp(oldest.end);
        if end_ns < start_ns {
            debug!(start_ns, end_ns, "End timestamp precedes start, reporting zero");
        }

        Some(end_ns.saturating_sub(start_ns) as f64 * NS_TO_MS)
    }

    /// 在途查询对数量
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    /// 空闲查询对数量
    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    /// 累计分配的查询对数量
    pub fn allocated_pairs(&self) -> usize {
        self.allocated_pairs
    }

    /// 获取后端引用
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 获取后端可变引用
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn allocate_pair(&mut self) -> Result<QueryPair> {
        let start = self.backend.create_query()?;
        let end = self.backend.create_query()?;
        self.allocated_pairs += 1;

        debug!(
            allocated_pairs = self.allocated_pairs,
            start = start.index(),
            end = end.index(),
            "Allocated timestamp query pair"
        );
        Ok(QueryPair { start, end })
    }

    fn check_inflight_growth(&mut self) {
        if self.growth_warned || self.inflight.len() <= self.inflight_warning_threshold {
            return;
        }
        self.growth_warned = true;
        warn!(
            inflight = self.inflight.len(),
            threshold = self.inflight_warning_threshold,
            "In-flight query pairs keep growing; every start() needs exactly one elapsed()"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::fake::{FakeBackend, FakeEvent};

    fn run_frame(timer: &mut GpuTimer<FakeBackend>, duration_ns: u64) -> Option<f64> {
        timer.start().unwrap();
        timer.backend_mut().advance_clock(duration_ns);
        timer.poll_elapsed()
    }

    fn assert_ms(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_first_frame_returns_zero() {
        let mut timer = GpuTimer::new(FakeBackend::new());
        timer.start().unwrap();
        timer.backend_mut().advance_clock(5_000_000);

        assert_eq!(timer.elapsed(), 0.0);
        assert_eq!(timer.inflight_len(), 1);
    }

    #[test]
    fn test_round_trip_nanoseconds_to_milliseconds() {
        let mut timer = GpuTimer::new(FakeBackend::new());

        timer.backend_mut().set_clock(1_000_000);
        timer.start().unwrap();
        timer.backend_mut().set_clock(3_500_000);
        assert_eq!(timer.elapsed(), 0.0);

        timer.start().unwrap();
        assert_ms(timer.elapsed(), (3_500_000 - 1_000_000) as f64 * 1e-6);
    }

    #[test]
    fn test_results_reported_in_submission_order() {
        let mut timer = GpuTimer::new(FakeBackend::with_latency(5));
        let mut reported = Vec::new();

        for i in 1..=20u64 {
            if let Some(ms) = run_frame(&mut timer, i * 1_000) {
                reported.push(ms);
            }
        }

        assert!(!reported.is_empty());
        for (i, ms) in reported.iter().enumerate() {
            assert_ms(*ms, (i as u64 + 1) as f64 * 1_000.0 * 1e-6);
        }
    }

    #[test]
    fn test_allocations_match_inflight_high_water_mark() {
        for latency in [0, 1, 3, 7] {
            let mut timer = GpuTimer::new(FakeBackend::with_latency(latency));
            let mut high_water = 0;

            for _ in 0..64 {
                timer.start().unwrap();
                high_water = high_water.max(timer.inflight_len());
                timer.backend_mut().advance_clock(100);
                timer.elapsed();
            }

            assert_eq!(timer.allocated_pairs(), high_water, "latency {}", latency);
            assert_eq!(timer.backend().created_queries(), 2 * high_water);
        }
    }

    #[test]
    fn test_consumed_pair_is_reused() {
        let mut timer = GpuTimer::new(FakeBackend::new());
        run_frame(&mut timer, 10);
        assert!(run_frame(&mut timer, 20).is_some());
        assert_eq!(timer.available_len(), 1);

        let created = timer.backend().created_queries();
        timer.start().unwrap();

        assert_eq!(timer.backend().created_queries(), created);
        assert_eq!(timer.available_len(), 0);
        // 第一次测量的查询对被重新写入
        let first_start = timer.backend().events().iter().find_map(|e| match e {
            FakeEvent::Write(q) => Some(*q),
            _ => None,
        });
        assert_eq!(timer.backend().last_write(), first_start);
    }

    #[test]
    fn test_pending_oldest_is_retried() {
        let mut timer = GpuTimer::new(FakeBackend::with_latency(u64::MAX));
        timer.backend_mut().set_clock(0);
        timer.start().unwrap();
        timer.backend_mut().set_clock(700);
        timer.elapsed();

        for _ in 0..3 {
            assert!(run_frame(&mut timer, 50).is_none());
        }
        assert_eq!(timer.inflight_len(), 4);

        timer.backend_mut().set_latency(0);
        assert_ms(run_frame(&mut timer, 50).unwrap(), 700.0 * 1e-6);
        assert_eq!(timer.inflight_len(), 4);
        assert_eq!(timer.available_len(), 1);
    }

    #[test]
    fn test_barrier_precedes_start_timestamp() {
        let mut timer = GpuTimer::new(FakeBackend::new());
        timer.start().unwrap();

        let events = timer.backend().events();
        let barrier = events.iter().position(|e| *e == FakeEvent::Barrier).unwrap();
        let write = events.iter().position(|e| matches!(e, FakeEvent::Write(_))).unwrap();
        assert!(barrier < write);
    }

    #[test]
    fn test_elapsed_without_start_is_ignored() {
        let mut timer = GpuTimer::new(FakeBackend::new());
        assert_eq!(timer.elapsed(), 0.0);
        assert!(timer.backend().events().is_empty());
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let mut backend = FakeBackend::new();
        backend.fail_after(3);
        let mut timer = GpuTimer::new(backend);

        timer.start().unwrap();
        // 第二对只分配到一个查询
        assert!(timer.start().is_err());
        assert_eq!(timer.allocated_pairs(), 1);
        assert_eq!(timer.inflight_len(), 1);
    }

    #[test]
    fn test_end_before_start_saturates() {
        let mut timer = GpuTimer::new(FakeBackend::new());
        timer.backend_mut().set_clock(900);
        timer.start().unwrap();
        timer.backend_mut().set_clock(100);
        timer.elapsed();

        timer.start().unwrap();
        assert_eq!(timer.poll_elapsed(), Some(0.0));
    }

    #[test]
    fn test_growth_without_elapsed_keeps_allocating() {
        let mut timer = GpuTimer::with_inflight_warning_threshold(FakeBackend::new(), 2);
        for _ in 0..5 {
            timer.start().unwrap();
        }
        assert_eq!(timer.inflight_len(), 5);
        assert_eq!(timer.allocated_pairs(), 5);
        assert!(timer.growth_warned);
    }
}
