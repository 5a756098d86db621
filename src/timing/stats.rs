//! 滚动统计模块
//!
//! `RollingStats` 是固定容量的环形缓冲区，写入时只标记缓存失效，
//! 读取 `average()`/`min()`/`max()` 时才一次性重新扫描全部样本。

use std::cell::Cell;
use std::ops::{Add, Div};

/// 默认窗口大小
pub const DEFAULT_CAPACITY: usize = 50;

/// 可参与统计的数值类型
///
/// 需要加法、偏序比较、除以整数个数以及零值。
/// 不处理溢出或 NaN，由调用者根据数值类型自行保证。
pub trait Sample: Copy + PartialOrd + Add<Output = Self> + Div<Output = Self> {
    /// 零值，用于初始化缓冲区和求和
    fn zero() -> Self;

    /// 把样本个数转换为同类型，用于求平均
    fn from_count(count: usize) -> Self;
}

macro_rules! impl_sample {
    ($($t:ty),* $(,)?) => {
        $(
            impl Sample for $t {
                fn zero() -> Self {
                    0 as $t
                }

                fn from_count(count: usize) -> Self {
                    count as $t
                }
            }
        )*
    };
}

impl_sample!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// 一次扫描得到的统计结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary<T> {
    pub average: T,
    pub min: T,
    pub max: T,
}

/// 固定窗口滚动统计
///
/// 缓冲区在构造时以零值填满，因此统计量总是可计算的；
/// 但在写满 `capacity` 个样本之前，零值会把平均值和最小值拉低。
/// 调用者应在 [`RollingStats::is_filled`] 为真之后再信任结果。
///
/// # 示例
///
/// ```
/// use gpu_timer::timing::RollingStats;
///
/// let mut stats = RollingStats::new(3);
/// stats.add(1);
/// stats.add(2);
/// stats.add(3);
/// assert_eq!(stats.average(), 2);
///
/// stats.add(10); // 覆盖最旧的样本
/// assert_eq!((stats.min(), stats.max()), (2, 10));
/// ```
#[derive(Debug, Clone)]
pub struct RollingStats<T: Sample> {
    samples: Vec<T>,
    cursor: usize,
    written: u64,
    // None 表示缓存失效
    cached: Cell<Option<Summary<T>>>,
}

impl<T: Sample> RollingStats<T> {
    /// 创建容量为 `capacity` 的统计窗口
    ///
    /// # Panics
    ///
    /// `capacity` 为 0 时 panic。
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RollingStats capacity must be greater than 0");
        Self {
            samples: vec![T::zero(); capacity],
            cursor: 0,
            written: 0,
            cached: Cell::new(None),
        }
    }

    /// 写入一个样本，窗口已满时覆盖最旧的样本
    pub fn add(&mut self, value: T) {
        self.samples[self.cursor] = value;
        self.cursor = (self.cursor + 1) % self.samples.len();
        self.written += 1;
        self.cached.set(None);
    }

    /// 窗口内样本的算术平均（总是除以容量）
    pub fn average(&self) -> T {
        self.summary().average
    }

    /// 窗口内的最小值
    pub fn min(&self) -> T {
        self.summary().min
    }

    /// 窗口内的最大值
    pub fn max(&self) -> T {
        self.summary().max
    }

    /// 同时获取三个统计量，缓存失效时重新计算一次
    pub fn summary(&self) -> Summary<T> {
        if let Some(summary) = self.cached.get() {
            return summary;
        }
        let summary = self.recompute();
        self.cached.set(Some(summary));
        summary
    }

    /// 窗口容量
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// 累计写入的样本数
    pub fn samples_written(&self) -> u64 {
        self.written
    }

    /// 是否已写满一个完整窗口
    pub fn is_filled(&self) -> bool {
        self.written >= self.samples.len() as u64
    }

    fn recompute(&self) -> Summary<T> {
        let first = self.samples[0];
        let (sum, min, max) = self.samples.iter().fold(
            (T::zero(), first, first),
            |(sum, min, max), &v| {
                (
                    sum + v,
                    if v < min { v } else { min },
                    if max < v { v } else { max },
                )
            },
        );

        Summary {
            average: sum / T::from_count(self.samples.len()),
            min,
            max,
        }
    }
}

impl<T: Sample> Default for RollingStats<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
