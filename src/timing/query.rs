//! 时间戳查询抽象
//!
//! 计时器不直接持有 GPU 对象，只持有 [`QueryHandle`]：
//! 一个指向后端资源表的不透明索引。所有真正的 GPU 操作都通过
//! [`TimestampBackend`] 注入，测试时可以替换为确定性的假后端。

use crate::core::error::Result;

/// 时间戳查询句柄
///
/// 后端资源表中的索引，复制成本为零。句柄本身不拥有资源，
/// 查询对象随后端一起释放。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryHandle(u32);

impl QueryHandle {
    /// 创建新的句柄
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// 获取资源表索引
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// 一次测量所需的一对查询
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPair {
    /// 起始时间戳查询
    pub start: QueryHandle,
    /// 结束时间戳查询
    pub end: QueryHandle,
}

/// 时间戳查询后端
///
/// 计时器依赖的全部图形能力。所有方法都不能阻塞调用线程：
/// `insert_execution_barrier` 只推迟 GPU 上后续命令的执行，
/// `is_result_available` 只做一次轮询。
///
/// # 方法说明
///
/// - `create_query()`: 分配一个新的时间戳查询对象（昂贵，只在池耗尽时调用）
/// - `insert_execution_barrier()`: 让后续命令等待此前提交的全部命令完成
/// - `write_timestamp()`: 在命令流中记录一个时间戳
/// - `is_result_available()`: 非阻塞地检查查询结果是否就绪
/// - `read_timestamp()`: 读取已就绪的时间戳（纳秒）
pub trait TimestampBackend {
    /// 分配一个新的时间戳查询对象
    fn create_query(&mut self) -> Result<QueryHandle>;

    /// 插入 GPU 侧执行屏障
    ///
    /// 防止上一帧尾部的工作与本次计时区间重叠执行。
    fn insert_execution_barrier(&mut self);

    /// 在命令流中对 `query` 记录时间戳
    fn write_timestamp(&mut self, query: QueryHandle);

    /// 非阻塞地检查 `query` 的结果是否就绪
    fn is_result_available(&mut self, query: QueryHandle) -> bool;

    /// 读取 `query` 的时间戳（纳秒）
    ///
    /// 只应在 `is_result_available` 对同一测量的结束查询返回 `true` 之后调用。
    fn read_timestamp(&mut self, query: QueryHandle) -> u64;
}
