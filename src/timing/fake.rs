//! 确定性的假时间戳后端，仅用于测试
//!
//! 时间戳取自可手动推进的时钟；查询在其后又发生 `latency` 次写入后视为就绪，
//! 模拟 GPU 流水线深度。

use crate::core::error::{GraphicsError, Result};
use super::query::{QueryHandle, TimestampBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeEvent {
    Barrier,
    Write(QueryHandle),
}

#[derive(Debug, Default, Clone, Copy)]
struct FakeQuery {
    seq: Option<u64>,
    timestamp: u64,
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    queries: Vec<FakeQuery>,
    clock_ns: u64,
    writes: u64,
    latency: u64,
    fail_after: Option<usize>,
    events: Vec<FakeEvent>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: u64) -> Self {
        Self { latency, ..Self::default() }
    }

    pub fn set_latency(&mut self, latency: u64) {
        self.latency = latency;
    }

    pub fn set_clock(&mut self, ns: u64) {
        self.clock_ns = ns;
    }

    pub fn advance_clock(&mut self, ns: u64) {
        self.clock_ns += ns;
    }

    /// 已成功创建 `count` 个查询后，后续创建全部失败
    pub fn fail_after(&mut self, count: usize) {
        self.fail_after = Some(count);
    }

    pub fn created_queries(&self) -> usize {
        self.queries.len()
    }

    pub fn events(&self) -> &[FakeEvent] {
        &self.events
    }

    pub fn last_write(&self) -> Option<QueryHandle> {
        self.events.iter().rev().find_map(|e| match e {
            FakeEvent::Write(q) => Some(*q),
            FakeEvent::Barrier => None,
        })
    }
}

impl TimestampBackend for FakeBackend {
    fn create_query(&mut self) -> Result<QueryHandle> {
        if self.fail_after.is_some_and(|limit| self.queries.len() >= limit) {
            return Err(GraphicsError::ResourceCreation("fake query pool exhausted".to_string()).into());
        }
        self.queries.push(FakeQuery::default());
        Ok(QueryHandle::new(self.queries.len() as u32 - 1))
    }

    fn insert_execution_barrier(&mut self) {
        self.events.push(FakeEvent::Barrier);
    }

    fn write_timestamp(&mut self, query: QueryHandle) {
        self.writes += 1;
        self.queries[query.index()] = FakeQuery {
            seq: Some(self.writes),
            timestamp: self.clock_ns,
        };
        self.events.push(FakeEvent::Write(query));
    }

    fn is_result_available(&mut self, query: QueryHandle) -> bool {
        self.queries[query.index()]
            .seq
            .is_some_and(|seq| self.writes - seq >= self.latency)
    }

    fn read_timestamp(&mut self, query: QueryHandle) -> u64 {
        self.queries[query.index()].timestamp
    }
}
