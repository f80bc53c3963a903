//! 基础模块
//! Base module
//!
//! 定义了与 Redis 交互的类型化抽象层、键名生成与常量
//! Defines the typed abstraction layer for interacting with Redis, key name
//! generation, and constants

use crate::error::Result;
use async_trait::async_trait;

pub mod constants;
pub mod keys;

/// 受 `cas` 保护的流水线操作
/// Pipeline operations guarded by `cas`
///
/// 入队协议只需要这两条命令；以类型化的形式表达，使内存后端与 Redis 后端
/// 执行完全相同的操作序列。
/// The enqueue protocol needs exactly these two commands; expressing them as
/// typed values lets the memory and Redis backends run the identical
/// operation sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueOp {
  /// SADD key member
  Sadd { key: String, member: String },
  /// LPUSH key value
  Lpush { key: String, value: String },
}

/// Redis 网关：对所用原语的类型化薄封装
/// Redis gateway: a thin typed wrapper over the primitives in use
///
/// 网关隐藏连接细节；瞬态 I/O 故障以单一的存储错误种类向上传播。
/// 实现必须在并发调用下安全，且 [`Gateway::cas`] 必须保持原子性。
/// The gateway hides connection details; transient I/O failures propagate as
/// the single storage error kind. Implementations must be safe under
/// concurrent calls, and [`Gateway::cas`] must stay atomic.
#[async_trait]
pub trait Gateway: Send + Sync {
  /// HSET key field value
  async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

  /// HSETNX key field value；返回是否为新字段
  /// HSETNX key field value; returns whether the field was new
  async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool>;

  /// HGET key field
  async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

  /// HKEYS key
  async fn hkeys(&self, key: &str) -> Result<Vec<String>>;

  /// SADD key member
  async fn sadd(&self, key: &str, member: &str) -> Result<()>;

  /// SMEMBERS key
  async fn smembers(&self, key: &str) -> Result<Vec<String>>;

  /// LPUSH key value
  async fn lpush(&self, key: &str, value: &str) -> Result<()>;

  /// LLEN key
  async fn llen(&self, key: &str) -> Result<usize>;

  /// LRANGE key start stop
  async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;

  /// EXISTS key
  async fn exists(&self, key: &str) -> Result<bool>;

  /// 比较并设置：`SET lock_key 1 NX`（无过期），仅当锁为新建时在一个
  /// MULTI/EXEC 块中执行 `ops`；返回是否新获得锁并执行了操作。
  /// Compare-and-set: `SET lock_key 1 NX` (no expiry); only when the lock is
  /// fresh, run `ops` inside one MULTI/EXEC block. Returns whether the lock
  /// was newly acquired and the ops ran.
  async fn cas(&self, lock_key: &str, ops: &[QueueOp]) -> Result<bool>;

  /// 测试连接
  /// Ping the backend
  async fn ping(&self) -> Result<()>;
}
