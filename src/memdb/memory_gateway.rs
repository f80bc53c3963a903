//! 内存网关实现
//! Memory gateway implementation

use crate::base::{Gateway, QueueOp};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// 内存存储
/// In-memory storage
///
/// 列表以表头在前的顺序保存（LPUSH 插入到索引 0），与 Redis 一致。
/// Lists are stored head-first (LPUSH inserts at index 0), matching Redis.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryStore {
  /// 哈希：键 → 字段 → 值
  /// Hashes: key → field → value
  pub hashes: HashMap<String, BTreeMap<String, String>>,
  /// 列表
  /// Lists
  pub lists: HashMap<String, Vec<String>>,
  /// 集合
  /// Sets
  pub sets: HashMap<String, BTreeSet<String>>,
  /// 字符串键（锁）
  /// String keys (locks)
  pub strings: HashMap<String, String>,
}

/// 内存网关
/// Memory gateway
///
/// 克隆共享同一份存储；`cas` 在单个写锁内完成，保持原子性。
/// Clones share the same store; `cas` runs inside one write lock, keeping it
/// atomic.
#[derive(Debug, Default, Clone)]
pub struct MemoryGateway {
  store: Arc<RwLock<MemoryStore>>,
}

impl MemoryGateway {
  /// 创建空的内存网关
  /// Create an empty memory gateway
  pub fn new() -> Self {
    Self::default()
  }

  /// 导出当前存储的快照
  /// Export a snapshot of the current store
  pub async fn snapshot(&self) -> MemoryStore {
    self.store.read().await.clone()
  }
}

#[async_trait]
impl Gateway for MemoryGateway {
  async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
    let mut store = self.store.write().await;
    store
      .hashes
      .entry(key.to_string())
      .or_default()
      .insert(field.to_string(), value.to_string());
    Ok(())
  }

  async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool> {
    let mut store = self.store.write().await;
    let hash = store.hashes.entry(key.to_string()).or_default();
    if hash.contains_key(field) {
      return Ok(false);
    }
    hash.insert(field.to_string(), value.to_string());
    Ok(true)
  }

  async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
    let store = self.store.read().await;
    Ok(store.hashes.get(key).and_then(|h| h.get(field)).cloned())
  }

  async fn hkeys(&self, key: &str) -> Result<Vec<String>> {
    let store = self.store.read().await;
    Ok(
      store
        .hashes
        .get(key)
        .map(|h| h.keys().cloned().collect())
        .unwrap_or_default(),
    )
  }

  async fn sadd(&self, key: &str, member: &str) -> Result<()> {
    let mut store = self.store.write().await;
    store
      .sets
      .entry(key.to_string())
      .or_default()
      .insert(member.to_string());
    Ok(())
  }

  async fn smembers(&self, key: &str) -> Result<Vec<String>> {
    let store = self.store.read().await;
    Ok(
      store
        .sets
        .get(key)
        .map(|s| s.iter().cloned().collect())
        .unwrap_or_default(),
    )
  }

  async fn lpush(&self, key: &str, value: &str) -> Result<()> {
    let mut store = self.store.write().await;
    store
      .lists
      .entry(key.to_string())
      .or_default()
      .insert(0, value.to_string());
    Ok(())
  }

  async fn llen(&self, key: &str) -> Result<usize> {
    let store = self.store.read().await;
    Ok(store.lists.get(key).map(|l| l.len()).unwrap_or(0))
  }

  async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
    let store = self.store.read().await;
    let list = match store.lists.get(key) {
      Some(list) => list,
      None => return Ok(Vec::new()),
    };
    let len = list.len() as isize;
    let normalize = |i: isize| -> isize {
      if i < 0 {
        (len + i).max(0)
      } else {
        i
      }
    };
    let from = normalize(start);
    let to = normalize(stop).min(len - 1);
    if from > to || from >= len {
      return Ok(Vec::new());
    }
    Ok(list[from as usize..=to as usize].to_vec())
  }

  async fn exists(&self, key: &str) -> Result<bool> {
    let store = self.store.read().await;
    Ok(
      store.strings.contains_key(key)
        || store.hashes.contains_key(key)
        || store.lists.contains_key(key)
        || store.sets.contains_key(key),
    )
  }

  async fn cas(&self, lock_key: &str, ops: &[QueueOp]) -> Result<bool> {
    // 锁检查与流水线在同一个写锁内执行，对并发调用者原子
    // Lock check and pipeline run under one write lock, atomic to
    // concurrent callers
    let mut store = self.store.write().await;
    if store.strings.contains_key(lock_key) {
      return Ok(false);
    }
    store.strings.insert(lock_key.to_string(), "1".to_string());
    for op in ops {
      match op {
        QueueOp::Sadd { key, member } => {
          store
            .sets
            .entry(key.clone())
            .or_default()
            .insert(member.clone());
        }
        QueueOp::Lpush { key, value } => {
          store.lists.entry(key.clone()).or_default().insert(0, value.clone());
        }
      }
    }
    Ok(true)
  }

  async fn ping(&self) -> Result<()> {
    Ok(())
  }
}
