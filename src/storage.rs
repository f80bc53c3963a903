//! 存储层模块
//! Storage layer module
//!
//! 持久化日程定义与运行时状态，并通过分布式锁执行受保护的入队协议。
//! Persists schedule definitions and runtime state, and performs the
//! lock-guarded enqueue protocol.

use crate::base::keys::KeySpace;
use crate::base::{Gateway, QueueOp};
use crate::clock::Clock;
use crate::config::ScheduleDef;
use crate::cron::format_instant;
use crate::error::Result;
use crate::schedule::{Schedule, ScheduledJob};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 单个日程的运行时状态行
/// The runtime state row of one schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
  pub enabled: bool,
}

/// 存储层
/// Storage layer
///
/// 网关之上的领域操作；所有写入要么是幂等哈希写，要么经由 `cas` 保护。
/// Domain operations on top of the gateway; every write is either an
/// idempotent hash write or guarded by `cas`.
pub struct Storage {
  gateway: Arc<dyn Gateway>,
  keys: KeySpace,
  clock: Arc<dyn Clock>,
  default_offset: FixedOffset,
}

impl Storage {
  /// 创建存储层
  /// Create the storage layer
  pub fn new(
    gateway: Arc<dyn Gateway>,
    keys: KeySpace,
    clock: Arc<dyn Clock>,
    default_offset: FixedOffset,
  ) -> Self {
    Self {
      gateway,
      keys,
      clock,
      default_offset,
    }
  }

  /// 键空间
  /// The key space
  pub fn keys(&self) -> &KeySpace {
    &self.keys
  }

  /// 持久化日程定义与状态；无条件覆盖两个哈希
  /// Persist the schedule definition and state; overwrites both hashes
  /// unconditionally
  ///
  /// 这是引导阶段的对账点：配置中的定义覆盖 Redis 中的同名定义，
  /// 不在配置中的定义保持原样。
  /// This is the bootstrap reconciliation point: configured definitions
  /// overwrite same-named ones in Redis, foreign definitions are left alone.
  pub async fn persist_schedule(&self, schedule: &Schedule) -> Result<()> {
    let def = serde_json::to_string(&schedule.to_def())?;
    self
      .gateway
      .hset(&self.keys.schedules(), schedule.name(), &def)
      .await?;
    let state = serde_json::to_string(&ScheduleState {
      enabled: schedule.opts().enabled,
    })?;
    self
      .gateway
      .hset(&self.keys.states(), schedule.name(), &state)
      .await?;
    Ok(())
  }

  /// 读出全部已持久化的日程
  /// Load all persisted schedules
  ///
  /// 无法解析的条目（外来或损坏的定义）记录日志后跳过。
  /// Entries that fail to parse (foreign or corrupt definitions) are logged
  /// and skipped.
  pub async fn load_schedules(&self) -> Result<Vec<Schedule>> {
    let mut schedules = Vec::new();
    for name in self.gateway.hkeys(&self.keys.schedules()).await? {
      let raw = match self.gateway.hget(&self.keys.schedules(), &name).await? {
        Some(raw) => raw,
        None => continue,
      };
      let def: ScheduleDef = match serde_json::from_str(&raw) {
        Ok(def) => def,
        Err(err) => {
          tracing::warn!("Skipping unparsable schedule definition '{}': {}", name, err);
          continue;
        }
      };
      match Schedule::from_def(&name, &def, self.default_offset) {
        Ok(schedule) => schedules.push(schedule),
        Err(err) => {
          tracing::warn!("Skipping invalid schedule '{}': {}", name, err);
        }
      }
    }
    Ok(schedules)
  }

  /// 日程是否启用；缺失或损坏的状态行视为启用
  /// Whether the schedule is enabled; a missing or corrupt state row counts
  /// as enabled
  pub async fn is_enabled(&self, name: &str) -> Result<bool> {
    let raw = self.gateway.hget(&self.keys.states(), name).await?;
    Ok(match raw {
      Some(raw) => serde_json::from_str::<ScheduleState>(&raw)
        .map(|state| state.enabled)
        .unwrap_or(true),
      None => true,
    })
  }

  /// 切换日程的启用标志
  /// Toggle the schedule's enabled flag
  pub async fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
    let state = serde_json::to_string(&ScheduleState { enabled })?;
    self.gateway.hset(&self.keys.states(), name, &state).await
  }

  /// 记录日程的相邻触发与考虑时刻
  /// Record the schedule's adjacent firings and consideration instants
  ///
  /// `first_runs` 只在缺失时写入；`last_runs` 每次覆盖。时间哈希仅供
  /// 运维参考，去重协议不读取它们。
  /// `first_runs` is written only when absent; `last_runs` is overwritten
  /// every time. The time hashes are informational; the dedup protocol never
  /// reads them.
  pub async fn record_times(&self, schedule: &Schedule) -> Result<()> {
    let now = self.clock.now();
    let offset = schedule.opts().tz_offset;

    if let Some(prev) = schedule.cron().previous_firings(offset, now, 1).first() {
      let value = serde_json::to_string(&format_instant(&prev.with_timezone(&offset)))?;
      self
        .gateway
        .hset(&self.keys.last_times(), schedule.name(), &value)
        .await?;
    }
    if let Some(next) = schedule.cron().next_firings(offset, now, 1).first() {
      let value = serde_json::to_string(&format_instant(&next.with_timezone(&offset)))?;
      self
        .gateway
        .hset(&self.keys.next_times(), schedule.name(), &value)
        .await?;
    }

    let wall = serde_json::to_string(&Self::format_utc(now))?;
    self
      .gateway
      .hsetnx(&self.keys.first_runs(), schedule.name(), &wall)
      .await?;
    self
      .gateway
      .hset(&self.keys.last_runs(), schedule.name(), &wall)
      .await?;
    Ok(())
  }

  /// 受保护的入队：对（任务编码，触发时刻）至多一次
  /// Guarded enqueue: at most once per (job encoding, firing instant)
  ///
  /// 返回是否由本次调用完成入队；`false` 表示其它副本或更早的 tick
  /// 已经认领，属于正常去重结果。
  /// Returns whether this call performed the enqueue; `false` means another
  /// replica or an earlier tick already claimed the pair, the normal dedup
  /// outcome.
  pub async fn enqueue(&self, schedule: &Schedule, scheduled_job: &ScheduledJob) -> Result<bool> {
    let encoded = scheduled_job.job.encode()?;
    let queue = scheduled_job.job.queue.as_str();
    let lock_key = self
      .keys
      .enqueued_job_lock(&encoded, &scheduled_job.firing_iso());
    let ops = [
      QueueOp::Sadd {
        key: self.keys.queues(),
        member: queue.to_string(),
      },
      QueueOp::Lpush {
        key: self.keys.queue(queue),
        value: encoded,
      },
    ];
    let acquired = self.gateway.cas(&lock_key, &ops).await?;
    // 无论锁竞争结果如何都刷新时间哈希
    // The time hashes are refreshed regardless of the lock outcome
    self.record_times(schedule).await?;
    Ok(acquired)
  }

  /// 队列长度
  /// Queue length
  pub async fn queue_len(&self, queue: &str) -> Result<usize> {
    self.gateway.llen(&self.keys.queue(queue)).await
  }

  /// 队列内容，表头在前
  /// Queue contents, head first
  pub async fn queue_jobs(&self, queue: &str) -> Result<Vec<String>> {
    self.gateway.lrange(&self.keys.queue(queue), 0, -1).await
  }

  /// 写过的队列名集合
  /// The set of queue names ever written
  pub async fn queues(&self) -> Result<Vec<String>> {
    self.gateway.smembers(&self.keys.queues()).await
  }

  /// 读取时间哈希中的某一行
  /// Read one row of a time hash
  pub async fn read_time(&self, hash_key: &str, name: &str) -> Result<Option<String>> {
    let raw = self.gateway.hget(hash_key, name).await?;
    Ok(match raw {
      Some(raw) => serde_json::from_str::<String>(&raw).ok(),
      None => None,
    })
  }

  /// 以 UTC 格式化墙钟时刻
  /// Format a wall instant in UTC
  fn format_utc(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
  }
}
