//! Redis 键名生成 - 与 Sidekiq 风格的工作者生态保持兼容
//! Redis key name generation - Compatible with the Sidekiq-style worker
//! ecosystem
//!
//! 两个命名空间：工作者命名空间（队列、队列集合、入队锁，与下游工作者共享）
//! 和调度器命名空间（日程状态与时间哈希，调度器自有）。
//! Two namespaces: the worker namespace (queues, the queue set, enqueue
//! locks, shared with downstream workers) and the scheduler namespace
//! (schedule state and time hashes, owned by the scheduler).

/// 键段分隔符
/// Key segment separator
const SEPARATOR: &str = ":";

/// 命名空间化的键生成器
/// Namespaced key generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
  worker_ns: String,
  scheduler_ns: String,
}

impl KeySpace {
  /// 创建键空间
  /// Create a key space
  pub fn new<W: Into<String>, S: Into<String>>(worker_ns: W, scheduler_ns: S) -> Self {
    Self {
      worker_ns: worker_ns.into(),
      scheduler_ns: scheduler_ns.into(),
    }
  }

  /// 以 `:` 连接非空键段
  /// Join non-empty segments with `:`
  fn join(segments: &[&str]) -> String {
    segments
      .iter()
      .filter(|s| !s.is_empty())
      .copied()
      .collect::<Vec<_>>()
      .join(SEPARATOR)
  }

  /// 日程定义哈希：name → JSON(定义)
  /// Schedule definition hash: name → JSON(definition)
  pub fn schedules(&self) -> String {
    Self::join(&[&self.worker_ns, "schedules"])
  }

  /// 队列列表键（LPUSH 到表头）
  /// Queue list key (LPUSH to the head)
  pub fn queue(&self, queue: &str) -> String {
    Self::join(&[&self.worker_ns, "queue", queue])
  }

  /// 写过的队列名集合
  /// Set of queue names ever written
  pub fn queues(&self) -> String {
    Self::join(&[&self.worker_ns, "queues"])
  }

  /// 入队锁键：内容寻址于（序列化任务，触发时刻）
  /// Enqueue lock key: content-addressed on (serialized job, firing instant)
  pub fn enqueued_job_lock(&self, encoded_job: &str, firing_iso: &str) -> String {
    Self::join(&[&self.worker_ns, "enqueued_jobs", encoded_job, firing_iso])
  }

  /// 日程状态哈希：name → JSON({enabled})
  /// Schedule state hash: name → JSON({enabled})
  pub fn states(&self) -> String {
    Self::join(&[&self.scheduler_ns, "states"])
  }

  /// 最近一次触发哈希
  /// Most recent firing hash
  pub fn last_times(&self) -> String {
    Self::join(&[&self.scheduler_ns, "last_times"])
  }

  /// 下一次触发哈希
  /// Next firing hash
  pub fn next_times(&self) -> String {
    Self::join(&[&self.scheduler_ns, "next_times"])
  }

  /// 首次考虑时刻哈希（只写一次）
  /// First-considered instant hash (written once)
  pub fn first_runs(&self) -> String {
    Self::join(&[&self.scheduler_ns, "first_runs"])
  }

  /// 最近考虑时刻哈希（每个 tick 覆盖）
  /// Most-recently-considered instant hash (overwritten each tick)
  pub fn last_runs(&self) -> String {
    Self::join(&[&self.scheduler_ns, "last_runs"])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_worker_namespace_keys() {
    let keys = KeySpace::new("exq", "cronq");
    assert_eq!(keys.schedules(), "exq:schedules");
    assert_eq!(keys.queue("default"), "exq:queue:default");
    assert_eq!(keys.queues(), "exq:queues");
    assert_eq!(
      keys.enqueued_job_lock(r#"{"class":"Mailer"}"#, "2024-01-01T00:00:00Z"),
      r#"exq:enqueued_jobs:{"class":"Mailer"}:2024-01-01T00:00:00Z"#
    );
  }

  #[test]
  fn test_scheduler_namespace_keys() {
    let keys = KeySpace::new("exq", "cronq");
    assert_eq!(keys.states(), "cronq:states");
    assert_eq!(keys.last_times(), "cronq:last_times");
    assert_eq!(keys.next_times(), "cronq:next_times");
    assert_eq!(keys.first_runs(), "cronq:first_runs");
    assert_eq!(keys.last_runs(), "cronq:last_runs");
  }

  #[test]
  fn test_empty_segments_are_dropped() {
    // 空命名空间不产生前导分隔符
    // An empty namespace yields no leading separator
    let keys = KeySpace::new("", "cronq");
    assert_eq!(keys.queue("default"), "queue:default");
    assert_eq!(keys.queues(), "queues");
    assert_eq!(keys.schedules(), "schedules");
  }
}
