//! Ticker 模块
//! Ticker module
//!
//! 调度器的主循环：每个 tick 以 `[now - 补偿窗口, now]` 为区间展开
//! 各日程的触发，并按触发时刻升序交给存储层做受锁保护的入队。
//! The scheduler's main loop: each tick expands every schedule's firings over
//! the window `[now - miss window, now]` and hands them to the storage layer
//! in ascending firing order for the lock-guarded enqueue.
//!
//! 补偿窗口的意义：副本重启或跳过 tick 后，停机期间的触发仍落在下一个
//! 窗口内而被补放；其它副本已见过的触发由锁保证不重复。
//! Why the miss window: after a replica restart or a skipped tick, firings
//! from the outage still land in the next window and are replayed; firings
//! another replica already saw are kept unique by the lock.

use crate::base::constants::{DEFAULT_MISS_WINDOW_MS, DEFAULT_TICK_INTERVAL};
use crate::clock::Clock;
use crate::components::ComponentLifecycle;
use crate::schedule::{Schedule, TimeRange};
use crate::storage::Storage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};

/// Ticker 配置
/// Ticker configuration
#[derive(Debug, Clone)]
pub struct TickerConfig {
  /// tick 周期
  /// Tick interval
  pub tick_interval: Duration,
  /// 补偿窗口
  /// Miss window
  pub miss_window: chrono::Duration,
}

impl Default for TickerConfig {
  fn default() -> Self {
    Self {
      tick_interval: DEFAULT_TICK_INTERVAL,
      miss_window: chrono::Duration::milliseconds(DEFAULT_MISS_WINDOW_MS as i64),
    }
  }
}

/// Ticker - 周期性展开日程并入队到期触发
/// Ticker - periodically expands schedules and enqueues due firings
///
/// 单个副本内 tick 串行；tick 内各日程通过轻量任务并发处理。
/// 单个日程的失败只影响它自己，绝不中止整个 tick。
/// Ticks are serialized within a replica; schedules within a tick are
/// processed concurrently as lightweight tasks. A single schedule's failure
/// affects only itself and never aborts the tick.
pub struct Ticker {
  storage: Arc<Storage>,
  clock: Arc<dyn Clock>,
  schedules: Vec<Schedule>,
  config: TickerConfig,
  done: Arc<AtomicBool>,
  notify: Arc<Notify>,
}

impl Ticker {
  /// 创建新的 Ticker
  /// Create a new Ticker
  pub fn new(
    storage: Arc<Storage>,
    clock: Arc<dyn Clock>,
    schedules: Vec<Schedule>,
    config: TickerConfig,
  ) -> Self {
    Self {
      storage,
      clock,
      schedules,
      config,
      done: Arc::new(AtomicBool::new(false)),
      notify: Arc::new(Notify::new()),
    }
  }

  /// 启动 Ticker
  /// Start the Ticker
  pub fn start(self: Arc<Self>) -> JoinHandle<()> {
    tokio::spawn(async move {
      loop {
        if self.done.load(Ordering::Relaxed) {
          tracing::debug!("Ticker: shutting down");
          break;
        }

        self.tick().await;

        // 关闭通知会中止 tick 间休眠
        // The shutdown notification aborts the inter-tick sleep
        tokio::select! {
          _ = tokio::time::sleep(self.config.tick_interval) => {}
          _ = self.notify.notified() => {}
        }
      }
    })
  }

  /// 执行一个 tick：对全部日程求值一次
  /// Run one tick: evaluate every schedule once
  pub async fn tick(&self) {
    let now = self.clock.now();
    let range = TimeRange::new(now - self.config.miss_window, now);

    let mut tasks = JoinSet::new();
    for schedule in &self.schedules {
      let storage = self.storage.clone();
      let schedule = schedule.clone();
      tasks.spawn(async move {
        Self::process_schedule(storage, schedule, range).await;
      });
    }
    while let Some(joined) = tasks.join_next().await {
      if let Err(err) = joined {
        tracing::error!("Ticker: schedule task panicked: {}", err);
      }
    }
  }

  /// 处理单个日程：过滤、展开、入队、记录时间
  /// Process one schedule: filter, expand, enqueue, record times
  async fn process_schedule(storage: Arc<Storage>, schedule: Schedule, range: TimeRange) {
    // 禁用的日程在 record_times 之前被过滤掉
    // Disabled schedules are filtered out before record_times
    match storage.is_enabled(schedule.name()).await {
      Ok(true) => {}
      Ok(false) => return,
      Err(err) => {
        tracing::warn!(
          "Ticker: could not read enabled flag for '{}': {}",
          schedule.name(),
          err
        );
        return;
      }
    }

    for scheduled_job in schedule.jobs_within(&range) {
      match storage.enqueue(&schedule, &scheduled_job).await {
        Ok(true) => {
          tracing::debug!(
            "Ticker: enqueued {} on '{}' for {}",
            scheduled_job.job.class,
            scheduled_job.job.queue,
            scheduled_job.firing_iso()
          );
        }
        Ok(false) => {
          // 锁已被其它副本或更早的 tick 持有：正常去重，静默跳过
          // The lock is held by another replica or an earlier tick: normal
          // dedup, skipped silently
          tracing::debug!(
            "Ticker: firing {} of '{}' already claimed",
            scheduled_job.firing_iso(),
            schedule.name()
          );
        }
        Err(err) if err.is_retriable() => {
          // 下一个 tick 的补偿窗口会重新覆盖丢失的触发
          // The next tick's miss window re-covers the lost firing
          tracing::warn!(
            "Ticker: storage unavailable for '{}', skipping rest of tick: {}",
            schedule.name(),
            err
          );
          break;
        }
        Err(err) => {
          tracing::warn!(
            "Ticker: skipping '{}' this tick: {}",
            schedule.name(),
            err
          );
          break;
        }
      }
    }

    // 该 tick 考虑过的日程无论入队结果如何都刷新时间哈希，包括中途
    // 出错提前放弃剩余任务的情况
    // Every schedule this tick considered gets its time hashes refreshed
    // regardless of the enqueue outcome, including when an error abandoned
    // the remaining jobs midway
    if let Err(err) = storage.record_times(&schedule).await {
      tracing::warn!(
        "Ticker: could not record times for '{}': {}",
        schedule.name(),
        err
      );
    }
  }

  /// 停止 Ticker
  /// Stop the Ticker
  pub fn shutdown(&self) {
    self.done.store(true, Ordering::Relaxed);
    self.notify.notify_one();
  }

  /// 检查是否已停止
  /// Check if stopped
  pub fn is_done(&self) -> bool {
    self.done.load(Ordering::Relaxed)
  }
}

impl ComponentLifecycle for Ticker {
  fn start(self: Arc<Self>) -> JoinHandle<()> {
    Ticker::start(self)
  }

  fn shutdown(&self) {
    Ticker::shutdown(self)
  }

  fn is_done(&self) -> bool {
    Ticker::is_done(self)
  }
}
