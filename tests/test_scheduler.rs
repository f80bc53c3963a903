//! 调度器端到端测试：内存网关 + 手动时钟驱动完整的 tick 流程
//! Scheduler end-to-end tests: the memory gateway plus a manual clock drive
//! the full tick flow

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use cronq::base::{Gateway, QueueOp};
use cronq::clock::ManualClock;
use cronq::components::ticker::{Ticker, TickerConfig};
use cronq::config::{ScheduleDef, SchedulerConfig};
use cronq::error::{Error, Result};
use cronq::memdb::MemoryGateway;
use cronq::scheduler::SchedulerServer;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn def(cron: &str, class: &str) -> ScheduleDef {
  ScheduleDef {
    description: String::new(),
    cron: cron.to_string(),
    class: class.to_string(),
    queue: None,
    args: Vec::new(),
    include_metadata: false,
    enabled: true,
    timezone: None,
  }
}

fn config_with(miss_window_ms: u64, schedules: Vec<(&str, ScheduleDef)>) -> SchedulerConfig {
  let mut config = SchedulerConfig::new();
  config.server_opts.missed_jobs_threshold_duration = miss_window_ms;
  for (name, schedule) in schedules {
    config = config.add_schedule(name, schedule);
  }
  config
}

fn clock_at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Arc<ManualClock> {
  Arc::new(ManualClock::new(
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap(),
  ))
}

/// 持久化配置的日程并构造一个可手动驱动的 Ticker
/// Persist the configured schedules and build a manually driven Ticker
async fn bootstrap_ticker(server: &SchedulerServer, clock: Arc<ManualClock>, miss_window_ms: u64) -> Ticker {
  let storage = server.storage();
  for schedule in server.schedules() {
    storage.persist_schedule(schedule).await.unwrap();
  }
  Ticker::new(
    storage,
    clock,
    server.schedules().to_vec(),
    TickerConfig {
      tick_interval: Duration::from_secs(1),
      miss_window: chrono::Duration::milliseconds(miss_window_ms as i64),
    },
  )
}

#[tokio::test]
async fn test_single_schedule_single_tick_single_firing() {
  let gateway = MemoryGateway::new();
  let clock = clock_at(2024, 1, 1, 0, 0, 30);
  let config = config_with(60_000, vec![("s1", def("* * * * *", "HardWorker"))]);
  let server = SchedulerServer::new(config, Arc::new(gateway.clone()), clock.clone()).unwrap();
  let ticker = bootstrap_ticker(&server, clock, 60_000).await;

  ticker.tick().await;

  let storage = server.storage();
  assert_eq!(storage.queue_len("default").await.unwrap(), 1);
  let jobs = storage.queue_jobs("default").await.unwrap();
  let parsed: serde_json::Value = serde_json::from_str(&jobs[0]).unwrap();
  assert_eq!(parsed["class"], json!("HardWorker"));
  assert_eq!(parsed["queue"], json!("default"));

  let keys = storage.keys().clone();
  assert_eq!(
    storage.read_time(&keys.last_times(), "s1").await.unwrap(),
    Some("2024-01-01T00:00:00Z".to_string())
  );
  assert_eq!(
    storage.read_time(&keys.next_times(), "s1").await.unwrap(),
    Some("2024-01-01T00:01:00Z".to_string())
  );
  assert_eq!(
    storage.read_time(&keys.first_runs(), "s1").await.unwrap(),
    Some("2024-01-01T00:00:30Z".to_string())
  );
  assert_eq!(
    storage.read_time(&keys.last_runs(), "s1").await.unwrap(),
    Some("2024-01-01T00:00:30Z".to_string())
  );
}

#[tokio::test]
async fn test_two_replicas_enqueue_each_firing_once() {
  // 两个独立副本共享同一个存储后端并并发执行同一个 tick
  // Two independent replicas share one storage backend and run the same
  // tick concurrently
  let gateway = MemoryGateway::new();
  let make = || config_with(60_000, vec![("s1", def("* * * * *", "HardWorker"))]);

  let clock_a = clock_at(2024, 1, 1, 0, 0, 30);
  let clock_b = clock_at(2024, 1, 1, 0, 0, 30);
  let server_a = SchedulerServer::new(make(), Arc::new(gateway.clone()), clock_a.clone()).unwrap();
  let server_b = SchedulerServer::new(make(), Arc::new(gateway.clone()), clock_b.clone()).unwrap();

  let ticker_a = bootstrap_ticker(&server_a, clock_a, 60_000).await;
  let ticker_b = bootstrap_ticker(&server_b, clock_b, 60_000).await;

  tokio::join!(ticker_a.tick(), ticker_b.tick());

  assert_eq!(server_a.storage().queue_len("default").await.unwrap(), 1);
}

#[tokio::test]
async fn test_missed_firings_are_replayed_in_order() {
  // 调度器自 00:00:00 起缺席，于 00:05:10 带着 300 秒窗口重新上线
  // The scheduler was absent since 00:00:00 and comes back at 00:05:10 with
  // a 300 second window
  let gateway = MemoryGateway::new();
  let clock = clock_at(2024, 1, 1, 0, 5, 10);
  let mut schedule = def("*/1 * * * *", "HardWorker");
  schedule.include_metadata = true;
  let config = config_with(300_000, vec![("s1", schedule)]);
  let server = SchedulerServer::new(config, Arc::new(gateway.clone()), clock.clone()).unwrap();
  let ticker = bootstrap_ticker(&server, clock.clone(), 300_000).await;

  ticker.tick().await;

  let storage = server.storage();
  let jobs = storage.queue_jobs("default").await.unwrap();
  // LPUSH 到表头：按升序入队后，表头是最近一次触发
  // LPUSH pushes to the head: after ascending enqueues the head is the most
  // recent firing
  let scheduled_at: Vec<String> = jobs
    .iter()
    .rev()
    .map(|raw| {
      let parsed: serde_json::Value = serde_json::from_str(raw).unwrap();
      parsed["args"][0]["scheduled_at"].as_str().unwrap().to_string()
    })
    .collect();
  assert_eq!(
    scheduled_at,
    vec![
      "2024-01-01T00:01:00Z",
      "2024-01-01T00:02:00Z",
      "2024-01-01T00:03:00Z",
      "2024-01-01T00:04:00Z",
      "2024-01-01T00:05:00Z",
    ]
  );

  // 下一个 tick 不产生新任务
  // The next tick enqueues nothing new
  clock.advance(chrono::Duration::seconds(1));
  ticker.tick().await;
  assert_eq!(storage.queue_len("default").await.unwrap(), 5);
}

#[tokio::test]
async fn test_include_metadata_appends_scheduled_at() {
  let gateway = MemoryGateway::new();
  let clock = clock_at(2024, 1, 1, 0, 0, 30);
  let mut schedule = def("* * * * *", "HardWorker");
  schedule.include_metadata = true;
  schedule.args = vec![json!(1), json!(2)];
  let config = config_with(60_000, vec![("s1", schedule)]);
  let server = SchedulerServer::new(config, Arc::new(gateway.clone()), clock.clone()).unwrap();
  let ticker = bootstrap_ticker(&server, clock, 60_000).await;

  ticker.tick().await;

  let jobs = server.storage().queue_jobs("default").await.unwrap();
  let parsed: serde_json::Value = serde_json::from_str(&jobs[0]).unwrap();
  assert_eq!(
    parsed["args"],
    json!([1, 2, { "scheduled_at": "2024-01-01T00:00:00Z" }])
  );
}

#[tokio::test]
async fn test_disabled_schedule_never_enqueues_or_records() {
  let gateway = MemoryGateway::new();
  let clock = clock_at(2024, 1, 1, 0, 0, 30);
  let mut schedule = def("* * * * *", "HardWorker");
  schedule.enabled = false;
  let config = config_with(60_000, vec![("s1", schedule)]);
  let server = SchedulerServer::new(config, Arc::new(gateway.clone()), clock.clone()).unwrap();
  let ticker = bootstrap_ticker(&server, clock.clone(), 60_000).await;

  ticker.tick().await;
  clock.advance(chrono::Duration::seconds(60));
  ticker.tick().await;

  let storage = server.storage();
  assert_eq!(storage.queue_len("default").await.unwrap(), 0);
  // 禁用的日程在 record_times 之前被过滤，时间哈希保持为空
  // The disabled schedule is filtered before record_times, the time hashes
  // stay empty
  let keys = storage.keys().clone();
  assert_eq!(storage.read_time(&keys.last_runs(), "s1").await.unwrap(), None);
  assert_eq!(storage.read_time(&keys.first_runs(), "s1").await.unwrap(), None);
}

#[tokio::test]
async fn test_timezone_offset_formats_local_instants() {
  // 本地 09:00（+05:30）在 03:30Z 触发
  // Local 09:00 at +05:30 fires at 03:30Z
  let gateway = MemoryGateway::new();
  let clock = clock_at(2024, 1, 1, 3, 30, 30);
  let mut schedule = def("0 9 * * *", "ReportWorker");
  schedule.timezone = Some("+05:30".to_string());
  schedule.include_metadata = true;
  let config = config_with(60_000, vec![("report", schedule)]);
  let server = SchedulerServer::new(config, Arc::new(gateway.clone()), clock.clone()).unwrap();
  let ticker = bootstrap_ticker(&server, clock, 60_000).await;

  ticker.tick().await;

  let storage = server.storage();
  assert_eq!(storage.queue_len("default").await.unwrap(), 1);
  let jobs = storage.queue_jobs("default").await.unwrap();
  let parsed: serde_json::Value = serde_json::from_str(&jobs[0]).unwrap();
  assert_eq!(
    parsed["args"][0]["scheduled_at"],
    json!("2024-01-01T09:00:00+05:30")
  );
  assert_eq!(
    storage
      .read_time(&storage.keys().last_times(), "report")
      .await
      .unwrap(),
    Some("2024-01-01T09:00:00+05:30".to_string())
  );
}

#[tokio::test]
async fn test_tick_without_firings_still_records_last_run() {
  // 窗口内没有触发的 tick 也要刷新 last_runs
  // A tick whose window holds no firing still refreshes last_runs
  let gateway = MemoryGateway::new();
  let clock = clock_at(2024, 1, 1, 0, 0, 30);
  let config = config_with(60_000, vec![("daily", def("0 9 * * *", "ReportWorker"))]);
  let server = SchedulerServer::new(config, Arc::new(gateway.clone()), clock.clone()).unwrap();
  let ticker = bootstrap_ticker(&server, clock, 60_000).await;

  ticker.tick().await;

  let storage = server.storage();
  assert_eq!(storage.queue_len("default").await.unwrap(), 0);
  assert_eq!(
    storage
      .read_time(&storage.keys().last_runs(), "daily")
      .await
      .unwrap(),
    Some("2024-01-01T00:00:30Z".to_string())
  );
  assert_eq!(
    storage
      .read_time(&storage.keys().next_times(), "daily")
      .await
      .unwrap(),
    Some("2024-01-01T09:00:00Z".to_string())
  );
}

#[tokio::test]
async fn test_bootstrap_reconciles_and_keeps_foreign_definitions() {
  let gateway = MemoryGateway::new();
  let clock = clock_at(2024, 1, 1, 0, 0, 30);
  let config = config_with(60_000, vec![("s1", def("* * * * *", "NewWorker"))]);
  let server = SchedulerServer::new(config, Arc::new(gateway.clone()), clock.clone()).unwrap();
  let storage = server.storage();
  let schedules_key = storage.keys().schedules();

  // Redis 中已有一个过期的 s1 定义和一个不在配置中的外来定义
  // Redis already holds a stale s1 definition and a foreign one absent from
  // the configuration
  let stale = serde_json::to_string(&def("*/5 * * * *", "OldWorker")).unwrap();
  gateway.hset(&schedules_key, "s1", &stale).await.unwrap();
  let foreign = serde_json::to_string(&def("0 0 * * *", "ForeignWorker")).unwrap();
  gateway.hset(&schedules_key, "legacy", &foreign).await.unwrap();

  server.start().await.unwrap();
  server.stop().await;

  let loaded = storage.load_schedules().await.unwrap();
  let s1 = loaded.iter().find(|s| s.name() == "s1").unwrap();
  assert_eq!(s1.template().class, "NewWorker");
  assert_eq!(s1.cron().as_str(), "* * * * *");
  // 外来定义原样保留：调度器不做垃圾回收
  // The foreign definition survives untouched: the scheduler does not
  // garbage-collect
  let legacy = loaded.iter().find(|s| s.name() == "legacy").unwrap();
  assert_eq!(legacy.template().class, "ForeignWorker");
}

#[tokio::test]
async fn test_server_lifecycle_dedups_across_ticks() {
  let gateway = MemoryGateway::new();
  let clock = clock_at(2024, 1, 1, 0, 0, 30);
  let mut config = config_with(60_000, vec![("s1", def("* * * * *", "HardWorker"))]);
  config.server_opts.tick_interval = 10;
  let server = SchedulerServer::new(config, Arc::new(gateway.clone()), clock.clone()).unwrap();

  server.start().await.unwrap();
  assert!(server.start().await.is_err()); // 已在运行 / already running
  tokio::time::sleep(Duration::from_millis(80)).await;
  server.stop().await;

  // 时钟钉死：多个 tick 看到同一触发，锁保证只入队一次
  // With the clock pinned, many ticks see the same firing and the lock keeps
  // it enqueued exactly once
  assert_eq!(server.storage().queue_len("default").await.unwrap(), 1);
}

/// 可开关故障的网关：打开开关时 `cas` 以瞬态错误失败，其余操作照常
/// A gateway with a failure switch: while it is on, `cas` fails with a
/// transient error and every other operation proceeds normally
struct FlakyGateway {
  inner: MemoryGateway,
  fail_cas: AtomicBool,
}

impl FlakyGateway {
  fn new() -> Self {
    Self {
      inner: MemoryGateway::new(),
      fail_cas: AtomicBool::new(true),
    }
  }
}

#[async_trait]
impl Gateway for FlakyGateway {
  async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
    self.inner.hset(key, field, value).await
  }

  async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool> {
    self.inner.hsetnx(key, field, value).await
  }

  async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
    self.inner.hget(key, field).await
  }

  async fn hkeys(&self, key: &str) -> Result<Vec<String>> {
    self.inner.hkeys(key).await
  }

  async fn sadd(&self, key: &str, member: &str) -> Result<()> {
    self.inner.sadd(key, member).await
  }

  async fn smembers(&self, key: &str) -> Result<Vec<String>> {
    self.inner.smembers(key).await
  }

  async fn lpush(&self, key: &str, value: &str) -> Result<()> {
    self.inner.lpush(key, value).await
  }

  async fn llen(&self, key: &str) -> Result<usize> {
    self.inner.llen(key).await
  }

  async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
    self.inner.lrange(key, start, stop).await
  }

  async fn exists(&self, key: &str) -> Result<bool> {
    self.inner.exists(key).await
  }

  async fn cas(&self, lock_key: &str, ops: &[QueueOp]) -> Result<bool> {
    if self.fail_cas.load(Ordering::Relaxed) {
      return Err(Error::Timeout);
    }
    self.inner.cas(lock_key, ops).await
  }

  async fn ping(&self) -> Result<()> {
    self.inner.ping().await
  }
}

#[tokio::test]
async fn test_storage_error_mid_tick_still_records_last_run() {
  let flaky = Arc::new(FlakyGateway::new());
  let clock = clock_at(2024, 1, 1, 0, 0, 30);
  let config = config_with(60_000, vec![("s1", def("* * * * *", "HardWorker"))]);
  let server = SchedulerServer::new(config, flaky.clone(), clock.clone()).unwrap();
  let ticker = bootstrap_ticker(&server, clock.clone(), 60_000).await;

  ticker.tick().await;

  let storage = server.storage();
  // 第一个任务的入队就失败了，但该 tick 考虑过的日程仍然刷新 last_runs
  // Enqueueing the very first job failed, yet the schedule this tick
  // considered still gets its last_runs refreshed
  assert_eq!(storage.queue_len("default").await.unwrap(), 0);
  assert_eq!(
    storage.read_time(&storage.keys().last_runs(), "s1").await.unwrap(),
    Some("2024-01-01T00:00:30Z".to_string())
  );

  // 存储恢复后，下一个 tick 的补偿窗口补放该触发并推进 last_runs
  // Once storage recovers, the next tick's miss window replays the firing
  // and last_runs advances
  flaky.fail_cas.store(false, Ordering::Relaxed);
  clock.advance(chrono::Duration::seconds(30));
  ticker.tick().await;

  assert_eq!(storage.queue_len("default").await.unwrap(), 1);
  assert_eq!(
    storage.read_time(&storage.keys().last_runs(), "s1").await.unwrap(),
    Some("2024-01-01T00:01:00Z".to_string())
  );
}

#[tokio::test]
async fn test_invalid_config_is_fatal_at_bootstrap() {
  let gateway = MemoryGateway::new();
  let clock = clock_at(2024, 1, 1, 0, 0, 30);

  let bad_cron = config_with(60_000, vec![("s1", def("every minute", "W"))]);
  assert!(SchedulerServer::new(bad_cron, Arc::new(gateway.clone()), clock.clone()).is_err());

  let mut bad_tz = def("* * * * *", "W");
  bad_tz.timezone = Some("Mars/Olympus".to_string());
  let config = config_with(60_000, vec![("s1", bad_tz)]);
  assert!(SchedulerServer::new(config, Arc::new(gateway.clone()), clock.clone()).is_err());

  let zero_window = config_with(0, vec![("s1", def("* * * * *", "W"))]);
  assert!(SchedulerServer::new(zero_window, Arc::new(gateway.clone()), clock).is_err());
}
