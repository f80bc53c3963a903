//! 配置模块
//! Configuration module
//!
//! 定义了调度器的配置模式：存储命名空间、服务器选项、Redis 连接参数
//! 与日程映射。宿主进程负责从文件加载；这里只做结构化解析与校验。
//! Defines the scheduler configuration schema: storage namespaces, server
//! options, Redis connection parameters, and the schedule map. The host
//! process loads files; this module only parses and validates the structure.

use crate::base::constants::{
  DEFAULT_MISS_WINDOW_MS, DEFAULT_SCHEDULER_NAMESPACE, DEFAULT_TICK_INTERVAL,
  DEFAULT_WORKER_NAMESPACE,
};
use crate::base::keys::KeySpace;
use crate::cron::{parse_offset, CronSpec};
use crate::error::{Error, Result};
use crate::redis::RedisSpec;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

fn default_true() -> bool {
  true
}

fn default_scheduler_namespace() -> String {
  DEFAULT_SCHEDULER_NAMESPACE.to_string()
}

fn default_worker_namespace() -> String {
  DEFAULT_WORKER_NAMESPACE.to_string()
}

fn default_miss_window_ms() -> u64 {
  DEFAULT_MISS_WINDOW_MS
}

fn default_tick_interval_ms() -> u64 {
  DEFAULT_TICK_INTERVAL.as_millis() as u64
}

/// 存储选项：两个互不相同的键前缀
/// Storage options: the two distinct key prefixes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageOpts {
  /// 调度器命名空间（状态与时间哈希）
  /// Scheduler namespace (state and time hashes)
  #[serde(default = "default_scheduler_namespace")]
  pub namespace: String,
  /// 工作者命名空间（队列与入队锁，与下游工作者共享）
  /// Worker namespace (queues and enqueue locks, shared with workers)
  #[serde(default = "default_worker_namespace", alias = "exq_namespace")]
  pub worker_namespace: String,
}

impl Default for StorageOpts {
  fn default() -> Self {
    Self {
      namespace: default_scheduler_namespace(),
      worker_namespace: default_worker_namespace(),
    }
  }
}

impl StorageOpts {
  /// 构造键空间
  /// Build the key space
  pub fn key_space(&self) -> KeySpace {
    KeySpace::new(&self.worker_namespace, &self.namespace)
  }
}

/// 服务器选项
/// Server options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerOpts {
  /// 补偿窗口（毫秒）：tick 区间为 `[now - 窗口, now]`
  /// Miss window (milliseconds): the tick window is `[now - window, now]`
  #[serde(default = "default_miss_window_ms")]
  pub missed_jobs_threshold_duration: u64,
  /// tick 周期（毫秒）
  /// Tick interval (milliseconds)
  #[serde(default = "default_tick_interval_ms")]
  pub tick_interval: u64,
  /// 未指定时区的日程使用的默认时区偏移
  /// Default timezone offset for schedules lacking one
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub time_zone: Option<String>,
}

impl Default for ServerOpts {
  fn default() -> Self {
    Self {
      missed_jobs_threshold_duration: default_miss_window_ms(),
      tick_interval: default_tick_interval_ms(),
      time_zone: None,
    }
  }
}

impl ServerOpts {
  /// 补偿窗口
  /// The miss window
  pub fn miss_window(&self) -> chrono::Duration {
    chrono::Duration::milliseconds(self.missed_jobs_threshold_duration as i64)
  }

  /// tick 周期
  /// The tick interval
  pub fn tick_interval(&self) -> Duration {
    Duration::from_millis(self.tick_interval)
  }

  /// 默认时区偏移
  /// The default timezone offset
  pub fn default_offset(&self) -> Result<FixedOffset> {
    match &self.time_zone {
      Some(tz) => parse_offset(tz),
      None => parse_offset("UTC"),
    }
  }
}

/// 单个日程的配置 / 持久化定义
/// The configured / persisted definition of one schedule
///
/// 未知键会被拒绝，而不是静默接受。
/// Unknown keys are rejected rather than silently accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleDef {
  /// 人类可读描述（不参与语义）
  /// Human-readable description (opaque)
  #[serde(default)]
  pub description: String,
  /// 5 字段 cron 表达式
  /// 5-field cron expression
  pub cron: String,
  /// 工作者类名
  /// Worker class name
  pub class: String,
  /// 目标队列
  /// Target queue
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub queue: Option<String>,
  /// 任务参数
  /// Job arguments
  #[serde(default)]
  pub args: Vec<Value>,
  /// 是否附加 `{scheduled_at}` 元数据
  /// Whether to append `{scheduled_at}` metadata
  #[serde(default)]
  pub include_metadata: bool,
  /// 是否启用
  /// Whether enabled
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// 固定时区偏移（"UTC"、"+05:30" 等）
  /// Fixed timezone offset ("UTC", "+05:30", ...)
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timezone: Option<String>,
}

/// 调度器配置
/// Scheduler configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
  /// 存储选项
  /// Storage options
  #[serde(default)]
  pub storage_opts: StorageOpts,
  /// 服务器选项
  /// Server options
  #[serde(default)]
  pub server_opts: ServerOpts,
  /// Redis 连接参数
  /// Redis connection parameters
  #[serde(default)]
  pub redis: RedisSpec,
  /// 日程映射：名称 → 定义
  /// Schedule map: name → definition
  #[serde(default)]
  pub schedules: BTreeMap<String, ScheduleDef>,
}

impl SchedulerConfig {
  /// 创建默认配置
  /// Create the default configuration
  pub fn new() -> Self {
    Self::default()
  }

  /// 添加一个日程
  /// Add a schedule
  pub fn add_schedule<N: Into<String>>(mut self, name: N, def: ScheduleDef) -> Self {
    self.schedules.insert(name.into(), def);
    self
  }

  /// 校验配置；任何失败在引导阶段都是致命的
  /// Validate the configuration; any failure is fatal at bootstrap
  pub fn validate(&self) -> Result<()> {
    if self.server_opts.missed_jobs_threshold_duration == 0 {
      return Err(Error::config("Miss window must be a positive duration"));
    }
    if self.server_opts.tick_interval == 0 {
      return Err(Error::config("Tick interval must be a positive duration"));
    }
    self.server_opts.default_offset()?;

    for (name, def) in &self.schedules {
      if name.trim().is_empty() {
        return Err(Error::config("Schedule name must not be empty"));
      }
      if def.class.trim().is_empty() {
        return Err(Error::config(format!(
          "Schedule '{}' is missing a worker class",
          name
        )));
      }
      if let Some(queue) = &def.queue {
        if queue.trim().is_empty() {
          return Err(Error::InvalidQueueName {
            name: queue.clone(),
          });
        }
      }
      CronSpec::parse(&def.cron)?;
      if let Some(tz) = &def.timezone {
        parse_offset(tz)?;
      }
    }
    Ok(())
  }
}
