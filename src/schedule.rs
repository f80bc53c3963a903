//! 日程模块
//! Schedule module
//!
//! 不可变的日程描述：名称、cron 表达式、任务模板与选项，以及
//! 从时间区间到待入队任务的展开。
//! The immutable schedule description: name, cron expression, job template
//! and options, plus the expansion from a time range to jobs to enqueue.

use crate::base::constants::DEFAULT_QUEUE_NAME;
use crate::config::ScheduleDef;
use crate::cron::{format_instant, parse_offset, CronSpec};
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// 一次 tick 的求值区间，半开 `[t_start, t_end)`
/// The evaluation window of one tick, half-open `[t_start, t_end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
  pub t_start: DateTime<Utc>,
  pub t_end: DateTime<Utc>,
}

impl TimeRange {
  /// 创建时间区间
  /// Create a time range
  pub fn new(t_start: DateTime<Utc>, t_end: DateTime<Utc>) -> Self {
    Self { t_start, t_end }
  }
}

/// 任务模板：来自配置的待入队任务描述
/// Job template: the to-be-enqueued job description from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTemplate {
  /// 工作者类名
  /// Worker class name
  pub class: String,
  /// 目标队列；缺省时由选项或默认队列解析
  /// Target queue; resolved from options or the default queue when absent
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub queue: Option<String>,
  /// 任务参数
  /// Job arguments
  #[serde(default)]
  pub args: Vec<Value>,
}

/// 入队到工作者队列的线格式任务
/// The wire-format job enqueued onto a worker queue
///
/// 序列化必须是确定性的：锁键按该编码做内容寻址，任何副本对同一
/// （日程，触发）对必须产生完全相同的字节。
/// Serialization must be deterministic: the lock key is content-addressed on
/// this encoding, and every replica must produce identical bytes for the same
/// (schedule, firing) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub class: String,
  pub queue: String,
  pub args: Vec<Value>,
}

impl Job {
  /// 编码为 JSON 线格式
  /// Encode to the JSON wire format
  pub fn encode(&self) -> Result<String> {
    Ok(serde_json::to_string(self)?)
  }
}

/// 某次触发对应的待入队任务
/// The job to enqueue for one firing
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledJob {
  pub job: Job,
  /// 触发时刻，以日程本地偏移表示
  /// The firing instant, in the schedule's local offset
  pub firing_time: DateTime<FixedOffset>,
}

impl ScheduledJob {
  /// 触发时刻的 RFC 3339 文本（锁键与 `scheduled_at` 共用）
  /// The firing instant as RFC 3339 text (shared by lock keys and
  /// `scheduled_at`)
  pub fn firing_iso(&self) -> String {
    format_instant(&self.firing_time)
  }
}

/// 日程选项
/// Schedule options
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleOpts {
  /// 是否启用
  /// Whether enabled
  pub enabled: bool,
  /// 是否在 args 末尾附加 `{scheduled_at}` 元数据
  /// Whether to append `{scheduled_at}` metadata to args
  pub include_metadata: bool,
  /// 解释 cron 与格式化触发时刻所用的固定偏移
  /// Fixed offset for interpreting the cron and formatting firings
  pub tz_offset: FixedOffset,
  /// 队列覆盖，优先于模板队列
  /// Queue override, takes precedence over the template queue
  pub queue: Option<String>,
}

impl Default for ScheduleOpts {
  fn default() -> Self {
    Self {
      enabled: true,
      include_metadata: false,
      tz_offset: Utc.fix(),
      queue: None,
    }
  }
}

/// 不可变日程
/// An immutable schedule
#[derive(Debug, Clone)]
pub struct Schedule {
  name: String,
  description: String,
  cron: CronSpec,
  template: JobTemplate,
  opts: ScheduleOpts,
}

impl Schedule {
  /// 构造日程；校验名称、类名与 cron 表达式
  /// Construct a schedule; validates name, class, and cron expression
  pub fn new<N, D>(
    name: N,
    description: D,
    cron_expr: &str,
    template: JobTemplate,
    opts: ScheduleOpts,
  ) -> Result<Self>
  where
    N: Into<String>,
    D: Into<String>,
  {
    let name = name.into();
    if name.trim().is_empty() {
      return Err(Error::config("Schedule name must not be empty"));
    }
    if template.class.trim().is_empty() {
      return Err(Error::config(format!(
        "Schedule '{}' is missing a worker class",
        name
      )));
    }
    let cron = CronSpec::parse(cron_expr)?;
    Ok(Self {
      name,
      description: description.into(),
      cron,
      template,
      opts,
    })
  }

  /// 从持久化 / 配置定义构造
  /// Construct from a persisted / configured definition
  pub fn from_def(name: &str, def: &ScheduleDef, default_offset: FixedOffset) -> Result<Self> {
    let tz_offset = match &def.timezone {
      Some(tz) => parse_offset(tz)?,
      None => default_offset,
    };
    let opts = ScheduleOpts {
      enabled: def.enabled,
      include_metadata: def.include_metadata,
      tz_offset,
      queue: None,
    };
    let template = JobTemplate {
      class: def.class.clone(),
      queue: def.queue.clone(),
      args: def.args.clone(),
    };
    Self::new(name, def.description.clone(), &def.cron, template, opts)
  }

  /// 导出为可持久化定义；时区固化为具体偏移
  /// Export as a persistable definition; the timezone is pinned to a
  /// concrete offset
  pub fn to_def(&self) -> ScheduleDef {
    ScheduleDef {
      description: self.description.clone(),
      cron: self.cron.as_str().to_string(),
      class: self.template.class.clone(),
      queue: self.template.queue.clone(),
      args: self.template.args.clone(),
      include_metadata: self.opts.include_metadata,
      enabled: self.opts.enabled,
      timezone: Some(self.opts.tz_offset.to_string()),
    }
  }

  /// 日程名称
  /// Schedule name
  pub fn name(&self) -> &str {
    &self.name
  }

  /// 日程描述
  /// Schedule description
  pub fn description(&self) -> &str {
    &self.description
  }

  /// cron 表达式
  /// The cron expression
  pub fn cron(&self) -> &CronSpec {
    &self.cron
  }

  /// 任务模板
  /// The job template
  pub fn template(&self) -> &JobTemplate {
    &self.template
  }

  /// 日程选项
  /// Schedule options
  pub fn opts(&self) -> &ScheduleOpts {
    &self.opts
  }

  /// 解析目标队列：选项覆盖 → 模板队列 → 默认队列
  /// Resolve the target queue: option override → template queue → default
  pub fn resolved_queue(&self) -> &str {
    self
      .opts
      .queue
      .as_deref()
      .or(self.template.queue.as_deref())
      .unwrap_or(DEFAULT_QUEUE_NAME)
  }

  /// 展开区间内的全部触发为待入队任务，按触发时刻升序
  /// Expand all firings in the window into jobs to enqueue, ascending by
  /// firing time
  pub fn jobs_within(&self, range: &TimeRange) -> Vec<ScheduledJob> {
    self
      .cron
      .firings_within(self.opts.tz_offset, range.t_start, range.t_end)
      .into_iter()
      .map(|firing| self.job_for(firing))
      .collect()
  }

  /// 构造某次触发的待入队任务，应用 `include_metadata`
  /// Build the job for one firing, applying `include_metadata`
  pub fn job_for(&self, firing: DateTime<Utc>) -> ScheduledJob {
    let firing_time = firing.with_timezone(&self.opts.tz_offset);
    let mut args = self.template.args.clone();
    if self.opts.include_metadata {
      args.push(json!({ "scheduled_at": format_instant(&firing_time) }));
    }
    ScheduledJob {
      job: Job {
        class: self.template.class.clone(),
        queue: self.resolved_queue().to_string(),
        args,
      },
      firing_time,
    }
  }
}
