//! 时钟模块
//! Clock module
//!
//! 调度器的所有时间读取都通过 [`Clock`] 能力进行，生产环境使用系统时钟，
//! 测试环境注入固定或加速的时钟。
//! Every time read in the scheduler flows through the [`Clock`] capability;
//! production uses the system clock, tests inject a pinned or accelerated one.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use std::time::Instant;

/// 时钟能力接口
/// Clock capability interface
///
/// 调度器绝不直接读取墙上时钟；通过构造函数注入 `Arc<dyn Clock>`。
/// The scheduler never reads the wall clock directly; an `Arc<dyn Clock>` is
/// injected through the constructor.
pub trait Clock: Send + Sync {
  /// 返回当前时刻（UTC）
  /// Return the current instant (UTC)
  fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟（生产环境）
/// System clock (production)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// 手动时钟（测试环境）：固定在某个时刻，可显式推进
/// Manual clock (tests): pinned to an instant, advanced explicitly
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  /// 创建固定在 `start` 的时钟
  /// Create a clock pinned at `start`
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(start),
    }
  }

  /// 设置当前时刻
  /// Set the current instant
  pub fn set(&self, instant: DateTime<Utc>) {
    if let Ok(mut now) = self.now.lock() {
      *now = instant;
    }
  }

  /// 推进时钟
  /// Advance the clock
  pub fn advance(&self, by: Duration) {
    if let Ok(mut now) = self.now.lock() {
      *now += by;
    }
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    match self.now.lock() {
      Ok(now) => *now,
      Err(poisoned) => *poisoned.into_inner(),
    }
  }
}

/// 加速时钟（测试环境）：从 `epoch` 起按 `factor` 倍速放大真实流逝时间
/// Scaled clock (tests): starting at `epoch`, real elapsed time is amplified
/// by `factor`
#[derive(Debug)]
pub struct ScaledClock {
  epoch: DateTime<Utc>,
  started: Instant,
  factor: f64,
}

impl ScaledClock {
  /// 创建从 `epoch` 开始、以 `factor` 倍速流逝的时钟
  /// Create a clock starting at `epoch` running at `factor` times real speed
  pub fn new(epoch: DateTime<Utc>, factor: f64) -> Self {
    Self {
      epoch,
      started: Instant::now(),
      factor,
    }
  }
}

impl Clock for ScaledClock {
  fn now(&self) -> DateTime<Utc> {
    let elapsed_ms = self.started.elapsed().as_millis() as f64 * self.factor;
    self.epoch + Duration::milliseconds(elapsed_ms as i64)
  }
}
