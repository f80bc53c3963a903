//! 错误处理模块
//! Error handling module
//!
//! 定义了 Cronq 库中使用的各种错误类型
//! Defines various error types used in the Cronq library

use thiserror::Error;

/// Cronq 库的结果类型
/// Result type for the Cronq library
pub type Result<T> = std::result::Result<T, Error>;

/// Cronq 错误类型
/// Cronq error type
#[derive(Error, Debug)]
pub enum Error {
  /// Redis 存储错误
  /// Redis storage error
  #[error("Redis storage error: {0}")]
  Storage(#[from] redis::RedisError),

  /// 存储操作超时
  /// Storage operation timed out
  #[error("Storage operation timed out")]
  Timeout,

  /// 任务序列化错误
  /// Job encoding error
  #[error("Job encoding error: {0}")]
  Encoding(#[from] serde_json::Error),

  /// 配置错误
  /// Configuration error
  #[error("Configuration error: {message}")]
  Config { message: String },

  /// 无效的 cron 表达式
  /// Invalid cron expression
  #[error("Invalid cron expression '{expr}': {message}")]
  InvalidCron { expr: String, message: String },

  /// 无效的时区偏移
  /// Invalid timezone offset
  #[error("Invalid timezone: {value}")]
  InvalidTimezone { value: String },

  /// 无效的队列名称
  /// Invalid queue name
  #[error("Invalid queue name: {name}")]
  InvalidQueueName { name: String },

  /// 调度器已在运行
  /// Scheduler is already running
  #[error("Scheduler is already running")]
  SchedulerRunning,
}

impl Error {
  /// 创建配置错误
  /// Create a configuration error
  pub fn config<S: Into<String>>(message: S) -> Self {
    Self::Config {
      message: message.into(),
    }
  }

  /// 创建无效 cron 表达式错误
  /// Create an invalid cron expression error
  pub fn invalid_cron<S: Into<String>, M: Into<String>>(expr: S, message: M) -> Self {
    Self::InvalidCron {
      expr: expr.into(),
      message: message.into(),
    }
  }

  /// 创建无效时区错误
  /// Create an invalid timezone error
  pub fn invalid_timezone<S: Into<String>>(value: S) -> Self {
    Self::InvalidTimezone {
      value: value.into(),
    }
  }

  /// 检查是否为可重试错误
  /// Check if the error is retriable
  ///
  /// 存储故障是瞬态的：本次 tick 跳过，错过的触发由下一次 tick 的补偿窗口兜底。
  /// Storage failures are transient: the current tick skips, and the miss window
  /// of the next tick picks up whatever was lost.
  pub fn is_retriable(&self) -> bool {
    matches!(self, Error::Storage(_) | Error::Timeout)
  }

  /// 检查是否为致命错误
  /// Check if the error is fatal
  pub fn is_fatal(&self) -> bool {
    !self.is_retriable()
  }
}
