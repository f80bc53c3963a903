//! Redis 配置和连接管理模块
//! Redis configuration and connection management module

use crate::error::Result;
use redis::aio::MultiplexedConnection;
use redis::{ConnectionAddr, IntoConnectionInfo};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_host() -> String {
  "127.0.0.1".to_string()
}

fn default_port() -> u16 {
  6379
}

fn default_operation_timeout_ms() -> u64 {
  5_000
}

fn default_backoff_initial_ms() -> u64 {
  1_000
}

fn default_backoff_max_ms() -> u64 {
  8_000
}

fn default_max_retries() -> u32 {
  3
}

/// Redis 连接参数
/// Redis connection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisSpec {
  /// 主机名
  /// Host name
  #[serde(default = "default_host")]
  pub host: String,
  /// 端口
  /// Port
  #[serde(default = "default_port")]
  pub port: u16,
  /// 数据库编号
  /// Database number
  #[serde(default)]
  pub database: i64,
  /// 认证密码
  /// Authentication password
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,
  /// 客户端名称
  /// Client name
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  /// 单个操作的超时时间（毫秒）
  /// Per-operation timeout (milliseconds)
  #[serde(default = "default_operation_timeout_ms")]
  pub operation_timeout: u64,
  /// 重试退避的初始间隔（毫秒）
  /// Initial retry backoff (milliseconds)
  #[serde(default = "default_backoff_initial_ms")]
  pub backoff_initial: u64,
  /// 重试退避的上限（毫秒）
  /// Retry backoff cap (milliseconds)
  #[serde(default = "default_backoff_max_ms")]
  pub backoff_max: u64,
  /// 单个操作的最大重试次数
  /// Maximum retries per operation
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
}

impl Default for RedisSpec {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      database: 0,
      password: None,
      name: None,
      operation_timeout: default_operation_timeout_ms(),
      backoff_initial: default_backoff_initial_ms(),
      backoff_max: default_backoff_max_ms(),
      max_retries: default_max_retries(),
    }
  }
}

impl RedisSpec {
  /// 从 Redis URL 构造
  /// Construct from a Redis URL
  pub fn from_url(url: &str) -> Result<Self> {
    let info = url
      .into_connection_info()
      .map_err(|e| crate::error::Error::config(format!("Invalid Redis URL '{}': {}", url, e)))?;
    let (host, port) = match info.addr {
      ConnectionAddr::Tcp(host, port) => (host, port),
      other => {
        return Err(crate::error::Error::config(format!(
          "Unsupported Redis address: {:?}",
          other
        )))
      }
    };
    Ok(Self {
      host,
      port,
      database: info.redis.db,
      password: info.redis.password,
      ..Self::default()
    })
  }

  /// 连接 URL
  /// The connection URL
  pub fn url(&self) -> String {
    match &self.password {
      Some(password) => format!(
        "redis://:{}@{}:{}/{}",
        password, self.host, self.port, self.database
      ),
      None => format!("redis://{}:{}/{}", self.host, self.port, self.database),
    }
  }

  /// 单个操作的超时
  /// The per-operation timeout
  pub fn operation_timeout(&self) -> Duration {
    Duration::from_millis(self.operation_timeout)
  }

  /// 初始退避间隔
  /// The initial backoff
  pub fn backoff_initial(&self) -> Duration {
    Duration::from_millis(self.backoff_initial)
  }

  /// 退避上限
  /// The backoff cap
  pub fn backoff_max(&self) -> Duration {
    Duration::from_millis(self.backoff_max)
  }

  /// 打开一条多路复用连接；所有 tick 工作共享该连接
  /// Open one multiplexed connection; all tick work shares it
  pub async fn connect(&self) -> Result<MultiplexedConnection> {
    let client = redis::Client::open(self.url().as_str())?;
    let conn = client.get_multiplexed_tokio_connection().await?;
    Ok(conn)
  }
}
