//! Redis 网关实现
//! Redis gateway implementation
//!
//! 所有 tick 工作共享一条多路复用连接；单条命令带有操作超时，并在
//! 瞬态错误上按带抖动的指数退避重试。`cas` 不做内部重试：锁一旦写入
//! 就绝不释放，重复执行流水线会破坏至多一次语义。
//! All tick work shares one multiplexed connection; single commands carry a
//! per-operation timeout and retry on transient errors with jittered
//! exponential backoff. `cas` never retries internally: once the lock is
//! written it is never released, and re-running the pipeline would break the
//! at-most-once semantics.

use crate::base::{Gateway, QueueOp};
use crate::error::{Error, Result};
use crate::redis::RedisSpec;
use async_trait::async_trait;
use rand::Rng;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Cmd, FromRedisValue};
use std::time::Duration;

/// Redis 网关
/// Redis gateway
#[derive(Clone)]
pub struct RedisGateway {
  conn: MultiplexedConnection,
  spec: RedisSpec,
}

impl RedisGateway {
  /// 建立连接并验证可达性
  /// Open the connection and verify reachability
  pub async fn connect(spec: RedisSpec) -> Result<Self> {
    let conn = spec.connect().await?;
    let gateway = Self { conn, spec };
    gateway.ping().await?;
    Ok(gateway)
  }

  /// 判断错误是否值得重试
  /// Whether an error is worth retrying
  fn is_transient(err: &redis::RedisError) -> bool {
    err.is_io_error() || err.is_timeout() || err.is_connection_dropped()
  }

  /// 带 10% 抖动的退避间隔
  /// Backoff with 10% jitter
  fn jittered(backoff: Duration) -> Duration {
    let cap = (backoff.as_millis() as u64 / 10).max(1);
    backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
  }

  /// 执行单条命令：操作超时 + 瞬态错误重试
  /// Run a single command: operation timeout + transient-error retries
  ///
  /// 只用于幂等命令；LPUSH 的生产路径经由 `cas`，不走这里的重试。
  /// Used only for idempotent commands; the production LPUSH path goes
  /// through `cas` and never retries here.
  async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
    let mut attempt: u32 = 0;
    let mut backoff = self.spec.backoff_initial();
    loop {
      let mut conn = self.conn.clone();
      match tokio::time::timeout(self.spec.operation_timeout(), cmd.query_async(&mut conn)).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(err)) => {
          if attempt >= self.spec.max_retries || !Self::is_transient(&err) {
            return Err(err.into());
          }
          tracing::warn!("Redis command failed (attempt {}): {}", attempt + 1, err);
        }
        Err(_) => {
          if attempt >= self.spec.max_retries {
            return Err(Error::Timeout);
          }
          tracing::warn!("Redis command timed out (attempt {})", attempt + 1);
        }
      }
      tokio::time::sleep(Self::jittered(backoff)).await;
      backoff = (backoff * 2).min(self.spec.backoff_max());
      attempt += 1;
    }
  }
}

#[async_trait]
impl Gateway for RedisGateway {
  async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
    let mut cmd = redis::cmd("HSET");
    cmd.arg(key).arg(field).arg(value);
    let _: i64 = self.query(&cmd).await?;
    Ok(())
  }

  async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool> {
    let mut cmd = redis::cmd("HSETNX");
    cmd.arg(key).arg(field).arg(value);
    let written: i64 = self.query(&cmd).await?;
    Ok(written == 1)
  }

  async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
    let mut cmd = redis::cmd("HGET");
    cmd.arg(key).arg(field);
    self.query(&cmd).await
  }

  async fn hkeys(&self, key: &str) -> Result<Vec<String>> {
    let mut cmd = redis::cmd("HKEYS");
    cmd.arg(key);
    self.query(&cmd).await
  }

  async fn sadd(&self, key: &str, member: &str) -> Result<()> {
    let mut cmd = redis::cmd("SADD");
    cmd.arg(key).arg(member);
    let _: i64 = self.query(&cmd).await?;
    Ok(())
  }

  async fn smembers(&self, key: &str) -> Result<Vec<String>> {
    let mut cmd = redis::cmd("SMEMBERS");
    cmd.arg(key);
    self.query(&cmd).await
  }

  async fn lpush(&self, key: &str, value: &str) -> Result<()> {
    let mut conn = self.conn.clone();
    let fut = conn.lpush::<_, _, i64>(key, value);
    let _ = tokio::time::timeout(self.spec.operation_timeout(), fut)
      .await
      .map_err(|_| Error::Timeout)??;
    Ok(())
  }

  async fn llen(&self, key: &str) -> Result<usize> {
    let mut cmd = redis::cmd("LLEN");
    cmd.arg(key);
    let len: i64 = self.query(&cmd).await?;
    Ok(len.max(0) as usize)
  }

  async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
    let mut cmd = redis::cmd("LRANGE");
    cmd.arg(key).arg(start).arg(stop);
    self.query(&cmd).await
  }

  async fn exists(&self, key: &str) -> Result<bool> {
    let mut cmd = redis::cmd("EXISTS");
    cmd.arg(key);
    let found: i64 = self.query(&cmd).await?;
    Ok(found > 0)
  }

  async fn cas(&self, lock_key: &str, ops: &[QueueOp]) -> Result<bool> {
    let timeout = self.spec.operation_timeout();
    let mut conn = self.conn.clone();

    // SET lock 1 NX，无过期：锁是永久的去重记录
    // SET lock 1 NX, no expiry: the lock is the permanent dedup record
    let acquired: bool = tokio::time::timeout(timeout, conn.set_nx(lock_key, 1))
      .await
      .map_err(|_| Error::Timeout)??;
    if !acquired {
      return Ok(false);
    }

    let mut pipe = redis::pipe();
    pipe.atomic();
    for op in ops {
      match op {
        QueueOp::Sadd { key, member } => {
          pipe.sadd(key, member).ignore();
        }
        QueueOp::Lpush { key, value } => {
          pipe.lpush(key, value).ignore();
        }
      }
    }
    let _: () = tokio::time::timeout(timeout, pipe.query_async(&mut conn))
      .await
      .map_err(|_| Error::Timeout)??;
    Ok(true)
  }

  async fn ping(&self) -> Result<()> {
    let cmd = redis::cmd("PING");
    let _: String = self.query(&cmd).await?;
    Ok(())
  }
}
