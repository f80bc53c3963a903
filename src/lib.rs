//! # Cronq
//!
//! Distributed cron scheduler for Sidekiq-compatible workers, coordinated
//! over Redis
//!
//! Cronq 按 cron 表达式周期性地物化任务，并把它们放入 Redis 上与
//! Sidekiq 风格工作者生态兼容的共享队列。
//! Cronq periodically materializes jobs defined by cron expressions and
//! pushes them onto shared Redis queues compatible with a Sidekiq-style
//! worker ecosystem.
//!
//! ## 特性
//! ## Features
//!
//! - 在任意固定时区偏移下求值 cron 表达式
//!   - Evaluates cron expressions under any fixed timezone offset
//! - 停机后在有界补偿窗口内补放错过的触发
//!   - Replays firings missed during downtime within a bounded miss window
//! - 任意数量并发副本下，每个（日程，触发时刻）对至多入队一次
//!   - At most one enqueue per (schedule, firing) pair across any number of
//!     concurrent replicas
//! - 去重由按内容寻址的 Redis 锁（`SET NX` + MULTI/EXEC）保证，与时钟
//!   偏差无关
//!   - Dedup is guaranteed by content-addressed Redis locks (`SET NX` +
//!     MULTI/EXEC), independent of clock skew
//! - 时钟是注入的能力：测试可钉死或加速时间
//!   - The clock is an injected capability: tests pin or accelerate time
//! - 自带内存后端，测试与本地运行不依赖外部服务
//!   - Ships an in-memory backend, so tests and local runs need no external
//!     service
//!
//! ## 快速开始
//! ## Quick Start
//!
//! ```rust,no_run
//! use cronq::config::{ScheduleDef, SchedulerConfig};
//! use cronq::scheduler::SchedulerServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 配置一个每分钟触发的日程
//!     // Configure a schedule firing every minute
//!     let config = SchedulerConfig::new().add_schedule(
//!         "heartbeat",
//!         serde_json::from_value::<ScheduleDef>(serde_json::json!({
//!             "cron": "* * * * *",
//!             "class": "HeartbeatWorker",
//!             "queue": "default",
//!         }))?,
//!     );
//!
//!     // 连接 Redis 并启动 tick 循环
//!     // Connect to Redis and start the tick loop
//!     let server = SchedulerServer::connect(config).await?;
//!     server.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await;
//!     Ok(())
//! }
//! ```

pub mod base;
pub mod clock;
pub mod components;
pub mod config;
pub mod cron;
pub mod error;
pub mod memdb;
pub mod rdb;
pub mod redis;
pub mod schedule;
pub mod scheduler;
pub mod storage;
