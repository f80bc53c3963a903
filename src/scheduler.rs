//! 调度器服务模块
//! Scheduler server module
//!
//! 引导入口：校验配置、构造日程、将定义对账写入 Redis，然后启动
//! tick 循环。宿主进程嵌入 [`SchedulerServer`] 并负责配置加载与进程
//! 管理；任意数量的副本可以共享同一个 Redis。
//! The bootstrap entry point: validates configuration, builds schedules,
//! reconciles definitions into Redis, then starts the tick loop. The host
//! process embeds [`SchedulerServer`] and owns config loading and process
//! supervision; any number of replicas may share one Redis.

use crate::base::Gateway;
use crate::clock::{Clock, SystemClock};
use crate::components::ticker::{Ticker, TickerConfig};
use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::rdb::RedisGateway;
use crate::schedule::Schedule;
use crate::storage::Storage;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// 调度器服务
/// Scheduler server
pub struct SchedulerServer {
  /// 副本标识：主机名:进程号:uuid，仅用于日志
  /// Replica identity: hostname:pid:uuid, used in logs only
  id: String,
  schedules: Vec<Schedule>,
  storage: Arc<Storage>,
  clock: Arc<dyn Clock>,
  config: SchedulerConfig,
  ticker: Mutex<Option<(Arc<Ticker>, JoinHandle<()>)>>,
}

impl SchedulerServer {
  /// 以显式网关与时钟构造调度器；配置错误在此处致命
  /// Construct the scheduler with an explicit gateway and clock;
  /// configuration errors are fatal here
  pub fn new(
    config: SchedulerConfig,
    gateway: Arc<dyn Gateway>,
    clock: Arc<dyn Clock>,
  ) -> Result<Self> {
    config.validate()?;
    let default_offset = config.server_opts.default_offset()?;
    let mut schedules = Vec::with_capacity(config.schedules.len());
    for (name, def) in &config.schedules {
      schedules.push(Schedule::from_def(name, def, default_offset)?);
    }
    let storage = Arc::new(Storage::new(
      gateway,
      config.storage_opts.key_space(),
      clock.clone(),
      default_offset,
    ));
    let id = format!(
      "{}:{}:{}",
      hostname::get().unwrap_or_default().to_string_lossy(),
      std::process::id(),
      Uuid::new_v4()
    );
    Ok(Self {
      id,
      schedules,
      storage,
      clock,
      config,
      ticker: Mutex::new(None),
    })
  }

  /// 生产构造：按配置连接 Redis，使用系统时钟
  /// Production constructor: connect to Redis per the configuration, with
  /// the system clock
  pub async fn connect(config: SchedulerConfig) -> Result<Self> {
    let gateway = Arc::new(RedisGateway::connect(config.redis.clone()).await?);
    Self::new(config, gateway, Arc::new(SystemClock))
  }

  /// 副本标识
  /// Replica identity
  pub fn id(&self) -> &str {
    &self.id
  }

  /// 存储层句柄
  /// Storage layer handle
  pub fn storage(&self) -> Arc<Storage> {
    self.storage.clone()
  }

  /// 引导时构造的日程
  /// Schedules built at bootstrap
  pub fn schedules(&self) -> &[Schedule] {
    &self.schedules
  }

  /// 启动：将配置的日程对账写入 Redis，然后启动 tick 循环
  /// Start: reconcile configured schedules into Redis, then start the tick
  /// loop
  ///
  /// Redis 中存在而配置中没有的定义保持原样；调度器不做垃圾回收。
  /// Definitions present in Redis but absent from the configuration are left
  /// in place; the scheduler does not garbage-collect.
  pub async fn start(&self) -> Result<()> {
    let mut guard = self.ticker.lock().await;
    if guard.is_some() {
      return Err(Error::SchedulerRunning);
    }

    for schedule in &self.schedules {
      self.storage.persist_schedule(schedule).await?;
    }

    let ticker = Arc::new(Ticker::new(
      self.storage.clone(),
      self.clock.clone(),
      self.schedules.clone(),
      TickerConfig {
        tick_interval: self.config.server_opts.tick_interval(),
        miss_window: self.config.server_opts.miss_window(),
      },
    ));
    let handle = ticker.clone().start();
    *guard = Some((ticker, handle));
    tracing::info!(
      "Scheduler {} started with {} schedule(s)",
      self.id,
      self.schedules.len()
    );
    Ok(())
  }

  /// 停止：中止 tick 间休眠，等待在途工作排空
  /// Stop: abort the inter-tick sleep and drain in-flight work
  pub async fn stop(&self) {
    let taken = { self.ticker.lock().await.take() };
    if let Some((ticker, handle)) = taken {
      ticker.shutdown();
      if let Err(err) = handle.await {
        tracing::error!(
          "Scheduler {}: ticker task failed on shutdown: {}",
          self.id,
          err
        );
      }
      tracing::info!("Scheduler {} stopped", self.id);
    }
  }
}
