use std::time::Duration;

/// 默认队列名称
pub const DEFAULT_QUEUE_NAME: &str = "default";

/// 默认调度器命名空间（调度器自有状态的键前缀）
/// Default scheduler namespace (key prefix for scheduler-owned state)
pub const DEFAULT_SCHEDULER_NAMESPACE: &str = "cronq";

/// 默认工作者命名空间（与下游工作者共享的队列 / 锁键前缀）
/// Default worker namespace (queue / lock key prefix shared with workers)
pub const DEFAULT_WORKER_NAMESPACE: &str = "";

/// 默认补偿窗口（毫秒）
/// Default miss window (milliseconds)
pub const DEFAULT_MISS_WINDOW_MS: u64 = 100_000;

/// 默认 tick 周期
/// Default tick interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// 版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
