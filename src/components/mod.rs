//! 组件生命周期模块
//! Component lifecycle module
//!
//! 提供通用的后台组件生命周期管理 trait
//! Provides a common trait for managing background components
//!
//! 调度器的后台工作（tick 循环）作为组件运行：启动返回 JoinHandle，
//! 关闭通过完成标志与通知异步传达，从而可以中止 tick 间的休眠。
//! The scheduler's background work (the tick loop) runs as a component:
//! start returns a JoinHandle, shutdown is signalled through a done flag and
//! a notification, so the inter-tick sleep can be aborted.

use std::sync::Arc;
use tokio::task::JoinHandle;

pub mod ticker;

/// 组件生命周期管理接口
/// Component lifecycle management interface
///
/// # 实现者 / Implementors
///
/// - [`Ticker`](ticker::Ticker) - 周期性展开日程并入队到期触发
///   - periodically expands schedules and enqueues due firings
pub trait ComponentLifecycle {
  /// 启动组件的后台任务，返回可等待的 JoinHandle
  /// Start the component's background task, returning an awaitable
  /// JoinHandle
  fn start(self: Arc<Self>) -> JoinHandle<()>;

  /// 发送关闭信号；组件完成当前操作后停止
  /// Send the shutdown signal; the component stops after finishing current
  /// operations
  fn shutdown(&self);

  /// 组件是否已收到关闭信号
  /// Whether the component has been signalled to stop
  fn is_done(&self) -> bool;
}
