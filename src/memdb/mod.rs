//! 内存网关模块
//! Memory gateway module
//!
//! [`Gateway`](crate::base::Gateway) 的内存实现，不依赖任何外部服务。
//! 主要用于测试：多个调度器副本可以共享同一个实例，从而在进程内
//! 复现跨副本的去重竞争。
//! The in-memory implementation of [`Gateway`](crate::base::Gateway), with no
//! external service dependencies. Used primarily in tests: several scheduler
//! replicas can share one instance, reproducing the cross-replica dedup race
//! in-process.

mod memory_gateway;

pub use memory_gateway::{MemoryGateway, MemoryStore};
