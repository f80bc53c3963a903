//! Redis 网关模块
//! Redis gateway module
//!
//! [`Gateway`](crate::base::Gateway) 的 Redis 实现
//! The Redis implementation of [`Gateway`](crate::base::Gateway)

mod gateway;

pub use gateway::RedisGateway;
