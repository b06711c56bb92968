//! Broker transports for the event queue abstraction.

pub mod redis_streams;

pub use redis_streams::RedisStreamsQueue;
