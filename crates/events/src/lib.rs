//! Event queue abstraction: durable publish/consume with explicit
//! acknowledgment, plus an in-memory implementation for tests/dev.

pub mod in_memory;
pub mod queue;

pub use in_memory::InMemoryQueue;
pub use queue::{ConsumerHandle, EventQueue, QueueError, QueueHandler};
