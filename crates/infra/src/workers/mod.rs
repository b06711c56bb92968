//! Background workers driven by the event queue.

pub mod order_consumer;

pub use order_consumer::OrderConsumer;
