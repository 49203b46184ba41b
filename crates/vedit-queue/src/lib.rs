//! Job store for vedit.
//!
//! This crate provides:
//! - The `JobStore` interface: create, get, atomic record updates, FIFO dequeue,
//!   active listing and expiry
//! - `MemoryJobStore` for single-process runs and tests
//! - `RedisJobStore`: TTL'd JSON records, a list queue and compare-and-set updates

pub mod config;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use config::QueueConfig;
pub use error::{QueueError, QueueResult};
pub use memory::MemoryJobStore;
pub use redis_store::RedisJobStore;
pub use store::{JobStore, RecordMutation};
