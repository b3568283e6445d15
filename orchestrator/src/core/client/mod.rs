// Client abstractions module - contains all client interface traits

pub mod database;
pub mod lock;
pub mod notification;

// Re-export commonly used types
pub use database::{InMemoryStore, KeyValueStore, RocksDbStore};
pub use lock::JobLocks;
pub use notification::{NotificationSender, WebhookSender};
