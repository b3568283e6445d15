pub mod database;
pub mod ethereum;
pub mod jobs;
pub mod notification;
pub mod substrate;

pub use database::{DatabaseBackend, DatabaseConfig};
pub use ethereum::EthereumConfig;
pub use jobs::{JobsConfig, StepPolicyConfig};
pub use notification::NotificationConfig;
pub use substrate::SubstrateConfig;
