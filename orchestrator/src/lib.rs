pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod types;
pub mod utils;
pub mod worker;


// Re-export commonly used item
pub use context::{AppContext, ChainClients};
pub use error::{OrchestratorError, OrchestratorResult};
