pub mod account;
pub mod jobs;
pub mod params;

pub use account::AccountId;
