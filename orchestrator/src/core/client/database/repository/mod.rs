mod job;

pub use job::{JobRepository, KvJobRepository};

#[cfg(test)]
pub use job::MockJobRepository;
