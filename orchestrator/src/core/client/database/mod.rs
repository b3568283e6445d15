pub mod constant;
pub mod error;
pub mod memory;
pub mod repository;
pub mod rocksdb;

pub use error::DatabaseError;
pub use memory::InMemoryStore;
pub use repository::{JobRepository, KvJobRepository};
pub use self::rocksdb::RocksDbStore;

/// Byte oriented storage backing the repositories.
///
/// Writes are atomic per key; `compare_and_swap` is what repositories build optimistic concurrency on.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// get - Value stored under `key`
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DatabaseError>;

    /// exists - Whether `key` holds a value
    fn exists(&self, key: &[u8]) -> Result<bool, DatabaseError> {
        Ok(self.get(key)?.is_some())
    }

    /// create - Store `value`, failing with `ItemAlreadyExists` when the key is taken
    fn create(&self, key: &[u8], value: Vec<u8>) -> Result<(), DatabaseError>;

    /// update - Overwrite `value`, failing with `NotFound` when the key is absent
    fn update(&self, key: &[u8], value: Vec<u8>) -> Result<(), DatabaseError>;

    /// compare_and_swap - Replace the value only if it still equals `expected`
    fn compare_and_swap(&self, key: &[u8], expected: &[u8], value: Vec<u8>) -> Result<bool, DatabaseError>;

    /// scan_prefix - All key value pairs whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DatabaseError>;
}
