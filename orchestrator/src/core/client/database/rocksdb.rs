use std::path::Path;
use std::sync::Mutex;

use ::rocksdb::{Direction, IteratorMode, Options, DB};
use tracing::info;

use super::{DatabaseError, KeyValueStore};

/// RocksDB backed store.
///
/// RocksDB has no conditional put, so `create`, `update` and `compare_and_swap` run under a write mutex
/// to make their read-then-write atomic within the process that owns the database.
pub struct RocksDbStore {
    db: DB,
    write_lock: Mutex<()>,
}

impl RocksDbStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        info!(path = %path.display(), "Opened job database");
        Ok(Self { db, write_lock: Mutex::new(()) })
    }

    fn write_guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, DatabaseError> {
        self.write_lock.lock().map_err(|_| DatabaseError::BackendError("rocksdb write lock poisoned".to_string()))
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DatabaseError> {
        Ok(self.db.get(key)?)
    }

    fn create(&self, key: &[u8], value: Vec<u8>) -> Result<(), DatabaseError> {
        let _guard = self.write_guard()?;
        if self.db.get_pinned(key)?.is_some() {
            return Err(DatabaseError::ItemAlreadyExists(hex::encode(key)));
        }
        Ok(self.db.put(key, value)?)
    }

    fn update(&self, key: &[u8], value: Vec<u8>) -> Result<(), DatabaseError> {
        let _guard = self.write_guard()?;
        if self.db.get_pinned(key)?.is_none() {
            return Err(DatabaseError::NotFound(hex::encode(key)));
        }
        Ok(self.db.put(key, value)?)
    }

    fn compare_and_swap(&self, key: &[u8], expected: &[u8], value: Vec<u8>) -> Result<bool, DatabaseError> {
        let _guard = self.write_guard()?;
        match self.db.get_pinned(key)? {
            Some(current) if current.as_ref() == expected => {
                self.db.put(key, value)?;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DatabaseError::NotFound(hex::encode(key))),
        }
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DatabaseError> {
        let mut entries = Vec::new();
        for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}
