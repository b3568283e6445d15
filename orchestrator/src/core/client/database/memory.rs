use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{DatabaseError, KeyValueStore};

/// Process local store, used by default and in tests.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> DatabaseError {
        DatabaseError::BackendError("in-memory store lock poisoned".to_string())
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DatabaseError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn create(&self, key: &[u8], value: Vec<u8>) -> Result<(), DatabaseError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        if entries.contains_key(key) {
            return Err(DatabaseError::ItemAlreadyExists(hex::encode(key)));
        }
        entries.insert(key.to_vec(), value);
        Ok(())
    }

    fn update(&self, key: &[u8], value: Vec<u8>) -> Result<(), DatabaseError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        match entries.get_mut(key) {
            Some(current) => {
                *current = value;
                Ok(())
            }
            None => Err(DatabaseError::NotFound(hex::encode(key))),
        }
    }

    fn compare_and_swap(&self, key: &[u8], expected: &[u8], value: Vec<u8>) -> Result<bool, DatabaseError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        match entries.get_mut(key) {
            Some(current) if current.as_slice() == expected => {
                *current = value;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DatabaseError::NotFound(hex::encode(key))),
        }
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DatabaseError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
