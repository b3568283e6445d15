use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Item already exists: {0}")]
    ItemAlreadyExists(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    BackendError(String),
}

impl From<::rocksdb::Error> for DatabaseError {
    fn from(err: ::rocksdb::Error) -> Self {
        DatabaseError::BackendError(err.into_string())
    }
}
