use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage quota exceeded writing '{key}': {bytes} bytes over a {quota} byte quota")]
    QuotaExceeded { key: String, bytes: usize, quota: usize },

    #[error("Storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("Corrupt payload: {reason}")]
    CorruptPayload { reason: String },

    #[error("Save version mismatch: found v{found}, this build supports v{supported}")]
    VersionMismatch { found: u32, supported: u32 },

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SessionError {
    /// True for failures that happened while writing to the backing store.
    pub fn is_write_failure(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded { .. } | Self::StorageUnavailable { .. } | Self::Database(_)
        )
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
