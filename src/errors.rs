use crate::config::ConfigError;
use crate::stores::BackendKind;

/// Errors returned by the session stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage quota exceeded: {bytes} bytes (limit {limit})")]
    QuotaExceeded { bytes: usize, limit: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Local storage is not available")]
    LocalStorageUnavailable,

    #[error("Switching from {from} to {to} failed: {source}")]
    SwitchFailed {
        from: BackendKind,
        to: BackendKind,
        source: Box<StoreError>,
    },

    #[error("Store has been destroyed")]
    Destroyed,
}

/// Raised by a storage medium (storage area or cookie jar) when a write does not fit.
///
/// Media return it wrapped in an `anyhow::Error`; the stores turn it back into
/// [`StoreError::QuotaExceeded`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("quota exceeded: {bytes} bytes (limit {limit})")]
pub struct QuotaExceeded {
    pub bytes: usize,
    pub limit: usize,
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<QuotaExceeded>() {
            Some(q) => StoreError::QuotaExceeded {
                bytes: q.bytes,
                limit: q.limit,
            },
            None => StoreError::Storage(err),
        }
    }
}
