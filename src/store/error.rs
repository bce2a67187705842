use crate::error::DispatchError;

/// Errors raised by the storage actor and its client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Storage actor closed")]
    ActorClosed,
    #[error("Storage actor dropped response channel")]
    ActorDropped,
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => DispatchError::NotFound(format!("resource not found: {id}")),
            StoreError::AlreadyExists(id) => DispatchError::Conflict(format!("resource already exists: {id}")),
            StoreError::ActorClosed | StoreError::ActorDropped => DispatchError::Internal(err.to_string()),
        }
    }
}
