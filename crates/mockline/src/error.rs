//! Errors surfaced by administrative engine operations.

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The submitted rule is incomplete or malformed. Nothing was changed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No rule with this id exists in the store.
    #[error("Stub not found with id: {0}")]
    NotFound(i64),

    /// The store rejected the operation. The match index was not touched.
    #[error("Persistence failure: {0}")]
    Store(#[from] StoreError),

    /// The engine has not been started or has been stopped.
    #[error("Stub engine is not running")]
    NotRunning,
}

impl EngineError {
    /// HTTP status the admin API reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Validation(_) => 400,
            EngineError::NotFound(_) => 404,
            EngineError::Store(StoreError::Conflict(_)) => 409,
            EngineError::Store(_) => 500,
            EngineError::NotRunning => 409,
        }
    }
}
