use crate::types::VALID_ENGINES;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid engine '{0}'. Must be one of: {engines}", engines = VALID_ENGINES.join(", "))]
    InvalidEngine(String),

    #[error("Render job not found: {0}")]
    JobNotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
