use thiserror::Error;
use uuid::Uuid;

pub type CadenceResult<T> = Result<T, CadenceError>;

#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown sequence: {0}")]
    SequenceNotFound(String),

    #[error("Invalid sequence definition: {0}")]
    InvalidSequence(String),

    #[error("Duplicate job id: {0}")]
    DuplicateJob(Uuid),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
