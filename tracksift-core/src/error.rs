use thiserror::Error;
use tracksift_capture::CaptureError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Capture error: {0}")]
    CaptureError(#[from] CaptureError),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Replay error: {0}")]
    Replay(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
