use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Invalid filter policy: {0}")]
    Policy(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
