use thiserror::Error;

use super::model::TaskStatus;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Invalid article URL: {0}")]
    InvalidInput(String),

    #[error("Failed to fetch: {0}")]
    FetchFailure(String),

    #[error("No images found: {0}")]
    NoContentFound(String),

    #[error("image {}: {reason}", .index + 1)]
    ItemFailure { index: usize, reason: String },

    #[error("No image was downloaded, all {0} failed")]
    BatchFailed(usize),

    #[error("Failed to create archive: {0}")]
    PackagingFailure(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {task_id} is {actual}, expected {expected}")]
    InvalidState {
        task_id: String,
        expected: TaskStatus,
        actual: TaskStatus,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Background downloads unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
