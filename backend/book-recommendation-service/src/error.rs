use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Service not ready: {0}")]
    NotReady(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("None of the requested books were found: {}", .0.join(", "))]
    SeedsNotFound(Vec<String>),

    #[error("No recommendations could be generated: {0}")]
    NoCandidates(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No valid content found for books")]
    NoContent,

    #[error("Model training failed: {0}")]
    Training(String),

    #[error("Model training already in progress")]
    TrainingInProgress,

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Conditions a caller can resolve by waiting (or triggering a retrain) and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::NotReady(_) | AppError::TrainingInProgress)
    }
}

// Implement conversions from other error types
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::DataSource(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
