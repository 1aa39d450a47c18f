use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum FeedServiceError {
    #[error("dependency error: {0}")]
    Dependency(String),
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<AppError> for FeedServiceError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::BadRequest(msg) => FeedServiceError::Invalid(msg),
            _ => FeedServiceError::Dependency(err.to_string()),
        }
    }
}

impl From<FeedServiceError> for AppError {
    fn from(err: FeedServiceError) -> Self {
        match err {
            FeedServiceError::Invalid(msg) => AppError::BadRequest(msg),
            FeedServiceError::Dependency(msg) => AppError::Internal(msg),
            FeedServiceError::Other(e) => AppError::Internal(e.to_string()),
        }
    }
}
