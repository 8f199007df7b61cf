/// Error types for post-service
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Cache failures are logged by the service and never returned to callers.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Event bus failures are logged by the service and never returned to callers.
    #[error("Event bus error: {0}")]
    EventBus(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// gRPC status code as a decimal string, used as a metrics label.
    pub fn grpc_code(&self) -> &'static str {
        match self {
            ServiceError::InvalidArgument(_) => "3",
            ServiceError::NotFound(_) => "5",
            ServiceError::AlreadyExists(_) => "6",
            _ => "13",
        }
    }
}

/// Convert ServiceError to tonic::Status for gRPC responses
impl From<ServiceError> for tonic::Status {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
            ServiceError::NotFound(msg) => tonic::Status::not_found(msg),
            ServiceError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ServiceError::Database(e) => {
                tracing::error!(error = %e, "database operation failed");
                tonic::Status::internal("Database operation failed")
            }
            ServiceError::Serialization(e) => {
                tracing::error!(error = %e, "serialization failed");
                tonic::Status::internal("Serialization failed")
            }
            other => {
                tracing::error!(error = %other, "internal error");
                tonic::Status::internal("Internal server error")
            }
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;
