/// Error types for student-query-service
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Failed to decode student event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Student not found: {0}")]
    StudentNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether processing the same message again could succeed.
    ///
    /// A missing student may show up once a delayed CreateStudent lands, and
    /// pool exhaustion or dropped connections clear up on their own. A payload
    /// that failed to decode will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::StudentNotFound(_) => true,
            ServiceError::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            ServiceError::Kafka(_) => true,
            ServiceError::Decode(_) | ServiceError::Internal(_) => false,
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::StudentNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Decode(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_retryable() {
        assert!(ServiceError::StudentNotFound("S1".to_string()).is_retryable());
    }

    #[test]
    fn test_decode_error_is_not_retryable() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(!ServiceError::from(err).is_retryable());
    }

    #[test]
    fn test_pool_timeout_is_retryable() {
        assert!(ServiceError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!ServiceError::Database(sqlx::Error::RowNotFound).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServiceError::StudentNotFound("S1".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
