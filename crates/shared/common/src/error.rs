//! Unified error handling for HTTP and gRPC.
//!
//! Provides a single error type that can be converted to:
//! - Axum HTTP responses (for the gateway and the direct REST API)
//! - Tonic gRPC status codes (for the user service)

use std::sync::Arc;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;
use thiserror::Error;
use tonic::{metadata::MetadataMap, Status};

/// Header / metadata key carrying the admitted request count.
pub const HEADER_RATE_LIMIT: &str = "x-ratelimit-limit";

/// Header / metadata key carrying the remaining request count.
pub const HEADER_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Header / metadata key carrying the sustained rate (requests per second).
pub const HEADER_RATE_LIMIT_RATE: &str = "x-ratelimit-rate";

/// Header / metadata key carrying the suggested back-off.
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Limit parameters reported with a rate limit denial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitInfo {
    /// Requests admitted per period (window quota or bucket capacity)
    pub limit: u64,
    /// Sustained requests per second
    pub rate_per_second: u64,
    /// Suggested wait before retrying, in seconds
    pub retry_after_seconds: u64,
}

impl RateLimitInfo {
    /// Attach the limit parameters to gRPC metadata.
    pub fn write_metadata(&self, metadata: &mut MetadataMap) {
        metadata.insert(HEADER_RATE_LIMIT, self.limit.into());
        metadata.insert(HEADER_RATE_LIMIT_RATE, self.rate_per_second.into());
        metadata.insert(HEADER_RETRY_AFTER, self.retry_after_seconds.into());
    }

    /// Read limit parameters back from gRPC metadata.
    pub fn from_metadata(metadata: &MetadataMap) -> Option<Self> {
        let read = |key: &str| -> Option<u64> { metadata.get(key)?.to_str().ok()?.parse().ok() };

        Some(Self {
            limit: read(HEADER_RATE_LIMIT)?,
            rate_per_second: read(HEADER_RATE_LIMIT_RATE).unwrap_or_default(),
            retry_after_seconds: read(HEADER_RETRY_AFTER).unwrap_or(1),
        })
    }
}

/// Application error types with support for both HTTP and gRPC.
#[derive(Error, Debug)]
pub enum AppError {
    // Resource errors
    #[error("Resource not found")]
    NotFound,

    #[error("{0} already exists")]
    Conflict(String),

    // Validation
    #[error("{0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    BadRequest(String),

    // Rate limiting
    #[error("Too many requests")]
    TooManyRequests(RateLimitInfo),

    // External service errors
    #[cfg(feature = "database")]
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    #[cfg(feature = "cache")]
    #[error("Cache error")]
    Cache(#[from] redis::RedisError),

    // gRPC specific
    #[error("Service unavailable")]
    ServiceUnavailable(String),

    #[error("gRPC error: {0}")]
    Grpc(String),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

/// Error response body for HTTP
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::TooManyRequests(_) => "RESOURCE_EXHAUSTED",
            #[cfg(feature = "database")]
            AppError::Database(_) => "DATABASE_ERROR",
            #[cfg(feature = "cache")]
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Grpc(_) => "GRPC_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            // Show full message for client errors
            AppError::Validation(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Conflict(msg) => {
                // Avoid duplicating "already exists" when converted from gRPC
                if msg.ends_with("already exists") {
                    msg.clone()
                } else {
                    format!("{} already exists", msg)
                }
            }
            AppError::TooManyRequests(info) => format!(
                "Too many requests. Limit is {} requests at {} per second; retry after {}s",
                info.limit, info.rate_per_second, info.retry_after_seconds
            ),

            // Hide details for internal errors
            #[cfg(feature = "database")]
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            }
            #[cfg(feature = "cache")]
            AppError::Cache(e) => {
                tracing::error!("Cache error: {:?}", e);
                "A cache error occurred".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }
            AppError::ServiceUnavailable(service) => {
                tracing::error!("Service unavailable: {}", service);
                format!("Service {} is unavailable", service)
            }
            AppError::Grpc(msg) => {
                tracing::error!("gRPC error: {}", msg);
                "A service communication error occurred".to_string()
            }

            // Use default message for others
            _ => self.to_string(),
        }
    }

    /// Produce an equivalent error of the same kind.
    ///
    /// Used when one failure has to be handed to several callers.
    pub fn replicate(&self) -> AppError {
        match self {
            AppError::NotFound => AppError::NotFound,
            AppError::Conflict(msg) => AppError::Conflict(msg.clone()),
            AppError::Validation(msg) => AppError::Validation(msg.clone()),
            AppError::BadRequest(msg) => AppError::BadRequest(msg.clone()),
            AppError::TooManyRequests(info) => AppError::TooManyRequests(*info),
            #[cfg(feature = "database")]
            AppError::Database(e) => AppError::Database(sea_orm::DbErr::Custom(e.to_string())),
            #[cfg(feature = "cache")]
            AppError::Cache(e) => AppError::Cache(redis::RedisError::from((
                e.kind(),
                "replicated cache error",
                e.to_string(),
            ))),
            AppError::ServiceUnavailable(service) => AppError::ServiceUnavailable(service.clone()),
            AppError::Grpc(msg) => AppError::Grpc(msg.clone()),
            AppError::Internal(msg) => AppError::Internal(msg.clone()),
        }
    }

    /// Take ownership of a shared error, replicating it if still shared.
    pub fn from_shared(shared: Arc<AppError>) -> AppError {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| shared.replicate())
    }
}

// =============================================================================
// HTTP Response (Axum)
// =============================================================================

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let limit_info = match &self {
            AppError::TooManyRequests(info) => Some(*info),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message: self.user_message(),
            },
        };

        let mut response = (status, Json(body)).into_response();

        if let Some(info) = limit_info {
            let headers = response.headers_mut();
            headers.insert(HEADER_RETRY_AFTER, HeaderValue::from(info.retry_after_seconds));
            headers.insert(HEADER_RATE_LIMIT, HeaderValue::from(info.limit));
            headers.insert(HEADER_RATE_LIMIT_REMAINING, HeaderValue::from_static("0"));
        }

        response
    }
}

// =============================================================================
// gRPC Status (Tonic)
// =============================================================================

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        let code = match &err {
            AppError::NotFound => tonic::Code::NotFound,
            AppError::Conflict(_) => tonic::Code::AlreadyExists,
            AppError::Validation(_) | AppError::BadRequest(_) => tonic::Code::InvalidArgument,
            AppError::TooManyRequests(_) => tonic::Code::ResourceExhausted,
            AppError::ServiceUnavailable(_) => tonic::Code::Unavailable,
            _ => tonic::Code::Internal,
        };

        let mut status = Status::new(code, err.user_message());
        if let AppError::TooManyRequests(info) = &err {
            info.write_metadata(status.metadata_mut());
        }
        status
    }
}

impl From<Status> for AppError {
    fn from(status: Status) -> Self {
        match status.code() {
            tonic::Code::NotFound => AppError::NotFound,
            tonic::Code::AlreadyExists => AppError::Conflict(status.message().to_string()),
            tonic::Code::InvalidArgument => AppError::Validation(status.message().to_string()),
            tonic::Code::ResourceExhausted => AppError::TooManyRequests(
                RateLimitInfo::from_metadata(status.metadata()).unwrap_or_default(),
            ),
            tonic::Code::Unavailable => AppError::ServiceUnavailable(status.message().to_string()),
            _ => AppError::Grpc(status.message().to_string()),
        }
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => AppError::Validation(msg),
            DomainError::NotFound(_) => AppError::NotFound,
            DomainError::Conflict(msg) => AppError::Conflict(msg),
            DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    pub fn conflict(entity: impl Into<String>) -> Self {
        AppError::Conflict(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn grpc(msg: impl Into<String>) -> Self {
        AppError::Grpc(msg.into())
    }

    pub fn service_unavailable(service: impl Into<String>) -> Self {
        AppError::ServiceUnavailable(service.into())
    }
}
