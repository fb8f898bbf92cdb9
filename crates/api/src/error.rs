use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use foodshare_services::auth::AuthError;
use foodshare_services::dao::base::DaoError;
use foodshare_services::donations::ServiceError;
use foodshare_services::workflow::WorkflowError;
use serde::Serialize;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    TooManyRequests(String),
    Internal(String),
    Validation(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::TooManyRequests(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "too_many_requests", msg)
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Something went wrong".to_string(),
                )
            }
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DaoError> for ApiError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            DaoError::DuplicateKey(msg) => ApiError::Conflict(msg),
            DaoError::Store(msg) => ApiError::Internal(msg),
            DaoError::Mongo(e) => ApiError::Internal(e.to_string()),
            DaoError::BsonSer(e) => ApiError::Internal(e.to_string()),
            DaoError::BsonDe(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let message = err.user_message();
        match err {
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::InvalidToken(_) => ApiError::Unauthorized(message),
            AuthError::UserNotFound => ApiError::NotFound(message),
            AuthError::EmailInUse => ApiError::Conflict(message),
            AuthError::WeakPassword(_) | AuthError::Validation(_) => ApiError::Validation(message),
            AuthError::TooManyRequests { .. } => ApiError::TooManyRequests(message),
            AuthError::InvalidLink => ApiError::BadRequest(message),
            AuthError::Dao(e) => ApiError::from(e),
            AuthError::HashError(msg) | AuthError::Mail(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err {
            WorkflowError::WrongRole { .. }
            | WorkflowError::NotOwner
            | WorkflowError::NotClaimer => ApiError::Forbidden(message),
            WorkflowError::AlreadyClaimer | WorkflowError::InvalidTransition { .. } => {
                ApiError::Conflict(message)
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Dao(e) => e.into(),
            ServiceError::Workflow(e) => e.into(),
            ServiceError::Validation(msg) => ApiError::Validation(msg),
            ServiceError::Forbidden(msg) => ApiError::Forbidden(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
        }
    }
}
