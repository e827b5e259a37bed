use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use domain::DomainError;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::schemas::ErrorResponse;

/// Error type returned by every handler and extractor
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The request body could not be parsed
    #[error("{0}")]
    Body(String),

    /// A path parameter could not be parsed
    #[error("{0}")]
    Path(String),

    /// The query string could not be parsed
    #[error("{0}")]
    Query(String),

    /// The query string parsed but its values are out of range
    #[error("Invalid query parameters")]
    Invalid(#[from] ValidationErrors),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Path(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Query(rejection.body_text())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Body(_) | ApiError::Path(_) | ApiError::Query(_) | ApiError::Invalid(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            ApiError::Domain(err) => match err {
                DomainError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                DomainError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                DomainError::InvalidCredentials => {
                    (StatusCode::BAD_REQUEST, "INVALID_CONFIRMATION_CODE")
                }
                DomainError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "PERMISSION_DENIED"),
                DomainError::Unauthenticated => (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED"),
                DomainError::Delivery(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "EMAIL_DELIVERY_FAILED")
                }
                DomainError::Token(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TOKEN_ERROR"),
                DomainError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            },
        }
    }

    fn fields(&self) -> Option<BTreeMap<String, Vec<String>>> {
        let (field, message) = match self {
            ApiError::Invalid(errors) => return Some(field_messages(errors)),
            ApiError::Query(message) => ("query".to_string(), message.clone()),
            ApiError::Domain(DomainError::Validation { field, message }) => {
                (field.clone(), message.clone())
            }
            ApiError::Domain(DomainError::InvalidCredentials) => (
                "confirmation_code".to_string(),
                "Invalid confirmation code".to_string(),
            ),
            _ => return None,
        };
        Some(BTreeMap::from([(field, vec![message])]))
    }
}

fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errors)| {
            let messages = errors
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("failed the {} check", e.code),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();

        let message = if status.is_server_error() {
            error!(code, "Request failed: {}", self);
            match &self {
                ApiError::Domain(DomainError::Delivery(_)) => {
                    "The confirmation email could not be sent".to_string()
                }
                _ => "Internal server error".to_string(),
            }
        } else {
            warn!(code, "Request rejected: {}", self);
            self.to_string()
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            success: false,
            fields: self.fields(),
        };
        (status, Json(body)).into_response()
    }
}
