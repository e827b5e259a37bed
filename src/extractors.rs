//! Request extractors that report failures through [`ApiError`].

use axum::extract::{FromRequest, FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_valid::{Valid, ValidRejection};
use domain::{DomainError, Principal};
use serde::de::DeserializeOwned;
use tracing::trace;
use validator::Validate;

use crate::error::ApiError;
use crate::schemas::AppState;

/// JSON body whose parse failures become validation errors.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose parse failures become validation errors.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Validated query string. Parse and range failures become validation
/// errors listing the offending parameters.
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Valid::<Query<T>>::from_request_parts(parts, state).await {
            Ok(Valid(Query(value))) => Ok(ApiQuery(value)),
            Err(ValidRejection::Valid(errors)) => Err(errors.into()),
            Err(ValidRejection::Inner(rejection)) => Err(rejection.into()),
        }
    }
}

/// The caller identified by an `Authorization: Bearer <token>` header.
///
/// A request without the header is anonymous. A header that is present but
/// malformed, or carries an invalid or expired token, rejects the request.
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Principal>);

impl Caller {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            trace!("Anonymous request");
            return Ok(Caller(None));
        };

        let value = header.to_str().map_err(|_| DomainError::Unauthenticated)?;
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(DomainError::Unauthenticated)?;

        let principal = state.auth.authenticate(token)?;
        trace!(user_id = principal.id, "Authenticated request");
        Ok(Caller(Some(principal)))
    }
}
