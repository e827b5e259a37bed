use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::extractors::ApiJson;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for signing up
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SignUpRequest {
    /// Desired username (letters, digits and `.@+-_`; not `me`)
    pub username: String,
    /// Address the confirmation code is sent to
    pub email: String,
}

/// Echo of an accepted signup
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SignUpResponse {
    pub username: String,
    pub email: String,
}

/// Request body for exchanging a confirmation code
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TokenRequest {
    pub username: String,
    /// Code received by email
    pub confirmation_code: String,
}

/// Access token
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TokenResponse {
    /// Bearer token for the `Authorization` header
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Register (or re-register) and receive a confirmation code by email
#[utoipa::path(
    post,
    path = "/api/v1/auth/signup",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "Confirmation code sent", body = ApiResponse<SignUpResponse>),
        (status = 400, description = "Invalid username or email", body = ErrorResponse),
        (status = 409, description = "Username or email belongs to another account", body = ErrorResponse),
        (status = 503, description = "Confirmation email could not be sent", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn sign_up(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SignUpRequest>,
) -> Result<Json<ApiResponse<SignUpResponse>>, ApiError> {
    trace!("Entering sign_up function");

    match state
        .auth
        .request_sign_up(&state.db, &request.username, &request.email)
        .await
    {
        Ok(signup) => {
            info!("Signup accepted for {}", signup.username);
            Ok(Json(ApiResponse::ok(
                SignUpResponse {
                    username: signup.username,
                    email: signup.email,
                },
                "Confirmation code sent",
            )))
        }
        Err(e) => {
            warn!("Signup for '{}' failed: {}", request.username, e);
            Err(e.into())
        }
    }
}

/// Exchange a confirmation code for an access token
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Invalid confirmation code", body = ErrorResponse),
        (status = 404, description = "Unknown username", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn obtain_token(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<TokenRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>, ApiError> {
    trace!("Entering obtain_token function");

    let issued = state
        .auth
        .exchange_token(&state.db, &request.username, &request.confirmation_code)
        .await?;
    debug!("Token for {} expires at {}", request.username, issued.expires_at);

    Ok(Json(ApiResponse::ok(
        TokenResponse {
            token: issued.token,
            expires_at: issued.expires_at,
        },
        "Token issued",
    )))
}
