use axum::{extract::State, http::StatusCode, response::Json};
use domain::users::{self, NewUser, UserChanges};
use model::Role;
use model::entities::user;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::schemas::{ApiResponse, AppState, Paginated, SearchQuery};

/// Request body for creating a user directly
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateUserRequest {
    /// Username (must be unique)
    pub username: String,
    /// Email (must be unique)
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    /// Role (default: user)
    pub role: Option<Role>,
}

impl From<CreateUserRequest> for NewUser {
    fn from(request: CreateUserRequest) -> Self {
        Self {
            username: request.username,
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            bio: request.bio,
            role: request.role,
        }
    }
}

/// Request body for updating a user; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    /// Only honoured for superusers on `/users/me`
    pub role: Option<Role>,
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(request: UpdateUserRequest) -> Self {
        Self {
            username: request.username,
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            bio: request.bio,
            role: request.role,
        }
    }
}

/// User response model
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            bio: model.bio,
            role: model.role,
        }
    }
}

/// List users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(SearchQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Paginated<UserResponse>>),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn get_users(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<ApiResponse<Paginated<UserResponse>>>, ApiError> {
    trace!("Entering get_users function");
    let page = state.page_request(query.page, query.limit);

    match users::list_users(&state.db, caller.principal(), query.search.as_deref(), page).await {
        Ok(found) => {
            debug!("Retrieved {} of {} users", found.items.len(), found.total);
            Ok(Json(ApiResponse::ok(
                Paginated::from_page(found, UserResponse::from),
                "Users retrieved successfully",
            )))
        }
        Err(e) => {
            warn!("Failed to list users: {}", e);
            Err(e.into())
        }
    }
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Username or email already taken", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller, request))]
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    trace!("Entering create_user function");
    debug!("Creating user with username: {}", request.username);

    let created = users::create_user(&state.db, caller.principal(), request.into()).await?;
    info!("User created successfully: {}", created.username);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserResponse::from(created), "User created successfully")),
    ))
}

/// Get a user by username
#[utoipa::path(
    get,
    path = "/api/v1/users/{username}",
    tag = "users",
    params(("username" = String, Path, description = "Username")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 403, description = "Administrator privileges required", body = crate::schemas::ErrorResponse),
        (status = 404, description = "User not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(username): ApiPath<String>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let found = users::get_user(&state.db, caller.principal(), &username).await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(found), "User retrieved successfully")))
}

/// Update a user
#[utoipa::path(
    patch,
    path = "/api/v1/users/{username}",
    tag = "users",
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Not allowed", body = crate::schemas::ErrorResponse),
        (status = 404, description = "User not found", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Username or email already taken", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller, request))]
pub async fn update_user(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(username): ApiPath<String>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering update_user function for {}", username);

    match users::update_user(&state.db, caller.principal(), &username, request.into()).await {
        Ok(updated) => {
            info!("User {} updated", username);
            Ok(Json(ApiResponse::ok(UserResponse::from(updated), "User updated successfully")))
        }
        Err(e) => {
            warn!("Failed to update user {}: {}", username, e);
            Err(e.into())
        }
    }
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{username}",
    tag = "users",
    params(("username" = String, Path, description = "Username")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "User deleted successfully"),
        (status = 403, description = "Not allowed", body = crate::schemas::ErrorResponse),
        (status = 404, description = "User not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(username): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    match users::delete_user(&state.db, caller.principal(), &username).await {
        Ok(()) => {
            info!("User {} deleted", username);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            error!("Failed to delete user {}: {}", username, e);
            Err(e.into())
        }
    }
}

/// Get the caller's own profile
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn get_me(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let me = users::get_profile(&state.db, caller.principal()).await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(me), "Profile retrieved successfully")))
}

/// Update the caller's own profile
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    tag = "users",
    request_body = UpdateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Username or email already taken", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller, request))]
pub async fn update_me(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    trace!("Entering update_me function");
    let updated = users::update_profile(&state.db, caller.principal(), request.into()).await?;
    debug!("Profile of {} updated", updated.username);
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "Profile updated successfully")))
}
