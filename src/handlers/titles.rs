use axum::{extract::State, http::StatusCode, response::Json};
use domain::catalog::{self, NewTitle, TitleChanges, TitleDetails, TitleFilter};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::categories::CategoryResponse;
use super::genres::GenreResponse;
use crate::error::ApiError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::schemas::{ApiResponse, AppState, Paginated};

/// Query parameters for listing titles
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct TitleQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: configured page size, at most 100)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Category slug
    pub category: Option<String>,
    /// Genre slug
    pub genre: Option<String>,
    /// Case-insensitive substring of the title name
    pub name: Option<String>,
    /// Exact release year
    pub year: Option<i32>,
}

/// Request body for creating a title
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateTitleRequest {
    pub name: String,
    /// Release year, not later than the current year
    pub year: i32,
    pub description: Option<String>,
    /// Genre slugs
    #[serde(default)]
    pub genre: Vec<String>,
    /// Category slug
    pub category: Option<String>,
}

/// Request body for updating a title; absent fields are left unchanged and
/// `null` clears `description` or `category`
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateTitleRequest {
    pub name: Option<String>,
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    /// Replaces the full genre set
    pub genre: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub category: Option<Option<String>>,
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Title response model
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TitleResponse {
    pub id: i32,
    pub name: String,
    pub year: i32,
    /// Mean review score, null without reviews
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<GenreResponse>,
    pub category: Option<CategoryResponse>,
}

impl From<TitleDetails> for TitleResponse {
    fn from(details: TitleDetails) -> Self {
        Self {
            id: details.title.id,
            name: details.title.name,
            year: details.title.year,
            rating: details.rating,
            description: details.title.description,
            genre: details.genres.into_iter().map(GenreResponse::from).collect(),
            category: details.category.map(CategoryResponse::from),
        }
    }
}

/// List titles
#[utoipa::path(
    get,
    path = "/api/v1/titles",
    tag = "titles",
    params(TitleQuery),
    responses(
        (status = 200, description = "Titles retrieved successfully", body = ApiResponse<Paginated<TitleResponse>>),
        (status = 400, description = "Invalid query", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_titles(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TitleQuery>,
) -> Result<Json<ApiResponse<Paginated<TitleResponse>>>, ApiError> {
    trace!("Entering get_titles function");
    let page = state.page_request(query.page, query.limit);
    let filter = TitleFilter {
        category: query.category,
        genre: query.genre,
        name: query.name,
        year: query.year,
    };

    match catalog::list_titles(&state.db, filter, page).await {
        Ok(found) => {
            debug!("Retrieved {} of {} titles", found.items.len(), found.total);
            Ok(Json(ApiResponse::ok(
                Paginated::from_page(found, TitleResponse::from),
                "Titles retrieved successfully",
            )))
        }
        Err(e) => {
            error!("Failed to list titles: {}", e);
            Err(e.into())
        }
    }
}

/// Create a title
#[utoipa::path(
    post,
    path = "/api/v1/titles",
    tag = "titles",
    request_body = CreateTitleRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Title created successfully", body = ApiResponse<TitleResponse>),
        (status = 400, description = "Invalid request or unknown slug", body = crate::schemas::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn create_title(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateTitleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TitleResponse>>), ApiError> {
    trace!("Entering create_title function");
    let input = NewTitle {
        name: request.name,
        year: request.year,
        description: request.description,
        genres: request.genre,
        category: request.category,
    };

    match catalog::create_title(&state.db, caller.principal(), input).await {
        Ok(created) => {
            info!("Title created successfully with ID: {}", created.title.id);
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok(TitleResponse::from(created), "Title created successfully")),
            ))
        }
        Err(e) => {
            warn!("Failed to create title: {}", e);
            Err(e.into())
        }
    }
}

/// Get a title with its rating
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}",
    tag = "titles",
    params(("title_id" = i32, Path, description = "Title ID")),
    responses(
        (status = 200, description = "Title retrieved successfully", body = ApiResponse<TitleResponse>),
        (status = 404, description = "Title not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_title(
    State(state): State<AppState>,
    ApiPath(title_id): ApiPath<i32>,
) -> Result<Json<ApiResponse<TitleResponse>>, ApiError> {
    let found = catalog::get_title(&state.db, title_id).await?;
    Ok(Json(ApiResponse::ok(TitleResponse::from(found), "Title retrieved successfully")))
}

/// Update a title
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}",
    tag = "titles",
    params(("title_id" = i32, Path, description = "Title ID")),
    request_body = UpdateTitleRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Title updated successfully", body = ApiResponse<TitleResponse>),
        (status = 400, description = "Invalid request or unknown slug", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Title not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn update_title(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(title_id): ApiPath<i32>,
    ApiJson(request): ApiJson<UpdateTitleRequest>,
) -> Result<Json<ApiResponse<TitleResponse>>, ApiError> {
    let changes = TitleChanges {
        name: request.name,
        year: request.year,
        description: request.description,
        genres: request.genre,
        category: request.category,
    };

    let updated = catalog::update_title(&state.db, caller.principal(), title_id, changes).await?;
    info!("Title {} updated", title_id);
    Ok(Json(ApiResponse::ok(TitleResponse::from(updated), "Title updated successfully")))
}

/// Delete a title together with its reviews and comments
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}",
    tag = "titles",
    params(("title_id" = i32, Path, description = "Title ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Title deleted successfully"),
        (status = 403, description = "Administrator privileges required", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Title not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn delete_title(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(title_id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    catalog::delete_title(&state.db, caller.principal(), title_id).await?;
    info!("Title {} deleted", title_id);
    Ok(StatusCode::NO_CONTENT)
}
