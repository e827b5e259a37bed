use axum::{extract::State, http::StatusCode, response::Json};
use domain::catalog::{self, NewTaxon};
use model::entities::genre;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::schemas::{ApiResponse, AppState, Paginated, SearchQuery};

/// Request body for creating a genre
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateGenreRequest {
    /// Display name (at most 256 characters)
    pub name: String,
    /// Unique identifier (letters, digits, `-` and `_`; at most 50 characters)
    pub slug: String,
}

/// Genre response model
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct GenreResponse {
    pub name: String,
    pub slug: String,
}

impl From<genre::Model> for GenreResponse {
    fn from(model: genre::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

/// List genres
#[utoipa::path(
    get,
    path = "/api/v1/genres",
    tag = "genres",
    params(SearchQuery),
    responses(
        (status = 200, description = "Genres retrieved successfully", body = ApiResponse<Paginated<GenreResponse>>),
        (status = 400, description = "Invalid query", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_genres(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<ApiResponse<Paginated<GenreResponse>>>, ApiError> {
    let page = state.page_request(query.page, query.limit);

    match catalog::list_genres(&state.db, query.search.as_deref(), page).await {
        Ok(found) => {
            debug!("Retrieved {} of {} genres", found.items.len(), found.total);
            Ok(Json(ApiResponse::ok(
                Paginated::from_page(found, GenreResponse::from),
                "Genres retrieved successfully",
            )))
        }
        Err(e) => {
            warn!("Failed to list genres: {}", e);
            Err(e.into())
        }
    }
}

/// Create a genre
#[utoipa::path(
    post,
    path = "/api/v1/genres",
    tag = "genres",
    request_body = CreateGenreRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Genre created successfully", body = ApiResponse<GenreResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Slug already taken", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn create_genre(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateGenreRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GenreResponse>>), ApiError> {
    debug!("Creating genre with slug: {}", request.slug);
    let created = catalog::create_genre(
        &state.db,
        caller.principal(),
        NewTaxon {
            name: request.name,
            slug: request.slug,
        },
    )
    .await?;

    info!("Genre created successfully: {}", created.slug);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(GenreResponse::from(created), "Genre created successfully")),
    ))
}

/// Delete a genre; titles lose the genre but are otherwise untouched
#[utoipa::path(
    delete,
    path = "/api/v1/genres/{slug}",
    tag = "genres",
    params(("slug" = String, Path, description = "Genre slug")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Genre deleted successfully"),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Genre not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn delete_genre(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(slug): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    catalog::delete_genre(&state.db, caller.principal(), &slug).await?;
    info!("Genre {} deleted", slug);
    Ok(StatusCode::NO_CONTENT)
}
