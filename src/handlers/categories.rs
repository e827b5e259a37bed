use axum::{extract::State, http::StatusCode, response::Json};
use domain::catalog::{self, NewTaxon};
use model::entities::category;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::schemas::{ApiResponse, AppState, ErrorResponse, Paginated, SearchQuery};

/// Request body for creating a category
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateCategoryRequest {
    /// Display name (at most 256 characters)
    pub name: String,
    /// Unique identifier (letters, digits, `-` and `_`; at most 50 characters)
    pub slug: String,
}

/// Category response model
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub name: String,
    pub slug: String,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            name: model.name,
            slug: model.slug,
        }
    }
}

/// List categories
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "categories",
    params(SearchQuery),
    responses(
        (status = 200, description = "Categories retrieved successfully", body = ApiResponse<Paginated<CategoryResponse>>),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_categories(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<ApiResponse<Paginated<CategoryResponse>>>, ApiError> {
    trace!("Entering get_categories function");
    let page = state.page_request(query.page, query.limit);

    let found = catalog::list_categories(&state.db, query.search.as_deref(), page).await?;
    debug!("Retrieved {} of {} categories", found.items.len(), found.total);
    Ok(Json(ApiResponse::ok(
        Paginated::from_page(found, CategoryResponse::from),
        "Categories retrieved successfully",
    )))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Category created successfully", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
        (status = 409, description = "Slug already taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn create_category(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponse>>), ApiError> {
    trace!("Entering create_category function");
    let input = NewTaxon {
        name: request.name,
        slug: request.slug,
    };

    match catalog::create_category(&state.db, caller.principal(), input).await {
        Ok(created) => {
            info!("Category created successfully: {}", created.slug);
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok(
                    CategoryResponse::from(created),
                    "Category created successfully",
                )),
            ))
        }
        Err(e) => {
            warn!("Failed to create category: {}", e);
            Err(e.into())
        }
    }
}

/// Delete a category; its titles are kept without a category
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{slug}",
    tag = "categories",
    params(("slug" = String, Path, description = "Category slug")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Category deleted successfully"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Administrator privileges required", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn delete_category(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(slug): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    catalog::delete_category(&state.db, caller.principal(), &slug).await?;
    info!("Category {} deleted", slug);
    Ok(StatusCode::NO_CONTENT)
}
