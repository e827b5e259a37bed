use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use domain::reviews::{self, NewReview, ReviewChanges, ReviewDetails};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::schemas::{ApiResponse, AppState, PageQuery, Paginated};

/// Request body for reviewing a title
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateReviewRequest {
    pub text: String,
    /// Score from 1 to 10
    pub score: i32,
}

/// Request body for editing a review
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateReviewRequest {
    pub text: Option<String>,
    /// Score from 1 to 10
    pub score: Option<i32>,
}

/// Review response model
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub id: i32,
    pub text: String,
    /// Username of the author
    pub author: String,
    pub score: i32,
    pub pub_date: DateTime<Utc>,
}

impl From<ReviewDetails> for ReviewResponse {
    fn from(details: ReviewDetails) -> Self {
        Self {
            id: details.review.id,
            text: details.review.text,
            author: details.author,
            score: details.review.score,
            pub_date: details.review.pub_date,
        }
    }
}

/// List reviews of a title
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews",
    tag = "reviews",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "Reviews retrieved successfully", body = ApiResponse<Paginated<ReviewResponse>>),
        (status = 404, description = "Title not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_reviews(
    State(state): State<AppState>,
    ApiPath(title_id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Paginated<ReviewResponse>>>, ApiError> {
    trace!("Entering get_reviews function for title {}", title_id);
    let page = state.page_request(query.page, query.limit);

    let found = reviews::list_reviews(&state.db, title_id, page).await?;
    debug!("Retrieved {} of {} reviews", found.items.len(), found.total);
    Ok(Json(ApiResponse::ok(
        Paginated::from_page(found, ReviewResponse::from),
        "Reviews retrieved successfully",
    )))
}

/// Review a title; each user may review a title once
#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews",
    tag = "reviews",
    params(("title_id" = i32, Path, description = "Title ID")),
    request_body = CreateReviewRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Review created successfully", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Title not found", body = crate::schemas::ErrorResponse),
        (status = 409, description = "Title already reviewed by this user", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller, request))]
pub async fn create_review(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(title_id): ApiPath<i32>,
    ApiJson(request): ApiJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReviewResponse>>), ApiError> {
    trace!("Entering create_review function for title {}", title_id);
    let input = NewReview {
        text: request.text,
        score: request.score,
    };

    match reviews::create_review(&state.db, caller.principal(), title_id, input).await {
        Ok(created) => {
            info!("Review {} created for title {}", created.review.id, title_id);
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::ok(ReviewResponse::from(created), "Review created successfully")),
            ))
        }
        Err(e) => {
            warn!("Failed to create review for title {}: {}", title_id, e);
            Err(e.into())
        }
    }
}

/// Get a review
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    responses(
        (status = 200, description = "Review retrieved successfully", body = ApiResponse<ReviewResponse>),
        (status = 404, description = "Title or review not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_review(
    State(state): State<AppState>,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
) -> Result<Json<ApiResponse<ReviewResponse>>, ApiError> {
    let found = reviews::get_review(&state.db, title_id, review_id).await?;
    Ok(Json(ApiResponse::ok(ReviewResponse::from(found), "Review retrieved successfully")))
}

/// Edit a review (author, moderators and admins)
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    request_body = UpdateReviewRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Review updated successfully", body = ApiResponse<ReviewResponse>),
        (status = 400, description = "Invalid request", body = crate::schemas::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Not the author or a moderator", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Title or review not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller, request))]
pub async fn update_review(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
    ApiJson(request): ApiJson<UpdateReviewRequest>,
) -> Result<Json<ApiResponse<ReviewResponse>>, ApiError> {
    let changes = ReviewChanges {
        text: request.text,
        score: request.score,
    };
    let updated =
        reviews::update_review(&state.db, caller.principal(), title_id, review_id, changes).await?;
    info!("Review {} updated", review_id);
    Ok(Json(ApiResponse::ok(ReviewResponse::from(updated), "Review updated successfully")))
}

/// Delete a review and its comments (author, moderators and admins)
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}",
    tag = "reviews",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Review deleted successfully"),
        (status = 401, description = "Not authenticated", body = crate::schemas::ErrorResponse),
        (status = 403, description = "Not the author or a moderator", body = crate::schemas::ErrorResponse),
        (status = 404, description = "Title or review not found", body = crate::schemas::ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn delete_review(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
) -> Result<StatusCode, ApiError> {
    match reviews::delete_review(&state.db, caller.principal(), title_id, review_id).await {
        Ok(()) => {
            info!("Review {} deleted", review_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Err(e) => {
            warn!("Failed to delete review {}: {}", review_id, e);
            Err(e.into())
        }
    }
}
