use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use domain::reviews::{self, CommentDetails};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::extractors::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::schemas::{ApiResponse, AppState, ErrorResponse, PageQuery, Paginated};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateCommentRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateCommentRequest {
    pub text: Option<String>,
}

/// Comment response model
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    pub text: String,
    /// Username of the author
    pub author: String,
    pub pub_date: DateTime<Utc>,
}

impl From<CommentDetails> for CommentResponse {
    fn from(details: CommentDetails) -> Self {
        Self {
            id: details.comment.id,
            text: details.comment.text,
            author: details.author,
            pub_date: details.comment.pub_date,
        }
    }
}

/// List comments on a review
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        PageQuery,
    ),
    responses(
        (status = 200, description = "Comments retrieved successfully", body = ApiResponse<Paginated<CommentResponse>>),
        (status = 404, description = "Title or review not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_comments(
    State(state): State<AppState>,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Paginated<CommentResponse>>>, ApiError> {
    let page = state.page_request(query.page, query.limit);

    match reviews::list_comments(&state.db, title_id, review_id, page).await {
        Ok(found) => {
            debug!("Retrieved {} of {} comments", found.items.len(), found.total);
            Ok(Json(ApiResponse::ok(
                Paginated::from_page(found, CommentResponse::from),
                "Comments retrieved successfully",
            )))
        }
        Err(e) => {
            warn!("Failed to list comments of review {}: {}", review_id, e);
            Err(e.into())
        }
    }
}

/// Comment on a review
#[utoipa::path(
    post,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
    ),
    request_body = CreateCommentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Comment created successfully", body = ApiResponse<CommentResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Title or review not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, caller, request))]
pub async fn create_comment(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath((title_id, review_id)): ApiPath<(i32, i32)>,
    ApiJson(request): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CommentResponse>>), ApiError> {
    let created =
        reviews::create_comment(&state.db, caller.principal(), title_id, review_id, request.text)
            .await?;
    info!("Comment {} added to review {}", created.comment.id, review_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(CommentResponse::from(created), "Comment created successfully")),
    ))
}

/// Get a comment
#[utoipa::path(
    get,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    responses(
        (status = 200, description = "Comment retrieved successfully", body = ApiResponse<CommentResponse>),
        (status = 404, description = "Title, review or comment not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_comment(
    State(state): State<AppState>,
    ApiPath((title_id, review_id, comment_id)): ApiPath<(i32, i32, i32)>,
) -> Result<Json<ApiResponse<CommentResponse>>, ApiError> {
    let found = reviews::get_comment(&state.db, title_id, review_id, comment_id).await?;
    Ok(Json(ApiResponse::ok(CommentResponse::from(found), "Comment retrieved successfully")))
}

/// Edit a comment (author, moderators and admins)
#[utoipa::path(
    patch,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    request_body = UpdateCommentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Comment updated successfully", body = ApiResponse<CommentResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Not the author or a moderator", body = ErrorResponse),
        (status = 404, description = "Title, review or comment not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, caller, request))]
pub async fn update_comment(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath((title_id, review_id, comment_id)): ApiPath<(i32, i32, i32)>,
    ApiJson(request): ApiJson<UpdateCommentRequest>,
) -> Result<Json<ApiResponse<CommentResponse>>, ApiError> {
    let updated = reviews::update_comment(
        &state.db,
        caller.principal(),
        title_id,
        review_id,
        comment_id,
        request.text,
    )
    .await?;
    Ok(Json(ApiResponse::ok(CommentResponse::from(updated), "Comment updated successfully")))
}

/// Delete a comment (author, moderators and admins)
#[utoipa::path(
    delete,
    path = "/api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("title_id" = i32, Path, description = "Title ID"),
        ("review_id" = i32, Path, description = "Review ID"),
        ("comment_id" = i32, Path, description = "Comment ID"),
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Comment deleted successfully"),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Not the author or a moderator", body = ErrorResponse),
        (status = 404, description = "Title, review or comment not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, caller))]
pub async fn delete_comment(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath((title_id, review_id, comment_id)): ApiPath<(i32, i32, i32)>,
) -> Result<StatusCode, ApiError> {
    reviews::delete_comment(&state.db, caller.principal(), title_id, review_id, comment_id).await?;
    info!("Comment {} deleted", comment_id);
    Ok(StatusCode::NO_CONTENT)
}
