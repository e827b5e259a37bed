use std::collections::BTreeMap;
use std::time::Duration;

use domain::auth::AuthService;
use domain::{Page, PageRequest};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{IntoParams, Modify, OpenApi, ToSchema};
use validator::Validate;

use crate::handlers::{
    auth::{SignUpRequest, SignUpResponse, TokenRequest, TokenResponse},
    categories::{CategoryResponse, CreateCategoryRequest},
    comments::{CommentResponse, CreateCommentRequest, UpdateCommentRequest},
    genres::{CreateGenreRequest, GenreResponse},
    reviews::{CreateReviewRequest, ReviewResponse, UpdateReviewRequest},
    titles::{CreateTitleRequest, TitleQuery, TitleResponse, UpdateTitleRequest},
    users::{CreateUserRequest, UpdateUserRequest, UserResponse},
};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Signup, token exchange and bearer verification
    pub auth: AuthService,
    /// Page size used when a list request gives no `limit`
    pub default_page_size: u64,
    /// Upper bound on request handling time
    pub request_timeout: Duration,
}

impl AppState {
    pub fn page_request(&self, page: Option<u64>, limit: Option<u64>) -> PageRequest {
        PageRequest::new(page.unwrap_or(1), limit.unwrap_or(self.default_page_size))
    }
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// One page of a list endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Paginated<T> {
    /// Number of matching items across all pages
    pub count: u64,
    /// Current page (1-based)
    pub page: u64,
    /// Page size
    pub limit: u64,
    /// Items on this page
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn from_page<S>(page: Page<S>, convert: impl FnMut(S) -> T) -> Self {
        Self {
            count: page.total,
            page: page.page,
            limit: page.limit,
            results: page.items.into_iter().map(convert).collect(),
        }
    }
}

/// Pagination parameters shared by nested list endpoints
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct PageQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: configured page size, at most 100)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
}

/// Pagination plus a name search, used by users, categories and genres
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct SearchQuery {
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: configured page size, at most 100)
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    /// Substring to search for
    pub search: Option<String>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Per-field messages for validation errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::sign_up,
        crate::handlers::auth::obtain_token,
        crate::handlers::users::get_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::get_me,
        crate::handlers::users::update_me,
        crate::handlers::categories::get_categories,
        crate::handlers::categories::create_category,
        crate::handlers::categories::delete_category,
        crate::handlers::genres::get_genres,
        crate::handlers::genres::create_genre,
        crate::handlers::genres::delete_genre,
        crate::handlers::titles::get_titles,
        crate::handlers::titles::create_title,
        crate::handlers::titles::get_title,
        crate::handlers::titles::update_title,
        crate::handlers::titles::delete_title,
        crate::handlers::reviews::get_reviews,
        crate::handlers::reviews::create_review,
        crate::handlers::reviews::get_review,
        crate::handlers::reviews::update_review,
        crate::handlers::reviews::delete_review,
        crate::handlers::comments::get_comments,
        crate::handlers::comments::create_comment,
        crate::handlers::comments::get_comment,
        crate::handlers::comments::update_comment,
        crate::handlers::comments::delete_comment,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            PageQuery,
            SearchQuery,
            SignUpRequest,
            SignUpResponse,
            TokenRequest,
            TokenResponse,
            CreateUserRequest,
            UpdateUserRequest,
            UserResponse,
            model::Role,
            CreateCategoryRequest,
            CategoryResponse,
            CreateGenreRequest,
            GenreResponse,
            TitleQuery,
            CreateTitleRequest,
            UpdateTitleRequest,
            TitleResponse,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewResponse,
            CreateCommentRequest,
            UpdateCommentRequest,
            CommentResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Signup and token exchange"),
        (name = "users", description = "User directory and profiles"),
        (name = "categories", description = "Title categories"),
        (name = "genres", description = "Title genres"),
        (name = "titles", description = "Reviewable works"),
        (name = "reviews", description = "Reviews of titles"),
        (name = "comments", description = "Comments on reviews"),
    ),
    info(
        title = "YaMDb API",
        description = "Catalog of titles with user reviews, ratings and comments",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
