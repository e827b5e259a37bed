use crate::handlers::{
    auth::{obtain_token, sign_up},
    categories::{create_category, delete_category, get_categories},
    comments::{create_comment, delete_comment, get_comment, get_comments, update_comment},
    genres::{create_genre, delete_genre, get_genres},
    health::health_check,
    reviews::{create_review, delete_review, get_review, get_reviews, update_review},
    titles::{create_title, delete_title, get_title, get_titles, update_title},
    users::{create_user, delete_user, get_me, get_user, get_users, update_me, update_user},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let timeout = state.request_timeout;

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Signup and token exchange
        .route("/api/v1/auth/signup", post(sign_up))
        .route("/api/v1/auth/token", post(obtain_token))
        // User directory
        .route("/api/v1/users", get(get_users).post(create_user))
        .route("/api/v1/users/me", get(get_me).patch(update_me))
        .route(
            "/api/v1/users/:username",
            get(get_user).patch(update_user).delete(delete_user),
        )
        // Categories and genres
        .route("/api/v1/categories", get(get_categories).post(create_category))
        .route("/api/v1/categories/:slug", axum::routing::delete(delete_category))
        .route("/api/v1/genres", get(get_genres).post(create_genre))
        .route("/api/v1/genres/:slug", axum::routing::delete(delete_genre))
        // Titles
        .route("/api/v1/titles", get(get_titles).post(create_title))
        .route(
            "/api/v1/titles/:title_id",
            get(get_title).patch(update_title).delete(delete_title),
        )
        // Reviews
        .route(
            "/api/v1/titles/:title_id/reviews",
            get(get_reviews).post(create_review),
        )
        .route(
            "/api/v1/titles/:title_id/reviews/:review_id",
            get(get_review).patch(update_review).delete(delete_review),
        )
        // Comments
        .route(
            "/api/v1/titles/:title_id/reviews/:review_id/comments",
            get(get_comments).post(create_comment),
        )
        .route(
            "/api/v1/titles/:title_id/reviews/:review_id/comments/:comment_id",
            get(get_comment).patch(update_comment).delete(delete_comment),
        )
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
