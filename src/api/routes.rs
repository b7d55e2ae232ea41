use axum::{
    routing::{delete, get, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::events;
use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Continue watching
        .route(
            "/continue-watching",
            get(handlers::list_continue_watching),
        )
        .route(
            "/continue-watching/events",
            get(events::continue_watching_events),
        )
        .route(
            "/continue-watching/:media_type/:media_id",
            delete(handlers::remove_progress),
        )
        // Player writes
        .route(
            "/progress/:media_type/:media_id",
            put(handlers::record_progress),
        )
}
