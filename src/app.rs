use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{admin, health, items};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/items", items::router())
        .nest("/api/admin", admin::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
