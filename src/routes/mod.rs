mod auth;
mod curriculum;
mod health;
mod problems;
mod progress;
mod settings;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::middleware::auth::require_auth;
use crate::response::json_error;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/api/v1/problems", problems::router())
        .nest("/api/v1/progress", progress::router())
        .nest("/api/v1/curriculum", curriculum::router())
        .nest("/api/v1/users/me", settings::router())
        .merge(auth::protected_router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest("/health", health::router())
        .merge(auth::public_router())
        .merge(protected)
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Route not found").into_response()
}
