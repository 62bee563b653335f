use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::auth::AuthUser;
use crate::response::{ok, AppError};
use crate::services::accounts::{self, SettingsUpdate};
use crate::state::AppState;

use super::auth::account_error;

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(update_settings))
}

async fn get_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let settings = accounts::get_settings(state.db(), &user.id)
        .await
        .map_err(account_error)?;
    Ok(ok(settings))
}

async fn update_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SettingsUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let settings = accounts::update_settings(state.db(), &user.id, payload)
        .await
        .map_err(account_error)?;
    tracing::info!(user_id = %user.id, "settings updated");
    Ok(ok(settings))
}
