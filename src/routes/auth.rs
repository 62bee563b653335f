use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;

use crate::auth::{AuthError, AuthUser};
use crate::response::{json_error, ok, AppError};
use crate::services::accounts::{self, AccountError, RegisterInput};
use crate::state::AppState;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/api/v1/auth/user", get(current_user))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterInput>,
) -> Result<impl IntoResponse, AppError> {
    let user = accounts::register(state.db(), payload, state.config().bcrypt_cost)
        .await
        .map_err(account_error)?;
    Ok((StatusCode::CREATED, ok(AuthUser::from(user))))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let config = state.config();
    let outcome = accounts::login(
        state.db(),
        &payload.username,
        &payload.password,
        config.jwt_secret.as_deref(),
        &config.jwt_expires_in,
    )
    .await
    .map_err(account_error)?;
    Ok(ok(outcome))
}

async fn current_user(Extension(user): Extension<AuthUser>) -> impl IntoResponse {
    ok(user)
}

pub(super) fn account_error(err: AccountError) -> AppError {
    match err {
        AccountError::Validation(msg) => AppError::validation(msg),
        AccountError::Conflict(msg) => AppError::conflict(msg),
        AccountError::InvalidCredentials => AppError::unauthorized("Incorrect username or password"),
        AccountError::Inactive => json_error(StatusCode::BAD_REQUEST, "INACTIVE_USER", "Inactive user"),
        AccountError::Token(AuthError::MissingSecret | AuthError::InvalidExpiresIn) => {
            tracing::error!("token signing is not configured");
            AppError::internal("token signing not configured")
        }
        other => {
            tracing::error!(error = %other, "account operation failed");
            AppError::internal(other.to_string())
        }
    }
}
