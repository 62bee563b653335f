use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};

use crate::auth::AuthUser;
use crate::db::operations::progress;
use crate::response::{ok, AppError};
use crate::services::progress_tracking::{self, ProgressError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recommend/:user_id", get(recommend))
        .route("/history/:user_id", get(history))
        .route("/:user_id", get(user_progress))
}

/// Progress data is private to its owner; checked before any store access.
fn require_owner(user: &AuthUser, user_id: &str) -> Result<(), AppError> {
    if user.id != user_id {
        tracing::warn!(caller = %user.id, target = %user_id, "progress access denied");
        return Err(AppError::forbidden("Not authorized to view this user's progress"));
    }
    Ok(())
}

fn progress_error(err: ProgressError) -> AppError {
    match err {
        ProgressError::Sql(err) => {
            tracing::error!(error = %err, "progress query failed");
            AppError::internal(err.to_string())
        }
    }
}

async fn user_progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_owner(&user, &user_id)?;
    let stats = progress_tracking::get_user_progress(state.db(), &user_id)
        .await
        .map_err(progress_error)?;
    Ok(ok(stats))
}

async fn recommend(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_owner(&user, &user_id)?;
    let problems = progress_tracking::recommend_problems(state.db(), &user_id)
        .await
        .map_err(progress_error)?;
    Ok(ok(problems))
}

async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    require_owner(&user, &user_id)?;
    let entries = progress::list_history(state.db().pool(), &user_id).await?;
    Ok(ok(entries))
}
