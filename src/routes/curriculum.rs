use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::db::operations::curriculum;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chapters", get(chapters))
        .route("/requirements/:chapter_id", get(requirements))
        .route("/goals/:requirement_id", get(goals))
}

async fn chapters(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(curriculum::list_chapters(state.db().pool()).await?))
}

async fn requirements(
    State(state): State<AppState>,
    Path(chapter_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(
        curriculum::requirements_for_chapter(state.db().pool(), &chapter_id).await?,
    ))
}

async fn goals(
    State(state): State<AppState>,
    Path(requirement_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(
        curriculum::goals_for_requirement(state.db().pool(), &requirement_id).await?,
    ))
}
