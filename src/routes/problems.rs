use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::response::{json_error, ok, AppError};
use crate::services::problem_solving::{self, SolveError, SolveRequest};
use crate::services::progress_tracking::{self, ProgressError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/solve", post(solve))
        .route("/:problem_id", get(get_problem))
        .route("/:problem_id/steps/:step_id/progress", post(record_step_progress))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolveBody {
    #[serde(default)]
    problem_text: String,
    subject_area: Option<String>,
    grade_level: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepProgressBody {
    #[serde(default)]
    solved_with_hint: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepProgressResponse {
    message: &'static str,
    problem_id: String,
    step_id: String,
    updated_goals: usize,
}

async fn solve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SolveBody>,
) -> Result<impl IntoResponse, AppError> {
    let llm = state.llm();
    let request = SolveRequest {
        problem_text: payload.problem_text,
        subject_area: payload.subject_area,
        grade_level: payload.grade_level,
    };

    let solution =
        problem_solving::solve_problem(state.db(), &llm, &user.id, user.grade_level, request)
            .await
            .map_err(solve_error)?;
    Ok(ok(solution))
}

async fn get_problem(
    State(state): State<AppState>,
    Path(problem_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let problem = problem_solving::get_problem(state.db(), &problem_id)
        .await
        .map_err(solve_error)?;
    Ok(ok(problem))
}

async fn record_step_progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((problem_id, step_id)): Path<(String, String)>,
    body: Option<Json<StepProgressBody>>,
) -> Result<impl IntoResponse, AppError> {
    let solved_with_hint = body.map(|Json(b)| b.solved_with_hint).unwrap_or(false);

    let outcome =
        progress_tracking::record_step_solved(state.db(), &user.id, &step_id, solved_with_hint)
            .await
            .map_err(|err| match err {
                ProgressError::Sql(sql_err) => {
                    tracing::error!(error = %sql_err, step_id = %step_id, "step progress update failed");
                    AppError::internal(sql_err.to_string())
                }
            })?;

    Ok(ok(StepProgressResponse {
        message: "Progress updated successfully",
        problem_id,
        step_id,
        updated_goals: outcome.updated_goals,
    }))
}

fn solve_error(err: SolveError) -> AppError {
    match err {
        SolveError::Validation(msg) => AppError::validation(msg),
        SolveError::NotFound(_) => AppError::not_found("Problem not found"),
        SolveError::Solution(err) => {
            tracing::error!(error = %err, "solution generation failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "SOLUTION_FAILED",
                "Failed to generate solution",
            )
        }
        SolveError::Sql(err) => {
            tracing::error!(error = %err, "problem storage failed");
            AppError::internal(err.to_string())
        }
    }
}
