use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use thiserror::Error;

use crate::db::operations::curriculum::{self, Goal};
use crate::db::operations::problems::{self, ProblemGoalRow};
use crate::db::operations::progress::{self, GoalProgressRecord};
use crate::db::Database;

pub const MASTERED_THRESHOLD: f64 = 0.8;
pub const STRUGGLING_THRESHOLD: f64 = 0.5;
pub const RECOMMEND_THRESHOLD: f64 = 0.6;
pub const MAX_RECOMMEND_GOALS: i64 = 5;
pub const MAX_RECOMMENDED_PROBLEMS: usize = 5;

const FULL_CREDIT: f64 = 1.0;
const HINT_CREDIT: f64 = 0.5;
const UNKNOWN_GOAL_DESCRIPTION: &str = "Unknown Goal";

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProgressOutcome {
    pub updated_goals: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgressDetail {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    pub goal_description: String,
    pub mastery_level: f64,
    pub attempts_count: i64,
    pub successful_attempts: f64,
    pub last_practiced: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressStats {
    pub total_goals: usize,
    pub mastered_goals: usize,
    pub struggling_goals: usize,
    pub average_mastery: f64,
    pub goal_progress: Vec<GoalProgressDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedProblem {
    pub id: String,
    pub text: String,
    pub subject_area: Option<String>,
    pub goal_ids: Vec<String>,
    pub goal_descriptions: Vec<String>,
}

/// Success credit for one solved step; hint-assisted solutions count half.
pub fn attempt_credit(solved_with_hint: bool) -> f64 {
    if solved_with_hint {
        HINT_CREDIT
    } else {
        FULL_CREDIT
    }
}

/// Goals credited when a step has no curriculum links.
pub fn fallback_step_goals() -> Vec<Goal> {
    vec![
        Goal {
            id: "sample_goal_1".to_string(),
            description: "Use algebraic methods to solve equations".to_string(),
        },
        Goal {
            id: "sample_goal_2".to_string(),
            description: "Apply mathematical knowledge to real-world problems".to_string(),
        },
    ]
}

/// Marks the step solved and credits every goal linked to it, in one transaction.
pub async fn record_step_solved(
    db: &Database,
    user_id: &str,
    step_id: &str,
    solved_with_hint: bool,
) -> Result<StepProgressOutcome, ProgressError> {
    let now = Utc::now();
    let mut tx = db.pool().begin().await?;

    // The first statement must write: a deferred transaction that reads first cannot
    // upgrade to a write lock while another connection is committing.
    let existing = if problems::insert_placeholder_step(&mut tx, step_id, solved_with_hint).await? {
        tracing::info!(step_id, "step not found, created placeholder");
        None
    } else {
        let step = problems::find_step(&mut tx, step_id).await?;
        problems::mark_step_solved(&mut tx, step_id, solved_with_hint).await?;
        step
    };

    let mut goals = problems::goals_for_step(&mut *tx, step_id).await?;
    if goals.is_empty() {
        goals = fallback_step_goals();
    }

    let credit = attempt_credit(solved_with_hint);
    for goal in &goals {
        progress::upsert_goal_attempt(&mut tx, user_id, &goal.id, credit, now).await?;
    }

    if let Some(step) = existing {
        if let (Some(problem_id), false) = (step.problem_id.as_deref(), step.user_solved) {
            record_history_step(&mut tx, user_id, problem_id, solved_with_hint, now).await?;
        }
    }

    tx.commit().await?;

    tracing::info!(
        user_id,
        step_id,
        solved_with_hint,
        updated_goals = goals.len(),
        "step progress recorded"
    );

    Ok(StepProgressOutcome {
        updated_goals: goals.len(),
    })
}

async fn record_history_step(
    conn: &mut SqliteConnection,
    user_id: &str,
    problem_id: &str,
    solved_with_hint: bool,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    progress::insert_history_if_absent(conn, user_id, problem_id, now).await?;
    let Some(history) = progress::get_history(conn, user_id, problem_id).await? else {
        return Ok(());
    };

    let completed_time_spent = if problems::count_unsolved_steps(conn, problem_id).await? == 0 {
        Some((now - history.attempted_at).num_seconds().max(0))
    } else {
        None
    };

    progress::record_history_step(conn, &history.id, solved_with_hint, completed_time_spent).await
}

pub async fn get_user_progress(
    db: &Database,
    user_id: &str,
) -> Result<UserProgressStats, ProgressError> {
    let records = progress::list_goal_progress(db.pool(), user_id).await?;
    let goal_ids: Vec<String> = records.iter().map(|r| r.goal_id.clone()).collect();
    let descriptions = curriculum::goal_descriptions(db.pool(), &goal_ids).await?;
    Ok(summarize_progress(records, &descriptions))
}

pub fn summarize_progress(
    records: Vec<GoalProgressRecord>,
    descriptions: &HashMap<String, String>,
) -> UserProgressStats {
    let total_goals = records.len();
    let mastered_goals = records
        .iter()
        .filter(|r| r.mastery_level >= MASTERED_THRESHOLD)
        .count();
    let struggling_goals = records
        .iter()
        .filter(|r| r.mastery_level < STRUGGLING_THRESHOLD)
        .count();
    let average_mastery = if total_goals > 0 {
        records.iter().map(|r| r.mastery_level).sum::<f64>() / total_goals as f64
    } else {
        0.0
    };

    let goal_progress = records
        .into_iter()
        .map(|r| GoalProgressDetail {
            goal_description: descriptions
                .get(&r.goal_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_GOAL_DESCRIPTION.to_string()),
            id: r.id,
            user_id: r.user_id,
            goal_id: r.goal_id,
            mastery_level: r.mastery_level,
            attempts_count: r.attempts_count,
            successful_attempts: r.successful_attempts,
            last_practiced: r.last_practiced,
        })
        .collect();

    UserProgressStats {
        total_goals,
        mastered_goals,
        struggling_goals,
        average_mastery,
        goal_progress,
    }
}

/// Unattempted problems that exercise the user's weakest goals.
pub async fn recommend_problems(
    db: &Database,
    user_id: &str,
) -> Result<Vec<RecommendedProblem>, ProgressError> {
    let weak = progress::weakest_goals(db.pool(), user_id, RECOMMEND_THRESHOLD, MAX_RECOMMEND_GOALS)
        .await?;
    if weak.is_empty() {
        return Ok(Vec::new());
    }

    let goal_ids: Vec<String> = weak.into_iter().map(|g| g.goal_id).collect();
    let rows = problems::unattempted_problem_rows(db.pool(), user_id, &goal_ids).await?;
    let recommended = group_problem_rows(rows, MAX_RECOMMENDED_PROBLEMS);

    if recommended.is_empty() {
        tracing::debug!(user_id, "no unattempted problems for weak goals, using samples");
        return Ok(sample_problems(&goal_ids[0]));
    }
    Ok(recommended)
}

fn group_problem_rows(rows: Vec<ProblemGoalRow>, limit: usize) -> Vec<RecommendedProblem> {
    let mut out: Vec<RecommendedProblem> = Vec::new();
    for row in rows {
        if let Some(existing) = out.iter_mut().find(|p| p.id == row.problem_id) {
            if !existing.goal_ids.contains(&row.goal_id) {
                existing.goal_ids.push(row.goal_id);
                existing.goal_descriptions.push(row.goal_description);
            }
            continue;
        }
        if out.len() == limit {
            continue;
        }
        out.push(RecommendedProblem {
            id: row.problem_id,
            text: row.text,
            subject_area: row.subject_area,
            goal_ids: vec![row.goal_id],
            goal_descriptions: vec![row.goal_description],
        });
    }
    out
}

pub fn sample_problems(goal_id: &str) -> Vec<RecommendedProblem> {
    vec![
        RecommendedProblem {
            id: "sample_problem_1".to_string(),
            text: "Solve the equation: 2x + 5 = 13".to_string(),
            subject_area: Some("Algebra".to_string()),
            goal_ids: vec![goal_id.to_string()],
            goal_descriptions: vec!["Use algebraic methods to solve equations".to_string()],
        },
        RecommendedProblem {
            id: "sample_problem_2".to_string(),
            text: "Calculate the area of a circle with radius 5 cm".to_string(),
            subject_area: Some("Geometry".to_string()),
            goal_ids: vec![goal_id.to_string()],
            goal_descriptions: vec!["Apply mathematical knowledge to real-world problems".to_string()],
        },
    ]
}
