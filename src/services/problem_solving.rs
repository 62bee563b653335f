use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::operations::curriculum::{self, Requirement};
use crate::db::operations::problems::{self, ProblemRecord, SolutionStepRecord};
use crate::db::operations::progress;
use crate::db::Database;
use crate::services::curriculum_matching::{match_step_to_curriculum, MatchedGoal};
use crate::services::llm_provider::LLMProvider;
use crate::services::solution_generator::{self, SolutionError};

pub const MIN_GRADE_LEVEL: i64 = 1;
pub const MAX_GRADE_LEVEL: i64 = 12;

#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub problem_text: String,
    pub subject_area: Option<String>,
    pub grade_level: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedStep {
    pub id: String,
    pub step_number: i64,
    pub description: String,
    pub hint: String,
    pub solution: String,
    pub user_solved: bool,
    pub solved_with_hint: Option<bool>,
    pub curriculum_goals: Vec<MatchedGoal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSolution {
    pub problem_id: String,
    pub problem_text: String,
    pub subject_area: Option<String>,
    pub grade_level: Option<i64>,
    pub solution_steps: Vec<SolvedStep>,
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("problem not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Solution(#[from] SolutionError),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

pub fn validate_request(request: &SolveRequest) -> Result<(), SolveError> {
    if request.problem_text.trim().is_empty() {
        return Err(SolveError::Validation("problemText must not be empty".to_string()));
    }
    if let Some(grade) = request.grade_level {
        if !(MIN_GRADE_LEVEL..=MAX_GRADE_LEVEL).contains(&grade) {
            return Err(SolveError::Validation(format!(
                "gradeLevel must be between {MIN_GRADE_LEVEL} and {MAX_GRADE_LEVEL}"
            )));
        }
    }
    Ok(())
}

/// Generates, matches and stores a solution. Storage is a single transaction: a failure
/// leaves no partial problem behind.
pub async fn solve_problem(
    db: &Database,
    llm: &LLMProvider,
    user_id: &str,
    user_grade_level: Option<i64>,
    request: SolveRequest,
) -> Result<ProblemSolution, SolveError> {
    validate_request(&request)?;
    let grade_level = request.grade_level.or(user_grade_level);

    let generated =
        solution_generator::generate_solution(llm, &request.problem_text, grade_level).await?;

    let problem_id = Uuid::new_v4().to_string();
    let mut steps = Vec::with_capacity(generated.len());
    for (index, step) in generated.into_iter().enumerate() {
        let goals = match_step_to_curriculum(db, llm, &step.description, &step.solution).await;
        tracing::debug!(step = index + 1, goals = goals.len(), "step matched");
        steps.push(SolvedStep {
            id: Uuid::new_v4().to_string(),
            step_number: index as i64 + 1,
            description: step.description,
            hint: step.hint,
            solution: step.solution,
            user_solved: false,
            solved_with_hint: None,
            curriculum_goals: goals,
        });
    }

    let now = Utc::now();
    let problem = ProblemRecord {
        id: problem_id.clone(),
        text: request.problem_text.clone(),
        subject_area: request.subject_area.clone(),
        grade_level,
        user_id: Some(user_id.to_string()),
        created_at: now,
    };

    let mut tx = db.pool().begin().await?;
    problems::insert_problem(&mut tx, &problem).await?;
    for step in &steps {
        problems::insert_step(
            &mut tx,
            &SolutionStepRecord {
                id: step.id.clone(),
                problem_id: Some(problem_id.clone()),
                step_number: step.step_number,
                description: step.description.clone(),
                hint: step.hint.clone(),
                solution: step.solution.clone(),
                user_solved: false,
                solved_with_hint: None,
            },
        )
        .await?;

        for goal in &step.curriculum_goals {
            curriculum::upsert_goal(&mut tx, &goal.id, &goal.description).await?;
            problems::link_step_goal(&mut tx, &step.id, &goal.id).await?;
        }
    }
    progress::insert_history_if_absent(&mut tx, user_id, &problem_id, now).await?;
    tx.commit().await?;

    tracing::info!(user_id, problem_id = %problem_id, steps = steps.len(), "problem solved and stored");

    Ok(ProblemSolution {
        problem_id,
        problem_text: request.problem_text,
        subject_area: request.subject_area,
        grade_level,
        solution_steps: steps,
    })
}

pub async fn get_problem(db: &Database, problem_id: &str) -> Result<ProblemSolution, SolveError> {
    let problem = problems::get_problem(db.pool(), problem_id)
        .await?
        .ok_or_else(|| SolveError::NotFound(problem_id.to_string()))?;

    let records = problems::steps_for_problem(db.pool(), problem_id).await?;
    let mut steps = Vec::with_capacity(records.len());
    for record in records {
        let goals = problems::goals_for_step(db.pool(), &record.id).await?;
        let mut curriculum_goals = Vec::with_capacity(goals.len());
        for goal in goals {
            let requirements: Vec<Requirement> =
                curriculum::requirements_for_goal(db.pool(), &goal.id).await?;
            curriculum_goals.push(MatchedGoal {
                id: goal.id,
                description: goal.description,
                requirements,
            });
        }

        steps.push(SolvedStep {
            id: record.id,
            step_number: record.step_number,
            description: record.description,
            hint: record.hint,
            solution: record.solution,
            user_solved: record.user_solved,
            solved_with_hint: record.solved_with_hint,
            curriculum_goals,
        });
    }

    Ok(ProblemSolution {
        problem_id: problem.id,
        problem_text: problem.text,
        subject_area: problem.subject_area,
        grade_level: problem.grade_level,
        solution_steps: steps,
    })
}
