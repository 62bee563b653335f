use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::db::operations::curriculum::Goal;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProblemRecord {
    pub id: String,
    pub text: String,
    pub subject_area: Option<String>,
    pub grade_level: Option<i64>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SolutionStepRecord {
    pub id: String,
    pub problem_id: Option<String>,
    pub step_number: i64,
    pub description: String,
    pub hint: String,
    pub solution: String,
    pub user_solved: bool,
    pub solved_with_hint: Option<bool>,
}

/// A problem reachable from one of the queried goals through its steps.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProblemGoalRow {
    pub problem_id: String,
    pub text: String,
    pub subject_area: Option<String>,
    pub goal_id: String,
    pub goal_description: String,
}

pub async fn insert_problem(
    conn: &mut SqliteConnection,
    problem: &ProblemRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "problems" ("id", "text", "subject_area", "grade_level", "user_id", "created_at")
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&problem.id)
    .bind(&problem.text)
    .bind(&problem.subject_area)
    .bind(problem.grade_level)
    .bind(&problem.user_id)
    .bind(problem.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_step(
    conn: &mut SqliteConnection,
    step: &SolutionStepRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "solution_steps"
            ("id", "problem_id", "step_number", "description", "hint", "solution", "user_solved", "solved_with_hint")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&step.id)
    .bind(&step.problem_id)
    .bind(step.step_number)
    .bind(&step.description)
    .bind(&step.hint)
    .bind(&step.solution)
    .bind(step.user_solved)
    .bind(step.solved_with_hint)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn link_step_goal(
    conn: &mut SqliteConnection,
    step_id: &str,
    goal_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "step_goals" ("step_id", "goal_id") VALUES (?, ?) ON CONFLICT DO NOTHING"#,
    )
    .bind(step_id)
    .bind(goal_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_problem(
    pool: &SqlitePool,
    problem_id: &str,
) -> Result<Option<ProblemRecord>, sqlx::Error> {
    sqlx::query_as::<_, ProblemRecord>(
        r#"
        SELECT "id", "text", "subject_area", "grade_level", "user_id", "created_at"
        FROM "problems"
        WHERE "id" = ?
        "#,
    )
    .bind(problem_id)
    .fetch_optional(pool)
    .await
}

pub async fn steps_for_problem(
    pool: &SqlitePool,
    problem_id: &str,
) -> Result<Vec<SolutionStepRecord>, sqlx::Error> {
    sqlx::query_as::<_, SolutionStepRecord>(
        r#"
        SELECT "id", "problem_id", "step_number", "description", "hint", "solution",
               "user_solved", "solved_with_hint"
        FROM "solution_steps"
        WHERE "problem_id" = ?
        ORDER BY "step_number"
        "#,
    )
    .bind(problem_id)
    .fetch_all(pool)
    .await
}

pub async fn find_step(
    conn: &mut SqliteConnection,
    step_id: &str,
) -> Result<Option<SolutionStepRecord>, sqlx::Error> {
    sqlx::query_as::<_, SolutionStepRecord>(
        r#"
        SELECT "id", "problem_id", "step_number", "description", "hint", "solution",
               "user_solved", "solved_with_hint"
        FROM "solution_steps"
        WHERE "id" = ?
        "#,
    )
    .bind(step_id)
    .fetch_optional(conn)
    .await
}

pub async fn mark_step_solved(
    conn: &mut SqliteConnection,
    step_id: &str,
    solved_with_hint: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "solution_steps" SET "user_solved" = 1, "solved_with_hint" = ? WHERE "id" = ?"#,
    )
    .bind(solved_with_hint)
    .bind(step_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Minimal solved step for ids that were never persisted by the solve pipeline.
/// Returns false when the step already exists.
pub async fn insert_placeholder_step(
    conn: &mut SqliteConnection,
    step_id: &str,
    solved_with_hint: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO "solution_steps" ("id", "problem_id", "step_number", "user_solved", "solved_with_hint")
        VALUES (?, NULL, 0, 1, ?)
        ON CONFLICT ("id") DO NOTHING
        "#,
    )
    .bind(step_id)
    .bind(solved_with_hint)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn goals_for_step<'c, E>(executor: E, step_id: &str) -> Result<Vec<Goal>, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    sqlx::query_as::<_, Goal>(
        r#"
        SELECT g."id", g."description"
        FROM "step_goals" sg
        JOIN "goals" g ON g."id" = sg."goal_id"
        WHERE sg."step_id" = ?
        ORDER BY g."id"
        "#,
    )
    .bind(step_id)
    .fetch_all(executor)
    .await
}

pub async fn count_unsolved_steps(
    conn: &mut SqliteConnection,
    problem_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM "solution_steps" WHERE "problem_id" = ? AND "user_solved" = 0"#,
    )
    .bind(problem_id)
    .fetch_one(conn)
    .await
}

/// Problems linked to any of `goal_ids` that `user_id` has no history row for.
pub async fn unattempted_problem_rows(
    pool: &SqlitePool,
    user_id: &str,
    goal_ids: &[String],
) -> Result<Vec<ProblemGoalRow>, sqlx::Error> {
    if goal_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT DISTINCT p."id" AS "problem_id", p."text", p."subject_area",
               g."id" AS "goal_id", g."description" AS "goal_description", p."created_at"
        FROM "problems" p
        JOIN "solution_steps" s ON s."problem_id" = p."id"
        JOIN "step_goals" sg ON sg."step_id" = s."id"
        JOIN "goals" g ON g."id" = sg."goal_id"
        WHERE NOT EXISTS (
            SELECT 1 FROM "problem_history" h
            WHERE h."problem_id" = p."id" AND h."user_id" = "#,
    );
    qb.push_bind(user_id);
    qb.push(r#") AND g."id" IN ("#);
    {
        let mut sep = qb.separated(", ");
        for id in goal_ids {
            sep.push_bind(id);
        }
    }
    qb.push(r#") ORDER BY p."created_at" DESC, p."id", g."id""#);

    qb.build_query_as::<ProblemGoalRow>().fetch_all(pool).await
}
