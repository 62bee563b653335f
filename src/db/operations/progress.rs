use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgressRecord {
    pub id: String,
    pub user_id: String,
    pub goal_id: String,
    pub mastery_level: f64,
    pub attempts_count: i64,
    pub successful_attempts: f64,
    pub last_practiced: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProblemHistoryRecord {
    pub id: String,
    pub user_id: String,
    pub problem_id: String,
    pub attempted_at: DateTime<Utc>,
    pub completed: bool,
    pub time_spent_seconds: Option<i64>,
    pub steps_completed: i64,
    pub steps_with_hints: i64,
}

/// History row joined with the problem it refers to.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProblemHistoryEntry {
    pub problem_id: String,
    pub problem_text: Option<String>,
    pub subject_area: Option<String>,
    pub attempted_at: DateTime<Utc>,
    pub completed: bool,
    pub time_spent_seconds: Option<i64>,
    pub steps_completed: i64,
    pub steps_with_hints: i64,
}

/// Records one attempt in a single statement so concurrent attempts on the same
/// (user, goal) row cannot lose increments. Inside `DO UPDATE` the bare column
/// names are the stored values and `excluded` carries this attempt's credit.
pub async fn upsert_goal_attempt(
    conn: &mut SqliteConnection,
    user_id: &str,
    goal_id: &str,
    credit: f64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "goal_progress"
            ("id", "user_id", "goal_id", "mastery_level", "attempts_count", "successful_attempts", "last_practiced")
        VALUES (?, ?, ?, MIN(1.0, ?), 1, ?, ?)
        ON CONFLICT ("user_id", "goal_id") DO UPDATE SET
            "attempts_count" = "attempts_count" + 1,
            "successful_attempts" = "successful_attempts" + excluded."successful_attempts",
            "mastery_level" = MIN(
                1.0,
                ("successful_attempts" + excluded."successful_attempts") / ("attempts_count" + 1)
            ),
            "last_practiced" = excluded."last_practiced"
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(goal_id)
    .bind(credit)
    .bind(credit)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_goal_progress(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<GoalProgressRecord>, sqlx::Error> {
    sqlx::query_as::<_, GoalProgressRecord>(
        r#"
        SELECT "id", "user_id", "goal_id", "mastery_level", "attempts_count",
               "successful_attempts", "last_practiced"
        FROM "goal_progress"
        WHERE "user_id" = ?
        ORDER BY "goal_id"
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn get_goal_progress(
    pool: &SqlitePool,
    user_id: &str,
    goal_id: &str,
) -> Result<Option<GoalProgressRecord>, sqlx::Error> {
    sqlx::query_as::<_, GoalProgressRecord>(
        r#"
        SELECT "id", "user_id", "goal_id", "mastery_level", "attempts_count",
               "successful_attempts", "last_practiced"
        FROM "goal_progress"
        WHERE "user_id" = ? AND "goal_id" = ?
        "#,
    )
    .bind(user_id)
    .bind(goal_id)
    .fetch_optional(pool)
    .await
}

/// Goals below `threshold`, weakest first.
pub async fn weakest_goals(
    pool: &SqlitePool,
    user_id: &str,
    threshold: f64,
    limit: i64,
) -> Result<Vec<GoalProgressRecord>, sqlx::Error> {
    sqlx::query_as::<_, GoalProgressRecord>(
        r#"
        SELECT "id", "user_id", "goal_id", "mastery_level", "attempts_count",
               "successful_attempts", "last_practiced"
        FROM "goal_progress"
        WHERE "user_id" = ? AND "mastery_level" < ?
        ORDER BY "mastery_level" ASC, "goal_id"
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(threshold)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn insert_history_if_absent(
    conn: &mut SqliteConnection,
    user_id: &str,
    problem_id: &str,
    attempted_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "problem_history" ("id", "user_id", "problem_id", "attempted_at")
        VALUES (?, ?, ?, ?)
        ON CONFLICT ("user_id", "problem_id") DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(problem_id)
    .bind(attempted_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_history(
    conn: &mut SqliteConnection,
    user_id: &str,
    problem_id: &str,
) -> Result<Option<ProblemHistoryRecord>, sqlx::Error> {
    sqlx::query_as::<_, ProblemHistoryRecord>(
        r#"
        SELECT "id", "user_id", "problem_id", "attempted_at", "completed", "time_spent_seconds",
               "steps_completed", "steps_with_hints"
        FROM "problem_history"
        WHERE "user_id" = ? AND "problem_id" = ?
        "#,
    )
    .bind(user_id)
    .bind(problem_id)
    .fetch_optional(conn)
    .await
}

pub async fn record_history_step(
    conn: &mut SqliteConnection,
    history_id: &str,
    with_hint: bool,
    completed_time_spent: Option<i64>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE "problem_history" SET
            "steps_completed" = "steps_completed" + 1,
            "steps_with_hints" = "steps_with_hints" + ?,
            "completed" = CASE WHEN ? THEN 1 ELSE "completed" END,
            "time_spent_seconds" = COALESCE(?, "time_spent_seconds")
        WHERE "id" = ?
        "#,
    )
    .bind(i64::from(with_hint))
    .bind(completed_time_spent.is_some())
    .bind(completed_time_spent)
    .bind(history_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_history(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<ProblemHistoryEntry>, sqlx::Error> {
    sqlx::query_as::<_, ProblemHistoryEntry>(
        r#"
        SELECT h."problem_id", p."text" AS "problem_text", p."subject_area", h."attempted_at",
               h."completed", h."time_spent_seconds", h."steps_completed", h."steps_with_hints"
        FROM "problem_history" h
        LEFT JOIN "problems" p ON p."id" = h."problem_id"
        WHERE h."user_id" = ?
        ORDER BY h."attempted_at" DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
