use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    pub name: String,
    pub grade_level: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub description: String,
}

/// One Requirement -> Goal edge with both endpoints' descriptions.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequirementGoalRow {
    pub goal_id: String,
    pub goal_description: String,
    pub requirement_id: String,
    pub requirement_description: String,
}

pub async fn list_chapters(pool: &SqlitePool) -> Result<Vec<Chapter>, sqlx::Error> {
    sqlx::query_as::<_, Chapter>(
        r#"SELECT "id", "name", "grade_level" FROM "chapters" ORDER BY "grade_level", "name""#,
    )
    .fetch_all(pool)
    .await
}

pub async fn list_requirements(pool: &SqlitePool) -> Result<Vec<Requirement>, sqlx::Error> {
    sqlx::query_as::<_, Requirement>(
        r#"SELECT "id", "description" FROM "requirements" ORDER BY "id""#,
    )
    .fetch_all(pool)
    .await
}

pub async fn requirements_for_chapter(
    pool: &SqlitePool,
    chapter_id: &str,
) -> Result<Vec<Requirement>, sqlx::Error> {
    sqlx::query_as::<_, Requirement>(
        r#"
        SELECT "id", "description"
        FROM "requirements"
        WHERE "chapter_id" = ?
        ORDER BY "id"
        "#,
    )
    .bind(chapter_id)
    .fetch_all(pool)
    .await
}

pub async fn goals_for_requirement(
    pool: &SqlitePool,
    requirement_id: &str,
) -> Result<Vec<Goal>, sqlx::Error> {
    sqlx::query_as::<_, Goal>(
        r#"
        SELECT g."id", g."description"
        FROM "requirement_goals" rg
        JOIN "goals" g ON g."id" = rg."goal_id"
        WHERE rg."requirement_id" = ?
        ORDER BY g."id"
        "#,
    )
    .bind(requirement_id)
    .fetch_all(pool)
    .await
}

pub async fn requirements_for_goal(
    pool: &SqlitePool,
    goal_id: &str,
) -> Result<Vec<Requirement>, sqlx::Error> {
    sqlx::query_as::<_, Requirement>(
        r#"
        SELECT r."id", r."description"
        FROM "requirement_goals" rg
        JOIN "requirements" r ON r."id" = rg."requirement_id"
        WHERE rg."goal_id" = ?
        ORDER BY r."id"
        "#,
    )
    .bind(goal_id)
    .fetch_all(pool)
    .await
}

/// Goal edges reachable from the given requirements, in requirement order then goal id.
pub async fn goal_rows_for_requirements(
    pool: &SqlitePool,
    requirement_ids: &[String],
) -> Result<Vec<RequirementGoalRow>, sqlx::Error> {
    if requirement_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT g."id" AS "goal_id", g."description" AS "goal_description",
               r."id" AS "requirement_id", r."description" AS "requirement_description"
        FROM "requirements" r
        JOIN "requirement_goals" rg ON rg."requirement_id" = r."id"
        JOIN "goals" g ON g."id" = rg."goal_id"
        WHERE r."id" IN ("#,
    );
    {
        let mut sep = qb.separated(", ");
        for id in requirement_ids {
            sep.push_bind(id);
        }
    }
    qb.push(r#") ORDER BY r."id", g."id""#);

    qb.build_query_as::<RequirementGoalRow>()
        .fetch_all(pool)
        .await
}

pub async fn goal_descriptions(
    pool: &SqlitePool,
    goal_ids: &[String],
) -> Result<HashMap<String, String>, sqlx::Error> {
    if goal_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(r#"SELECT "id", "description" FROM "goals" WHERE "id" IN ("#);
    {
        let mut sep = qb.separated(", ");
        for id in goal_ids {
            sep.push_bind(id);
        }
    }
    qb.push(")");

    let goals = qb.build_query_as::<Goal>().fetch_all(pool).await?;
    Ok(goals.into_iter().map(|g| (g.id, g.description)).collect())
}

/// Creates the goal when missing; an existing description is kept.
pub async fn upsert_goal(
    conn: &mut SqliteConnection,
    goal_id: &str,
    description: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "goals" ("id", "description") VALUES (?, ?) ON CONFLICT ("id") DO NOTHING"#,
    )
    .bind(goal_id)
    .bind(description)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_chapter(
    conn: &mut SqliteConnection,
    chapter: &Chapter,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO "chapters" ("id", "name", "grade_level")
        VALUES (?, ?, ?)
        ON CONFLICT ("id") DO NOTHING
        "#,
    )
    .bind(&chapter.id)
    .bind(&chapter.name)
    .bind(chapter.grade_level)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn insert_requirement(
    conn: &mut SqliteConnection,
    chapter_id: &str,
    requirement: &Requirement,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO "requirements" ("id", "chapter_id", "description")
        VALUES (?, ?, ?)
        ON CONFLICT ("id") DO NOTHING
        "#,
    )
    .bind(&requirement.id)
    .bind(chapter_id)
    .bind(&requirement.description)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn link_requirement_goal(
    conn: &mut SqliteConnection,
    requirement_id: &str,
    goal_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "requirement_goals" ("requirement_id", "goal_id")
        VALUES (?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(requirement_id)
    .bind(goal_id)
    .execute(conn)
    .await?;
    Ok(())
}
