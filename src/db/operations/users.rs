use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub grade_level: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSettingsRecord {
    pub user_id: String,
    pub difficulty_preference: String,
    pub hint_preference: bool,
    pub notification_enabled: bool,
    pub theme: String,
    pub updated_at: DateTime<Utc>,
}

impl UserSettingsRecord {
    pub fn defaults(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            difficulty_preference: "adaptive".to_string(),
            hint_preference: true,
            notification_enabled: true,
            theme: "light".to_string(),
            updated_at: now,
        }
    }
}

const USER_COLUMNS: &str = r#""id", "username", "email", "password_hash", "grade_level", "is_active", "created_at", "last_login""#;

pub async fn insert_user(conn: &mut SqliteConnection, user: &UserRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "users"
            ("id", "username", "email", "password_hash", "grade_level", "is_active", "created_at", "last_login")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.grade_level)
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(user.last_login)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_user_by_id(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let sql = format!(r#"SELECT {USER_COLUMNS} FROM "users" WHERE "id" = ?"#);
    sqlx::query_as::<_, UserRecord>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<UserRecord>, sqlx::Error> {
    let sql = format!(r#"SELECT {USER_COLUMNS} FROM "users" WHERE "username" = ?"#);
    sqlx::query_as::<_, UserRecord>(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await
}

pub async fn username_taken(pool: &SqlitePool, username: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "users" WHERE "username" = ?"#)
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn email_taken(pool: &SqlitePool, email: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "users" WHERE "email" = ?"#)
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

pub async fn touch_last_login(
    pool: &SqlitePool,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "users" SET "last_login" = ? WHERE "id" = ?"#)
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_settings(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<UserSettingsRecord>, sqlx::Error> {
    sqlx::query_as::<_, UserSettingsRecord>(
        r#"
        SELECT "user_id", "difficulty_preference", "hint_preference", "notification_enabled",
               "theme", "updated_at"
        FROM "user_settings"
        WHERE "user_id" = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn upsert_settings(
    conn: &mut SqliteConnection,
    settings: &UserSettingsRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO "user_settings"
            ("user_id", "difficulty_preference", "hint_preference", "notification_enabled", "theme", "updated_at")
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT ("user_id") DO UPDATE SET
            "difficulty_preference" = excluded."difficulty_preference",
            "hint_preference" = excluded."hint_preference",
            "notification_enabled" = excluded."notification_enabled",
            "theme" = excluded."theme",
            "updated_at" = excluded."updated_at"
        "#,
    )
    .bind(&settings.user_id)
    .bind(&settings.difficulty_preference)
    .bind(settings.hint_preference)
    .bind(settings.notification_enabled)
    .bind(&settings.theme)
    .bind(settings.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}
