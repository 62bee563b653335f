use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{self, AuthError};
use crate::db::operations::users::{self, UserRecord, UserSettingsRecord};
use crate::db::Database;
use crate::services::problem_solving::{MAX_GRADE_LEVEL, MIN_GRADE_LEVEL};

pub const DIFFICULTY_PREFERENCES: [&str; 4] = ["adaptive", "easy", "medium", "hard"];

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error("inactive user")]
    Inactive,
    #[error(transparent)]
    Token(#[from] AuthError),
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub grade_level: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOutcome {
    pub access_token: String,
    pub token_type: &'static str,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub difficulty_preference: Option<String>,
    pub hint_preference: Option<bool>,
    pub notification_enabled: Option<bool>,
    pub theme: Option<String>,
}

fn validate_registration(input: &RegisterInput) -> Result<(), AccountError> {
    if input.username.trim().is_empty() {
        return Err(AccountError::Validation("username must not be empty".to_string()));
    }
    if input.email.trim().is_empty() || !input.email.contains('@') {
        return Err(AccountError::Validation("email is invalid".to_string()));
    }
    if input.password.is_empty() {
        return Err(AccountError::Validation("password must not be empty".to_string()));
    }
    if let Some(grade) = input.grade_level {
        if !(MIN_GRADE_LEVEL..=MAX_GRADE_LEVEL).contains(&grade) {
            return Err(AccountError::Validation(format!(
                "gradeLevel must be between {MIN_GRADE_LEVEL} and {MAX_GRADE_LEVEL}"
            )));
        }
    }
    Ok(())
}

/// Creates the user together with default settings.
pub async fn register(
    db: &Database,
    input: RegisterInput,
    bcrypt_cost: u32,
) -> Result<UserRecord, AccountError> {
    validate_registration(&input)?;
    let username = input.username.trim().to_string();
    let email = input.email.trim().to_ascii_lowercase();

    if users::username_taken(db.pool(), &username).await? {
        return Err(AccountError::Conflict("Username already registered".to_string()));
    }
    if users::email_taken(db.pool(), &email).await? {
        return Err(AccountError::Conflict("Email already registered".to_string()));
    }

    let now = Utc::now();
    let user = UserRecord {
        id: Uuid::new_v4().to_string(),
        username,
        email,
        password_hash: bcrypt::hash(&input.password, bcrypt_cost)?,
        grade_level: input.grade_level,
        is_active: true,
        created_at: now,
        last_login: None,
    };

    let mut tx = db.pool().begin().await?;
    if let Err(err) = users::insert_user(&mut tx, &user).await {
        if is_unique_violation(&err) {
            return Err(AccountError::Conflict("Username or email already registered".to_string()));
        }
        return Err(err.into());
    }
    users::upsert_settings(&mut tx, &UserSettingsRecord::defaults(&user.id, now)).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub async fn login(
    db: &Database,
    username: &str,
    password: &str,
    secret: Option<&str>,
    expires_in: &str,
) -> Result<LoginOutcome, AccountError> {
    let Some(user) = users::find_user_by_username(db.pool(), username.trim()).await? else {
        return Err(AccountError::InvalidCredentials);
    };

    if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
        tracing::debug!(username, "password mismatch");
        return Err(AccountError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AccountError::Inactive);
    }

    let secret = secret.ok_or(AuthError::MissingSecret)?;
    let (access_token, expires_at) = auth::sign_jwt_for_user(&user.id, secret, expires_in)?;
    users::touch_last_login(db.pool(), &user.id, Utc::now()).await?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(LoginOutcome {
        access_token,
        token_type: "bearer",
        user_id: user.id,
        expires_at,
    })
}

pub async fn get_settings(db: &Database, user_id: &str) -> Result<UserSettingsRecord, AccountError> {
    Ok(users::get_settings(db.pool(), user_id)
        .await?
        .unwrap_or_else(|| UserSettingsRecord::defaults(user_id, Utc::now())))
}

pub async fn update_settings(
    db: &Database,
    user_id: &str,
    update: SettingsUpdate,
) -> Result<UserSettingsRecord, AccountError> {
    let current = get_settings(db, user_id).await?;
    let merged = apply_settings_update(current, update, Utc::now())?;

    let mut conn = db.pool().acquire().await?;
    users::upsert_settings(&mut conn, &merged).await?;
    Ok(merged)
}

fn apply_settings_update(
    mut settings: UserSettingsRecord,
    update: SettingsUpdate,
    now: DateTime<Utc>,
) -> Result<UserSettingsRecord, AccountError> {
    if let Some(difficulty) = update.difficulty_preference {
        if !DIFFICULTY_PREFERENCES.contains(&difficulty.as_str()) {
            return Err(AccountError::Validation(format!(
                "difficultyPreference must be one of {}",
                DIFFICULTY_PREFERENCES.join(", ")
            )));
        }
        settings.difficulty_preference = difficulty;
    }
    if let Some(theme) = update.theme {
        if theme.trim().is_empty() {
            return Err(AccountError::Validation("theme must not be empty".to_string()));
        }
        settings.theme = theme;
    }
    if let Some(hint) = update.hint_preference {
        settings.hint_preference = hint;
    }
    if let Some(enabled) = update.notification_enabled {
        settings.notification_enabled = enabled;
    }
    settings.updated_at = now;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(username: &str, email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            grade_level: None,
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(validate_registration(&input("ala", "ala@example.com", "secret")).is_ok());
        assert!(validate_registration(&input(" ", "ala@example.com", "secret")).is_err());
        assert!(validate_registration(&input("ala", "not-an-email", "secret")).is_err());
        assert!(validate_registration(&input("ala", "ala@example.com", "")).is_err());

        let mut bad_grade = input("ala", "ala@example.com", "secret");
        bad_grade.grade_level = Some(15);
        assert!(validate_registration(&bad_grade).is_err());
    }

    #[test]
    fn test_settings_update_merges_fields() {
        let now = Utc::now();
        let settings = UserSettingsRecord::defaults("u1", now);
        let merged = apply_settings_update(
            settings,
            SettingsUpdate {
                difficulty_preference: Some("hard".to_string()),
                hint_preference: Some(false),
                ..SettingsUpdate::default()
            },
            now,
        )
        .unwrap();

        assert_eq!(merged.difficulty_preference, "hard");
        assert!(!merged.hint_preference);
        assert!(merged.notification_enabled);
        assert_eq!(merged.theme, "light");
    }

    #[test]
    fn test_settings_update_rejects_unknown_difficulty() {
        let now = Utc::now();
        let result = apply_settings_update(
            UserSettingsRecord::defaults("u1", now),
            SettingsUpdate {
                difficulty_preference: Some("extreme".to_string()),
                ..SettingsUpdate::default()
            },
            now,
        );
        assert!(matches!(result, Err(AccountError::Validation(_))));
    }
}
