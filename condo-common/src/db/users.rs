//! User accounts and login sessions

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{generate_salt, generate_session_token, hash_password, verify_password};
use crate::config::AdminCredentials;
use crate::db::record::{require_text, uuid_column};
use crate::time::now_unix;
use crate::{Error, Result};

const USER_COLUMNS: &str =
    "guid, username, password_hash, password_salt, role, created_at, updated_at";

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full read/write access
    Admin,
    /// Read-only access
    Viewer,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Viewer => "viewer",
        }
    }

    pub fn can_write(self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "viewer" => Ok(UserRole::Viewer),
            other => Err(Error::InvalidInput(format!("Invalid user role '{}'", other))),
        }
    }
}

/// User account; credential columns are never serialized
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub guid: Uuid,
    pub username: String,
    #[serde(skip)]
    password_hash: String,
    #[serde(skip)]
    password_salt: String,
    pub role: UserRole,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            guid: uuid_column(row, "guid")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            password_salt: row.try_get("password_salt")?,
            role: role.parse()?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    pub fn check_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_salt, &self.password_hash)
    }
}

/// Issued login session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    /// Unix seconds
    pub expires_at: i64,
}

/// Create a user with a freshly salted password hash
pub async fn create_user<'e, E>(
    executor: E,
    username: &str,
    password: &str,
    role: UserRole,
) -> Result<User>
where
    E: SqliteExecutor<'e>,
{
    let username = require_text("username", username)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let salt = generate_salt();
    let hash = hash_password(password, &salt);

    let sql = format!(
        "INSERT INTO users (guid, username, password_hash, password_salt, role) \
         VALUES (?, ?, ?, ?, ?) RETURNING {}",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(Uuid::new_v4().to_string())
        .bind(&username)
        .bind(&hash)
        .bind(&salt)
        .bind(role.as_str())
        .fetch_one(executor)
        .await
        .map_err(Error::from_write)?;

    User::from_row(&row)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(username.trim())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(User::from_row).transpose()
}

pub async fn count_users(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Check credentials; unknown users and wrong passwords are indistinguishable
pub async fn authenticate(pool: &SqlitePool, username: &str, password: &str) -> Result<User> {
    match find_by_username(pool, username).await? {
        Some(user) if user.check_password(password) => Ok(user),
        _ => Err(Error::Unauthorized("Invalid username or password".to_string())),
    }
}

/// Issue a new session token valid for `ttl_hours`
pub async fn create_session(pool: &SqlitePool, user_id: Uuid, ttl_hours: u32) -> Result<Session> {
    let token = generate_session_token();
    let expires_at = now_unix() + i64::from(ttl_hours) * 3600;

    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user_id.to_string())
        .bind(expires_at)
        .execute(pool)
        .await
        .map_err(Error::from_write)?;

    Ok(Session {
        token,
        user_id,
        expires_at,
    })
}

/// Resolve a session token to its user, purging expired sessions first
pub async fn session_user(pool: &SqlitePool, token: &str) -> Result<User> {
    purge_expired_sessions(pool).await?;

    let sql = format!(
        "SELECT {} FROM users WHERE guid = (SELECT user_id FROM sessions WHERE token = ?)",
        USER_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::Unauthorized("Invalid or expired session".to_string()))?;

    User::from_row(&row)
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now_unix())
        .execute(pool)
        .await?;

    let purged = result.rows_affected();
    if purged > 0 {
        debug!("Purged {} expired sessions", purged);
    }
    Ok(purged)
}

/// Create the configured admin when no users exist yet
pub async fn ensure_bootstrap_admin(
    pool: &SqlitePool,
    admin: Option<&AdminCredentials>,
) -> Result<Option<User>> {
    let Some(admin) = admin else {
        return Ok(None);
    };
    if count_users(pool).await? > 0 {
        debug!("Users already exist, skipping admin bootstrap");
        return Ok(None);
    }

    let user = create_user(pool, &admin.username, &admin.password, UserRole::Admin).await?;
    info!("Created bootstrap admin user '{}'", user.username);
    Ok(Some(user))
}
