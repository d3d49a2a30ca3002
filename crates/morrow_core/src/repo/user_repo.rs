//! User repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide account persistence keyed by id and unique email.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Emails are stored normalized; lookups expect normalized input.
//! - `update_user` reports `UserNotFound` instead of silently writing nothing.

use crate::model::user::{User, UserId};
use crate::repo::{bool_to_int, ensure_connection_ready, parse_bool, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const USER_SELECT_SQL: &str = "SELECT
    uuid,
    email,
    name,
    password_hash,
    is_verified,
    verification_code,
    verification_expires_at,
    reset_code,
    reset_expires_at,
    created_at
FROM users";

const USER_COLUMNS: &[&str] = &[
    "uuid",
    "email",
    "name",
    "password_hash",
    "is_verified",
    "verification_code",
    "verification_expires_at",
    "reset_code",
    "reset_expires_at",
    "created_at",
];

/// Repository interface for account persistence.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<UserId>;
    /// Persists all mutable fields of an existing account.
    fn update_user(&self, user: &User) -> RepoResult<()>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Returns all account ids, for scheduler fan-out.
    fn list_user_ids(&self) -> RepoResult<Vec<UserId>>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("users", USER_COLUMNS)])?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<UserId> {
        self.conn.execute(
            "INSERT INTO users (
                uuid,
                email,
                name,
                password_hash,
                is_verified,
                verification_code,
                verification_expires_at,
                reset_code,
                reset_expires_at,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                user.uuid.to_string(),
                user.email.as_str(),
                user.name.as_deref(),
                user.password_hash.as_deref(),
                bool_to_int(user.is_verified),
                user.verification_code.as_deref(),
                user.verification_expires_at,
                user.reset_code.as_deref(),
                user.reset_expires_at,
                user.created_at,
            ],
        )?;

        Ok(user.uuid)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                email = ?1,
                name = ?2,
                password_hash = ?3,
                is_verified = ?4,
                verification_code = ?5,
                verification_expires_at = ?6,
                reset_code = ?7,
                reset_expires_at = ?8
             WHERE uuid = ?9;",
            params![
                user.email.as_str(),
                user.name.as_deref(),
                user.password_hash.as_deref(),
                bool_to_int(user.is_verified),
                user.verification_code.as_deref(),
                user.verification_expires_at,
                user.reset_code.as_deref(),
                user.reset_expires_at,
                user.uuid.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::UserNotFound(user.uuid));
        }

        Ok(())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE email = ?1;"))?;
        let mut rows = stmt.query([email])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn list_user_ids(&self) -> RepoResult<Vec<UserId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT uuid FROM users ORDER BY created_at ASC, uuid ASC;")?;
        let mut rows = stmt.query([])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "users.uuid")?);
        }
        Ok(ids)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = parse_uuid(&uuid_text, "users.uuid")?;
    let is_verified = parse_bool(row.get::<_, i64>("is_verified")?, "users.is_verified")?;

    Ok(User {
        uuid,
        email: row.get("email")?,
        name: row.get("name")?,
        password_hash: row.get("password_hash")?,
        is_verified,
        verification_code: row.get("verification_code")?,
        verification_expires_at: row.get("verification_expires_at")?,
        reset_code: row.get("reset_code")?,
        reset_expires_at: row.get("reset_expires_at")?,
        created_at: row.get("created_at")?,
    })
}
