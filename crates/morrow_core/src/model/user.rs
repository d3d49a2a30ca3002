//! User domain model.
//!
//! # Responsibility
//! - Define the account record including verification and reset state.
//! - Provide the safe public projection returned over the API.
//!
//! # Invariants
//! - `email` is the unique lookup key; stored normalized (trimmed, lowercase).
//! - An unverified user never carries a usable password.
//! - Reset fields are transient and cleared after a successful reset.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a user account.
pub type UserId = Uuid;

/// Canonical account record.
///
/// A user is created as an unverified shell on the first verification-code
/// request; name and password appear only once registration completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable global ID used as the owner key on todos.
    pub uuid: UserId,
    /// Unique, normalized email address.
    pub email: String,
    /// Display name; set on registration.
    pub name: Option<String>,
    /// Argon2 PHC-format hash; set on registration or password reset.
    pub password_hash: Option<String>,
    /// Whether the email address has been confirmed.
    pub is_verified: bool,
    /// Pending 6-digit verification code, cleared by registration.
    pub verification_code: Option<String>,
    /// Verification code expiry, epoch milliseconds.
    pub verification_expires_at: Option<i64>,
    /// Pending 6-digit password-reset code.
    pub reset_code: Option<String>,
    /// Reset code expiry, epoch milliseconds.
    pub reset_expires_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// Public projection of a user, safe for API responses.
///
/// Excludes the password hash and any pending codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: Option<String>,
    pub email: String,
}

impl User {
    /// Creates an unverified account shell keyed by email.
    pub fn new(email: impl Into<String>, created_at: i64) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            email: email.into(),
            name: None,
            password_hash: None,
            is_verified: false,
            verification_code: None,
            verification_expires_at: None,
            reset_code: None,
            reset_expires_at: None,
            created_at,
        }
    }

    /// Returns the API-safe projection of this account.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.uuid,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    /// Whether registration has completed for this account.
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Clears the pending verification code and its expiry.
    pub fn clear_verification(&mut self) {
        self.verification_code = None;
        self.verification_expires_at = None;
    }

    /// Clears the pending reset code and its expiry.
    pub fn clear_reset(&mut self) {
        self.reset_code = None;
        self.reset_expires_at = None;
    }
}

/// Normalizes an email for storage and lookup.
///
/// Returns `None` when the value is empty after trimming.
pub fn normalize_email(email: &str) -> Option<String> {
    let trimmed = email.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, User};

    #[test]
    fn new_user_starts_unverified_without_credentials() {
        let user = User::new("a@example.com", 1_000);
        assert!(!user.is_verified);
        assert!(!user.has_password());
        assert!(user.verification_code.is_none());
        assert_eq!(user.created_at, 1_000);
    }

    #[test]
    fn profile_excludes_sensitive_fields() {
        let mut user = User::new("a@example.com", 0);
        user.password_hash = Some("$argon2id$...".to_string());
        user.verification_code = Some("123456".to_string());

        let json = serde_json::to_value(user.profile()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("verification_code").is_none());
        assert_eq!(json["email"], "a@example.com");
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  User@Example.COM ").as_deref(),
            Some("user@example.com")
        );
        assert_eq!(normalize_email("   "), None);
    }
}
