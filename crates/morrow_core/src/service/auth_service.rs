//! Credential service: verification, registration, login, password reset.
//!
//! # Responsibility
//! - Drive the verify-then-register account state machine.
//! - Issue and check short-lived numeric codes through the mail seam.
//!
//! # Invariants
//! - A password is only ever set for a verified account.
//! - Verification success leaves the code in place; registration clears it.
//!   The two-step handshake lets the steps be checked independently.
//! - Code expiry is compared against absolute instants in milliseconds.

use crate::mail::{MailError, Mailer};
use crate::model::user::{normalize_email, User, UserId, UserProfile};
use crate::repo::{RepoError, UserRepository};
use crate::service::password::{hash_password, verify_password, PasswordError};
use crate::service::token_service::{TokenError, TokenService};
use chrono::Utc;
use log::info;
use rand::Rng;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Verification codes stay valid for ten minutes.
pub const VERIFICATION_CODE_TTL_MS: i64 = 10 * 60 * 1000;
/// Reset codes stay valid for thirty minutes.
pub const RESET_CODE_TTL_MS: i64 = 30 * 60 * 1000;

/// Credential-service errors, one variant per contract failure.
#[derive(Debug)]
pub enum AuthError {
    /// Verification requested for an already-verified account.
    AlreadyVerified,
    /// No account exists for the given email.
    NotFound,
    /// Presented verification code does not match the stored one.
    InvalidCode,
    /// Verification code matched but its validity window has passed.
    CodeExpired,
    /// A required input (name/email/password) was absent or blank.
    MissingFields,
    /// Registration attempted for an account that already has a password.
    UserExists,
    /// Registration attempted without a verified email.
    VerificationRequired,
    /// Unknown account, missing password, or password mismatch.
    InvalidCredentials,
    /// Correct password but the email was never verified.
    EmailNotVerified,
    /// Reset attempted with a code that does not match or has expired.
    InvalidOrExpiredCode,
    /// The mail collaborator failed to dispatch a code.
    Delivery(MailError),
    Password(PasswordError),
    Token(TokenError),
    Repo(RepoError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyVerified => write!(f, "email is already verified"),
            Self::NotFound => write!(f, "no account found for this email"),
            Self::InvalidCode => write!(f, "verification code is incorrect"),
            Self::CodeExpired => write!(f, "verification code has expired"),
            Self::MissingFields => write!(f, "name, email and password are required"),
            Self::UserExists => write!(f, "an account with this email already exists"),
            Self::VerificationRequired => write!(f, "email must be verified before registration"),
            Self::InvalidCredentials => write!(f, "invalid email or password"),
            Self::EmailNotVerified => write!(f, "email is not verified"),
            Self::InvalidOrExpiredCode => write!(f, "reset code is invalid or has expired"),
            Self::Delivery(err) => write!(f, "{err}"),
            Self::Password(err) => write!(f, "{err}"),
            Self::Token(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Delivery(err) => Some(err),
            Self::Password(err) => Some(err),
            Self::Token(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MailError> for AuthError {
    fn from(value: MailError) -> Self {
        Self::Delivery(value)
    }
}

impl From<PasswordError> for AuthError {
    fn from(value: PasswordError) -> Self {
        Self::Password(value)
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        Self::Token(value)
    }
}

impl From<RepoError> for AuthError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Successful registration/login payload.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: UserProfile,
}

/// Credential use-case service over a user repository and mail seam.
pub struct AuthService<R: UserRepository, M: Mailer> {
    repo: R,
    mailer: M,
    tokens: TokenService,
}

impl<R: UserRepository, M: Mailer> AuthService<R, M> {
    pub fn new(repo: R, mailer: M, tokens: TokenService) -> Self {
        Self {
            repo,
            mailer,
            tokens,
        }
    }

    /// Issues a verification code for `email` and dispatches it by mail.
    ///
    /// Creates the account shell when none exists (explicit find-or-create).
    pub fn request_verification_code(&self, email: &str) -> Result<(), AuthError> {
        self.request_verification_code_at(email, now_ms())
    }

    pub fn request_verification_code_at(&self, email: &str, now_ms: i64) -> Result<(), AuthError> {
        let email = normalize_email(email).ok_or(AuthError::MissingFields)?;
        let code = six_digit_code();
        let expires_at = now_ms + VERIFICATION_CODE_TTL_MS;

        match self.repo.get_user_by_email(&email)? {
            Some(user) if user.is_verified => return Err(AuthError::AlreadyVerified),
            Some(mut user) => {
                user.verification_code = Some(code.clone());
                user.verification_expires_at = Some(expires_at);
                self.repo.update_user(&user)?;
            }
            None => {
                let mut user = User::new(email.clone(), now_ms);
                user.verification_code = Some(code.clone());
                user.verification_expires_at = Some(expires_at);
                self.repo.create_user(&user)?;
            }
        }

        self.mailer.send_verification_code(&email, &code)?;
        info!("event=verification_code_sent module=auth status=ok");
        Ok(())
    }

    /// Checks a verification code and marks the account verified.
    ///
    /// The code stays stored; registration clears it later.
    pub fn verify_code(&self, email: &str, code: &str) -> Result<(), AuthError> {
        self.verify_code_at(email, code, now_ms())
    }

    pub fn verify_code_at(&self, email: &str, code: &str, now_ms: i64) -> Result<(), AuthError> {
        let email = normalize_email(email).ok_or(AuthError::MissingFields)?;
        let mut user = self
            .repo
            .get_user_by_email(&email)?
            .ok_or(AuthError::NotFound)?;

        if user.verification_code.as_deref() != Some(code) {
            return Err(AuthError::InvalidCode);
        }
        let expires_at = user.verification_expires_at.ok_or(AuthError::CodeExpired)?;
        if now_ms > expires_at {
            return Err(AuthError::CodeExpired);
        }

        user.is_verified = true;
        self.repo.update_user(&user)?;
        info!("event=email_verified module=auth status=ok");
        Ok(())
    }

    /// Completes registration for a verified account and returns a session.
    ///
    /// Registration does not re-check code expiry; the verified flag is the
    /// gate, and the stored code is simply cleared here.
    pub fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let name = name.trim();
        if name.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        let email = normalize_email(email).ok_or(AuthError::MissingFields)?;

        let mut user = self
            .repo
            .get_user_by_email(&email)?
            .ok_or(AuthError::VerificationRequired)?;
        if user.has_password() {
            return Err(AuthError::UserExists);
        }
        if !user.is_verified {
            return Err(AuthError::VerificationRequired);
        }

        user.name = Some(name.to_string());
        user.password_hash = Some(hash_password(password)?);
        user.clear_verification();
        self.repo.update_user(&user)?;

        let token = self.tokens.issue(user.uuid)?;
        info!("event=user_registered module=auth status=ok");
        Ok(AuthSession {
            token,
            user: user.profile(),
        })
    }

    /// Authenticates an email/password pair and returns a session.
    pub fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
        let user = self
            .repo
            .get_user_by_email(&email)?
            .ok_or(AuthError::InvalidCredentials)?;
        let stored_hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, stored_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let token = self.tokens.issue(user.uuid)?;
        info!("event=user_login module=auth status=ok");
        Ok(AuthSession {
            token,
            user: user.profile(),
        })
    }

    /// Issues a password-reset code and dispatches it by mail.
    pub fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.request_password_reset_at(email, now_ms())
    }

    pub fn request_password_reset_at(&self, email: &str, now_ms: i64) -> Result<(), AuthError> {
        let email = normalize_email(email).ok_or(AuthError::MissingFields)?;
        let mut user = self
            .repo
            .get_user_by_email(&email)?
            .ok_or(AuthError::NotFound)?;

        let code = six_digit_code();
        user.reset_code = Some(code.clone());
        user.reset_expires_at = Some(now_ms + RESET_CODE_TTL_MS);
        self.repo.update_user(&user)?;

        self.mailer.send_password_reset(&email, &code)?;
        info!("event=reset_code_sent module=auth status=ok");
        Ok(())
    }

    /// Sets a new password when the reset code matches and is still valid.
    pub fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.reset_password_at(email, code, new_password, now_ms())
    }

    pub fn reset_password_at(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
        now_ms: i64,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        let email = normalize_email(email).ok_or(AuthError::MissingFields)?;

        // A missing user, mismatched code and stale code are deliberately
        // indistinguishable to the caller.
        let mut user = self
            .repo
            .get_user_by_email(&email)?
            .ok_or(AuthError::InvalidOrExpiredCode)?;
        let code_matches = user.reset_code.as_deref() == Some(code);
        let still_valid = user.reset_expires_at.is_some_and(|expires| expires > now_ms);
        if !code_matches || !still_valid {
            return Err(AuthError::InvalidOrExpiredCode);
        }

        user.password_hash = Some(hash_password(new_password)?);
        user.clear_reset();
        self.repo.update_user(&user)?;
        info!("event=password_reset module=auth status=ok");
        Ok(())
    }

    /// Loads the API-safe profile for an authenticated user id.
    pub fn current_user(&self, id: UserId) -> Result<UserProfile, AuthError> {
        let user = self.repo.get_user(id)?.ok_or(AuthError::NotFound)?;
        Ok(user.profile())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Draws a code uniformly from the 6-digit space, 100000..=999999.
fn six_digit_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}
