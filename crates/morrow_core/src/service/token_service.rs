//! Bearer token issuance and validation.
//!
//! # Responsibility
//! - Issue signed, time-limited credentials binding a user id.
//! - Validate incoming `Authorization` headers into owner ids.
//!
//! # Invariants
//! - The signing secret is loaded once at startup and never mutated.
//! - Expired or malformed tokens are indistinguishable to callers
//!   (`InvalidToken` either way).

use crate::model::user::UserId;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const BEARER_PREFIX: &str = "Bearer ";

/// Token validation/issuance errors.
#[derive(Debug)]
pub enum TokenError {
    /// No credential was presented with the request.
    MissingToken,
    /// Bad scheme, signature, format or an expired credential.
    InvalidToken,
    /// Signing failed; a configuration problem, not a caller problem.
    Signing(jsonwebtoken::errors::Error),
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingToken => write!(f, "no authentication token provided"),
            Self::InvalidToken => write!(f, "invalid or expired token"),
            Self::Signing(err) => write!(f, "token signing failed: {err}"),
        }
    }
}

impl Error for TokenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Signing(err) => Some(err),
            _ => None,
        }
    }
}

/// Signed claims carried by every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Bound user id.
    pub sub: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Stateless token service around a process-wide signing secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    /// Creates a service with the shared secret and validity window.
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        let mut validation = Validation::default();
        // Expiry boundaries are contractual; no clock leeway.
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issues a token bound to `user` valid from now.
    pub fn issue(&self, user: UserId) -> Result<String, TokenError> {
        self.issue_at(user, Utc::now())
    }

    /// Issues a token valid from the given instant; test seam for expiry.
    pub fn issue_at(&self, user: UserId, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = TokenClaims {
            sub: user.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(TokenError::Signing)
    }

    /// Validates the raw `Authorization` header value into a user id.
    ///
    /// # Errors
    /// - `MissingToken` when the header is absent or blank.
    /// - `InvalidToken` for a bad scheme, signature, format or expiry.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<UserId, TokenError> {
        let header = authorization
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(TokenError::MissingToken)?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(TokenError::InvalidToken)?;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::InvalidToken)?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::{TokenError, TokenService};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn service() -> TokenService {
        TokenService::new(b"test-secret", 24)
    }

    #[test]
    fn issue_then_authenticate_roundtrip() {
        let tokens = service();
        let user = Uuid::new_v4();

        let token = tokens.issue(user).unwrap();
        let header = format!("Bearer {token}");
        assert_eq!(tokens.authenticate(Some(&header)).unwrap(), user);
    }

    #[test]
    fn missing_header_is_missing_token() {
        let tokens = service();
        assert!(matches!(
            tokens.authenticate(None),
            Err(TokenError::MissingToken)
        ));
        assert!(matches!(
            tokens.authenticate(Some("   ")),
            Err(TokenError::MissingToken)
        ));
    }

    #[test]
    fn bad_scheme_or_garbage_is_invalid() {
        let tokens = service();
        assert!(matches!(
            tokens.authenticate(Some("Basic abc")),
            Err(TokenError::InvalidToken)
        ));
        assert!(matches!(
            tokens.authenticate(Some("Bearer not.a.jwt")),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_invalid() {
        let tokens = service();
        let user = Uuid::new_v4();

        let stale = tokens
            .issue_at(user, Utc::now() - Duration::hours(25))
            .unwrap();
        let header = format!("Bearer {stale}");
        assert!(matches!(
            tokens.authenticate(Some(&header)),
            Err(TokenError::InvalidToken)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let tokens = service();
        let other = TokenService::new(b"other-secret", 24);
        let user = Uuid::new_v4();

        let forged = other.issue(user).unwrap();
        let header = format!("Bearer {forged}");
        assert!(matches!(
            tokens.authenticate(Some(&header)),
            Err(TokenError::InvalidToken)
        ));
    }
}
