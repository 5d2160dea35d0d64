//! HS256 bearer tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::config::AuthConfig;
use crate::users::{Role, User};

pub const ISSUER: &str = "searchgate";

/// Overrides `auth.jwt_secret` from the config file.
pub const SECRET_ENV: &str = "SEARCHGATE_JWT_SECRET";

/// Upper bound on token lifetime, about ten years.
const MAX_TTL_HOURS: u64 = 24 * 365 * 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub sub: String,
}

/// Issues and verifies signed tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Build from config, resolving the secret from the environment, the
    /// config file, or a random per-process value, in that order.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let env_secret = std::env::var(SECRET_ENV).ok();
        let secret = resolve_secret(env_secret.as_deref(), config.jwt_secret.as_deref())?;
        let hours = config.token_ttl_hours.min(MAX_TTL_HOURS) as i64;
        Ok(Self::new(&secret, Duration::hours(hours)))
    }

    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            iss: ISSUER.to_string(),
            sub: user.id.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Check signature, issuer and validity window.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

/// Pick the signing secret. Blank values count as absent.
pub fn resolve_secret(env: Option<&str>, configured: Option<&str>) -> Result<Vec<u8>, AuthError> {
    let explicit = [env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty());
    if let Some(secret) = explicit {
        return Ok(secret.as_bytes().to_vec());
    }

    let mut bytes = vec![0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| AuthError::Secret(e.to_string()))?;
    tracing::warn!(
        "No JWT secret configured (set auth.jwt_secret or {}); tokens will not survive a restart",
        SECRET_ENV
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64, role: Role) -> User {
        let now = Utc::now();
        User {
            id,
            username: format!("user{}", id),
            password_hash: String::new(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = TokenService::new(b"secret", Duration::hours(1));
        let token = tokens.issue(&user(7, Role::Admin)).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenService::new(b"one", Duration::hours(1))
            .issue(&user(1, Role::User))
            .unwrap();
        let other = TokenService::new(b"two", Duration::hours(1));
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_rejected() {
        let tokens = TokenService::new(b"secret", Duration::seconds(-30));
        let token = tokens.issue(&user(1, Role::User)).unwrap();
        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = TokenService::new(b"secret", Duration::hours(1));
        assert!(tokens.verify("not.a.token").is_err());
        assert!(tokens.verify("").is_err());
    }

    #[test]
    fn test_claims_use_wire_names() {
        let tokens = TokenService::new(b"secret", Duration::hours(1));
        let token = tokens.issue(&user(4, Role::User)).unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        let raw = decode::<serde_json::Value>(&token, &DecodingKey::from_secret(b"secret"), &validation)
            .unwrap()
            .claims;

        assert_eq!(raw["userId"], 4);
        assert_eq!(raw["role"], "user");
        assert_eq!(raw["iss"], "searchgate");
    }

    #[test]
    fn test_secret_precedence() {
        assert_eq!(resolve_secret(Some("env"), Some("cfg")).unwrap(), b"env");
        assert_eq!(resolve_secret(Some("  "), Some("cfg")).unwrap(), b"cfg");
        assert_eq!(resolve_secret(None, None).unwrap().len(), 32);
        assert_ne!(
            resolve_secret(None, None).unwrap(),
            resolve_secret(None, None).unwrap()
        );
    }
}
