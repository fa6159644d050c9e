//! JWT access-token handling

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::User;

/// Access tokens carry a fixed one-hour lifetime.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// JWT signing configuration.
///
/// Loaded from the `[security]` config section at startup; an empty secret
/// is rejected there, before any request is served.
#[derive(Clone, Debug)]
pub struct JwtConfig {
    /// Symmetric key for HS256 signing
    pub secret: String,
    /// Issuer claim
    pub issuer: String,
    /// Audience claim
    pub audience: String,
}

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Email address of the subject
    pub email: String,
    /// Display name
    pub name: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
}

impl TokenClaims {
    pub fn new(user: &User, config: &JwtConfig) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(ACCESS_TOKEN_TTL_SECS);

        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: config.issuer.clone(),
            aud: config.audience.clone(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// Sign an access token for `user`.
pub fn create_token(user: &User, config: &JwtConfig) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = TokenClaims::new(user, config);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Verify and decode an access token.
pub fn verify_token(
    token: &str,
    config: &JwtConfig,
) -> Result<TokenClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);

    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-signing-key".to_string(),
            issuer: "auth-service".to_string(),
            audience: "auth-service-clients".to_string(),
        }
    }

    fn test_user() -> User {
        User::new(
            "ann@example.com",
            "digest",
            "Ann",
            "123456".to_string(),
            Utc::now() + Duration::minutes(30),
        )
    }

    #[test]
    fn create_and_verify_roundtrip() {
        let config = test_config();
        let user = test_user();

        let token = create_token(&user, &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "ann@example.com");
        assert_eq!(claims.name, "Ann");
        assert_eq!(claims.iss, "auth-service");
        assert!(!claims.is_expired());
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_TTL_SECS);
    }

    #[test]
    fn garbage_token_is_rejected() {
        let config = test_config();
        assert!(verify_token("not-a-token", &config).is_err());
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let config = test_config();
        let other = JwtConfig {
            secret: "a-different-key".to_string(),
            ..test_config()
        };

        let token = create_token(&test_user(), &other).unwrap();
        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn token_for_other_audience_is_rejected() {
        let config = test_config();
        let other = JwtConfig {
            audience: "somebody-else".to_string(),
            ..test_config()
        };

        let token = create_token(&test_user(), &other).unwrap();
        assert!(verify_token(&token, &config).is_err());
    }
}
