//! Token issuance and refresh-token rotation

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Mutex;

use crate::domain::{DomainError, DomainResult, User, UserRepositoryInterface};
use crate::infrastructure::crypto::jwt::{create_token, JwtConfig};

/// Refresh tokens live two days from issuance.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 2;

/// Number of random bytes behind an opaque refresh token.
const REFRESH_TOKEN_BYTES: usize = 32;

/// Access + refresh token pair handed to clients.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs access tokens and manages refresh-token rotation against the store.
pub struct TokenIssuer {
    repo: Arc<dyn UserRepositoryInterface>,
    jwt: JwtConfig,
    rng: Mutex<StdRng>,
}

impl TokenIssuer {
    pub fn new(repo: Arc<dyn UserRepositoryInterface>, jwt: JwtConfig) -> Self {
        Self::with_rng(repo, jwt, StdRng::from_entropy())
    }

    /// Construct with a caller-provided generator (seedable in tests).
    pub fn with_rng(repo: Arc<dyn UserRepositoryInterface>, jwt: JwtConfig, rng: StdRng) -> Self {
        Self {
            repo,
            jwt,
            rng: Mutex::new(rng),
        }
    }

    /// Sign a short-lived access token for `user`.
    pub fn issue_access_token(&self, user: &User) -> DomainResult<String> {
        create_token(user, &self.jwt)
            .map_err(|e| DomainError::Validation(format!("failed to sign access token: {e}")))
    }

    /// Generate an opaque refresh token: 256 random bits, base64-encoded.
    fn generate_refresh_token(&self) -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        rng.fill_bytes(&mut bytes);
        BASE64.encode(bytes)
    }

    /// Issue an access + refresh pair for `user`.
    ///
    /// The refresh token and its expiry are persisted before the pair is
    /// returned, so a client can never hold a refresh token the store does
    /// not know about.
    pub async fn issue_token_pair(&self, user: &User) -> DomainResult<TokenPair> {
        let access_token = self.issue_access_token(user)?;
        let refresh_token = self.generate_refresh_token();

        let now = Utc::now();
        let mut updated = user.clone();
        updated.set_refresh_token(
            refresh_token.clone(),
            now + Duration::days(REFRESH_TOKEN_TTL_DAYS),
            now,
        );
        self.repo.update_user(&updated).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Resolve the user owning this exact refresh token.
    ///
    /// Absence and expiry collapse into the same error value, so callers
    /// cannot distinguish the two beyond the cost of the store lookup.
    pub async fn validate_refresh_token(&self, token: &str) -> DomainResult<User> {
        let invalid = || DomainError::Unauthorized("invalid refresh token".to_string());

        let user = self
            .repo
            .get_user_by_refresh_token(token)
            .await?
            .ok_or_else(invalid)?;

        match user.refresh_token_expires_at {
            Some(expires_at) if expires_at >= Utc::now() => Ok(user),
            _ => Err(invalid()),
        }
    }
}
