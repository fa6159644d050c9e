//! Authentication service — application-layer orchestration
//!
//! All credential-lifecycle business logic lives here: registration, login,
//! email confirmation, code resend and refresh-token rotation. HTTP handlers
//! are thin wrappers that delegate to this service.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::application::services::email_dispatcher::EmailDispatcher;
use crate::application::services::tokens::{TokenIssuer, TokenPair};
use crate::domain::{ConfirmationPolicy, DomainError, DomainResult, User, UserRepositoryInterface};
use crate::infrastructure::crypto::password::{hash_password, verify_password};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub email_confirmed: bool,
}

/// Orchestrates the credential lifecycle against the identity store.
///
/// Confirmation and refresh mutations for one user are serialized through a
/// per-user async lock, so concurrent requests cannot interleave their
/// read-modify-write cycles and lose updates.
pub struct AuthService {
    repo: Arc<dyn UserRepositoryInterface>,
    tokens: TokenIssuer,
    policy: ConfirmationPolicy,
    dispatcher: EmailDispatcher,
    rng: Mutex<StdRng>,
    user_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn UserRepositoryInterface>,
        tokens: TokenIssuer,
        dispatcher: EmailDispatcher,
    ) -> Self {
        Self::with_rng(repo, tokens, dispatcher, StdRng::from_entropy())
    }

    /// Construct with a caller-provided code generator (seedable in tests).
    pub fn with_rng(
        repo: Arc<dyn UserRepositoryInterface>,
        tokens: TokenIssuer,
        dispatcher: EmailDispatcher,
        rng: StdRng,
    ) -> Self {
        Self {
            repo,
            tokens,
            policy: ConfirmationPolicy::default(),
            dispatcher,
            rng: Mutex::new(rng),
            user_locks: DashMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: ConfirmationPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn user_lock(&self, email: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.user_locks
            .entry(email.to_string())
            .or_insert_with(Default::default)
            .clone()
    }

    fn issue_code(&self, now: chrono::DateTime<Utc>) -> (String, chrono::DateTime<Utc>) {
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.policy.issue(&mut *rng, now)
    }

    /// Register a new account and return its first token pair.
    ///
    /// The confirmation email is fire-and-forget: the dispatch job is queued
    /// and this call returns without waiting for delivery.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> DomainResult<TokenPair> {
        if self.repo.get_user_by_email(email).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "account already exists for {email}"
            )));
        }

        let password_hash = hash_password(password)
            .map_err(|e| DomainError::Validation(format!("failed to hash password: {e}")))?;

        let (code, expires_at) = self.issue_code(Utc::now());
        let user = User::new(email, password_hash, name, code.clone(), expires_at);
        self.repo.create_user(&user).await?;

        self.dispatcher.enqueue(user.email.clone(), code).await;

        let pair = self.tokens.issue_token_pair(&user).await?;
        info!(user_id = %user.id, "new account registered");
        Ok(pair)
    }

    /// Authenticate by email + password.
    ///
    /// Fails `Unauthorized` when the email is unknown or the password does
    /// not match the stored digest.
    pub async fn login(&self, email: &str, password: &str) -> DomainResult<LoginOutcome> {
        let invalid = || DomainError::Unauthorized("invalid credentials".to_string());

        let user = self
            .repo
            .get_user_by_email(email)
            .await?
            .ok_or_else(invalid)?;

        let valid = verify_password(password, &user.password_hash).unwrap_or(false);
        if !valid {
            return Err(invalid());
        }

        let tokens = self.tokens.issue_token_pair(&user).await?;
        Ok(LoginOutcome {
            tokens,
            email_confirmed: user.email_confirmed,
        })
    }

    /// Check a submitted confirmation code.
    ///
    /// Returns `false` without mutating anything when no live code exists,
    /// the code expired, or it does not match. On match the code pair is
    /// cleared in the same update that marks the address confirmed, so a
    /// repeat submission returns `false`.
    pub async fn confirm_email_code(&self, email: &str, submitted_code: &str) -> DomainResult<bool> {
        let lock = self.user_lock(email);
        let _guard = lock.lock().await;

        let mut user = self
            .repo
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "User",
                field: "email",
                value: email.to_string(),
            })?;

        let now = Utc::now();
        let matches = match (&user.confirmation_code, user.confirmation_code_expires_at) {
            (Some(code), Some(expires_at)) => {
                !self.policy.is_expired(expires_at, now) && code == submitted_code
            }
            _ => false,
        };
        if !matches {
            return Ok(false);
        }

        user.mark_confirmed(now);
        self.repo.update_user(&user).await?;
        info!(user_id = %user.id, "email confirmed");
        Ok(true)
    }

    /// Issue and dispatch a replacement confirmation code.
    ///
    /// Fails `RateLimited` while the cooldown since the prior issuance is
    /// still running. A successful resend reopens confirmation: the stored
    /// `email_confirmed` flag is reset.
    pub async fn resend_confirmation_code(&self, email: &str) -> DomainResult<()> {
        let lock = self.user_lock(email);
        let _guard = lock.lock().await;

        let mut user = self
            .repo
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "User",
                field: "email",
                value: email.to_string(),
            })?;

        let now = Utc::now();
        if !self
            .policy
            .can_reissue(user.confirmation_code_expires_at, now)
        {
            return Err(DomainError::RateLimited(
                "a confirmation code was issued recently".to_string(),
            ));
        }

        let (code, expires_at) = self.issue_code(now);
        user.reissue_confirmation(code.clone(), expires_at, now);
        self.repo.update_user(&user).await?;

        self.dispatcher.enqueue(user.email.clone(), code).await;
        info!(user_id = %user.id, "confirmation code reissued");
        Ok(())
    }

    /// Rotate a refresh token: the presented token is invalidated and a new
    /// access + refresh pair is issued and persisted.
    pub async fn refresh_token(&self, refresh_token: &str) -> DomainResult<TokenPair> {
        // Resolve the owner first to know which per-user lock to take.
        let owner = self.tokens.validate_refresh_token(refresh_token).await?;

        let lock = self.user_lock(&owner.email);
        let _guard = lock.lock().await;

        // Revalidate under the lock: a concurrent rotation of the same
        // token must fail on the second validation.
        let mut user = self.tokens.validate_refresh_token(refresh_token).await?;

        user.clear_refresh_token(Utc::now());
        self.repo.update_user(&user).await?;

        self.tokens.issue_token_pair(&user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::Duration;

    use crate::application::ports::{EmailTransport, TransportError};
    use crate::application::services::email_dispatcher::DispatcherConfig;
    use crate::infrastructure::crypto::jwt::JwtConfig;
    use crate::infrastructure::storage::memory::InMemoryUserRepository;
    use crate::support::shutdown::ShutdownSignal;

    struct SilentTransport;

    #[async_trait]
    impl EmailTransport for SilentTransport {
        async fn send_confirmation(&self, _: &str, _: &str) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct Fixture {
        service: AuthService,
        repo: Arc<InMemoryUserRepository>,
        shutdown: ShutdownSignal,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.shutdown.trigger();
        }
    }

    fn fixture() -> Fixture {
        fixture_with_policy(ConfirmationPolicy::default())
    }

    fn fixture_with_policy(policy: ConfirmationPolicy) -> Fixture {
        let repo = Arc::new(InMemoryUserRepository::new());
        let jwt = JwtConfig {
            secret: "test-signing-key".to_string(),
            issuer: "auth-service".to_string(),
            audience: "auth-service-clients".to_string(),
        };
        let shutdown = ShutdownSignal::new();
        let (dispatcher, _handle) = EmailDispatcher::start(
            Arc::new(SilentTransport),
            DispatcherConfig::default(),
            shutdown.clone(),
        );
        let tokens = TokenIssuer::with_rng(repo.clone(), jwt, StdRng::seed_from_u64(11));
        let service = AuthService::with_rng(
            repo.clone(),
            tokens,
            dispatcher,
            StdRng::seed_from_u64(13),
        )
        .with_policy(policy);
        Fixture {
            service,
            repo,
            shutdown,
        }
    }

    async fn stored_user(repo: &InMemoryUserRepository, email: &str) -> User {
        repo.get_user_by_email(email)
            .await
            .unwrap()
            .expect("user must exist")
    }

    #[tokio::test]
    async fn register_creates_unconfirmed_user_with_pending_code() {
        let fx = fixture();
        let pair = fx
            .service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();
        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());

        let user = stored_user(&fx.repo, "ann@example.com").await;
        assert!(!user.email_confirmed);
        let code = user.confirmation_code.expect("code must be pending");
        assert_eq!(code.len(), 6);
        let value: u32 = code.parse().unwrap();
        assert!((100_000..=999_999).contains(&value));
        assert!(user.confirmation_code_expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_and_leaves_first_intact() {
        let fx = fixture();
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();
        let before = stored_user(&fx.repo, "ann@example.com").await;

        let err = fx
            .service
            .register("ann@example.com", "Other2@", "Impostor")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let after = stored_user(&fx.repo, "ann@example.com").await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let fx = fixture();
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();

        let err = fx
            .service
            .login("ann@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        let err = fx
            .service
            .login("nobody@example.com", "Secret1!")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn login_returns_confirmation_state() {
        let fx = fixture();
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();

        let outcome = fx.service.login("ann@example.com", "Secret1!").await.unwrap();
        assert!(!outcome.email_confirmed);
        assert!(!outcome.tokens.access_token.is_empty());
    }

    #[tokio::test]
    async fn confirm_succeeds_once_then_returns_false() {
        let fx = fixture();
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();
        let code = stored_user(&fx.repo, "ann@example.com")
            .await
            .confirmation_code
            .unwrap();

        assert!(fx
            .service
            .confirm_email_code("ann@example.com", &code)
            .await
            .unwrap());
        let user = stored_user(&fx.repo, "ann@example.com").await;
        assert!(user.email_confirmed);
        assert!(user.confirmation_code.is_none());
        assert!(user.confirmation_code_expires_at.is_none());

        // The code was cleared by the first confirmation.
        assert!(!fx
            .service
            .confirm_email_code("ann@example.com", &code)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn confirm_with_wrong_code_mutates_nothing() {
        let fx = fixture();
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();
        let before = stored_user(&fx.repo, "ann@example.com").await;

        assert!(!fx
            .service
            .confirm_email_code("ann@example.com", "000000")
            .await
            .unwrap());

        let after = stored_user(&fx.repo, "ann@example.com").await;
        assert_eq!(before, after);
        assert!(!after.email_confirmed);
    }

    #[tokio::test]
    async fn confirm_with_expired_code_returns_false() {
        let fx = fixture();
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();

        let mut user = stored_user(&fx.repo, "ann@example.com").await;
        let code = user.confirmation_code.clone().unwrap();
        user.confirmation_code_expires_at = Some(Utc::now() - Duration::seconds(1));
        fx.repo.update_user(&user).await.unwrap();

        assert!(!fx
            .service
            .confirm_email_code("ann@example.com", &code)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn confirm_unknown_email_is_not_found() {
        let fx = fixture();
        let err = fx
            .service
            .confirm_email_code("nobody@example.com", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn resend_inside_cooldown_is_rate_limited() {
        let fx = fixture();
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();

        let err = fx
            .service
            .resend_confirmation_code("ann@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::RateLimited(_)));
    }

    #[tokio::test]
    async fn resend_after_cooldown_issues_fresh_code() {
        let fx = fixture();
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();

        // Age the pending pair so issuance lies three minutes in the past.
        let mut user = stored_user(&fx.repo, "ann@example.com").await;
        let old_code = user.confirmation_code.clone().unwrap();
        user.confirmation_code_expires_at = Some(
            user.confirmation_code_expires_at.unwrap() - Duration::minutes(3),
        );
        fx.repo.update_user(&user).await.unwrap();

        fx.service
            .resend_confirmation_code("ann@example.com")
            .await
            .unwrap();

        let user = stored_user(&fx.repo, "ann@example.com").await;
        assert!(!user.email_confirmed);
        let new_code = user.confirmation_code.unwrap();
        assert_ne!(new_code, old_code);
        assert!(user.confirmation_code_expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn zero_cooldown_policy_allows_immediate_resend() {
        let fx = fixture_with_policy(ConfirmationPolicy::new(
            Duration::minutes(30),
            Duration::zero(),
        ));
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();
        let old_code = stored_user(&fx.repo, "ann@example.com")
            .await
            .confirmation_code
            .unwrap();

        fx.service
            .resend_confirmation_code("ann@example.com")
            .await
            .unwrap();

        let new_code = stored_user(&fx.repo, "ann@example.com")
            .await
            .confirmation_code
            .unwrap();
        assert_ne!(new_code, old_code);
    }

    #[tokio::test]
    async fn resend_reopens_a_confirmed_address() {
        let fx = fixture();
        fx.service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();
        let code = stored_user(&fx.repo, "ann@example.com")
            .await
            .confirmation_code
            .unwrap();
        fx.service
            .confirm_email_code("ann@example.com", &code)
            .await
            .unwrap();

        // No live pair after confirmation, so the cooldown does not apply.
        fx.service
            .resend_confirmation_code("ann@example.com")
            .await
            .unwrap();

        let user = stored_user(&fx.repo, "ann@example.com").await;
        assert!(!user.email_confirmed);
        assert!(user.confirmation_code.is_some());
    }

    #[tokio::test]
    async fn refresh_token_is_single_use() {
        let fx = fixture();
        let pair = fx
            .service
            .register("ann@example.com", "Secret1!", "Ann")
            .await
            .unwrap();

        let rotated = fx.service.refresh_token(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        let err = fx
            .service
            .refresh_token(&pair.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));

        // The replacement token still rotates.
        fx.service.refresh_token(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn registration_to_confirmed_login_flow() {
        let fx = fixture();
        let pair = fx
            .service
            .register("a@x.com", "Secret1!", "Ann")
            .await
            .unwrap();
        assert!(!pair.access_token.is_empty());

        let outcome = fx.service.login("a@x.com", "Secret1!").await.unwrap();
        assert!(!outcome.email_confirmed);

        let code = stored_user(&fx.repo, "a@x.com")
            .await
            .confirmation_code
            .unwrap();
        assert!(fx.service.confirm_email_code("a@x.com", &code).await.unwrap());

        let outcome = fx.service.login("a@x.com", "Secret1!").await.unwrap();
        assert!(outcome.email_confirmed);
    }
}
