use async_trait::async_trait;

use super::User;
use crate::support::DomainResult;

/// Persistence port for the user aggregate.
///
/// Implementations must be safe to call concurrently from multiple
/// orchestrator invocations. Email uniqueness is enforced here: `create_user`
/// fails with `DomainError::Conflict` on a duplicate address.
#[async_trait]
pub trait UserRepositoryInterface: Send + Sync {
    async fn create_user(&self, user: &User) -> DomainResult<()>;

    async fn get_user_by_email(&self, email: &str) -> DomainResult<Option<User>>;
    async fn get_user_by_id(&self, id: &str) -> DomainResult<Option<User>>;
    async fn get_user_by_refresh_token(&self, token: &str) -> DomainResult<Option<User>>;

    /// Persist the full snapshot, replacing the stored record.
    async fn update_user(&self, user: &User) -> DomainResult<()>;
    async fn delete_user(&self, id: &str) -> DomainResult<()>;
}
