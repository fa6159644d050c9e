//! In-memory user repository for development and testing

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{DomainError, DomainResult, User, UserRepositoryInterface};

/// DashMap-backed repository keyed by user id.
///
/// Email uniqueness is enforced by scanning, which is fine at dev/test
/// scale. Selected with `database.url = "memory"`.
pub struct InMemoryUserRepository {
    users: DashMap<String, User>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    fn find<P: Fn(&User) -> bool>(&self, predicate: P) -> Option<User> {
        self.users
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepositoryInterface for InMemoryUserRepository {
    async fn create_user(&self, new_user: &User) -> DomainResult<()> {
        if self.find(|u| u.email == new_user.email).is_some() {
            return Err(DomainError::Conflict("email already exists".to_string()));
        }
        self.users.insert(new_user.id.clone(), new_user.clone());
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        Ok(self.find(|u| u.email == email))
    }

    async fn get_user_by_id(&self, id: &str) -> DomainResult<Option<User>> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }

    async fn get_user_by_refresh_token(&self, token: &str) -> DomainResult<Option<User>> {
        Ok(self.find(|u| u.refresh_token.as_deref() == Some(token)))
    }

    async fn update_user(&self, snapshot: &User) -> DomainResult<()> {
        if !self.users.contains_key(&snapshot.id) {
            return Err(DomainError::NotFound {
                entity: "User",
                field: "id",
                value: snapshot.id.clone(),
            });
        }
        self.users.insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> DomainResult<()> {
        if self.users.remove(id).is_none() {
            return Err(DomainError::NotFound {
                entity: "User",
                field: "id",
                value: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample(email: &str) -> User {
        User::new(
            email,
            "digest",
            "Someone",
            "123456".to_string(),
            Utc::now() + Duration::minutes(30),
        )
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let repo = InMemoryUserRepository::new();
        repo.create_user(&sample("ann@example.com")).await.unwrap();

        let err = repo
            .create_user(&sample("ann@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn lookup_by_refresh_token() {
        let repo = InMemoryUserRepository::new();
        let mut user = sample("ann@example.com");
        user.set_refresh_token(
            "opaque-token".to_string(),
            Utc::now() + Duration::days(2),
            Utc::now(),
        );
        repo.create_user(&user).await.unwrap();

        let found = repo
            .get_user_by_refresh_token("opaque-token")
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(repo
            .get_user_by_refresh_token("other")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let repo = InMemoryUserRepository::new();
        let err = repo.update_user(&sample("ghost@example.com")).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
