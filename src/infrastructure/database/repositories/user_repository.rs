use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::domain::{DomainError, DomainResult, User, UserRepositoryInterface};
use crate::infrastructure::database::entities::user;

pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(model: user::Model) -> User {
    User {
        id: model.id,
        email: model.email,
        password_hash: model.password_hash,
        name: model.name,
        email_confirmed: model.email_confirmed,
        confirmation_code: model.confirmation_code,
        confirmation_code_expires_at: model.confirmation_code_expires_at,
        refresh_token: model.refresh_token,
        refresh_token_expires_at: model.refresh_token_expires_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

fn domain_to_active(u: &User) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(u.id.clone()),
        email: Set(u.email.clone()),
        password_hash: Set(u.password_hash.clone()),
        name: Set(u.name.clone()),
        email_confirmed: Set(u.email_confirmed),
        confirmation_code: Set(u.confirmation_code.clone()),
        confirmation_code_expires_at: Set(u.confirmation_code_expires_at),
        refresh_token: Set(u.refresh_token.clone()),
        refresh_token_expires_at: Set(u.refresh_token_expires_at),
        created_at: Set(u.created_at),
        updated_at: Set(u.updated_at),
    }
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(e.to_string())
}

fn is_unique_violation(e: &sea_orm::DbErr) -> bool {
    let msg = e.to_string();
    msg.contains("UNIQUE") || msg.contains("duplicate")
}

// ── Repository implementation ───────────────────────────────────

#[async_trait]
impl UserRepositoryInterface for SeaOrmUserRepository {
    async fn create_user(&self, new_user: &User) -> DomainResult<()> {
        domain_to_active(new_user)
            .insert(&self.db)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::Conflict("email already exists".to_string())
                } else {
                    db_err(e)
                }
            })?;
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let model = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.map(model_to_domain))
    }

    async fn get_user_by_id(&self, id: &str) -> DomainResult<Option<User>> {
        let model = user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.map(model_to_domain))
    }

    async fn get_user_by_refresh_token(&self, token: &str) -> DomainResult<Option<User>> {
        let model = user::Entity::find()
            .filter(user::Column::RefreshToken.eq(token))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.map(model_to_domain))
    }

    async fn update_user(&self, snapshot: &User) -> DomainResult<()> {
        domain_to_active(snapshot)
            .update(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> DomainResult<()> {
        let result = user::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound {
                entity: "User",
                field: "id",
                value: id.to_string(),
            });
        }

        Ok(())
    }
}
