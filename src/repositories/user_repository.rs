use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    NotSet, QueryFilter, QueryOrder, Set, SqlErr,
};
use std::sync::Arc;

use crate::auth::{
    user::{self, Column, Entity as Users},
    Role,
};
use crate::errors::ServiceError;

use super::{NewUser, UserDirectory, UserUpdate};

/// `sea-orm` backed user directory.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn require(&self, id: i64) -> Result<user::Model, ServiceError> {
        Users::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {id}")))
    }
}

fn map_unique_violation(err: DbErr, username: &str) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            ServiceError::Conflict(format!("Username '{username}' is already taken"))
        }
        _ => ServiceError::DatabaseError(err),
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn get_user(&self, id: i64) -> Result<Option<user::Model>, ServiceError> {
        Ok(Users::find_by_id(id).one(&*self.db).await?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(Users::find()
            .filter(Column::Username.eq(username))
            .one(&*self.db)
            .await?)
    }

    async fn users_with_role(
        &self,
        role: Role,
        active_only: bool,
    ) -> Result<Vec<user::Model>, ServiceError> {
        let mut query = Users::find().filter(Column::Role.eq(role));
        if active_only {
            query = query.filter(Column::IsActive.eq(true));
        }
        Ok(query.order_by_asc(Column::Id).all(&*self.db).await?)
    }

    async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(Users::find()
            .order_by_desc(Column::JoinedAt)
            .order_by_desc(Column::Id)
            .all(&*self.db)
            .await?)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<user::Model, ServiceError> {
        if self.find_by_username(&new_user.username).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Username '{}' is already taken",
                new_user.username
            )));
        }

        let username = new_user.username.clone();
        user::ActiveModel {
            id: NotSet,
            username: Set(new_user.username),
            name: Set(new_user.name),
            password_hash: Set(new_user.password_hash),
            role: Set(new_user.role),
            is_active: Set(new_user.is_active),
            joined_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| map_unique_violation(e, &username))
    }

    async fn update_user(&self, id: i64, update: UserUpdate) -> Result<user::Model, ServiceError> {
        let existing = self.require(id).await?;

        if let Some(username) = &update.username {
            if let Some(other) = self.find_by_username(username).await? {
                if other.id != id {
                    return Err(ServiceError::Conflict(format!(
                        "Username '{username}' is already taken"
                    )));
                }
            }
        }

        let username = update
            .username
            .clone()
            .unwrap_or_else(|| existing.username.clone());
        let mut active = existing.into_active_model();
        if let Some(value) = update.username {
            active.username = Set(value);
        }
        if let Some(value) = update.name {
            active.name = Set(value);
        }
        if let Some(value) = update.role {
            active.role = Set(value);
        }
        if let Some(value) = update.password_hash {
            active.password_hash = Set(value);
        }

        active
            .update(&*self.db)
            .await
            .map_err(|e| map_unique_violation(e, &username))
    }

    async fn set_active(&self, id: i64, active_flag: bool) -> Result<user::Model, ServiceError> {
        let mut active = self.require(id).await?.into_active_model();
        active.is_active = Set(active_flag);
        Ok(active.update(&*self.db).await?)
    }
}
