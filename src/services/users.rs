use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::password::{hash_password, MIN_PASSWORD_LENGTH};
use crate::auth::{AuthUser, Capability, Role, UserSummary};
use crate::errors::ServiceError;
use crate::repositories::{NewUser, UserDirectory, UserUpdate};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserListing {
    pub users: Vec<UserSummary>,
    /// Accounts waiting for activation
    pub pending: usize,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct EditUserRequest {
    #[validate(email)]
    pub username: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub role: Role,
    /// Left unchanged when absent or blank
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub username: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub role: Role,
    #[validate(length(min = 8))]
    pub password: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Account administration. Every call requires `ManageUsers`.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserDirectory>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    pub async fn list(&self, actor: &AuthUser) -> Result<UserListing, ServiceError> {
        actor.require(Capability::ManageUsers)?;
        let users = self.users.list_users().await?;
        let pending = users.iter().filter(|u| !u.is_active).count();
        Ok(UserListing {
            users: users.into_iter().map(UserSummary::from).collect(),
            pending,
        })
    }

    /// Used by the CLI as well, where there is no signed-in actor.
    pub async fn create(&self, request: CreateUserRequest) -> Result<UserSummary, ServiceError> {
        request.validate()?;
        let user = self
            .users
            .create_user(NewUser {
                username: request.username.trim().to_lowercase(),
                name: request.name.trim().to_string(),
                password_hash: hash_password(&request.password)?,
                role: request.role,
                is_active: request.is_active,
            })
            .await?;
        info!(user_id = user.id, role = %user.role, "user created");
        Ok(user.into())
    }

    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn toggle_active(&self, actor: &AuthUser, id: i64) -> Result<UserSummary, ServiceError> {
        actor.require(Capability::ManageUsers)?;
        let user = self
            .users
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {id}")))?;
        let updated = self.users.set_active(id, !user.is_active).await?;
        info!(user_id = id, active = updated.is_active, "user activation toggled");
        Ok(updated.into())
    }

    #[instrument(skip(self, actor, request), fields(actor_id = actor.user_id))]
    pub async fn edit(
        &self,
        actor: &AuthUser,
        id: i64,
        request: EditUserRequest,
    ) -> Result<UserSummary, ServiceError> {
        actor.require(Capability::ManageUsers)?;
        request.validate()?;

        // Blank means "keep the current password"; anything else is hashed as typed.
        let password_hash = match request.password.as_deref() {
            Some(pw) if !pw.trim().is_empty() => {
                if pw.chars().count() < MIN_PASSWORD_LENGTH {
                    return Err(ServiceError::ValidationError(format!(
                        "Password must be at least {MIN_PASSWORD_LENGTH} characters"
                    )));
                }
                Some(hash_password(pw)?)
            }
            _ => None,
        };

        let updated = self
            .users
            .update_user(
                id,
                UserUpdate {
                    username: Some(request.username.trim().to_lowercase()),
                    name: Some(request.name.trim().to_string()),
                    role: Some(request.role),
                    password_hash,
                },
            )
            .await?;
        info!(user_id = id, "user updated");
        Ok(updated.into())
    }
}
