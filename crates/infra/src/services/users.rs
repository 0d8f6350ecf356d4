use serde::Deserialize;
use tracing::info;

use supplydesk_auth::{Role, User};
use supplydesk_core::UserId;

use super::{now, ServiceResult, SupplyDesk};

/// Directory entry created by an administrator.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    /// Identity-provider subject; generated when absent.
    pub id: Option<UserId>,
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub department: String,
    /// Accounts created by an administrator are approved unless asked otherwise.
    #[serde(default = "default_true")]
    pub approved: bool,
}

fn default_true() -> bool {
    true
}

impl SupplyDesk {
    pub async fn list_users(&self) -> ServiceResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    pub async fn get_user(&self, id: UserId) -> ServiceResult<User> {
        self.load_user(id).await
    }

    pub async fn register_user(&self, input: NewUser) -> ServiceResult<User> {
        let mut user = User::register(
            input.id.unwrap_or_default(),
            input.username,
            input.full_name,
            input.role,
            input.department,
            now(),
        )?;
        if input.approved {
            user.approve()?;
        }
        self.store.save_user(&user).await?;
        info!(user_id = %user.id, username = %user.username, role = %user.role, "user registered");
        Ok(user)
    }

    /// Approve (or reject) a pending account.
    pub async fn review_user(&self, id: UserId, approve: bool) -> ServiceResult<User> {
        let mut user = self.load_user(id).await?;
        if approve {
            user.approve()?;
        } else {
            user.reject()?;
        }
        self.store.save_user(&user).await?;
        info!(user_id = %id, status = user.approval_status.as_str(), "user reviewed");
        Ok(user)
    }

    /// Directory record for a token subject, provisioned on first contact.
    ///
    /// A new account takes the first role carried by the token and waits for
    /// approval. Administrator accounts are approved at once so an empty
    /// directory can be bootstrapped from the identity provider.
    pub async fn resolve_token_user(&self, id: UserId, roles: &[Role]) -> ServiceResult<User> {
        if let Some(user) = self.store.get_user(id).await? {
            return Ok(user);
        }
        let role = roles.first().copied().unwrap_or(Role::DepartmentUser);
        let mut user = User::register(id, id.to_string(), "", role, "", now())?;
        if role == Role::Admin {
            user.approve()?;
        }
        self.store.save_user(&user).await?;
        info!(user_id = %id, role = %role, status = user.approval_status.as_str(), "user provisioned from token");
        Ok(user)
    }

    pub async fn toggle_user_active(&self, actor: UserId, id: UserId) -> ServiceResult<User> {
        let mut user = self.load_user(id).await?;
        let active = user.toggle_active(actor)?;
        self.store.save_user(&user).await?;
        info!(user_id = %id, active, "user active flag toggled");
        Ok(user)
    }
}
