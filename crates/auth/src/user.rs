//! Directory user record.
//!
//! Identities are issued by the campus identity provider; SupplyDesk keeps a
//! local directory entry per user carrying the role, department and the
//! approval/active flags that gate access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supplydesk_core::{DomainError, DomainResult, Entity, UserId};

use crate::Role;

/// Account approval state. New accounts wait for an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub department: String,
    pub approval_status: ApprovalStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn register(
        id: UserId,
        username: impl Into<String>,
        full_name: impl Into<String>,
        role: Role,
        department: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        Ok(Self {
            id,
            username,
            full_name: full_name.into().trim().to_string(),
            role,
            department: department.into().trim().to_string(),
            approval_status: ApprovalStatus::Pending,
            is_active: true,
            created_at: now,
        })
    }

    /// Approved and active users may use the API.
    pub fn can_sign_in(&self) -> bool {
        self.is_active && self.approval_status == ApprovalStatus::Approved
    }

    pub fn approve(&mut self) -> DomainResult<()> {
        if self.approval_status == ApprovalStatus::Approved {
            return Err(DomainError::invariant("user is already approved"));
        }
        self.approval_status = ApprovalStatus::Approved;
        Ok(())
    }

    pub fn reject(&mut self) -> DomainResult<()> {
        if self.approval_status != ApprovalStatus::Pending {
            return Err(DomainError::invariant("only pending users can be rejected"));
        }
        self.approval_status = ApprovalStatus::Rejected;
        Ok(())
    }

    /// Flip the active flag; returns the new value.
    ///
    /// An actor cannot deactivate their own account.
    pub fn toggle_active(&mut self, actor: UserId) -> DomainResult<bool> {
        if actor == self.id && self.is_active {
            return Err(DomainError::invariant("users cannot deactivate themselves"));
        }
        self.is_active = !self.is_active;
        Ok(self.is_active)
    }

    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
