use serde::{Deserialize, Serialize};

/// Directory role of a user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    /// General Services Office staff (inventory managers).
    GsoStaff,
    DepartmentUser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::GsoStaff => "gso_staff",
            Role::DepartmentUser => "department_user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "gso_staff" => Some(Role::GsoStaff),
            "department_user" => Some(Role::DepartmentUser),
            _ => None,
        }
    }

    /// Admins and GSO staff see and manage everything inventory-related.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::GsoStaff)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
