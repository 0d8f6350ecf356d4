use std::collections::HashSet;

use thiserror::Error;

use crate::{Permission, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Static role policy.
///
/// - `admin`: wildcard
/// - `gso_staff`: everything except user management
/// - `department_user`: browse the catalog, file requests and borrow
pub fn role_permissions(role: Role) -> Vec<Permission> {
    match role {
        Role::Admin => vec![Permission::WILDCARD],
        Role::GsoStaff => vec![
            Permission::CATALOG_READ,
            Permission::CATALOG_MANAGE,
            Permission::STOCK_MANAGE,
            Permission::REQUESTS_READ,
            Permission::REQUESTS_CREATE,
            Permission::REQUESTS_REVIEW,
            Permission::BORROW_REQUEST,
            Permission::LOANS_READ,
            Permission::LOANS_MANAGE,
            Permission::SCAN_PROCESS,
            Permission::REPORTS_EXPORT,
            Permission::ANALYTICS_READ,
            Permission::ADMIN_JOBS,
        ],
        Role::DepartmentUser => vec![
            Permission::CATALOG_READ,
            Permission::REQUESTS_READ,
            Permission::REQUESTS_CREATE,
            Permission::BORROW_REQUEST,
            Permission::LOANS_READ,
        ],
    }
}

/// Union of the permissions granted by `roles`, without duplicates.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut seen = HashSet::new();
    roles
        .iter()
        .flat_map(|r| role_permissions(*r))
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Authorize a principal for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
