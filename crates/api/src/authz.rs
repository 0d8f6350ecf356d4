//! Permission guard applied by handlers before calling a service.

use supplydesk_auth::{authorize, AuthzError, Permission};

use crate::context::PrincipalContext;

/// Require every permission in `required`.
pub fn require(ctx: &PrincipalContext, required: &[Permission]) -> Result<(), AuthzError> {
    for perm in required {
        authorize(ctx.principal(), perm)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use supplydesk_auth::{Role, User};
    use supplydesk_core::UserId;

    fn ctx(role: Role) -> PrincipalContext {
        let user = User::register(UserId::new(), "u", "", role, "", Utc::now()).unwrap();
        PrincipalContext::new(user)
    }

    #[test]
    fn directory_role_drives_permissions() {
        assert!(require(&ctx(Role::GsoStaff), &[Permission::SCAN_PROCESS, Permission::LOANS_MANAGE]).is_ok());
        assert_eq!(
            require(&ctx(Role::DepartmentUser), &[Permission::LOANS_READ, Permission::LOANS_MANAGE]),
            Err(AuthzError::Forbidden("loans.manage".to_string()))
        );
    }
}
