use supplydesk_auth::{Principal, Role, User};
use supplydesk_core::UserId;

/// Authenticated caller of a request.
///
/// Built by the auth middleware from a verified token and the caller's
/// directory record. Authorization uses the directory role, not the roles
/// carried by the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    user: User,
}

impl PrincipalContext {
    pub fn new(user: User) -> Self {
        Self {
            principal: Principal::new(user.id, vec![user.role]),
            user,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn roles(&self) -> &[Role] {
        &self.principal.roles
    }
}
