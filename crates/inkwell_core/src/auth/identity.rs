use crate::error::{CoreError, CoreResult};
use crate::model::Role;

/// Caller identity resolved from a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoreError::forbidden("administrator role required"))
        }
    }

    /// Owner-only check. Admins get no implicit pass here; admin paths use
    /// their own entry points.
    pub fn require_owner(&self, owner_id: Option<&str>) -> CoreResult<()> {
        match owner_id {
            Some(owner) if owner == self.user_id => Ok(()),
            _ => Err(CoreError::forbidden("resource belongs to another user")),
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let mut parts = header_value.split_ascii_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}
