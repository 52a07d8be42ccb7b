use thiserror::Error;

use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("You do not have permission to perform this action")]
    Forbidden { role: Role },
}

/// Role gate for a route.
///
/// - No IO
/// - No panics
/// - An empty allow-list denies everyone
pub fn authorize(role: Role, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden { role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_role_is_allowed() {
        assert_eq!(authorize(Role::LeadGuide, &[Role::Admin, Role::LeadGuide]), Ok(()));
    }

    #[test]
    fn unlisted_role_is_forbidden() {
        assert_eq!(
            authorize(Role::Guide, &[Role::Admin, Role::LeadGuide]),
            Err(AuthzError::Forbidden { role: Role::Guide })
        );
    }

    #[test]
    fn admin_is_not_implicitly_allowed() {
        assert!(authorize(Role::Admin, &[Role::User]).is_err());
    }

    #[test]
    fn empty_allow_list_denies() {
        assert!(authorize(Role::Admin, &[]).is_err());
    }
}
