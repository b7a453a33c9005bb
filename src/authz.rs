//! Role-based authorization gate.

use crate::error::Error;
use crate::identity::{Identity, Role};

/// Check a resolved identity's role against an allowed set.
///
/// Pure membership test. Must only be called with an identity the session
/// guard produced; there is no anonymous case here, a request with no
/// identity fails authentication long before authorization.
///
/// # Errors
///
/// [`Error::Forbidden`] when the role is not in `allowed`.
pub fn require_role(identity: &Identity, allowed: &[Role]) -> Result<(), Error> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity_with_role(role: Role) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role,
            active: true,
            credential_changed_at: None,
            reset_token_expires_at: None,
        }
    }

    #[test]
    fn member_of_allowed_set_passes() {
        let identity = identity_with_role(Role::LeadOperator);
        assert!(require_role(&identity, &[Role::Administrator, Role::LeadOperator]).is_ok());
    }

    #[test]
    fn non_member_is_forbidden() {
        let identity = identity_with_role(Role::Standard);
        assert!(matches!(
            require_role(&identity, &[Role::Administrator]),
            Err(Error::Forbidden)
        ));
    }

    #[test]
    fn empty_allowed_set_forbids_everyone() {
        let identity = identity_with_role(Role::Administrator);
        assert!(matches!(require_role(&identity, &[]), Err(Error::Forbidden)));
    }
}
