use crate::domain::privilege::PrivilegeId;
use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// An account holder, as far as privilege evaluation needs one: an identity
/// plus the set of privilege flags granted to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub privileges: Vec<PrivilegeId>,
}

impl User {
    pub fn new(id: UserId, name: &str, privileges: Vec<PrivilegeId>) -> Self {
        Self {
            id,
            name: name.to_string(),
            privileges,
        }
    }

    /// Whether this user holds the given privilege flag.
    pub fn has_priv(&self, id: PrivilegeId) -> bool {
        self.privileges.contains(&id)
    }

    /// Grants a privilege flag (if not already held).
    pub fn grant_priv(&mut self, id: PrivilegeId) {
        if !self.has_priv(id) {
            self.privileges.push(id);
        }
    }

    /// Revokes a privilege flag.
    pub fn revoke_priv(&mut self, id: PrivilegeId) {
        self.privileges.retain(|p| *p != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::privilege::{PRIV_SYSADMIN, PRIV_USERADMIN};

    #[test]
    fn test_has_priv() {
        let user = User::new(1, "jdoe", vec![PRIV_SYSADMIN]);
        assert!(user.has_priv(PRIV_SYSADMIN));
        assert!(!user.has_priv(PRIV_USERADMIN));
    }

    #[test]
    fn test_grant_is_idempotent() {
        let mut user = User::new(1, "jdoe", vec![]);
        user.grant_priv(PRIV_USERADMIN);
        user.grant_priv(PRIV_USERADMIN);
        assert_eq!(user.privileges.len(), 1);

        user.revoke_priv(PRIV_USERADMIN);
        assert!(user.privileges.is_empty());
        user.revoke_priv(PRIV_USERADMIN); // no-op
    }
}
