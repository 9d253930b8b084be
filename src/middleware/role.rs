use std::sync::Arc;

use crate::error::AppError;
use crate::types::Identity;

/// Route-declared set of role codes, normalized to trimmed lower case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoles(Arc<[String]>);

impl AllowedRoles {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles: Vec<String> = roles
            .into_iter()
            .map(|r| r.as_ref().trim().to_lowercase())
            .filter(|r| !r.is_empty())
            .collect();
        Self(roles.into())
    }

    pub fn permits(&self, role: &str) -> bool {
        let role = role.trim().to_lowercase();
        self.0.iter().any(|allowed| *allowed == role)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Grants access iff the identity's role is in `allowed`.
///
/// An empty role is an authentication failure; a known role outside the set is `Forbidden`.
pub fn authorize(allowed: &AllowedRoles, identity: &Identity) -> Result<(), AppError> {
    let role = identity.role.trim().to_lowercase();
    if role.is_empty() {
        return Err(AppError::unauthorized());
    }
    if !allowed.permits(&role) {
        return Err(AppError::Forbidden { role, required_roles: allowed.as_slice().to_vec() });
    }
    Ok(())
}
