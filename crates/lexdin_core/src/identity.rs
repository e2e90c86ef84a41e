//! Identity resolution: presented credential -> [`User`].
//!
//! # Responsibility
//! - Define the provider seam the rest of the crate depends on.
//! - Ship a directory-backed provider for the bundled user set.
//!
//! # Invariants
//! - The directory provider does not verify credentials cryptographically;
//!   any non-empty credential for a known username is accepted.
//! - Credentials are never logged.

use crate::model::user::User;
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Authentication failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown username or empty credential.
    InvalidCredentials,
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid credentials"),
        }
    }
}

impl Error for AuthError {}

/// Resolves a presented credential to a user.
///
/// Callers receive a plain [`User`] value and pass it explicitly to every
/// operation that needs it.
pub trait IdentityProvider {
    fn authenticate(&self, username: &str, credential: &str) -> Result<User, AuthError>;
}

/// Identity provider over a fixed user directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIdentityProvider {
    by_username: BTreeMap<String, User>,
}

impl DirectoryIdentityProvider {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        let by_username = users
            .into_iter()
            .map(|user| (user.username().to_string(), user))
            .collect();
        Self { by_username }
    }

    /// Looks up a registered user by stable id.
    pub fn find_by_id(&self, user_id: &str) -> Option<&User> {
        self.by_username.values().find(|user| user.id() == user_id)
    }

    pub fn len(&self) -> usize {
        self.by_username.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_username.is_empty()
    }
}

impl IdentityProvider for DirectoryIdentityProvider {
    fn authenticate(&self, username: &str, credential: &str) -> Result<User, AuthError> {
        let user = match self.by_username.get(username.trim()) {
            Some(user) if !credential.is_empty() => user.clone(),
            _ => {
                warn!("event=auth_login module=identity status=error error_code=invalid_credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        info!(
            "event=auth_login module=identity status=ok user_id={} role={}",
            user.id(),
            user.role()
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthError, DirectoryIdentityProvider, IdentityProvider};
    use crate::model::user::{Role, User};

    fn directory() -> DirectoryIdentityProvider {
        DirectoryIdentityProvider::new([
            User::new("admin01", "admin", Role::Admin),
            User::new("dir01", "directivo", Role::Directivo),
        ])
    }

    #[test]
    fn known_username_with_any_credential_authenticates() {
        let user = directory()
            .authenticate("admin", "whatever")
            .expect("known user should authenticate");
        assert_eq!(user.id(), "admin01");
        assert_eq!(user.role(), Role::Admin);
    }

    #[test]
    fn unknown_username_or_empty_credential_fails() {
        let directory = directory();
        assert_eq!(
            directory.authenticate("ghost", "pw"),
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            directory.authenticate("admin", ""),
            Err(AuthError::InvalidCredentials)
        );
    }

    #[test]
    fn finds_users_by_stable_id() {
        let directory = directory();
        assert_eq!(directory.len(), 2);
        assert_eq!(
            directory.find_by_id("dir01").map(|user| user.username()),
            Some("directivo")
        );
        assert!(directory.find_by_id("nobody").is_none());
    }
}
