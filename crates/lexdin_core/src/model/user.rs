//! Acting subjects and their privilege tier.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable user identifier (e.g. `admin01`).
pub type UserId = String;

/// Privilege tier of a user.
///
/// `Directivo` and `Admin` read confidential norms; only `Admin` may apply
/// modifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Public,
    Directivo,
    Admin,
}

/// Wire value for the public role.
pub const ROLE_PUBLIC: &str = "PUBLIC";
/// Wire value for the directivo role.
pub const ROLE_DIRECTIVO: &str = "DIRECTIVO";
/// Wire value for the admin role.
pub const ROLE_ADMIN: &str = "ADMIN";

impl Role {
    /// Stable string id used in fixtures and persisted rows.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => ROLE_PUBLIC,
            Self::Directivo => ROLE_DIRECTIVO,
            Self::Admin => ROLE_ADMIN,
        }
    }

    /// Whether this tier may read confidential content.
    pub fn reads_confidential(self) -> bool {
        matches!(self, Self::Directivo | Self::Admin)
    }

    /// Whether this tier may append versions through the modification workflow.
    pub fn applies_modifications(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated subject.
///
/// Issued once by an identity provider and never mutated afterwards, so
/// fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    username: String,
    role: Role,
}

impl User {
    pub fn new(id: impl Into<UserId>, username: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, User};

    #[test]
    fn only_admin_applies_modifications() {
        assert!(Role::Admin.applies_modifications());
        assert!(!Role::Directivo.applies_modifications());
        assert!(!Role::Public.applies_modifications());
        assert!(Role::Directivo.reads_confidential());
        assert!(!Role::Public.reads_confidential());
    }

    #[test]
    fn user_serializes_role_as_wire_value() {
        let user = User::new("dir01", "directivo", Role::Directivo);
        let json = serde_json::to_value(&user).expect("serialize user");
        assert_eq!(json["role"], "DIRECTIVO");
        assert_eq!(json["username"], "directivo");
    }
}
