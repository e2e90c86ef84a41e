//! Role-gated access checks.
//!
//! Both predicates are pure. The `assert_*` variants turn a `false` into a
//! typed [`AccessError::Forbidden`] for use-case code.

use crate::model::norm::{Norm, NormId};
use crate::model::user::{Role, User};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Operation being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAction {
    View,
    Modify,
}

impl AccessAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Modify => "modify",
        }
    }
}

/// Access denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    Forbidden {
        norm_id: NormId,
        action: AccessAction,
        /// `None` for anonymous callers.
        role: Option<Role>,
    },
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden {
                norm_id,
                action,
                role,
            } => write!(
                f,
                "forbidden: {} may not {} norm {norm_id}",
                role.map_or("anonymous caller", Role::as_str),
                action.as_str()
            ),
        }
    }
}

impl Error for AccessError {}

/// Whether `user` may read the content of `norm`.
///
/// Public norms are readable by everyone, including anonymous callers.
/// Confidential norms require `DIRECTIVO` or `ADMIN`.
pub fn can_view(norm: &Norm, user: Option<&User>) -> bool {
    !norm.is_confidential || user.is_some_and(|user| user.role().reads_confidential())
}

/// Whether `user` may apply modifications to `norm`.
///
/// Only `ADMIN`, regardless of confidentiality.
pub fn can_modify(_norm: &Norm, user: Option<&User>) -> bool {
    user.is_some_and(|user| user.role().applies_modifications())
}

/// Denies with [`AccessError::Forbidden`] when [`can_view`] is false.
pub fn assert_can_view(norm: &Norm, user: Option<&User>) -> Result<(), AccessError> {
    if can_view(norm, user) {
        return Ok(());
    }
    Err(forbidden(norm, AccessAction::View, user))
}

/// Denies with [`AccessError::Forbidden`] when [`can_modify`] is false.
pub fn assert_can_modify(norm: &Norm, user: Option<&User>) -> Result<(), AccessError> {
    authorize_modifier(norm, user).map(|_| ())
}

/// Returns the acting user when [`can_modify`] holds.
pub fn authorize_modifier<'u>(
    norm: &Norm,
    user: Option<&'u User>,
) -> Result<&'u User, AccessError> {
    match user {
        Some(user) if can_modify(norm, Some(user)) => Ok(user),
        _ => Err(forbidden(norm, AccessAction::Modify, user)),
    }
}

fn forbidden(norm: &Norm, action: AccessAction, user: Option<&User>) -> AccessError {
    AccessError::Forbidden {
        norm_id: norm.id.clone(),
        action,
        role: user.map(User::role),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        assert_can_modify, assert_can_view, authorize_modifier, can_modify, can_view,
        AccessAction, AccessError,
    };
    use crate::model::norm::{Norm, NormHeader};
    use crate::model::user::{Role, User};
    use chrono::Utc;

    fn norm(is_confidential: bool) -> Norm {
        Norm::new(
            NormHeader {
                id: "n-1".to_string(),
                title: "Norma".to_string(),
                short_title: "N".to_string(),
                description: String::new(),
                tags: Vec::new(),
                is_confidential,
            },
            "body",
            Utc::now(),
        )
    }

    fn users() -> [User; 3] {
        [
            User::new("p", "public", Role::Public),
            User::new("d", "directivo", Role::Directivo),
            User::new("a", "admin", Role::Admin),
        ]
    }

    #[test]
    fn public_norms_are_viewable_by_everyone() {
        let public = norm(false);
        assert!(can_view(&public, None));
        for user in users() {
            assert!(can_view(&public, Some(&user)));
        }
    }

    #[test]
    fn confidential_norms_require_directivo_or_admin() {
        let confidential = norm(true);
        let [public, directivo, admin] = users();
        assert!(!can_view(&confidential, None));
        assert!(!can_view(&confidential, Some(&public)));
        assert!(can_view(&confidential, Some(&directivo)));
        assert!(can_view(&confidential, Some(&admin)));
    }

    #[test]
    fn only_admin_can_modify_regardless_of_confidentiality() {
        let [public, directivo, admin] = users();
        for target in [norm(false), norm(true)] {
            assert!(!can_modify(&target, None));
            assert!(!can_modify(&target, Some(&public)));
            assert!(!can_modify(&target, Some(&directivo)));
            assert!(can_modify(&target, Some(&admin)));
        }
    }

    #[test]
    fn assertions_report_action_and_role() {
        let confidential = norm(true);
        let directivo = User::new("d", "directivo", Role::Directivo);

        assert_can_view(&confidential, Some(&directivo)).expect("directivo can view");
        let err = assert_can_modify(&confidential, Some(&directivo))
            .expect_err("directivo cannot modify");
        assert_eq!(
            err,
            AccessError::Forbidden {
                norm_id: "n-1".to_string(),
                action: AccessAction::Modify,
                role: Some(Role::Directivo),
            }
        );

        let err = assert_can_view(&confidential, None).expect_err("anonymous cannot view");
        assert!(err.to_string().contains("anonymous caller"));
    }

    #[test]
    fn authorize_modifier_hands_back_the_admin() {
        let target = norm(false);
        let [public, _, admin] = users();

        let acting = authorize_modifier(&target, Some(&admin)).expect("admin may modify");
        assert_eq!(acting.id(), "a");

        let err = authorize_modifier(&target, None).expect_err("anonymous cannot modify");
        assert_eq!(
            err,
            AccessError::Forbidden {
                norm_id: "n-1".to_string(),
                action: AccessAction::Modify,
                role: None,
            }
        );
        assert!(authorize_modifier(&target, Some(&public)).is_err());
    }
}
