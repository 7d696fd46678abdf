//! Per-request resolution of the caller's authority level.

use sqlx::SqlitePool;
use tracing::warn;

use crate::error::RepoError;
use crate::stores::repo::StoreScope;
use crate::users::repo::{Role, User};

/// The resolved identity making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    Owner(i64),
    /// Carries the admin's own user id so callers can reject self-deletion
    /// and attach ownership on create.
    Admin(i64),
}

impl Principal {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            Principal::Anonymous => None,
            Principal::Owner(id) | Principal::Admin(id) => Some(*id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::Admin(_))
    }

    /// Scope for store listings: owners see their own stores, everyone else
    /// (admins and anonymous visitors) sees the full directory.
    pub fn list_scope(&self) -> StoreScope {
        match self {
            Principal::Owner(id) => StoreScope::OwnedBy(*id),
            Principal::Anonymous | Principal::Admin(_) => StoreScope::Unconstrained,
        }
    }

    /// Scope for store writes. `None` means the caller may not write at all.
    pub fn write_scope(&self) -> Option<StoreScope> {
        match self {
            Principal::Anonymous => None,
            Principal::Owner(id) => Some(StoreScope::OwnedBy(*id)),
            Principal::Admin(_) => Some(StoreScope::Unconstrained),
        }
    }
}

/// Map the session-carried user id to a [`Principal`].
///
/// Runs fresh on every request; the stored role column is authoritative. A
/// session that references a user that no longer exists degrades to
/// anonymous rather than failing the request.
pub async fn resolve(
    db: &SqlitePool,
    session_user: Option<i64>,
) -> Result<Principal, RepoError> {
    let Some(id) = session_user else {
        return Ok(Principal::Anonymous);
    };
    match User::find_by_id(db, id).await? {
        Some(user) if user.role == Role::Admin => Ok(Principal::Admin(user.id)),
        Some(user) => Ok(Principal::Owner(user.id)),
        None => {
            warn!(user_id = id, "session references a user that no longer exists");
            Ok(Principal::Anonymous)
        }
    }
}
