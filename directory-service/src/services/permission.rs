//! Minimum-tier checks over authenticated sessions.

use super::jwt::Claims;
use super::session::Session;
use super::ServiceError;
use crate::models::{PrincipalKind, Tier};

fn insufficient() -> ServiceError {
    ServiceError::Forbidden("Not enough permissions".to_string())
}

pub fn require_at_least(claims: &Claims, min_tier: Tier) -> Result<(), ServiceError> {
    if claims.perm >= min_tier {
        Ok(())
    } else {
        Err(insufficient())
    }
}

/// Admin-kind principal only. A user carrying tier ADMIN does not pass.
pub fn require_admin(session: &Session) -> Result<(), ServiceError> {
    if session.kind != PrincipalKind::Admin {
        return Err(insufficient());
    }
    require_at_least(&session.claims, Tier::Admin)
}

pub fn require_user_at_least(session: &Session, min_tier: Tier) -> Result<(), ServiceError> {
    if session.kind != PrincipalKind::User {
        return Err(insufficient());
    }
    require_at_least(&session.claims, min_tier)
}

/// Admins, or users at LEADER and above.
pub fn require_admin_or_leader(session: &Session) -> Result<(), ServiceError> {
    match session.kind {
        PrincipalKind::Admin => require_admin(session),
        PrincipalKind::User => require_user_at_least(session, Tier::Leader),
    }
}
