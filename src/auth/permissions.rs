//! Group roles and the per-request role resolver
//!
//! Roles come from the user directory on every call. Nothing is cached.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::session::ReqContext;
use crate::services::userbase::UserDirectory;
use crate::types::{ApiError, Id, Result};

/// A caller's standing in a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub i8);

impl Role {
    /// The user acting as their own personal group
    pub const SELF: Role = Role(2);
    pub const ADMIN: Role = Role(1);
    pub const MEMBER: Role = Role(0);
    pub const PUBLIC: Role = Role(-1);
    pub const FORBIDDEN: Role = Role(-2);

    /// Writes need membership
    pub fn can_write(self) -> bool {
        self >= Role::MEMBER
    }

    pub fn can_read(self) -> bool {
        self >= Role::PUBLIC
    }

    /// Owner-only writes: group admins, or the creator editing their own
    pub fn can_edit_owned(self, creator: Id, uid: Id) -> bool {
        self >= Role::ADMIN || (self.can_write() && creator == uid)
    }

    /// Fail with 403 unless the role reaches `min`
    pub fn require(self, min: Role, gid: Id) -> Result<()> {
        if self >= min {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "role {} in group {} is below {}",
                self, gid, min
            )))
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Role::SELF => write!(f, "SELF"),
            Role::ADMIN => write!(f, "ADMIN"),
            Role::MEMBER => write!(f, "MEMBER"),
            Role::PUBLIC => write!(f, "PUBLIC"),
            Role(r) if r > 2 => write!(f, "ADMIN({})", r),
            Role(r) => write!(f, "FORBIDDEN({})", r),
        }
    }
}

/// Role of the caller in `gid`. A user is always SELF in their own group,
/// without asking the directory.
pub async fn resolve_role(dir: &dyn UserDirectory, ctx: &ReqContext, gid: Id) -> Result<Role> {
    let uid = ctx.uid();
    if !uid.is_zero() && uid == gid {
        return Ok(Role::SELF);
    }
    if gid.is_zero() {
        return Err(ApiError::BadRequest("group id required".into()));
    }
    match dir.group_role(ctx, gid).await {
        Ok(role) => Ok(Role(role)),
        Err(e) if e.is_not_found() => Ok(Role::FORBIDDEN),
        Err(e) => Err(e),
    }
}

/// Resolve and require in one step
pub async fn require_role(
    dir: &dyn UserDirectory,
    ctx: &ReqContext,
    gid: Id,
    min: Role,
) -> Result<Role> {
    let role = resolve_role(dir, ctx, gid).await?;
    role.require(min, gid)?;
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use crate::testing::FakeUserbase;

    fn ctx(uid: Id) -> ReqContext {
        ReqContext {
            request_id: "t".into(),
            real_ip: String::new(),
            session: Session {
                user_id: uid,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::SELF > Role::ADMIN);
        assert!(Role::ADMIN > Role::MEMBER);
        assert!(Role::MEMBER.can_write());
        assert!(!Role::PUBLIC.can_write());
        assert!(Role::PUBLIC.can_read());
        assert!(!Role::FORBIDDEN.can_read());
    }

    #[test]
    fn test_can_edit_owned() {
        let me = Id::from_bytes([1; 12]);
        let other = Id::from_bytes([2; 12]);
        assert!(Role::ADMIN.can_edit_owned(other, me));
        assert!(Role::MEMBER.can_edit_owned(me, me));
        assert!(!Role::MEMBER.can_edit_owned(other, me));
        assert!(!Role::PUBLIC.can_edit_owned(me, me));
    }

    #[test]
    fn test_require() {
        let gid = Id::from_bytes([3; 12]);
        assert!(Role::MEMBER.require(Role::MEMBER, gid).is_ok());
        let err = Role::PUBLIC.require(Role::MEMBER, gid).unwrap_err();
        assert_eq!(err.status_code(), hyper::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_self_group_needs_no_lookup() {
        let dir = FakeUserbase::default();
        let me = Id::from_bytes([1; 12]);
        assert_eq!(resolve_role(&dir, &ctx(me), me).await.unwrap(), Role::SELF);
        assert_eq!(dir.calls(), 0);
    }

    #[tokio::test]
    async fn test_lookup_and_missing_membership() {
        let dir = FakeUserbase::default();
        let me = Id::from_bytes([1; 12]);
        let gid = Id::from_bytes([9; 12]);
        dir.set_role(gid, 1);
        assert_eq!(resolve_role(&dir, &ctx(me), gid).await.unwrap(), Role::ADMIN);

        let stranger = Id::from_bytes([8; 12]);
        assert_eq!(
            resolve_role(&dir, &ctx(me), stranger).await.unwrap(),
            Role::FORBIDDEN
        );
        assert_eq!(dir.calls(), 2);
    }
}
