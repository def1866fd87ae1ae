//! Caller identity and group authorization
//!
//! Provides:
//! - Session reconstruction from the edge's `x-auth-*` headers
//! - The per-request context passed to service calls
//! - Group roles resolved through the user directory

pub mod permissions;
pub mod session;

pub use permissions::{require_role, resolve_role, Role};
pub use session::{AuthMode, ReqContext, Session};
