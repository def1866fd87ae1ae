//! Caller identity from trusted edge headers
//!
//! The edge auth service verifies cookies and tokens, then injects the
//! `x-auth-*` headers read here. Nothing in this module verifies a
//! credential; it only reconstructs what the edge already decided.

use hyper::HeaderMap;
use uuid::Uuid;

use crate::types::{ApiError, Id, Result};

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_REAL_IP: &str = "x-real-ip";
pub const X_AUTH_USER: &str = "x-auth-user";
pub const X_AUTH_APP: &str = "x-auth-app";
pub const X_AUTH_USER_STATUS: &str = "x-auth-user-status";
pub const X_AUTH_USER_RATING: &str = "x-auth-user-rating";
pub const X_AUTH_USER_KIND: &str = "x-auth-user-kind";
pub const X_AUTH_APP_SCOPE: &str = "x-auth-app-scope";

/// How strictly a route wants the caller identified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// A signed-in user, cookie or token
    Required,
    /// Anyone; anonymous callers get a zero user id
    AllowAnon,
    /// A signed-in user calling through an app token; cookie-only
    /// sessions are turned away
    Token,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Id,
    pub app_id: Id,
    pub user_status: i32,
    pub user_rating: i32,
    pub user_kind: i32,
    pub app_scope: Vec<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_zero()
    }

    /// Token sessions carry an app; cookie-only sessions do not
    pub fn is_token(&self) -> bool {
        !self.app_id.is_zero()
    }

    pub fn from_headers(headers: &HeaderMap, mode: AuthMode) -> Result<Self> {
        let user_id = match header_str(headers, X_AUTH_USER) {
            Some(v) => v
                .parse::<Id>()
                .map_err(|_| ApiError::Unauthorized(format!("invalid {}", X_AUTH_USER)))?,
            None => Id::ZERO,
        };

        if user_id.is_zero() {
            return match mode {
                AuthMode::AllowAnon => Ok(Self::anonymous()),
                _ => Err(ApiError::Unauthorized("sign-in required".into())),
            };
        }

        let mut session = Session {
            user_id,
            ..Default::default()
        };

        if let Some(v) = header_str(headers, X_AUTH_APP) {
            session.app_id = v
                .parse::<Id>()
                .map_err(|_| ApiError::Unauthorized(format!("invalid {}", X_AUTH_APP)))?;
        }

        if session.is_token() {
            session.user_status = header_int(headers, X_AUTH_USER_STATUS)?;
            session.user_rating = header_int(headers, X_AUTH_USER_RATING)?;
            session.user_kind = header_int(headers, X_AUTH_USER_KIND)?;
            session.app_scope = header_str(headers, X_AUTH_APP_SCOPE)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
        }

        if mode == AuthMode::Token && !session.is_token() {
            return Err(ApiError::Unauthorized("app token required".into()));
        }
        Ok(session)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn header_int(headers: &HeaderMap, name: &str) -> Result<i32> {
    match header_str(headers, name) {
        Some(v) => v
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("invalid {}", name))),
        None => Ok(0),
    }
}

/// Per-request identity handed to every service call
#[derive(Debug, Clone, Default)]
pub struct ReqContext {
    pub request_id: String,
    pub real_ip: String,
    pub session: Session,
}

impl ReqContext {
    pub fn from_headers(headers: &HeaderMap, mode: AuthMode) -> Result<Self> {
        let session = Session::from_headers(headers, mode)?;
        Ok(Self {
            request_id: request_id(headers),
            real_ip: header_str(headers, X_REAL_IP).unwrap_or_default().to_string(),
            session,
        })
    }

    /// Context for calls made by the gateway itself
    pub fn system(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ..Default::default()
        }
    }

    pub fn uid(&self) -> Id {
        self.session.user_id
    }

    /// The copy a background job keeps after the request has been answered.
    /// Identity is preserved; the request id is suffixed so job logs stay
    /// traceable to the request that started them.
    pub fn detached(&self) -> Self {
        Self {
            request_id: format!("{}-bg", self.request_id),
            real_ip: self.real_ip.clone(),
            session: self.session.clone(),
        }
    }
}

/// The edge's request id, or a fresh one
pub fn request_id(headers: &HeaderMap) -> String {
    header_str(headers, X_REQUEST_ID)
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
