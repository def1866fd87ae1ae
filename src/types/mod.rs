//! Shared types: errors, identifiers, opaque payloads and the response envelope

pub mod bytes;
pub mod error;
pub mod id;

pub use self::bytes::RawBytes;
pub use error::{ApiError, Result};
pub use id::Id;

use serde::{Deserialize, Serialize};

/// Envelope wrapping every successful response, ours and the backends'
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<RawBytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<i8>,
    pub result: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(result: T) -> Self {
        Self {
            retry: None,
            total_size: None,
            next_page_token: None,
            job: None,
            progress: None,
            result,
        }
    }

    /// Envelope for an outstanding job
    pub fn job(job: Id, progress: Option<i8>, result: T) -> Self {
        Self {
            job: Some(job.to_string()),
            progress,
            ..Self::new(result)
        }
    }
}

/// Current unix time in seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
