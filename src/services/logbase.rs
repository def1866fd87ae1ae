//! Job ledger (logbase)
//!
//! A log row is created pending before any chargeable call and moved to a
//! terminal status exactly once. Its id is the job id clients poll with.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::base::BaseClient;
use crate::auth::ReqContext;
use crate::types::{Id, RawBytes, Result, SuccessResponse};

pub const STATUS_PENDING: i8 = 0;
pub const STATUS_SUCCESS: i8 = 1;
pub const STATUS_FAILURE: i8 = -1;

pub const ACTION_MESSAGE_TRANSLATE: &str = "message.translate";
pub const ACTION_CREATION_SUBSCRIBE: &str = "creation.subscribe";
pub const ACTION_COLLECTION_SUBSCRIBE: &str = "collection.subscribe";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogOutput {
    pub uid: Id,
    pub id: Id,
    #[serde(default)]
    pub gid: Id,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub status: i8,
    #[serde(default)]
    pub payload: RawBytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateLogInput {
    pub uid: Id,
    pub gid: Id,
    pub action: String,
    pub status: i8,
    #[serde(default)]
    pub ip: String,
    pub payload: RawBytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateLogInput {
    pub uid: Id,
    pub id: Id,
    pub status: i8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateLogInput {
    pub fn success(uid: Id, id: Id, tokens: Option<u32>) -> Self {
        Self {
            uid,
            id,
            status: STATUS_SUCCESS,
            tokens,
            error: None,
        }
    }

    pub fn failure(uid: Id, id: Id, error: impl Into<String>) -> Self {
        Self {
            uid,
            id,
            status: STATUS_FAILURE,
            tokens: None,
            error: Some(error.into()),
        }
    }
}

/// Payload of a translation job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub id: Id,
    pub attach_to: Id,
    pub language: String,
    pub version: u16,
}

#[derive(Debug, Serialize)]
struct QueryLog {
    uid: Id,
    id: Id,
}

#[async_trait]
pub trait JobLedger: Send + Sync {
    async fn insert(&self, ctx: &ReqContext, input: &CreateLogInput) -> Result<LogOutput>;

    async fn update(&self, ctx: &ReqContext, input: &UpdateLogInput) -> Result<()>;

    async fn get(&self, ctx: &ReqContext, uid: Id, id: Id) -> Result<LogOutput>;
}

#[derive(Debug, Clone)]
pub struct LogbaseClient {
    base: BaseClient,
}

impl LogbaseClient {
    pub fn new(base: BaseClient) -> Self {
        Self { base }
    }
}

#[async_trait]
impl JobLedger for LogbaseClient {
    async fn insert(&self, ctx: &ReqContext, input: &CreateLogInput) -> Result<LogOutput> {
        let res: SuccessResponse<LogOutput> = self.base.post(ctx, "/v1/log", input).await?;
        Ok(res.result)
    }

    async fn update(&self, ctx: &ReqContext, input: &UpdateLogInput) -> Result<()> {
        let _: SuccessResponse<serde_cbor::Value> =
            self.base.patch(ctx, "/v1/log", input).await?;
        Ok(())
    }

    async fn get(&self, ctx: &ReqContext, uid: Id, id: Id) -> Result<LogOutput> {
        let query = super::query(&QueryLog { uid, id })?;
        self.base.get_result(ctx, &format!("/v1/log?{}", query)).await
    }
}
