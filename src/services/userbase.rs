//! User directory (userbase)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::base::BaseClient;
use crate::auth::ReqContext;
use crate::types::{Id, Result};

/// Public view of a group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: Id,
    pub cn: String,
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub slogan: String,
    #[serde(default)]
    pub status: i8,
}

#[derive(Debug, Serialize)]
struct QueryGroup {
    id: Id,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Role of the calling user in `gid`; not-found when not a member
    async fn group_role(&self, ctx: &ReqContext, gid: Id) -> Result<i8>;

    async fn group_info(&self, ctx: &ReqContext, gid: Id) -> Result<GroupInfo>;
}

#[derive(Debug, Clone)]
pub struct UserbaseClient {
    base: BaseClient,
}

impl UserbaseClient {
    pub fn new(base: BaseClient) -> Self {
        Self { base }
    }
}

#[async_trait]
impl UserDirectory for UserbaseClient {
    async fn group_role(&self, ctx: &ReqContext, gid: Id) -> Result<i8> {
        let query = super::query(&QueryGroup { id: gid })?;
        self.base
            .get_result(ctx, &format!("/v1/group/role?{}", query))
            .await
    }

    async fn group_info(&self, ctx: &ReqContext, gid: Id) -> Result<GroupInfo> {
        let query = super::query(&QueryGroup { id: gid })?;
        self.base
            .get_result(ctx, &format!("/v1/group/info?{}", query))
            .await
    }
}
