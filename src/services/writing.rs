//! Content store (writing): messages, sale targets, subscriptions, search

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::base::BaseClient;
use super::search::SearchDocument;
use crate::auth::ReqContext;
use crate::types::{Id, RawBytes, Result};

/// Longest message context, in bytes
pub const MAX_CONTEXT_LEN: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageOutput {
    pub id: Id,
    pub attach_to: Id,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub version: u16,
    #[serde(default)]
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<RawBytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n_messages: Option<BTreeMap<String, RawBytes>>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

impl MessageOutput {
    pub fn i18n(&self, language: &str) -> Option<&RawBytes> {
        self.i18n_messages.as_ref()?.get(language)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMessageInput {
    pub attach_to: Id,
    pub kind: String,
    pub language: String,
    #[serde(default)]
    pub context: String,
    pub message: RawBytes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMessageInput {
    pub id: Id,
    pub version: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<RawBytes>,
}

/// Store one translation of a message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateI18nMessageInput {
    pub id: Id,
    pub version: u16,
    pub language: String,
    pub message: RawBytes,
}

/// Something sold by subscription: a creation or a collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleTarget {
    /// Owning group
    pub gid: Id,
    pub id: Id,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: String,
    /// Price in WEN
    #[serde(default)]
    pub price: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionOutput {
    pub uid: Id,
    pub cid: Id,
    pub gid: Id,
    pub txn: Id,
    pub expire_at: i64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionInput {
    pub uid: Id,
    pub cid: Id,
    pub gid: Id,
    pub txn: Id,
    pub expire_at: i64,
    /// Precondition: the stored subscription must still carry this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// What a subscription is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    Creation,
    Collection,
}

impl SubscriptionKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Creation => "/v1/creation",
            Self::Collection => "/v1/collection",
        }
    }
}

#[derive(Debug, Serialize)]
struct QueryId<'a> {
    id: Id,
    #[serde(skip_serializing_if = "str::is_empty")]
    fields: &'a str,
}

#[derive(Debug, Serialize)]
struct QueryCid {
    cid: Id,
}

#[derive(Debug, Serialize)]
struct QuerySearch<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    language: &'a str,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_message(&self, ctx: &ReqContext, id: Id, fields: &str) -> Result<MessageOutput>;

    async fn create_message(
        &self,
        ctx: &ReqContext,
        input: &CreateMessageInput,
    ) -> Result<MessageOutput>;

    async fn update_message(
        &self,
        ctx: &ReqContext,
        input: &UpdateMessageInput,
    ) -> Result<MessageOutput>;

    async fn update_i18n_message(
        &self,
        ctx: &ReqContext,
        input: &UpdateI18nMessageInput,
    ) -> Result<MessageOutput>;

    async fn get_sale_target(
        &self,
        ctx: &ReqContext,
        kind: SubscriptionKind,
        id: Id,
    ) -> Result<SaleTarget>;

    async fn get_subscription(
        &self,
        ctx: &ReqContext,
        kind: SubscriptionKind,
        cid: Id,
    ) -> Result<SubscriptionOutput>;

    async fn create_subscription(
        &self,
        ctx: &ReqContext,
        kind: SubscriptionKind,
        input: &SubscriptionInput,
    ) -> Result<SubscriptionOutput>;

    async fn update_subscription(
        &self,
        ctx: &ReqContext,
        kind: SubscriptionKind,
        input: &SubscriptionInput,
    ) -> Result<SubscriptionOutput>;

    /// Keep a subscribed creation or collection in the caller's bookmarks
    async fn bookmark(&self, ctx: &ReqContext, kind: SubscriptionKind, cid: Id) -> Result<()>;

    async fn search(
        &self,
        ctx: &ReqContext,
        q: &str,
        language: &str,
    ) -> Result<Vec<SearchDocument>>;
}

#[derive(Debug, Clone)]
pub struct WritingClient {
    base: BaseClient,
}

impl WritingClient {
    pub fn new(base: BaseClient) -> Self {
        Self { base }
    }
}

#[async_trait]
impl ContentStore for WritingClient {
    async fn get_message(&self, ctx: &ReqContext, id: Id, fields: &str) -> Result<MessageOutput> {
        let query = super::query(&QueryId { id, fields })?;
        self.base
            .get_result(ctx, &format!("/v1/message?{}", query))
            .await
    }

    async fn create_message(
        &self,
        ctx: &ReqContext,
        input: &CreateMessageInput,
    ) -> Result<MessageOutput> {
        let res: crate::types::SuccessResponse<MessageOutput> =
            self.base.post(ctx, "/v1/message", input).await?;
        Ok(res.result)
    }

    async fn update_message(
        &self,
        ctx: &ReqContext,
        input: &UpdateMessageInput,
    ) -> Result<MessageOutput> {
        let res: crate::types::SuccessResponse<MessageOutput> =
            self.base.patch(ctx, "/v1/message", input).await?;
        Ok(res.result)
    }

    async fn update_i18n_message(
        &self,
        ctx: &ReqContext,
        input: &UpdateI18nMessageInput,
    ) -> Result<MessageOutput> {
        let res: crate::types::SuccessResponse<MessageOutput> =
            self.base.patch(ctx, "/v1/message/i18n", input).await?;
        Ok(res.result)
    }

    async fn get_sale_target(
        &self,
        ctx: &ReqContext,
        kind: SubscriptionKind,
        id: Id,
    ) -> Result<SaleTarget> {
        let query = super::query(&QueryId { id, fields: "" })?;
        self.base
            .get_result(ctx, &format!("{}/sale_info?{}", kind.prefix(), query))
            .await
    }

    async fn get_subscription(
        &self,
        ctx: &ReqContext,
        kind: SubscriptionKind,
        cid: Id,
    ) -> Result<SubscriptionOutput> {
        let query = super::query(&QueryCid { cid })?;
        self.base
            .get_result(ctx, &format!("{}/subscription?{}", kind.prefix(), query))
            .await
    }

    async fn create_subscription(
        &self,
        ctx: &ReqContext,
        kind: SubscriptionKind,
        input: &SubscriptionInput,
    ) -> Result<SubscriptionOutput> {
        let res: crate::types::SuccessResponse<SubscriptionOutput> = self
            .base
            .post(ctx, &format!("{}/subscription", kind.prefix()), input)
            .await?;
        Ok(res.result)
    }

    async fn update_subscription(
        &self,
        ctx: &ReqContext,
        kind: SubscriptionKind,
        input: &SubscriptionInput,
    ) -> Result<SubscriptionOutput> {
        let res: crate::types::SuccessResponse<SubscriptionOutput> = self
            .base
            .patch(ctx, &format!("{}/subscription", kind.prefix()), input)
            .await?;
        Ok(res.result)
    }

    async fn bookmark(&self, ctx: &ReqContext, kind: SubscriptionKind, cid: Id) -> Result<()> {
        let _: crate::types::SuccessResponse<IgnoredAny> = self
            .base
            .post(ctx, &format!("{}/bookmark", kind.prefix()), &QueryCid { cid })
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        ctx: &ReqContext,
        q: &str,
        language: &str,
    ) -> Result<Vec<SearchDocument>> {
        let query = super::query(&QuerySearch { q, language })?;
        self.base
            .get_result(ctx, &format!("/v1/search?{}", query))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::base::PoolConfig;
    use crate::types::SuccessResponse;
    use wiremock::matchers::{body_bytes, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> WritingClient {
        let http = PoolConfig::internal().build().unwrap();
        WritingClient::new(BaseClient::internal(&server.uri(), http))
    }

    #[tokio::test]
    async fn test_get_message_keeps_payload_bytes() {
        let server = MockServer::start().await;
        let id = Id::from_bytes([4; 12]);
        let payload = vec![0xa1, 0x61, 0x61, 0x65, b'h', b'e', b'l', b'l', b'o'];
        let msg = MessageOutput {
            id,
            attach_to: Id::from_bytes([1; 12]),
            language: "eng".into(),
            version: 2,
            message: Some(RawBytes(payload.clone())),
            ..Default::default()
        };
        Mock::given(method("GET"))
            .and(path("/v1/message"))
            .and(query_param("id", id.to_string().as_str()))
            .and(query_param("fields", "message"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(serde_cbor::to_vec(&SuccessResponse::new(&msg)).unwrap()),
            )
            .mount(&server)
            .await;

        let got = client(&server)
            .get_message(&ReqContext::system("t"), id, "message")
            .await
            .unwrap();
        assert_eq!(got.version, 2);
        assert_eq!(got.message.unwrap().into_inner(), payload);
    }

    #[tokio::test]
    async fn test_subscription_paths_follow_kind() {
        let server = MockServer::start().await;
        let sub = SubscriptionOutput {
            expire_at: 100,
            ..Default::default()
        };
        Mock::given(method("GET"))
            .and(path("/v1/collection/subscription"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(serde_cbor::to_vec(&SuccessResponse::new(&sub)).unwrap()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let got = client(&server)
            .get_subscription(
                &ReqContext::system("t"),
                SubscriptionKind::Collection,
                Id::from_bytes([2; 12]),
            )
            .await
            .unwrap();
        assert_eq!(got.expire_at, 100);
    }

    #[tokio::test]
    async fn test_bookmark_posts_cid() {
        let server = MockServer::start().await;
        let cid = Id::from_bytes([6; 12]);
        let body = serde_cbor::to_vec(&QueryCid { cid }).unwrap();
        Mock::given(method("POST"))
            .and(path("/v1/creation/bookmark"))
            .and(body_bytes(body))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(serde_cbor::to_vec(&SuccessResponse::new(true)).unwrap()),
            )
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .bookmark(&ReqContext::system("t"), SubscriptionKind::Creation, cid)
            .await
            .unwrap();
    }
}
