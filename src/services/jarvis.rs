//! Translation service (jarvis)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::base::BaseClient;
use super::search::SearchDocument;
use crate::auth::ReqContext;
use crate::types::{Id, RawBytes, Result, SuccessResponse};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimateInput {
    pub text: String,
    pub from_language: String,
    pub to_language: String,
}

/// One message translation. `content` is CBOR of `TEContents`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslatingInput {
    pub gid: Id,
    pub cid: Id,
    pub language: String,
    pub version: u16,
    pub from_language: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub context: String,
    pub content: RawBytes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslatingOutput {
    #[serde(default)]
    pub gid: Id,
    #[serde(default)]
    pub cid: Id,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub version: u16,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub progress: i8,
    #[serde(default)]
    pub tokens: u32,
    pub content: RawBytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressQuery<'a> {
    pub gid: Id,
    pub cid: Id,
    pub language: &'a str,
    pub version: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProgressOutput {
    #[serde(default)]
    progress: i8,
}

#[derive(Debug, Serialize)]
struct QuerySearch<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    language: &'a str,
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Tokens the translation of `text` is expected to produce
    async fn estimate_tokens(&self, ctx: &ReqContext, input: &EstimateInput) -> Result<u32>;

    async fn translate_message(
        &self,
        ctx: &ReqContext,
        input: &TranslatingInput,
    ) -> Result<TranslatingOutput>;

    /// Percent done of an outstanding translation
    async fn translating_progress(&self, ctx: &ReqContext, query: &ProgressQuery<'_>) -> Result<i8>;

    /// Semantic search over embeddings
    async fn search(
        &self,
        ctx: &ReqContext,
        q: &str,
        language: &str,
    ) -> Result<Vec<SearchDocument>>;
}

#[derive(Debug, Clone)]
pub struct JarvisClient {
    base: BaseClient,
}

impl JarvisClient {
    pub fn new(base: BaseClient) -> Self {
        Self { base }
    }
}

#[async_trait]
impl Translator for JarvisClient {
    async fn estimate_tokens(&self, ctx: &ReqContext, input: &EstimateInput) -> Result<u32> {
        let res: SuccessResponse<u32> = self
            .base
            .post(ctx, "/v1/translating/estimate", input)
            .await?;
        Ok(res.result)
    }

    async fn translate_message(
        &self,
        ctx: &ReqContext,
        input: &TranslatingInput,
    ) -> Result<TranslatingOutput> {
        let res: SuccessResponse<TranslatingOutput> =
            self.base.post(ctx, "/v1/translating/message", input).await?;
        Ok(res.result)
    }

    async fn translating_progress(&self, ctx: &ReqContext, query: &ProgressQuery<'_>) -> Result<i8> {
        let query = super::query(query)?;
        let out: ProgressOutput = self
            .base
            .get_result(ctx, &format!("/v1/translating/progress?{}", query))
            .await?;
        Ok(out.progress)
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
