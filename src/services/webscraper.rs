//! Web page fetcher (webscraper)
//!
//! Third-party service, so it is spoken to in JSON over the strict external
//! pool. It fetches a public page and returns it as a document tree ready to
//! be imported as a creation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::base::BaseClient;
use crate::auth::ReqContext;
use crate::types::{ApiError, Id, RawBytes, Result};

/// Longest URL accepted for scraping
pub const MAX_URL_LEN: usize = 2048;

/// A scraped page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapingOutput {
    pub id: Id,
    pub url: String,
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// CBOR document tree
    #[serde(default)]
    pub content: RawBytes,
}

#[derive(Debug, Serialize)]
struct QueryUrl<'a> {
    url: &'a str,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, ctx: &ReqContext, url: &str) -> Result<ScrapingOutput>;
}

#[derive(Debug, Clone)]
pub struct WebscraperClient {
    base: BaseClient,
}

impl WebscraperClient {
    pub fn new(base: BaseClient) -> Self {
        Self { base }
    }
}

#[async_trait]
impl Scraper for WebscraperClient {
    async fn scrape(&self, ctx: &ReqContext, url: &str) -> Result<ScrapingOutput> {
        let query = super::query(&QueryUrl { url })?;
        self.base
            .get_result(ctx, &format!("/v1/scraping?{}", query))
            .await
    }
}

/// Only absolute http(s) URLs with a host go out to the scraper
pub fn check_url(url: &str) -> Result<()> {
    if url.is_empty() || url.len() > MAX_URL_LEN {
        return Err(ApiError::BadRequest(format!(
            "url must be 1 to {} bytes",
            MAX_URL_LEN
        )));
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported url {:?}", url)))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(ApiError::BadRequest(format!("invalid url {:?}", url)));
    }
    Ok(())
}
