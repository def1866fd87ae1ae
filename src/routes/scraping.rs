//! GET /v1/scraping

use serde::Deserialize;

use super::{ok, HttpResponse};
use crate::auth::AuthMode;
use crate::server::codec::ApiRequest;
use crate::server::AppState;
use crate::services::webscraper::check_url;
use crate::types::Result;

#[derive(Debug, Deserialize)]
struct ScrapingQuery {
    #[serde(default)]
    url: String,
}

/// App tokens only: the scraper fetches arbitrary third-party pages
pub async fn scrape(state: &AppState, req: &ApiRequest) -> Result<HttpResponse> {
    let ctx = req.ctx(AuthMode::Token)?;
    let query: ScrapingQuery = req.query()?;
    check_url(&query.url)?;
    let page = state.backends.webscraper.scrape(&ctx, &query.url).await?;
    Ok(ok(req, page))
}
