//! GET /v1/search

use serde::Deserialize;

use super::{ok, HttpResponse};
use crate::auth::AuthMode;
use crate::server::codec::ApiRequest;
use crate::server::AppState;
use crate::services::search as flow;
use crate::types::Result;

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    language: String,
}

pub async fn search(state: &AppState, req: &ApiRequest) -> Result<HttpResponse> {
    let ctx = req.ctx(AuthMode::AllowAnon)?;
    let query: SearchQuery = req.query()?;
    let docs = flow::search(&state.backends, &ctx, &query.q, &query.language).await?;
    Ok(ok(req, docs))
}
