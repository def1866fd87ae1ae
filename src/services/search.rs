//! Search fan-out: semantic (jarvis) and literal (writing) side by side

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use super::Backends;
use crate::auth::ReqContext;
use crate::types::{ApiError, Id, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub gid: Id,
    pub cid: Id,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub version: u16,
    #[serde(default)]
    pub kind: i8,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

/// Query both engines concurrently and merge. One engine failing degrades
/// to the other's results.
pub async fn search(
    backends: &Backends,
    ctx: &ReqContext,
    q: &str,
    language: &str,
) -> Result<Vec<SearchDocument>> {
    let q = q.trim();
    if q.is_empty() {
        return Err(ApiError::BadRequest("empty search query".into()));
    }

    let (semantic, literal) = tokio::join!(
        backends.jarvis.search(ctx, q, language),
        backends.writing.search(ctx, q, language),
    );

    match (semantic, literal) {
        (Ok(a), Ok(b)) => Ok(merge(a, b, language)),
        (Ok(a), Err(e)) => {
            warn!(error = %e, "literal search failed, using semantic results only");
            Ok(merge(a, Vec::new(), language))
        }
        (Err(e), Ok(b)) => {
            warn!(error = %e, "semantic search failed, using literal results only");
            Ok(merge(Vec::new(), b, language))
        }
        (Err(e), Err(_)) => Err(e),
    }
}

/// Dedupe by `cid`, keeping first-seen order; a document in the preferred
/// language replaces one in another language.
pub fn merge(
    first: Vec<SearchDocument>,
    second: Vec<SearchDocument>,
    language: &str,
) -> Vec<SearchDocument> {
    let mut out: Vec<SearchDocument> = Vec::with_capacity(first.len() + second.len());
    let mut seen: HashMap<Id, usize> = HashMap::new();

    for doc in first.into_iter().chain(second) {
        match seen.get(&doc.cid) {
            Some(&idx) => {
                if out[idx].language != language && doc.language == language {
                    out[idx] = doc;
                }
            }
            None => {
                seen.insert(doc.cid, out.len());
                out.push(doc);
            }
        }
    }
    out
}
