//! Shared HTTP client for backend services
//!
//! Internal services speak CBOR over a lenient connection pool; third-party
//! services speak JSON over a strict one. Every call carries the caller's
//! request id, address and identity so backends can authorize and trace.
//! A status above 206 becomes an [`ApiError::Upstream`] with the upstream
//! code and the body rendered in CBOR diagnostic notation.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_cbor::Value;
use std::fmt::Write;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::session::{
    ReqContext, X_AUTH_APP, X_AUTH_USER, X_AUTH_USER_KIND, X_AUTH_USER_RATING, X_REAL_IP,
    X_REQUEST_ID,
};
use crate::types::{ApiError, Result, SuccessResponse};

pub const MIME_CBOR: &str = "application/cbor";
pub const MIME_JSON: &str = "application/json";

/// Highest status treated as success
const MAX_OK_STATUS: u16 = 206;

/// Wire format of one backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Cbor,
    Json,
}

impl Codec {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Cbor => MIME_CBOR,
            Self::Json => MIME_JSON,
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Cbor => serde_cbor::to_vec(value)
                .map_err(|e| ApiError::Internal(format!("CBOR encode: {}", e))),
            Self::Json => serde_json::to_vec(value)
                .map_err(|e| ApiError::Internal(format!("JSON encode: {}", e))),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, data: &[u8]) -> std::result::Result<T, String> {
        // an empty body decodes like `null` so `()` and `Option` outputs work
        let data: &[u8] = match (self, data.is_empty()) {
            (Self::Cbor, true) => &[0xf6],
            (Self::Json, true) => b"null",
            _ => data,
        };
        match self {
            Self::Cbor => serde_cbor::from_slice(data).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_slice(data).map_err(|e| e.to_string()),
        }
    }
}

/// Connection pool profile
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub timeout: Duration,
    pub max_idle_per_host: usize,
    pub accept_invalid_certs: bool,
}

impl PoolConfig {
    /// Services inside the cluster
    pub fn internal() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_idle_per_host: 100,
            accept_invalid_certs: true,
        }
    }

    /// Third-party services
    pub fn external() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_idle_per_host: 20,
            accept_invalid_certs: false,
        }
    }

    pub fn build(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .pool_max_idle_per_host(self.max_idle_per_host)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .user_agent(concat!("yiwen-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {}", e)))
    }
}

/// One backend: a base URL, a pool and a codec
#[derive(Debug, Clone)]
pub struct BaseClient {
    endpoint: String,
    http: reqwest::Client,
    codec: Codec,
}

impl BaseClient {
    pub fn new(endpoint: &str, http: reqwest::Client, codec: Codec) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
            codec,
        }
    }

    /// CBOR client over the internal pool
    pub fn internal(endpoint: &str, http: reqwest::Client) -> Self {
        Self::new(endpoint, http, Codec::Cbor)
    }

    /// JSON client over the external pool
    pub fn external(endpoint: &str, http: reqwest::Client) -> Self {
        Self::new(endpoint, http, Codec::Json)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn get<O: DeserializeOwned>(&self, ctx: &ReqContext, path: &str) -> Result<O> {
        self.send::<(), O>(ctx, Method::GET, path, None).await
    }

    pub async fn post<I: Serialize, O: DeserializeOwned>(
        &self,
        ctx: &ReqContext,
        path: &str,
        input: &I,
    ) -> Result<O> {
        self.send(ctx, Method::POST, path, Some(input)).await
    }

    pub async fn put<I: Serialize, O: DeserializeOwned>(
        &self,
        ctx: &ReqContext,
        path: &str,
        input: &I,
    ) -> Result<O> {
        self.send(ctx, Method::PUT, path, Some(input)).await
    }

    pub async fn patch<I: Serialize, O: DeserializeOwned>(
        &self,
        ctx: &ReqContext,
        path: &str,
        input: &I,
    ) -> Result<O> {
        self.send(ctx, Method::PATCH, path, Some(input)).await
    }

    pub async fn delete<O: DeserializeOwned>(&self, ctx: &ReqContext, path: &str) -> Result<O> {
        self.send::<(), O>(ctx, Method::DELETE, path, None).await
    }

    /// Call a backend that wraps its output in the standard envelope
    pub async fn get_result<O: DeserializeOwned>(&self, ctx: &ReqContext, path: &str) -> Result<O> {
        let res: SuccessResponse<O> = self.get(ctx, path).await?;
        Ok(res.result)
    }

    pub async fn send<I: Serialize, O: DeserializeOwned>(
        &self,
        ctx: &ReqContext,
        method: Method,
        path: &str,
        input: Option<&I>,
    ) -> Result<O> {
        let url = format!("{}{}", self.endpoint, path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .headers(self.context_headers(ctx))
            .header(ACCEPT, self.codec.mime());
        if let Some(input) = input {
            req = req
                .header(CONTENT_TYPE, self.codec.mime())
                .body(self.codec.encode(input)?);
        }

        let res = req.send().await?;
        let status = res.status().as_u16();
        let body = res.bytes().await?;
        debug!(
            method = %method,
            url = %url,
            status,
            bytes = body.len(),
            request_id = %ctx.request_id,
            "backend call"
        );

        if status > MAX_OK_STATUS {
            let err = upstream_error(status, &body);
            if status >= 500 {
                warn!(url = %url, status, error = %err, "backend failed");
            }
            return Err(err);
        }

        self.codec.decode(&body).map_err(|e| {
            ApiError::upstream(
                500,
                format!("failed to decode response from {}: {}", url, e),
                Some(diagnostic_of(&body)),
            )
        })
    }

    fn context_headers(&self, ctx: &ReqContext) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let mut put = |name: &'static str, value: &str| {
            if value.is_empty() {
                return;
            }
            if let Ok(v) = HeaderValue::from_str(value) {
                headers.insert(name, v);
            }
        };

        put(X_REQUEST_ID, &ctx.request_id);
        put(X_REAL_IP, &ctx.real_ip);
        let session = &ctx.session;
        if !session.user_id.is_zero() {
            put(X_AUTH_USER, &session.user_id.to_string());
            put(X_AUTH_USER_RATING, &session.user_rating.to_string());
            put(X_AUTH_USER_KIND, &session.user_kind.to_string());
        }
        if !session.app_id.is_zero() {
            put(X_AUTH_APP, &session.app_id.to_string());
        }
        headers
    }
}

/// Build an upstream error from a failed response body. Backends answer
/// with `{"error": {"message": ...}}`; anything else is kept as-is.
fn upstream_error(status: u16, body: &[u8]) -> ApiError {
    let value = serde_cbor::from_slice::<Value>(body)
        .ok()
        .or_else(|| serde_json::from_slice::<serde_json::Value>(body).ok().map(json_to_cbor));

    let message = value
        .as_ref()
        .and_then(error_message)
        .unwrap_or_else(|| format!("upstream responded with {}", status));
    let data = match &value {
        Some(v) => diagnostic(v),
        None => String::from_utf8_lossy(body).into_owned(),
    };
    ApiError::upstream(status, message, (!data.is_empty()).then_some(data))
}

fn error_message(value: &Value) -> Option<String> {
    let Value::Map(map) = value else { return None };
    let error = map.get(&Value::Text("error".into()))?;
    match error {
        Value::Text(msg) => Some(msg.clone()),
        Value::Map(inner) => match inner.get(&Value::Text("message".into()))? {
            Value::Text(msg) => Some(msg.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn json_to_cbor(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i as i128),
            None => Value::Float(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(json_to_cbor).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (Value::Text(k), json_to_cbor(v)))
                .collect(),
        ),
    }
}

fn diagnostic_of(body: &[u8]) -> String {
    match serde_cbor::from_slice::<Value>(body) {
        Ok(v) => diagnostic(&v),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Render a CBOR value in diagnostic notation (RFC 8949 §8)
pub fn diagnostic(value: &Value) -> String {
    let mut out = String::new();
    write_diagnostic(&mut out, value);
    out
}

fn write_diagnostic(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        Value::Float(f) => {
            let _ = write!(out, "{:?}", f);
        }
        Value::Bytes(b) => {
            out.push_str("h'");
            for byte in b {
                let _ = write!(out, "{:02x}", byte);
            }
            out.push('\'');
        }
        Value::Text(s) => {
            let _ = write!(out, "{:?}", s);
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_diagnostic(out, item);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_diagnostic(out, k);
                out.push_str(": ");
                write_diagnostic(out, v);
            }
            out.push('}');
        }
        Value::Tag(tag, inner) => {
            let _ = write!(out, "{}(", tag);
            write_diagnostic(out, inner);
            out.push(')');
        }
        _ => out.push_str("undefined"),
    }
}
