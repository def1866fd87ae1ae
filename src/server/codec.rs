//! Request reading and response writing
//!
//! Clients choose the wire format: `Content-Type` for what they send,
//! `Accept` for what they get back. JSON unless they ask for CBOR.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::{AuthMode, ReqContext};
use crate::services::base::{MIME_CBOR, MIME_JSON};
use crate::services::Codec;
use crate::types::{ApiError, Result};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 512 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Codec of the response, from `Accept`
pub fn response_codec(headers: &HeaderMap) -> Codec {
    let accept = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if accept.contains(MIME_CBOR) {
        Codec::Cbor
    } else {
        Codec::Json
    }
}

/// Codec of the request body, from `Content-Type`
pub fn request_codec(headers: &HeaderMap) -> Result<Codec> {
    let content_type = match headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(v) => v,
        None => return Ok(Codec::Json),
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        MIME_JSON | "" => Ok(Codec::Json),
        MIME_CBOR => Ok(Codec::Cbor),
        other => Err(ApiError::UnsupportedMediaType(format!(
            "expected {} or {}, got {}",
            MIME_JSON, MIME_CBOR, other
        ))),
    }
}

/// A request with its body read, ready for a handler
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    /// Read the body under the size cap. A body that breaks off because the
    /// peer went away is reported as 499.
    pub async fn read<B>(req: Request<B>) -> Result<Self>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        if declared_length(&parts) > Some(MAX_BODY_BYTES) {
            return Err(too_large());
        }

        let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => return Err(too_large()),
            Err(_) => return Err(ApiError::ClientClosed),
        };

        Ok(Self {
            path: parts.uri.path().to_string(),
            query: parts.uri.query().unwrap_or_default().to_string(),
            method: parts.method,
            headers: parts.headers,
            body,
        })
    }

    pub fn ctx(&self, mode: AuthMode) -> Result<ReqContext> {
        ReqContext::from_headers(&self.headers, mode)
    }

    pub fn codec(&self) -> Codec {
        response_codec(&self.headers)
    }

    pub fn query<T: DeserializeOwned>(&self) -> Result<T> {
        serde_urlencoded::from_str(&self.query)
            .map_err(|e| ApiError::BadRequest(format!("invalid query: {}", e)))
    }

    pub fn body<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(ApiError::BadRequest("request body required".into()));
        }
        request_codec(&self.headers)?
            .decode(&self.body)
            .map_err(|e| ApiError::BadRequest(format!("invalid body: {}", e)))
    }
}

fn declared_length(parts: &Parts) -> Option<usize> {
    parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn too_large() -> ApiError {
    ApiError::PayloadTooLarge(format!("request body exceeds {} bytes", MAX_BODY_BYTES))
}

/// Serialize `value` with `codec`
pub fn respond<T: Serialize>(
    codec: Codec,
    status: StatusCode,
    value: &T,
) -> Response<Full<Bytes>> {
    match codec.encode(value) {
        Ok(body) => with_body(codec, status, body),
        Err(e) => error_response(Codec::Json, &e),
    }
}

/// `{"error": {...}}` with the error's status
pub fn error_response(codec: Codec, err: &ApiError) -> Response<Full<Bytes>> {
    let status = err.status_code();
    let body = codec
        .encode(&err.to_body())
        .unwrap_or_else(|_| br#"{"error":{"code":500,"message":"internal error"}}"#.to_vec());
    with_body(codec, status, body)
}

fn with_body(codec: Codec, status: StatusCode, body: Vec<u8>) -> Response<Full<Bytes>> {
    let mut res = Response::new(Full::new(Bytes::from(body)));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(codec.mime()));
    res
}
