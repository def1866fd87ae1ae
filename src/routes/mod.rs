//! HTTP routes for the gateway
//!
//! Every handler takes the shared state and a fully read [`ApiRequest`],
//! and answers with the envelope encoded in the caller's codec.

pub mod health;
pub mod message;
pub mod payment;
pub mod scraping;
pub mod search;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response, StatusCode};
use serde::Serialize;

use crate::server::codec::{respond, ApiRequest};
use crate::server::AppState;
use crate::types::{ApiError, Result, SuccessResponse};

pub type HttpResponse = Response<Full<Bytes>>;

pub async fn dispatch(state: &AppState, req: ApiRequest) -> Result<HttpResponse> {
    match (&req.method, req.path.as_str()) {
        (&Method::GET, "/healthz") => Ok(health::healthz(state, &req)),
        (&Method::GET, "/version") => Ok(health::version(&req)),

        (&Method::POST, "/v1/message") => message::create(state, &req).await,
        (&Method::PATCH, "/v1/message") => message::update(state, &req).await,
        (&Method::GET, "/v1/message") => message::get(state, &req).await,
        (&Method::PATCH, "/v1/message/i18n") => message::translate(state, &req).await,
        (&Method::GET, "/v1/message/by_job") => message::by_job(state, &req).await,

        (&Method::GET, "/v1/payment/code") => payment::get_code(state, &req).await,
        (&Method::POST, "/v1/payment/by_code") => payment::pay_by_code(state, &req).await,

        (&Method::GET, "/v1/search") => search::search(state, &req).await,
        (&Method::GET, "/v1/scraping") => scraping::scrape(state, &req).await,

        (method, path) => Err(ApiError::NotFound(format!("no route for {} {}", method, path))),
    }
}

/// 200 with `result` in the envelope
pub(crate) fn ok<T: Serialize>(req: &ApiRequest, result: T) -> HttpResponse {
    respond(req.codec(), StatusCode::OK, &SuccessResponse::new(result))
}
