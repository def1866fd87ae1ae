//! Per-request handling: request ids, routing, error rendering, access log

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::header::HeaderValue;
use hyper::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use super::codec::{error_response, response_codec, ApiRequest};
use super::AppState;
use crate::auth::session::{self, X_REAL_IP, X_REQUEST_ID};
use crate::routes;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub async fn handle_request<B>(
    state: Arc<AppState>,
    addr: SocketAddr,
    mut req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let codec = response_codec(req.headers());

    let request_id = session::request_id(req.headers());
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(X_REQUEST_ID, v);
    }
    if !req.headers().contains_key(X_REAL_IP) {
        if let Ok(v) = HeaderValue::from_str(&addr.ip().to_string()) {
            req.headers_mut().insert(X_REAL_IP, v);
        }
    }

    let result = match ApiRequest::read(req).await {
        Ok(api) => routes::dispatch(&state, api).await,
        Err(e) => Err(e),
    };

    let mut res = match result {
        Ok(res) => res,
        Err(e) => {
            if e.status_code().is_server_error() {
                error!(request_id = %request_id, method = %method, path = %path, error = %e, "request failed");
            } else {
                debug!(request_id = %request_id, error = %e, "request rejected");
            }
            error_response(codec, &e)
        }
    };
    if let Ok(v) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(X_REQUEST_ID, v);
    }

    info!(
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        request_id = %request_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    Ok(res)
}
