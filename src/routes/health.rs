//! Liveness and build information

use hyper::StatusCode;
use serde::Serialize;

use super::HttpResponse;
use crate::server::codec::{respond, ApiRequest};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub env: String,
    /// Seconds since the process started serving
    pub uptime: u64,
    /// Background jobs still running
    pub active_jobs: usize,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
    pub commit_full: &'static str,
    pub build_time: &'static str,
}

pub fn healthz(state: &AppState, req: &ApiRequest) -> HttpResponse {
    let body = HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        env: state.conf.env.clone(),
        uptime: state.started.elapsed().as_secs(),
        active_jobs: state.jobs.active(),
    };
    respond(req.codec(), StatusCode::OK, &body)
}

pub fn version(req: &ApiRequest) -> HttpResponse {
    let body = VersionResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
    };
    respond(req.codec(), StatusCode::OK, &body)
}
