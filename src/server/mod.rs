//! HTTP server and the state it shares with handlers

pub mod codec;
pub mod http;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::cache::RedisLocker;
use crate::config::Conf;
use crate::sealing::{SealKey, Sealer};
use crate::services::{
    Backends, BaseClient, JarvisClient, LogbaseClient, PoolConfig, UserbaseClient, WalletClient,
    WebscraperClient, WritingClient,
};
use crate::types::Result;
use crate::worker::JobTracker;

/// How long aborted jobs get to finish their compensation
pub const ABORT_WINDOW: Duration = Duration::from_secs(5);

/// Shared application state
pub struct AppState {
    pub conf: Conf,
    pub backends: Backends,
    /// Seals payment codes
    pub sealer: Sealer,
    pub jobs: JobTracker,
    pub started: Instant,
}

impl AppState {
    pub fn new(conf: Conf, backends: Backends, sealer: Sealer) -> Self {
        let jobs = JobTracker::new(conf.server.max_background_jobs);
        Self {
            conf,
            backends,
            sealer,
            jobs,
            started: Instant::now(),
        }
    }

    /// Connect every backend named in `conf` and load the sealing key
    pub async fn connect(conf: Conf) -> Result<Self> {
        let http = PoolConfig::internal().build()?;
        let external = PoolConfig::external().build()?;
        let base = &conf.base;

        let locker = RedisLocker::connect(&conf.redis.node)?;
        locker.ping().await?;
        info!(node = %conf.redis.node, "redis connected");

        let backends = Backends {
            userbase: Arc::new(UserbaseClient::new(BaseClient::internal(
                &base.userbase,
                http.clone(),
            ))),
            writing: Arc::new(WritingClient::new(BaseClient::internal(
                &base.writing,
                http.clone(),
            ))),
            jarvis: Arc::new(JarvisClient::new(BaseClient::internal(
                &base.jarvis,
                http.clone(),
            ))),
            logbase: Arc::new(LogbaseClient::new(BaseClient::internal(
                &base.logbase,
                http.clone(),
            ))),
            wallet: Arc::new(WalletClient::new(BaseClient::internal(
                &base.walletbase,
                http,
            ))),
            webscraper: Arc::new(WebscraperClient::new(BaseClient::external(
                &base.webscraper,
                external,
            ))),
            locker: Arc::new(locker),
            key_prefix: conf.redis.prefix.clone(),
        };

        let key = SealKey::load(&conf.keys.aesgcm)?;
        info!(kind = %key.kind(), "sealing key loaded");

        Ok(Self::new(conf, backends, Sealer::new(key)))
    }
}

/// Serve until `shutdown` resolves, then give open connections the grace
/// period to finish.
pub async fn run(state: Arc<AppState>, shutdown: impl Future<Output = ()>) -> Result<()> {
    let listener = TcpListener::bind(state.conf.server.addr).await?;
    info!(addr = %state.conf.server.addr, env = %state.conf.env, "yiwen-api listening");

    let builder = auto::Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(v) => v,
                    Err(e) => {
                        error!(error = %e, "error accepting connection");
                        continue;
                    }
                };
                let state = Arc::clone(&state);
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { http::handle_request(state, addr, req).await }
                });

                let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                let conn = graceful.watch(conn.into_owned());
                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        warn!(peer = %addr, error = %e, "error serving connection");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("shutdown requested, no longer accepting connections");
                break;
            }
        }
    }

    drop(listener);
    tokio::select! {
        _ = graceful.shutdown() => info!("all connections closed"),
        _ = tokio::time::sleep(state.conf.server.grace()) => {
            warn!("connections still open after grace period");
        }
    }
    Ok(())
}

/// Stop taking jobs, wait `grace` for them, then abort the rest so they
/// cancel their reservations. True when nothing is left running.
pub async fn drain_jobs(jobs: &JobTracker, grace: Duration) -> bool {
    jobs.close();
    info!(active = jobs.active(), "draining background jobs");
    if jobs.wait_idle(grace).await {
        return true;
    }

    warn!(active = jobs.active(), "background jobs outlived the grace period");
    jobs.abort();
    let idle = jobs.wait_idle(ABORT_WINDOW).await;
    if !idle {
        error!(active = jobs.active(), "background jobs did not stop after abort");
    }
    idle
}
