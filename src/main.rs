//! yiwen-api - user-facing API gateway for the Yiwen writing platform

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use yiwen_api::{config::VERSION, drain_jobs, logging, run, tokenizer, AppState, Args, Conf};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let conf = match Conf::from_file(&args.config) {
        Ok(conf) => conf,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    logging::init(&conf.log);
    info!(version = VERSION, env = %conf.env, config = %args.config.display(), "yiwen-api starting");

    if let Err(e) = tokenizer::init() {
        error!(error = %e, "failed to load tokenizer");
        std::process::exit(1);
    }

    let grace = conf.server.grace();
    let state = match AppState::connect(conf).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "failed to connect backends");
            std::process::exit(1);
        }
    };

    run(Arc::clone(&state), shutdown_signal()).await?;

    if !drain_jobs(&state.jobs, grace).await {
        error!("exiting with background jobs still running");
        std::process::exit(1);
    }
    info!("yiwen-api stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}
