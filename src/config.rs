//! Configuration for the yiwen API gateway
//!
//! The command line only says where the configuration file is; everything
//! else lives in TOML. `.env` is loaded first so `CONFIG_FILE_PATH` can come
//! from there.

use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{ApiError, Result};
use crate::worker::tracker::DEFAULT_MAX_JOBS;

/// Version line printed by `--version`
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT_SHORT"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// yiwen API gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "yiwen-api")]
#[command(about = "Translation, publishing and payment gateway for yiwen")]
#[command(version = VERSION)]
pub struct Args {
    /// Path of the TOML configuration file
    #[arg(
        short,
        long,
        env = "CONFIG_FILE_PATH",
        default_value = "./config/default.toml"
    )]
    pub config: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Conf {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default)]
    pub log: LogConf,
    pub server: ServerConf,
    pub base: BaseConf,
    pub redis: RedisConf,
    pub keys: KeysConf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConf {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// One JSON object per line instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConf {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConf {
    pub addr: SocketAddr,
    /// Seconds to wait for connections and background jobs on shutdown
    #[serde(default = "default_graceful_shutdown")]
    pub graceful_shutdown: u64,
    #[serde(default = "default_max_background_jobs")]
    pub max_background_jobs: usize,
}

impl ServerConf {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown)
    }
}

/// Base URLs of the backend services
#[derive(Debug, Clone, Deserialize)]
pub struct BaseConf {
    pub userbase: String,
    pub writing: String,
    pub jarvis: String,
    pub logbase: String,
    pub walletbase: String,
    /// Third-party page fetcher, reached over the external pool
    pub webscraper: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConf {
    /// `redis://host:port/db`
    pub node: String,
    #[serde(default)]
    pub prefix: String,
}

/// Sealed key files
#[derive(Debug, Clone, Deserialize)]
pub struct KeysConf {
    /// AEAD key for payment codes
    pub aesgcm: PathBuf,
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_graceful_shutdown() -> u64 {
    10
}

fn default_max_background_jobs() -> usize {
    DEFAULT_MAX_JOBS
}

impl Conf {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let conf: Conf =
            toml::from_str(text).map_err(|e| ApiError::Config(format!("invalid config: {}", e)))?;
        conf.validate()?;
        Ok(conf)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let bases = [
            ("base.userbase", &self.base.userbase),
            ("base.writing", &self.base.writing),
            ("base.jarvis", &self.base.jarvis),
            ("base.logbase", &self.base.logbase),
            ("base.walletbase", &self.base.walletbase),
            ("base.webscraper", &self.base.webscraper),
        ];
        for (name, url) in bases {
            if url.trim().is_empty() {
                return Err(ApiError::Config(format!("{} is required", name)));
            }
        }
        if self.redis.node.trim().is_empty() {
            return Err(ApiError::Config("redis.node is required".into()));
        }
        if self.server.graceful_shutdown == 0 {
            return Err(ApiError::Config(
                "server.graceful_shutdown must be at least 1 second".into(),
            ));
        }
        if self.server.max_background_jobs == 0 {
            return Err(ApiError::Config(
                "server.max_background_jobs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.env == "prod"
    }
}

#[cfg(test)]
pub(crate) const SAMPLE: &str = r#"
env = "test"

[log]
level = "debug"

[server]
addr = "127.0.0.1:8080"
graceful_shutdown = 5

[base]
userbase = "http://userbase:8080"
writing = "http://writing:8080"
jarvis = "http://jarvis:8080"
logbase = "http://logbase:8080"
walletbase = "http://walletbase:8080"
webscraper = "https://webscraper.example.com"

[redis]
node = "redis://127.0.0.1:6379/0"
prefix = "yw:"

[keys]
aesgcm = "./keys/aesgcm.key"

[oss]
bucket = "ignored"

[wechat]
appId = "ignored"
"#;
