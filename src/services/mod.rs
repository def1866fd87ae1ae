//! Backend services and the flows composed over them
//!
//! ## Clients
//!
//! - **userbase**: group roles and group profiles
//! - **writing**: messages, sale targets, subscriptions, literal search
//! - **jarvis**: translation, token estimates, semantic search
//! - **logbase**: the job ledger
//! - **walletbase**: balances and two-phase spending
//! - **webscraper**: third-party page fetching, JSON over the external pool
//!
//! ## Flows
//!
//! - **message**: message create/update/read with group checks
//! - **translation**: the asynchronous translation job and its poll side
//! - **payment**: sealed payment codes and subscription purchase
//! - **search**: concurrent semantic + literal search

pub mod base;
pub mod jarvis;
pub mod logbase;
pub mod message;
pub mod payment;
pub mod search;
pub mod translation;
pub mod userbase;
pub mod walletbase;
pub mod webscraper;
pub mod writing;

use serde::Serialize;
use std::sync::Arc;

use crate::cache::Locker;
use crate::types::{ApiError, Result};

pub use base::{BaseClient, Codec, PoolConfig};
pub use jarvis::{JarvisClient, Translator};
pub use logbase::{JobLedger, LogbaseClient};
pub use userbase::{UserDirectory, UserbaseClient};
pub use walletbase::{Wallet, WalletClient, WalletService};
pub use webscraper::{Scraper, WebscraperClient};
pub use writing::{ContentStore, WritingClient};

/// Every backend a flow may call, behind its trait
#[derive(Clone)]
pub struct Backends {
    pub userbase: Arc<dyn UserDirectory>,
    pub writing: Arc<dyn ContentStore>,
    pub jarvis: Arc<dyn Translator>,
    pub logbase: Arc<dyn JobLedger>,
    pub wallet: Arc<dyn WalletService>,
    pub webscraper: Arc<dyn Scraper>,
    pub locker: Arc<dyn Locker>,
    /// Prefix of every Redis key this process writes
    pub key_prefix: String,
}

/// Encode a query string
pub(crate) fn query<T: Serialize>(input: &T) -> Result<String> {
    serde_urlencoded::to_string(input)
        .map_err(|e| ApiError::Internal(format!("failed to encode query: {}", e)))
}
