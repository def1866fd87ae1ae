//! yiwen-api - user-facing API gateway for the Yiwen writing platform
//!
//! Sits between clients and the internal services (userbase, writing,
//! jarvis, logbase, walletbase, webscraper):
//!
//! - **Messages**: create, update and read multilingual messages
//! - **Translation**: priced, locked, ledgered background translation jobs
//!   with polling by job id
//! - **Payment**: sealed payment codes and subscription purchase
//! - **Search**: merged full-text and semantic search
//! - **Scraping**: third-party pages fetched for app token callers
//!
//! Every endpoint speaks JSON or CBOR, chosen by the client's headers.

pub mod auth;
pub mod cache;
pub mod config;
pub mod content;
pub mod logging;
pub mod routes;
pub mod sealing;
pub mod server;
pub mod services;
pub mod tokenizer;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::{Args, Conf};
pub use server::{drain_jobs, run, AppState};
pub use types::{ApiError, Result};
