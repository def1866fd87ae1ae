//! BPE token counting and WEN pricing
//!
//! The local tokenizer gates the input size; the translator's own estimate
//! of the output decides the price.

use std::sync::OnceLock;
use tiktoken_rs::CoreBPE;

use crate::types::{ApiError, Result};

/// Upper bound on the tokens of one translation input
pub const MAX_TOKENS: usize = 131_072;

/// Price per thousand tokens for models without a premium tier
pub const DEFAULT_PRICE: f64 = 1.0;

pub const PREMIUM_PRICE: f64 = 10.0;

const PREMIUM_MODELS: &[&str] = &["gpt-4", "gpt-4-turbo", "gpt-4o"];

static BPE: OnceLock<CoreBPE> = OnceLock::new();

fn bpe() -> Result<&'static CoreBPE> {
    if let Some(bpe) = BPE.get() {
        return Ok(bpe);
    }
    let loaded = tiktoken_rs::cl100k_base()
        .map_err(|e| ApiError::Internal(format!("failed to load cl100k_base: {}", e)))?;
    Ok(BPE.get_or_init(|| loaded))
}

/// Load the tokenizer up front so the first request does not pay for it
pub fn init() -> Result<()> {
    bpe().map(|_| ())
}

/// Number of cl100k_base tokens in `text`
pub fn tokens(text: &str) -> Result<usize> {
    Ok(bpe()?.encode_with_special_tokens(text).len())
}

/// Price tier of a model name; unknown models cost the default
pub fn model_price(model: &str) -> f64 {
    if PREMIUM_MODELS.contains(&model) {
        PREMIUM_PRICE
    } else {
        DEFAULT_PRICE
    }
}

/// `max(1, ceil(price * tokens / 1000))`
pub fn cost_wen(price: f64, tokens: u32) -> i64 {
    let cost = (price * tokens as f64 / 1000.0).ceil() as i64;
    cost.max(1)
}
