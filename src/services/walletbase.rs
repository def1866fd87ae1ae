//! Wallet (walletbase) and its two-phase spend
//!
//! `spend` and `subscribe` reserve funds and return the reservation as
//! `txn`; the reservation is then either committed or cancelled. Neither
//! call is idempotent, so callers hold a lock and a pending ledger row
//! before reserving.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::base::BaseClient;
use crate::auth::ReqContext;
use crate::types::{Id, RawBytes, Result, SuccessResponse};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireWallet")]
pub struct Wallet {
    pub award: i64,
    pub topup: i64,
    pub income: i64,
    pub credits: u64,
    pub level: u8,
    /// Reservation awaiting commit, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn: Option<Id>,
}

#[derive(Deserialize)]
struct WireWallet {
    #[serde(default)]
    award: i64,
    #[serde(default)]
    topup: i64,
    #[serde(default)]
    income: i64,
    #[serde(default)]
    credits: u64,
    #[serde(default)]
    txn: Option<Id>,
}

impl From<WireWallet> for Wallet {
    fn from(w: WireWallet) -> Self {
        Self {
            award: w.award,
            topup: w.topup,
            income: w.income,
            credits: w.credits,
            level: Wallet::level_of(w.credits),
            txn: w.txn.filter(|t| !t.is_zero()),
        }
    }
}

impl Wallet {
    /// Spendable WEN
    pub fn balance(&self) -> i64 {
        self.award + self.topup + self.income
    }

    /// `floor(log10(credits))`, 0 without credits
    pub fn level_of(credits: u64) -> u8 {
        match credits {
            0 => 0,
            c => c.ilog10() as u8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendInput {
    pub uid: Id,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payee: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_payee: Option<Id>,
    pub description: String,
    pub payload: RawBytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInput {
    pub uid: Id,
    pub txn: Id,
}

#[derive(Debug, Serialize)]
struct QueryWallet {
    uid: Id,
}

#[async_trait]
pub trait WalletService: Send + Sync {
    async fn get(&self, ctx: &ReqContext, uid: Id) -> Result<Wallet>;

    /// Reserve `amount`; the returned wallet carries the reservation
    async fn spend(&self, ctx: &ReqContext, input: &SpendInput) -> Result<Wallet>;

    /// Reserve a subscription payment routed to the payee
    async fn subscribe(&self, ctx: &ReqContext, input: &SpendInput) -> Result<Wallet>;

    async fn commit(&self, ctx: &ReqContext, uid: Id, txn: Id) -> Result<Wallet>;

    async fn cancel(&self, ctx: &ReqContext, uid: Id, txn: Id) -> Result<Wallet>;
}

#[derive(Debug, Clone)]
pub struct WalletClient {
    base: BaseClient,
}

impl WalletClient {
    pub fn new(base: BaseClient) -> Self {
        Self { base }
    }

    async fn call(&self, ctx: &ReqContext, path: &str, input: &impl Serialize) -> Result<Wallet> {
        let res: SuccessResponse<Wallet> = self.base.post(ctx, path, input).await?;
        Ok(res.result)
    }
}

#[async_trait]
impl WalletService for WalletClient {
    async fn get(&self, ctx: &ReqContext, uid: Id) -> Result<Wallet> {
        let query = super::query(&QueryWallet { uid })?;
        self.base
            .get_result(ctx, &format!("/v1/wallet?{}", query))
            .await
    }

    async fn spend(&self, ctx: &ReqContext, input: &SpendInput) -> Result<Wallet> {
        self.call(ctx, "/v1/transaction/spend", input).await
    }

    async fn subscribe(&self, ctx: &ReqContext, input: &SpendInput) -> Result<Wallet> {
        self.call(ctx, "/v1/transaction/subscribe", input).await
    }

    async fn commit(&self, ctx: &ReqContext, uid: Id, txn: Id) -> Result<Wallet> {
        self.call(ctx, "/v1/transaction/commit", &TransactionInput { uid, txn })
            .await
    }

    async fn cancel(&self, ctx: &ReqContext, uid: Id, txn: Id) -> Result<Wallet> {
        self.call(ctx, "/v1/transaction/cancel", &TransactionInput { uid, txn })
            .await
    }
}
