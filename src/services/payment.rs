//! Payment codes and subscription purchase
//!
//! A payment code is a sealed, short-lived offer: who pays whom, how much,
//! for what and for how long. The client gets it from [`get_code`], shows
//! it, and hands it back to [`pay_by_code`], which trusts nothing but what
//! the seal protects.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::logbase::{
    CreateLogInput, UpdateLogInput, ACTION_COLLECTION_SUBSCRIBE, ACTION_CREATION_SUBSCRIBE,
    STATUS_PENDING,
};
use super::userbase::GroupInfo;
use super::walletbase::SpendInput;
use super::writing::{SubscriptionInput, SubscriptionKind, SubscriptionOutput};
use super::Backends;
use crate::auth::ReqContext;
use crate::sealing::Sealer;
use crate::types::{unix_now, ApiError, Id, RawBytes, Result};
use crate::worker::{AbortSignal, JobTracker};

/// Purpose bound into every payment code
pub const PAYMENT_CODE_PURPOSE: &str = "PaymentCode";

/// How long a code stays payable, seconds
pub const CODE_TTL: i64 = 3600;

/// Subscription length bought by one payment, seconds
pub const SUBSCRIPTION_DURATION: i64 = 3 * 365 * 86400;

pub const KIND_CREATION: i8 = 0;
pub const KIND_COLLECTION: i8 = 1;
pub const KIND_RESERVED: i8 = 2;

/// Sealed offer. Field order is part of the token format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentCode {
    pub kind: i8,
    pub expire_at: i64,
    pub payee: Id,
    #[serde(default)]
    pub sub_payee: Option<Id>,
    pub amount: i64,
    pub gid: Id,
    pub uid: Id,
    pub cid: Id,
    pub duration: i64,
}

impl PaymentCode {
    fn subscription_kind(&self) -> Result<SubscriptionKind> {
        match self.kind {
            KIND_CREATION => Ok(SubscriptionKind::Creation),
            KIND_COLLECTION => Ok(SubscriptionKind::Collection),
            k => Err(ApiError::BadRequest(format!("unsupported payment kind {}", k))),
        }
    }

    fn action(&self) -> &'static str {
        match self.kind {
            KIND_COLLECTION => ACTION_COLLECTION_SUBSCRIBE,
            _ => ACTION_CREATION_SUBSCRIBE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCodeInput {
    pub kind: i8,
    pub cid: Id,
    /// Group the purchase is made through
    #[serde(default)]
    pub gid: Id,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentCodeOutput {
    pub code: String,
    pub kind: i8,
    pub amount: i64,
    pub duration: i64,
    pub expire_at: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_info: Option<GroupInfo>,
    /// The caller's current subscription to the same target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionOutput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayByCodeInput {
    pub code: String,
}

fn kind_for_offer(kind: i8) -> Result<SubscriptionKind> {
    match kind {
        KIND_CREATION => Ok(SubscriptionKind::Creation),
        KIND_COLLECTION => Ok(SubscriptionKind::Collection),
        KIND_RESERVED => Err(ApiError::NotImplemented(format!(
            "payment kind {} is not available yet",
            kind
        ))),
        k => Err(ApiError::BadRequest(format!("invalid payment kind {}", k))),
    }
}

/// The caller's subscription, or none
async fn current_subscription(
    backends: &Backends,
    ctx: &ReqContext,
    kind: SubscriptionKind,
    cid: Id,
) -> Result<Option<SubscriptionOutput>> {
    match backends.writing.get_subscription(ctx, kind, cid).await {
        Ok(sub) => Ok(Some(sub)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn get_code(
    backends: &Backends,
    sealer: &Sealer,
    ctx: &ReqContext,
    input: &GetCodeInput,
) -> Result<PaymentCodeOutput> {
    let kind = kind_for_offer(input.kind)?;
    if input.cid.is_zero() {
        return Err(ApiError::BadRequest("cid is required".into()));
    }

    let target = backends.writing.get_sale_target(ctx, kind, input.cid).await?;
    if target.price <= 0 {
        return Err(ApiError::BadRequest(format!("{} is not for sale", target.id)));
    }

    // buying through another group shares revenue with it
    let sub_payee = Some(input.gid).filter(|g| !g.is_zero() && *g != target.gid);
    let code = PaymentCode {
        kind: input.kind,
        expire_at: unix_now() + CODE_TTL,
        payee: target.gid,
        sub_payee,
        amount: target.price,
        gid: input.gid,
        uid: ctx.uid(),
        cid: target.id,
        duration: SUBSCRIPTION_DURATION,
    };
    let token = sealer.seal(&code, PAYMENT_CODE_PURPOSE)?;

    let group_info = match backends.userbase.group_info(ctx, target.gid).await {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(gid = %target.gid, error = %e, "group info unavailable for payment code");
            None
        }
    };
    let subscription = current_subscription(backends, ctx, kind, target.id).await?;
    if subscription.is_some() {
        if let Err(e) = backends.writing.bookmark(ctx, kind, target.id).await {
            warn!(cid = %target.id, error = %e, "failed to bookmark subscribed target");
        }
    }

    Ok(PaymentCodeOutput {
        code: token,
        kind: code.kind,
        amount: code.amount,
        duration: code.duration,
        expire_at: code.expire_at,
        title: target.title,
        group_info,
        subscription,
    })
}

/// Pay a sealed code and extend the caller's subscription
pub async fn pay_by_code(
    backends: &Backends,
    sealer: &Sealer,
    jobs: &JobTracker,
    ctx: &ReqContext,
    token: &str,
) -> Result<SubscriptionOutput> {
    let code: PaymentCode = sealer.open(token, PAYMENT_CODE_PURPOSE)?;
    let kind = code.subscription_kind()?;
    let now = unix_now();
    if code.expire_at < now {
        return Err(ApiError::BadRequest("payment code expired".into()));
    }
    if code.uid != ctx.uid() {
        return Err(ApiError::Forbidden("payment code belongs to another user".into()));
    }
    if code.amount <= 0 || code.duration <= 0 {
        return Err(ApiError::BadRequest("invalid payment code".into()));
    }

    let existing = current_subscription(backends, ctx, kind, code.cid).await?;
    if let Some(sub) = &existing {
        if sub.expire_at > now + code.duration / 2 {
            return Err(ApiError::BadRequest("already subscribed".into()));
        }
    }
    let expire_at = match &existing {
        Some(sub) if sub.expire_at > now => sub.expire_at + code.duration,
        _ => now + code.duration,
    };

    let wallet = backends.wallet.get(ctx, code.uid).await?;
    if wallet.balance() < code.amount {
        return Err(ApiError::PaymentRequired(format!(
            "insufficient balance: need {} WEN, have {}",
            code.amount,
            wallet.balance()
        )));
    }

    let action = code.action();
    let purchase = Purchase {
        backends: backends.clone(),
        ctx: ctx.detached(),
        kind,
        code,
        existing,
        expire_at,
    };
    jobs.run(action, move |signal| purchase.run(signal)).await
}

/// A subscription purchase, run to a terminal state even if the client
/// goes away
struct Purchase {
    backends: Backends,
    ctx: ReqContext,
    kind: SubscriptionKind,
    code: PaymentCode,
    existing: Option<SubscriptionOutput>,
    expire_at: i64,
}

impl Purchase {
    async fn run(self, mut signal: AbortSignal) -> Result<SubscriptionOutput> {
        let uid = self.code.uid;
        let payload = RawBytes::from_cbor(&self.code)
            .map_err(|e| ApiError::Internal(format!("failed to encode payment: {}", e)))?;
        let log = self
            .backends
            .logbase
            .insert(
                &self.ctx,
                &CreateLogInput {
                    uid,
                    gid: self.code.gid,
                    action: self.code.action().to_string(),
                    status: STATUS_PENDING,
                    ip: self.ctx.real_ip.clone(),
                    payload: payload.clone(),
                    tokens: None,
                },
            )
            .await
            .map_err(|e| ApiError::Internal(format!("failed to record payment: {}", e)))?;

        if signal.is_aborted() {
            let err = ApiError::Internal("payment aborted by shutdown".into());
            self.record(UpdateLogInput::failure(uid, log.id, err.to_string()))
                .await;
            return Err(err);
        }

        let reserved = self
            .backends
            .wallet
            .subscribe(
                &self.ctx,
                &SpendInput {
                    uid,
                    amount: self.code.amount,
                    payee: Some(self.code.payee),
                    sub_payee: self.code.sub_payee,
                    description: self.code.action().to_string(),
                    payload,
                },
            )
            .await
            .and_then(|w| {
                w.txn
                    .ok_or_else(|| ApiError::Internal("wallet returned no reservation".into()))
            });
        let txn = match reserved {
            Ok(txn) => txn,
            Err(e) => {
                self.record(UpdateLogInput::failure(uid, log.id, e.to_string()))
                    .await;
                return Err(e);
            }
        };

        let written = tokio::select! {
            r = self.write_subscription(txn) => r,
            _ = signal.aborted() => Err(ApiError::Internal("payment aborted by shutdown".into())),
        };
        let sub = match written {
            Ok(sub) => sub,
            Err(e) => {
                warn!(log = %log.id, txn = %txn, error = %e, "subscription write failed, cancelling");
                self.cancel(txn).await;
                self.record(UpdateLogInput::failure(uid, log.id, e.to_string()))
                    .await;
                return Err(e);
            }
        };

        if let Err(e) = self.backends.wallet.commit(&self.ctx, uid, txn).await {
            error!(log = %log.id, txn = %txn, error = %e, "commit failed, cancelling reservation");
            self.cancel(txn).await;
            self.record(UpdateLogInput::failure(uid, log.id, e.to_string()))
                .await;
            return Err(e);
        }

        self.record(UpdateLogInput::success(uid, log.id, None)).await;
        info!(log = %log.id, cid = %self.code.cid, expire_at = sub.expire_at, "subscription purchased");
        Ok(sub)
    }

    async fn write_subscription(&self, txn: Id) -> Result<SubscriptionOutput> {
        let mut input = SubscriptionInput {
            uid: self.code.uid,
            cid: self.code.cid,
            gid: self.code.payee,
            txn,
            expire_at: self.expire_at,
            updated_at: None,
        };
        let writing = &self.backends.writing;
        match &self.existing {
            Some(sub) => {
                input.updated_at = Some(sub.updated_at);
                writing.update_subscription(&self.ctx, self.kind, &input).await
            }
            None => writing.create_subscription(&self.ctx, self.kind, &input).await,
        }
    }

    async fn cancel(&self, txn: Id) {
        if let Err(e) = self
            .backends
            .wallet
            .cancel(&self.ctx, self.code.uid, txn)
            .await
        {
            error!(txn = %txn, error = %e, "failed to cancel reservation");
        }
    }

    async fn record(&self, update: UpdateLogInput) {
        if let Err(e) = self.backends.logbase.update(&self.ctx, &update).await {
            error!(log = %update.id, status = update.status, error = %e, "failed to update payment log");
        }
    }
}
