//! Asynchronous message translation
//!
//! # Flow
//!
//! In the request: load and check the message and price it. In a tracked
//! job the request only waits on until the job id is known: take the
//! single-flight lock and write a pending ledger row whose id is the job id.
//! Then, with the caller answered: reserve the cost in the wallet,
//! translate, store the merged translation, then commit the reservation and
//! mark the row succeeded, or cancel it and mark the row failed. The lock is
//! released on every path.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::jarvis::{EstimateInput, ProgressQuery, TranslatingInput};
use super::logbase::{
    CreateLogInput, LogMessage, UpdateLogInput, ACTION_MESSAGE_TRANSLATE, STATUS_FAILURE,
    STATUS_PENDING, STATUS_SUCCESS,
};
use super::walletbase::SpendInput;
use super::writing::{MessageOutput, UpdateI18nMessageInput};
use super::Backends;
use crate::auth::{require_role, ReqContext, Role};
use crate::cache::{lock_message, unlock, MessageLockKey};
use crate::content::{MessageBody, TEContents};
use crate::tokenizer::{self, cost_wen, model_price, MAX_TOKENS};
use crate::types::{ApiError, Id, RawBytes, Result};
use crate::worker::{AbortSignal, JobTracker};

/// Progress reported while the final write is still landing
const PROGRESS_ALMOST_DONE: i8 = 99;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateMessageInput {
    pub id: Id,
    pub language: String,
    pub version: u16,
    #[serde(default)]
    pub model: Option<String>,
    /// Only translate units the target language does not have yet
    #[serde(default)]
    pub newly_add: bool,
}

/// State of a translation job as seen by its poller
#[derive(Debug, Clone, PartialEq)]
pub enum JobPoll {
    Done(MessageOutput),
    Pending { job: Id, progress: i8 },
}

/// ISO 639-3 style codes, plus regional variants like `zho-Hant`
pub fn valid_language(lang: &str) -> bool {
    (2..=16).contains(&lang.len())
        && lang.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Validate, price, lock and record a translation, then start it in the
/// background. Returns the job id.
pub async fn start_translation(
    backends: &Backends,
    jobs: &JobTracker,
    ctx: &ReqContext,
    input: TranslateMessageInput,
) -> Result<Id> {
    if !valid_language(&input.language) {
        return Err(ApiError::BadRequest(format!(
            "invalid language {:?}",
            input.language
        )));
    }

    let msg = backends.writing.get_message(ctx, input.id, "").await?;
    if msg.version != input.version {
        return Err(ApiError::Conflict(format!(
            "message version is {}, not {}",
            msg.version, input.version
        )));
    }
    if msg.language == input.language {
        return Err(ApiError::BadRequest(
            "target language is the source language".into(),
        ));
    }
    require_role(backends.userbase.as_ref(), ctx, msg.attach_to, Role::MEMBER).await?;

    let src = match &msg.message {
        Some(data) if !data.is_empty() => MessageBody::decode(data)?,
        _ => return Err(ApiError::BadRequest("message has no content".into())),
    };
    let dst = match msg.i18n(&input.language) {
        Some(data) if !data.is_empty() => match MessageBody::decode(data) {
            Ok(existing) if existing.is_kv() == src.is_kv() => existing,
            _ => {
                warn!(message = %msg.id, language = %input.language, "existing translation has a different shape, starting over");
                src.new_like()
            }
        },
        _ => src.new_like(),
    };
    let todo = if input.newly_add {
        src.newly_add(&dst)?
    } else {
        src
    };
    if todo.is_empty() {
        return Err(ApiError::BadRequest("no need to translate".into()));
    }

    let te = todo.to_te().without_blank();
    let text = te.joined_text();
    let tokens = tokenizer::tokens(&text)?;
    if tokens > MAX_TOKENS {
        return Err(ApiError::Unprocessable(format!(
            "{} tokens exceed the limit of {}",
            tokens, MAX_TOKENS
        )));
    }

    let estimated = backends
        .jarvis
        .estimate_tokens(
            ctx,
            &EstimateInput {
                text,
                from_language: msg.language.clone(),
                to_language: input.language.clone(),
            },
        )
        .await?;
    let model = input.model.clone().unwrap_or_default();
    let cost = cost_wen(model_price(&model), estimated);

    let uid = ctx.uid();
    let wallet = backends.wallet.get(ctx, uid).await?;
    if wallet.balance() < cost {
        return Err(ApiError::PaymentRequired(format!(
            "insufficient balance: need {} WEN, have {}",
            cost,
            wallet.balance()
        )));
    }

    let content = te
        .to_cbor()
        .map(RawBytes)
        .map_err(|e| ApiError::Internal(format!("failed to encode contents: {}", e)))?;

    let accepted = Accepted {
        backends: backends.clone(),
        ctx: ctx.clone(),
        uid,
        msg,
        language: input.language,
        estimated,
        model,
        content,
        dst,
        cost,
    };
    jobs.start(ACTION_MESSAGE_TRANSLATE, move |signal, handoff| async move {
        match accepted.lock_and_record().await {
            Ok(job) => {
                handoff.send(Ok(job.job_id));
                job.run(signal).await;
            }
            Err(e) => handoff.send(Err(e)),
        }
    })
    .await
}

/// A priced request about to become a job. Taking the lock and writing the
/// pending row happen inside the tracked task, so once the lock is held the
/// row is always written and later settled, even if the caller hangs up.
struct Accepted {
    backends: Backends,
    ctx: ReqContext,
    uid: Id,
    msg: MessageOutput,
    language: String,
    estimated: u32,
    model: String,
    content: RawBytes,
    dst: MessageBody,
    cost: i64,
}

impl Accepted {
    async fn lock_and_record(self) -> Result<TranslationJob> {
        let Accepted {
            backends,
            ctx,
            uid,
            msg,
            language,
            estimated,
            model,
            content,
            dst,
            cost,
        } = self;

        let key = MessageLockKey::new(msg.id, &language, msg.version);
        let lock_key = lock_message(backends.locker.as_ref(), &backends.key_prefix, &key).await?;

        let recorded = record_pending(&backends, &ctx, &msg, &language, estimated).await;
        let (job_id, payload) = match recorded {
            Ok(v) => v,
            Err(e) => {
                unlock(backends.locker.as_ref(), &lock_key).await;
                error!(message = %msg.id, error = %e, "failed to record translation job");
                return Err(ApiError::Internal(format!("failed to record job: {}", e)));
            }
        };

        info!(job = %job_id, message = %msg.id, language = %language, cost, "translation job accepted");
        Ok(TranslationJob {
            ctx: ctx.detached(),
            backends,
            uid,
            job_id,
            lock_key,
            message: msg.id,
            gid: msg.attach_to,
            from_language: msg.language,
            language,
            version: msg.version,
            model,
            context: msg.context,
            content,
            dst,
            cost,
            payload,
        })
    }
}

async fn record_pending(
    backends: &Backends,
    ctx: &ReqContext,
    msg: &MessageOutput,
    language: &str,
    estimated: u32,
) -> Result<(Id, RawBytes)> {
    let payload = RawBytes::from_cbor(&LogMessage {
        id: msg.id,
        attach_to: msg.attach_to,
        language: language.to_string(),
        version: msg.version,
    })
    .map_err(|e| ApiError::Internal(format!("failed to encode job payload: {}", e)))?;

    let log = backends
        .logbase
        .insert(
            ctx,
            &CreateLogInput {
                uid: ctx.uid(),
                gid: msg.attach_to,
                action: ACTION_MESSAGE_TRANSLATE.to_string(),
                status: STATUS_PENDING,
                ip: ctx.real_ip.clone(),
                payload: payload.clone(),
                tokens: Some(estimated),
            },
        )
        .await?;
    Ok((log.id, payload))
}

/// Everything the background half needs, owned
struct TranslationJob {
    backends: Backends,
    ctx: ReqContext,
    uid: Id,
    job_id: Id,
    lock_key: String,
    message: Id,
    gid: Id,
    from_language: String,
    language: String,
    version: u16,
    model: String,
    context: String,
    content: RawBytes,
    dst: MessageBody,
    cost: i64,
    payload: RawBytes,
}

impl TranslationJob {
    async fn run(self, mut signal: AbortSignal) {
        info!(job = %self.job_id, message = %self.message, language = %self.language, "translation started");

        match self.reserve(&signal).await {
            Err(e) => {
                warn!(job = %self.job_id, error = %e, "reservation failed");
                self.record_failure(&e).await;
            }
            Ok(txn) => {
                let result = tokio::select! {
                    r = self.translate_and_apply() => r,
                    _ = signal.aborted() => Err(ApiError::Internal("translation aborted by shutdown".into())),
                };
                match result {
                    Ok(tokens) => self.commit(txn, tokens).await,
                    Err(e) => {
                        warn!(job = %self.job_id, error = %e, "translation failed, cancelling reservation");
                        self.cancel(txn).await;
                        self.record_failure(&e).await;
                    }
                }
            }
        }

        unlock(self.backends.locker.as_ref(), &self.lock_key).await;
    }

    async fn reserve(&self, signal: &AbortSignal) -> Result<Id> {
        if signal.is_aborted() {
            return Err(ApiError::Internal("translation aborted by shutdown".into()));
        }
        let wallet = self
            .backends
            .wallet
            .spend(
                &self.ctx,
                &SpendInput {
                    uid: self.uid,
                    amount: self.cost,
                    payee: None,
                    sub_payee: None,
                    description: ACTION_MESSAGE_TRANSLATE.to_string(),
                    payload: self.payload.clone(),
                },
            )
            .await?;
        wallet
            .txn
            .ok_or_else(|| ApiError::Internal("wallet returned no reservation".into()))
    }

    async fn translate_and_apply(&self) -> Result<u32> {
        let out = self
            .backends
            .jarvis
            .translate_message(
                &self.ctx,
                &TranslatingInput {
                    gid: self.gid,
                    cid: self.message,
                    language: self.language.clone(),
                    version: self.version,
                    from_language: self.from_language.clone(),
                    model: self.model.clone(),
                    context: self.context.clone(),
                    content: self.content.clone(),
                },
            )
            .await?;

        let translated = TEContents::from_cbor(&out.content).map_err(|e| {
            ApiError::upstream(500, format!("invalid translated contents: {}", e), None)
        })?;
        let mut dst = self.dst.clone();
        dst.from_te(&translated)?;

        self.backends
            .writing
            .update_i18n_message(
                &self.ctx,
                &UpdateI18nMessageInput {
                    id: self.message,
                    version: self.version,
                    language: self.language.clone(),
                    message: RawBytes(dst.encode()?),
                },
            )
            .await?;
        Ok(out.tokens)
    }

    async fn commit(&self, txn: Id, tokens: u32) {
        if let Err(e) = self.backends.wallet.commit(&self.ctx, self.uid, txn).await {
            error!(job = %self.job_id, txn = %txn, error = %e, "commit failed, cancelling reservation");
            self.cancel(txn).await;
            self.record_failure(&e).await;
            return;
        }

        let update = UpdateLogInput::success(self.uid, self.job_id, Some(tokens));
        match self.backends.logbase.update(&self.ctx, &update).await {
            Ok(()) => info!(job = %self.job_id, tokens, "translation committed"),
            Err(e) => error!(job = %self.job_id, error = %e, "failed to mark job succeeded"),
        }
    }

    async fn cancel(&self, txn: Id) {
        if let Err(e) = self.backends.wallet.cancel(&self.ctx, self.uid, txn).await {
            error!(job = %self.job_id, txn = %txn, error = %e, "failed to cancel reservation");
        }
    }

    async fn record_failure(&self, err: &ApiError) {
        let update = UpdateLogInput::failure(self.uid, self.job_id, err.to_string());
        if let Err(e) = self.backends.logbase.update(&self.ctx, &update).await {
            error!(job = %self.job_id, error = %e, "failed to mark job failed");
        }
    }
}

/// Read side of a translation job
pub async fn poll_translation(
    backends: &Backends,
    ctx: &ReqContext,
    job: Id,
    fields: &str,
) -> Result<JobPoll> {
    let log = backends.logbase.get(ctx, ctx.uid(), job).await?;
    if log.action != ACTION_MESSAGE_TRANSLATE {
        return Err(ApiError::BadRequest(format!(
            "job {} is not a message translation",
            job
        )));
    }
    let lm: LogMessage = log
        .payload
        .decode_cbor()
        .map_err(|e| ApiError::Internal(format!("invalid job payload: {}", e)))?;

    match log.status {
        STATUS_SUCCESS => Ok(JobPoll::Done(
            backends.writing.get_message(ctx, lm.id, fields).await?,
        )),
        STATUS_FAILURE => Err(ApiError::upstream(
            500,
            log.error.unwrap_or_else(|| "translation failed".into()),
            None,
        )),
        _ => {
            let query = ProgressQuery {
                gid: lm.attach_to,
                cid: lm.id,
                language: &lm.language,
                version: lm.version,
            };
            let progress = match backends.jarvis.translating_progress(ctx, &query).await {
                Ok(p) => p,
                Err(e) if e.is_not_found() => 0,
                Err(e) => return Err(e),
            };
            if progress < 100 {
                return Ok(JobPoll::Pending { job, progress });
            }

            match backends.writing.get_message(ctx, lm.id, fields).await {
                Ok(msg) if msg.i18n(&lm.language).is_some() => Ok(JobPoll::Done(msg)),
                Ok(_) => Ok(JobPoll::Pending {
                    job,
                    progress: PROGRESS_ALMOST_DONE,
                }),
                Err(e) if e.is_not_found() => Ok(JobPoll::Pending {
                    job,
                    progress: PROGRESS_ALMOST_DONE,
                }),
                Err(e) => Err(e),
            }
        }
    }
}
