//! In-memory backends for flow tests
//!
//! Every fake records its side-effecting calls into one shared event list so
//! tests can check the order in which a flow touched the ledger, the wallet
//! and the translator.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use crate::auth::{ReqContext, Session};
use crate::cache::Locker;
use crate::content::TEContents;
use crate::services::jarvis::{EstimateInput, ProgressQuery, TranslatingInput, TranslatingOutput};
use crate::services::logbase::{CreateLogInput, LogOutput, UpdateLogInput};
use crate::services::search::SearchDocument;
use crate::services::userbase::GroupInfo;
use crate::services::walletbase::SpendInput;
use crate::services::webscraper::ScrapingOutput;
use crate::services::writing::{
    CreateMessageInput, MessageOutput, SaleTarget, SubscriptionInput, SubscriptionKind,
    SubscriptionOutput, UpdateI18nMessageInput, UpdateMessageInput,
};
use crate::services::{
    Backends, ContentStore, JobLedger, Scraper, Translator, UserDirectory, Wallet, WalletService,
};
use crate::types::{unix_now, ApiError, Id, RawBytes, Result};

/// The calling user in every fake context
pub const USER: Id = Id::from_bytes([1; 12]);

/// Group that owns fixture messages and sale targets
pub const GROUP: Id = Id::from_bytes([2; 12]);

type Events = Arc<Mutex<Vec<String>>>;

fn record(events: &Events, event: impl Into<String>) {
    events.lock().unwrap().push(event.into());
}

/// Fresh, increasing ids
pub fn next_id() -> Id {
    static NEXT: AtomicU64 = AtomicU64::new(1 << 32);
    let n = NEXT.fetch_add(1, Ordering::SeqCst);
    let mut raw = [0u8; 12];
    raw[4..].copy_from_slice(&n.to_be_bytes());
    Id::from_bytes(raw)
}

fn not_found(what: &str) -> ApiError {
    ApiError::upstream(404, format!("{} not found", what), None)
}

// ============================================================================
// userbase
// ============================================================================

#[derive(Default)]
pub struct FakeUserbase {
    roles: Mutex<HashMap<Id, i8>>,
    calls: AtomicUsize,
}

impl FakeUserbase {
    pub fn set_role(&self, gid: Id, role: i8) {
        self.roles.lock().unwrap().insert(gid, role);
    }

    /// Directory lookups so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for FakeUserbase {
    async fn group_role(&self, _ctx: &ReqContext, gid: Id) -> Result<i8> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.roles
            .lock()
            .unwrap()
            .get(&gid)
            .copied()
            .ok_or_else(|| not_found("membership"))
    }

    async fn group_info(&self, _ctx: &ReqContext, gid: Id) -> Result<GroupInfo> {
        Ok(GroupInfo {
            id: gid,
            cn: format!("g{}", &gid.to_string()[..6]),
            name: "Fixture group".into(),
            ..Default::default()
        })
    }
}

// ============================================================================
// writing
// ============================================================================

pub struct FakeWriting {
    events: Events,
    messages: Mutex<HashMap<Id, MessageOutput>>,
    targets: Mutex<HashMap<(SubscriptionKind, Id), SaleTarget>>,
    subscriptions: Mutex<HashMap<(SubscriptionKind, Id), SubscriptionOutput>>,
    bookmarks: Mutex<HashSet<(SubscriptionKind, Id)>>,
    search_results: Mutex<Vec<SearchDocument>>,
    fail_search: AtomicBool,
    fail_subscription_writes: AtomicBool,
}

impl FakeWriting {
    fn new(events: Events) -> Self {
        Self {
            events,
            messages: Mutex::default(),
            targets: Mutex::default(),
            subscriptions: Mutex::default(),
            bookmarks: Mutex::default(),
            search_results: Mutex::default(),
            fail_search: AtomicBool::new(false),
            fail_subscription_writes: AtomicBool::new(false),
        }
    }

    /// Store a message attached to [`GROUP`]
    pub fn put_message(&self, language: &str, version: u16, message: RawBytes) -> Id {
        let id = next_id();
        self.messages.lock().unwrap().insert(
            id,
            MessageOutput {
                id,
                attach_to: GROUP,
                kind: "creation".into(),
                language: language.into(),
                version,
                message: Some(message),
                ..Default::default()
            },
        );
        id
    }

    pub fn put_i18n(&self, id: Id, language: &str, message: RawBytes) {
        if let Some(msg) = self.messages.lock().unwrap().get_mut(&id) {
            msg.i18n_messages
                .get_or_insert_with(BTreeMap::new)
                .insert(language.into(), message);
        }
    }

    pub fn message(&self, id: Id) -> Option<MessageOutput> {
        self.messages.lock().unwrap().get(&id).cloned()
    }

    pub fn put_sale_target(&self, kind: SubscriptionKind, target: SaleTarget) {
        self.targets.lock().unwrap().insert((kind, target.id), target);
    }

    pub fn put_subscription(&self, kind: SubscriptionKind, sub: SubscriptionOutput) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert((kind, sub.cid), sub);
    }

    pub fn set_search(&self, docs: Vec<SearchDocument>) {
        *self.search_results.lock().unwrap() = docs;
    }

    pub fn fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    pub fn is_bookmarked(&self, kind: SubscriptionKind, cid: Id) -> bool {
        self.bookmarks.lock().unwrap().contains(&(kind, cid))
    }

    pub fn fail_subscription_writes(&self, fail: bool) {
        self.fail_subscription_writes.store(fail, Ordering::SeqCst);
    }

    fn check_subscription_write(&self) -> Result<()> {
        if self.fail_subscription_writes.load(Ordering::SeqCst) {
            return Err(ApiError::upstream(500, "writing is down", None));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for FakeWriting {
    async fn get_message(&self, _ctx: &ReqContext, id: Id, _fields: &str) -> Result<MessageOutput> {
        self.message(id).ok_or_else(|| not_found("message"))
    }

    async fn create_message(
        &self,
        _ctx: &ReqContext,
        input: &CreateMessageInput,
    ) -> Result<MessageOutput> {
        let now = unix_now();
        let msg = MessageOutput {
            id: next_id(),
            attach_to: input.attach_to,
            kind: input.kind.clone(),
            language: input.language.clone(),
            version: 1,
            context: input.context.clone(),
            message: Some(input.message.clone()),
            i18n_messages: None,
            created_at: now,
            updated_at: now,
        };
        self.messages.lock().unwrap().insert(msg.id, msg.clone());
        Ok(msg)
    }

    async fn update_message(
        &self,
        _ctx: &ReqContext,
        input: &UpdateMessageInput,
    ) -> Result<MessageOutput> {
        let mut messages = self.messages.lock().unwrap();
        let msg = messages
            .get_mut(&input.id)
            .ok_or_else(|| not_found("message"))?;
        if msg.version != input.version {
            return Err(ApiError::upstream(409, "version mismatch", None));
        }
        if let Some(context) = &input.context {
            msg.context = context.clone();
        }
        if let Some(language) = &input.language {
            msg.language = language.clone();
        }
        if let Some(message) = &input.message {
            msg.message = Some(message.clone());
        }
        msg.version += 1;
        msg.updated_at = unix_now();
        Ok(msg.clone())
    }

    async fn update_i18n_message(
        &self,
        _ctx: &ReqContext,
        input: &UpdateI18nMessageInput,
    ) -> Result<MessageOutput> {
        record(&self.events, "writing.update_i18n");
        let mut messages = self.messages.lock().unwrap();
        let msg = messages
            .get_mut(&input.id)
            .ok_or_else(|| not_found("message"))?;
        if msg.version != input.version {
            return Err(ApiError::upstream(409, "version mismatch", None));
        }
        msg.i18n_messages
            .get_or_insert_with(BTreeMap::new)
            .insert(input.language.clone(), input.message.clone());
        Ok(msg.clone())
    }

    async fn get_sale_target(
        &self,
        _ctx: &ReqContext,
        kind: SubscriptionKind,
        id: Id,
    ) -> Result<SaleTarget> {
        self.targets
            .lock()
            .unwrap()
            .get(&(kind, id))
            .cloned()
            .ok_or_else(|| not_found("sale target"))
    }

    async fn get_subscription(
        &self,
        _ctx: &ReqContext,
        kind: SubscriptionKind,
        cid: Id,
    ) -> Result<SubscriptionOutput> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(&(kind, cid))
            .cloned()
            .ok_or_else(|| not_found("subscription"))
    }

    async fn create_subscription(
        &self,
        _ctx: &ReqContext,
        kind: SubscriptionKind,
        input: &SubscriptionInput,
    ) -> Result<SubscriptionOutput> {
        record(&self.events, "writing.create_subscription");
        self.check_subscription_write()?;
        let mut subs = self.subscriptions.lock().unwrap();
        if subs.contains_key(&(kind, input.cid)) {
            return Err(ApiError::upstream(409, "subscription exists", None));
        }
        let now = unix_now();
        let sub = SubscriptionOutput {
            uid: input.uid,
            cid: input.cid,
            gid: input.gid,
            txn: input.txn,
            expire_at: input.expire_at,
            created_at: now,
            updated_at: now,
        };
        subs.insert((kind, input.cid), sub.clone());
        Ok(sub)
    }

    async fn update_subscription(
        &self,
        _ctx: &ReqContext,
        kind: SubscriptionKind,
        input: &SubscriptionInput,
    ) -> Result<SubscriptionOutput> {
        record(&self.events, "writing.update_subscription");
        self.check_subscription_write()?;
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs
            .get_mut(&(kind, input.cid))
            .ok_or_else(|| not_found("subscription"))?;
        if input.updated_at != Some(sub.updated_at) {
            return Err(ApiError::upstream(409, "subscription changed", None));
        }
        sub.txn = input.txn;
        sub.expire_at = input.expire_at;
        sub.updated_at += 1;
        Ok(sub.clone())
    }

    async fn bookmark(&self, _ctx: &ReqContext, kind: SubscriptionKind, cid: Id) -> Result<()> {
        record(&self.events, "writing.bookmark");
        self.bookmarks.lock().unwrap().insert((kind, cid));
        Ok(())
    }

    async fn search(
        &self,
        _ctx: &ReqContext,
        _q: &str,
        _language: &str,
    ) -> Result<Vec<SearchDocument>> {
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(ApiError::upstream(500, "writing search failed", None));
        }
        Ok(self.search_results.lock().unwrap().clone())
    }
}

// ============================================================================
// jarvis
// ============================================================================

pub struct FakeJarvis {
    events: Events,
    estimate: AtomicU32,
    tokens: AtomicU32,
    dictionary: Mutex<HashMap<String, String>>,
    progress: Mutex<Option<i8>>,
    fail_translations: AtomicBool,
    held: watch::Sender<bool>,
    search_results: Mutex<Vec<SearchDocument>>,
    fail_search: AtomicBool,
}

impl FakeJarvis {
    fn new(events: Events) -> Self {
        let (held, _) = watch::channel(false);
        Self {
            events,
            estimate: AtomicU32::new(0),
            tokens: AtomicU32::new(0),
            dictionary: Mutex::default(),
            progress: Mutex::default(),
            fail_translations: AtomicBool::new(false),
            held,
            search_results: Mutex::default(),
            fail_search: AtomicBool::new(false),
        }
    }

    pub fn set_estimate(&self, tokens: u32) {
        self.estimate.store(tokens, Ordering::SeqCst);
    }

    /// Tokens reported as actually used
    pub fn set_tokens(&self, tokens: u32) {
        self.tokens.store(tokens, Ordering::SeqCst);
    }

    pub fn set_dictionary(&self, pairs: &[(&str, &str)]) {
        let mut dict = self.dictionary.lock().unwrap();
        for (from, to) in pairs {
            dict.insert(from.to_string(), to.to_string());
        }
    }

    /// None answers progress queries with not-found
    pub fn set_progress(&self, progress: Option<i8>) {
        *self.progress.lock().unwrap() = progress;
    }

    pub fn fail_translations(&self, fail: bool) {
        self.fail_translations.store(fail, Ordering::SeqCst);
    }

    /// Park every translation until [`FakeJarvis::release_translations`]
    pub fn hold_translations(&self) {
        self.held.send_replace(true);
    }

    pub fn release_translations(&self) {
        self.held.send_replace(false);
    }

    pub fn set_search(&self, docs: Vec<SearchDocument>) {
        *self.search_results.lock().unwrap() = docs;
    }

    pub fn fail_search(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Translator for FakeJarvis {
    async fn estimate_tokens(&self, _ctx: &ReqContext, _input: &EstimateInput) -> Result<u32> {
        Ok(self.estimate.load(Ordering::SeqCst))
    }

    async fn translate_message(
        &self,
        _ctx: &ReqContext,
        input: &TranslatingInput,
    ) -> Result<TranslatingOutput> {
        record(&self.events, "jarvis.translate");
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|h| !*h).await;

        if self.fail_translations.load(Ordering::SeqCst) {
            return Err(ApiError::upstream(
                500,
                "jarvis is down",
                Some(r#"{"error": "model overloaded"}"#.into()),
            ));
        }

        let mut te = TEContents::from_cbor(&input.content)?;
        {
            let dict = self.dictionary.lock().unwrap();
            for content in te.0.iter_mut() {
                for text in content.texts.iter_mut() {
                    if let Some(t) = dict.get(text.as_str()) {
                        *text = t.clone();
                    }
                }
            }
        }

        Ok(TranslatingOutput {
            gid: input.gid,
            cid: input.cid,
            language: input.language.clone(),
            version: input.version,
            model: input.model.clone(),
            progress: 100,
            tokens: self.tokens.load(Ordering::SeqCst),
            content: RawBytes(te.to_cbor()?),
        })
    }

    async fn translating_progress(
        &self,
        _ctx: &ReqContext,
        _query: &ProgressQuery<'_>,
    ) -> Result<i8> {
        self.progress
            .lock()
            .unwrap()
            .ok_or_else(|| not_found("translation"))
    }

    async fn search(
        &self,
        _ctx: &ReqContext,
        _q: &str,
        _language: &str,
    ) -> Result<Vec<SearchDocument>> {
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(ApiError::upstream(500, "jarvis search failed", None));
        }
        Ok(self.search_results.lock().unwrap().clone())
    }
}

// ============================================================================
// logbase
// ============================================================================

pub struct FakeLedger {
    events: Events,
    rows: Mutex<Vec<LogOutput>>,
    fail_inserts: AtomicBool,
    held: watch::Sender<bool>,
}

impl FakeLedger {
    fn new(events: Events) -> Self {
        let (held, _) = watch::channel(false);
        Self {
            events,
            rows: Mutex::default(),
            fail_inserts: AtomicBool::new(false),
            held,
        }
    }

    pub fn row(&self, id: Id) -> Option<LogOutput> {
        self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned()
    }

    pub fn rows(&self) -> Vec<LogOutput> {
        self.rows.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().unwrap().is_empty()
    }

    /// Insert a row directly, assigning an id when it has none
    pub fn put_row(&self, mut row: LogOutput) -> Id {
        if row.id.is_zero() {
            row.id = next_id();
        }
        let id = row.id;
        self.rows.lock().unwrap().push(row);
        id
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Park every insert until [`FakeLedger::release_inserts`]
    pub fn hold_inserts(&self) {
        self.held.send_replace(true);
    }

    pub fn release_inserts(&self) {
        self.held.send_replace(false);
    }
}

#[async_trait]
impl JobLedger for FakeLedger {
    async fn insert(&self, _ctx: &ReqContext, input: &CreateLogInput) -> Result<LogOutput> {
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|h| !*h).await;

        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(ApiError::upstream(500, "logbase is down", None));
        }
        record(&self.events, "ledger.insert");
        let row = LogOutput {
            uid: input.uid,
            id: next_id(),
            gid: input.gid,
            action: input.action.clone(),
            status: input.status,
            payload: input.payload.clone(),
            tokens: input.tokens,
            error: None,
            created_at: unix_now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn update(&self, _ctx: &ReqContext, input: &UpdateLogInput) -> Result<()> {
        record(&self.events, format!("ledger.update:{}", input.status));
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.uid == input.uid && r.id == input.id)
            .ok_or_else(|| not_found("log"))?;
        row.status = input.status;
        if input.tokens.is_some() {
            row.tokens = input.tokens;
        }
        row.error = input.error.clone();
        Ok(())
    }

    async fn get(&self, _ctx: &ReqContext, uid: Id, id: Id) -> Result<LogOutput> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.uid == uid && r.id == id)
            .cloned()
            .ok_or_else(|| not_found("log"))
    }
}

// ============================================================================
// walletbase
// ============================================================================

pub struct FakeWallet {
    events: Events,
    balance: AtomicI64,
    reservations: Mutex<HashMap<Id, i64>>,
    spends: AtomicUsize,
    fail_spends: AtomicBool,
    fail_commits: AtomicBool,
}

impl FakeWallet {
    fn new(events: Events) -> Self {
        Self {
            events,
            balance: AtomicI64::new(0),
            reservations: Mutex::default(),
            spends: AtomicUsize::new(0),
            fail_spends: AtomicBool::new(false),
            fail_commits: AtomicBool::new(false),
        }
    }

    pub fn set_balance(&self, balance: i64) {
        self.balance.store(balance, Ordering::SeqCst);
    }

    /// Balance with open reservations already taken out
    pub fn balance(&self) -> i64 {
        self.balance.load(Ordering::SeqCst)
    }

    /// Reservations made so far, committed or not
    pub fn spends(&self) -> usize {
        self.spends.load(Ordering::SeqCst)
    }

    pub fn fail_spends(&self, fail: bool) {
        self.fail_spends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn view(&self, txn: Option<Id>) -> Wallet {
        Wallet {
            topup: self.balance(),
            txn,
            ..Default::default()
        }
    }

    fn reserve(&self, event: &str, input: &SpendInput) -> Result<Wallet> {
        record(&self.events, event);
        if self.fail_spends.load(Ordering::SeqCst) {
            return Err(ApiError::upstream(500, "wallet is down", None));
        }
        if input.amount > self.balance() {
            return Err(ApiError::upstream(402, "insufficient balance", None));
        }
        self.spends.fetch_add(1, Ordering::SeqCst);
        self.balance.fetch_sub(input.amount, Ordering::SeqCst);
        let txn = next_id();
        self.reservations.lock().unwrap().insert(txn, input.amount);
        Ok(self.view(Some(txn)))
    }
}

#[async_trait]
impl WalletService for FakeWallet {
    async fn get(&self, _ctx: &ReqContext, _uid: Id) -> Result<Wallet> {
        Ok(self.view(None))
    }

    async fn spend(&self, _ctx: &ReqContext, input: &SpendInput) -> Result<Wallet> {
        self.reserve("wallet.spend", input)
    }

    async fn subscribe(&self, _ctx: &ReqContext, input: &SpendInput) -> Result<Wallet> {
        self.reserve("wallet.subscribe", input)
    }

    async fn commit(&self, _ctx: &ReqContext, _uid: Id, txn: Id) -> Result<Wallet> {
        record(&self.events, "wallet.commit");
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(ApiError::upstream(500, "wallet commit failed", None));
        }
        self.reservations
            .lock()
            .unwrap()
            .remove(&txn)
            .ok_or_else(|| not_found("transaction"))?;
        Ok(self.view(None))
    }

    async fn cancel(&self, _ctx: &ReqContext, _uid: Id, txn: Id) -> Result<Wallet> {
        record(&self.events, "wallet.cancel");
        let amount = self
            .reservations
            .lock()
            .unwrap()
            .remove(&txn)
            .ok_or_else(|| not_found("transaction"))?;
        self.balance.fetch_add(amount, Ordering::SeqCst);
        Ok(self.view(None))
    }
}

// ============================================================================
// locks
// ============================================================================

/// Process-local locker; TTLs are ignored
#[derive(Default)]
pub struct MemoryLocker {
    held: Mutex<HashSet<String>>,
}

impl MemoryLocker {
    pub fn is_empty(&self) -> bool {
        self.held.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl Locker for MemoryLocker {
    async fn try_lock(&self, key: &str, _ttl: Duration) -> Result<bool> {
        Ok(self.held.lock().unwrap().insert(key.to_string()))
    }

    async fn release(&self, key: &str) -> Result<()> {
        self.held.lock().unwrap().remove(key);
        Ok(())
    }
}

// ============================================================================
// webscraper
// ============================================================================

#[derive(Default)]
pub struct FakeScraper {
    pages: Mutex<HashMap<String, ScrapingOutput>>,
    calls: AtomicUsize,
}

impl FakeScraper {
    pub fn put_page(&self, page: ScrapingOutput) {
        self.pages.lock().unwrap().insert(page.url.clone(), page);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for FakeScraper {
    async fn scrape(&self, _ctx: &ReqContext, url: &str) -> Result<ScrapingOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| not_found("page"))
    }
}

// ============================================================================
// all of them
// ============================================================================

pub struct Fakes {
    pub userbase: Arc<FakeUserbase>,
    pub writing: Arc<FakeWriting>,
    pub jarvis: Arc<FakeJarvis>,
    pub logbase: Arc<FakeLedger>,
    pub wallet: Arc<FakeWallet>,
    pub webscraper: Arc<FakeScraper>,
    pub locker: Arc<MemoryLocker>,
    events: Events,
}

impl Default for Fakes {
    fn default() -> Self {
        let events = Events::default();
        Self {
            userbase: Arc::new(FakeUserbase::default()),
            writing: Arc::new(FakeWriting::new(events.clone())),
            jarvis: Arc::new(FakeJarvis::new(events.clone())),
            logbase: Arc::new(FakeLedger::new(events.clone())),
            wallet: Arc::new(FakeWallet::new(events.clone())),
            webscraper: Arc::new(FakeScraper::default()),
            locker: Arc::new(MemoryLocker::default()),
            events,
        }
    }
}

impl Fakes {
    pub fn backends(&self) -> Backends {
        Backends {
            userbase: self.userbase.clone(),
            writing: self.writing.clone(),
            jarvis: self.jarvis.clone(),
            logbase: self.logbase.clone(),
            wallet: self.wallet.clone(),
            webscraper: self.webscraper.clone(),
            locker: self.locker.clone(),
            key_prefix: "test:".into(),
        }
    }

    /// A signed-in [`USER`]
    pub fn ctx(&self) -> ReqContext {
        ReqContext {
            request_id: "test".into(),
            real_ip: "127.0.0.1".into(),
            session: Session {
                user_id: USER,
                ..Default::default()
            },
        }
    }

    /// Side effects observed so far, in order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}
