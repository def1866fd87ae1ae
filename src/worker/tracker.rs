//! Background job tracker
//!
//! Jobs outlive the request that started them: they run on the process
//! runtime, not inside the connection task, so a client hanging up does not
//! stop a half-done wallet transaction. The tracker bounds how many run at
//! once and lets shutdown drain them, then ask the stragglers to abort.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::types::{ApiError, Result};

/// Default cap on concurrently running jobs
pub const DEFAULT_MAX_JOBS: usize = 256;

struct Inner {
    semaphore: Arc<Semaphore>,
    active: AtomicUsize,
    idle: Notify,
    abort: watch::Sender<bool>,
}

/// Handle shared by the server and every handler that starts a job
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<Inner>,
}

/// Lets a running job notice that shutdown gave up waiting for it
#[derive(Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the tracker aborts; never resolves otherwise
    pub async fn aborted(&mut self) {
        if self.rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Early result channel of a job started with [`JobTracker::start`]
pub struct Handoff<T>(oneshot::Sender<Result<T>>);

impl<T> Handoff<T> {
    /// Hand `value` to the waiting caller, if it is still there
    pub fn send(self, value: Result<T>) {
        let _ = self.0.send(value);
    }
}

struct ActiveGuard {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl JobTracker {
    pub fn new(max_jobs: usize) -> Self {
        let (abort, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                semaphore: Arc::new(Semaphore::new(max_jobs.max(1))),
                active: AtomicUsize::new(0),
                idle: Notify::new(),
                abort,
            }),
        }
    }

    /// Number of jobs still running
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.inner.abort.subscribe(),
        }
    }

    /// Start a detached job. Waits for a free slot; fails once closed.
    pub async fn spawn<F, Fut>(&self, name: &'static str, job: F) -> Result<()>
    where
        F: FnOnce(AbortSignal) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ApiError::Internal("shutting down, not accepting new jobs".into()))?;

        self.inner.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard {
            inner: Arc::clone(&self.inner),
            _permit: permit,
        };

        let fut = job(self.signal());
        tokio::spawn(async move {
            let _guard = guard;
            debug!(job = name, "background job started");
            fut.await;
            debug!(job = name, "background job finished");
        });
        Ok(())
    }

    /// Run a job detached but wait for its result. Dropping the returned
    /// future (client gone) leaves the job running to completion.
    pub async fn run<T, F, Fut>(&self, name: &'static str, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(AbortSignal) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.start(name, move |signal, handoff| {
            let fut = job(signal);
            async move { handoff.send(fut.await) }
        })
        .await
    }

    /// Run a job detached and wait only for the value it passes to its
    /// [`Handoff`]. The job carries on after handing off, and keeps running
    /// if the caller goes away at any point after the slot is taken.
    pub async fn start<T, F, Fut>(&self, name: &'static str, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(AbortSignal, Handoff<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.spawn(name, move |signal| job(signal, Handoff(tx))).await?;
        rx.await
            .map_err(|_| ApiError::Internal(format!("{} ended without a result", name)))?
    }

    /// Stop accepting new jobs
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    /// Ask running jobs to take their abort path
    pub fn abort(&self) {
        info!(active = self.active(), "aborting background jobs");
        self.inner.abort.send_replace(true);
    }

    /// Wait until no job runs or `grace` elapses. True when idle.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.active() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.active() == 0;
            }
        }
    }
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JOBS)
    }
}
