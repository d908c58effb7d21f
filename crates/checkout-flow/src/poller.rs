//! # Payment Poller
//!
//! Polls a payment handle until the backend reports `done`.
//!
//! ```text
//!   start(handle)
//!        │
//!        ▼
//!   ┌──────────┐  done=false / error   ┌───────────────────────────┐
//!   │  lookup  │ ────────────────────▶ │ wait poll_interval(elapsed)│
//!   └──────────┘ ◀──────────────────── │ (1s ticker → progress)     │
//!        │ done=true                   └───────────────────────────┘
//!        ▼
//!   PollOutcome::{Succeeded, Failed}
//! ```
//!
//! The loop owns its timers. Cancelling the session's token (or dropping
//! the session) stops both the ticker and the poll timer; the token is
//! checked again before every lookup. There is no deadline.

use checkout_core::backoff::TICK_INTERVAL;
use checkout_core::{poll_interval, PaymentAttempt, PaymentSnapshot, SharedBackend};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Live view of a running poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollProgress {
    /// Handle, last observed status and whole seconds since polling began
    pub attempt: PaymentAttempt,
    /// Status lookups issued so far
    pub polls: u32,
}

/// Terminal classification of a `done=true` snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded(PaymentSnapshot),
    Failed(PaymentSnapshot),
}

impl PollOutcome {
    pub fn from_snapshot(snapshot: PaymentSnapshot) -> Self {
        if snapshot.is_success() {
            PollOutcome::Succeeded(snapshot)
        } else {
            PollOutcome::Failed(snapshot)
        }
    }

    pub fn snapshot(&self) -> &PaymentSnapshot {
        match self {
            PollOutcome::Succeeded(s) | PollOutcome::Failed(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Succeeded(_))
    }
}

/// Starts poll loops on the current tokio runtime
#[derive(Clone)]
pub struct PaymentPoller {
    backend: SharedBackend,
}

impl PaymentPoller {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Start polling `handle` under a fresh cancellation token
    pub fn start(&self, handle: impl Into<String>) -> PollSession {
        self.start_with_token(handle, CancellationToken::new())
    }

    /// Start polling `handle`; cancelling `cancel` ends the loop
    pub fn start_with_token(&self, handle: impl Into<String>, cancel: CancellationToken) -> PollSession {
        let handle = handle.into();
        let (tx, rx) = watch::channel(PollProgress {
            attempt: PaymentAttempt::new(handle.clone()),
            polls: 0,
        });

        info!(handle = %handle, "Polling payment status");
        let task = tokio::spawn(poll_loop(
            self.backend.clone(),
            handle.clone(),
            cancel.clone(),
            tx,
        ));

        PollSession {
            handle,
            cancel,
            progress: rx,
            task: Some(task),
        }
    }
}

/// A running poll loop. Dropping the session cancels it.
pub struct PollSession {
    handle: String,
    cancel: CancellationToken,
    progress: watch::Receiver<PollProgress>,
    task: Option<JoinHandle<Option<PaymentSnapshot>>>,
}

impl PollSession {
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Progress updates, one per tick and one per lookup
    pub fn progress(&self) -> watch::Receiver<PollProgress> {
        self.progress.clone()
    }

    /// Stop the loop; no lookup is issued after this returns
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for a terminal snapshot; `None` if the loop was cancelled first.
    ///
    /// The session stays owned by the returned future, so dropping the
    /// future before it resolves cancels the loop.
    pub async fn wait(mut self) -> Option<PollOutcome> {
        let joined = match self.task.as_mut() {
            Some(task) => task.await,
            None => return None,
        };
        self.task = None;
        match joined {
            Ok(snapshot) => snapshot.map(PollOutcome::from_snapshot),
            Err(e) => {
                warn!(handle = %self.handle, error = %e, "Poll task ended abnormally");
                None
            }
        }
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel.cancel();
        }
    }
}

async fn poll_loop(
    backend: SharedBackend,
    handle: String,
    cancel: CancellationToken,
    progress: watch::Sender<PollProgress>,
) -> Option<PaymentSnapshot> {
    let started = Instant::now();
    let mut ticker = interval_at(started + TICK_INTERVAL, TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if cancel.is_cancelled() {
            debug!(handle = %handle, "Polling stopped");
            return None;
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = backend.payment_status(&handle) => result,
        };
        progress.send_modify(|p| p.polls += 1);

        match result {
            Ok(snapshot) => {
                debug!(
                    handle = %handle,
                    status = %snapshot.status,
                    done = snapshot.done,
                    elapsed_secs = started.elapsed().as_secs(),
                    "[POLL]"
                );
                progress.send_modify(|p| p.attempt.observe(&snapshot));
                if snapshot.done {
                    info!(handle = %handle, status = %snapshot.status, "Payment reached a terminal state");
                    return Some(snapshot);
                }
            }
            // Treated the same as "still pending"
            Err(e) => warn!(handle = %handle, error = %e, "Payment status lookup failed"),
        }

        let next = Instant::now() + poll_interval(started.elapsed().as_secs());
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = sleep_until(next) => break,
                _ = ticker.tick() => {
                    let elapsed = started.elapsed().as_secs();
                    progress.send_modify(|p| p.attempt.elapsed_secs = elapsed);
                }
            }
        }
    }
}
