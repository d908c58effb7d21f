//! # Checkout Flow
//!
//! One subscription checkout, from invoice creation to the result view.
//!
//! ```text
//! IDLE ──▶ INVOICING ──▶ CONFIRMING ──▶ POLLING ──┬──▶ TERMINAL_SUCCESS
//!   ▲          │              │                   └──▶ TERMINAL_FAILURE
//!   └──────────┴──────────────┘  (missing/malformed id or handle)
//! ```
//!
//! INVOICING strictly precedes CONFIRMING strictly precedes POLLING and
//! no step is retried. Starting a new attempt cancels the previous poll
//! loop before a new handle exists.
//!
//! Every attempt carries a generation number. Only the newest attempt may
//! publish state, own the cancellation token or navigate; a superseded
//! attempt ends as [`CheckoutOutcome::Canceled`].

use crate::poller::{PaymentPoller, PollOutcome, PollSession};
use checkout_core::{
    result_route, CardOption, CheckoutContextStore, CheckoutError, CheckoutResult, ConfirmPayment,
    ErrorKind, InvoiceId, Navigator, PaymentSnapshot, PlanSelection, SharedBackend, StartSubscription,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Where the checkout currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    Invoicing,
    Confirming { invoice_id: InvoiceId },
    Polling { invoice_id: InvoiceId, handle: String },
    TerminalSuccess { invoice_id: InvoiceId, snapshot: PaymentSnapshot },
    TerminalFailure { invoice_id: InvoiceId, snapshot: PaymentSnapshot },
}

/// How a full checkout run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Polling saw `done`; the shopper was sent to `route`
    Completed { outcome: PollOutcome, route: String },
    /// A hard failure before polling began
    Aborted { message: String, kind: ErrorKind },
    /// Torn down before a terminal state
    Canceled,
}

pub struct CheckoutFlow {
    backend: SharedBackend,
    store: CheckoutContextStore,
    navigator: Arc<dyn Navigator>,
    poller: PaymentPoller,
    state: Mutex<CheckoutState>,
    generation: AtomicU64,
    active: Mutex<Option<ActivePoll>>,
}

/// Cancellation token of the attempt currently polling
struct ActivePoll {
    generation: u64,
    token: CancellationToken,
}

impl CheckoutFlow {
    pub fn new(
        backend: SharedBackend,
        store: CheckoutContextStore,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            poller: PaymentPoller::new(backend.clone()),
            backend,
            store,
            navigator,
            state: Mutex::new(CheckoutState::Idle),
            generation: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// Record the checkout page so a gateway redirect can return to it
    pub fn mount(&self) {
        self.store.remember_page(&self.navigator.current_href());
    }

    pub fn state(&self) -> CheckoutState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(CheckoutState::Idle)
    }

    /// Create the invoice, start the payment and begin polling it
    pub async fn begin(&self, plan: &PlanSelection, card: &CardOption) -> CheckoutResult<PollSession> {
        self.start(plan, card).await.map(|started| started.session)
    }

    /// Run a checkout to completion and navigate to the result view
    pub async fn run(&self, plan: &PlanSelection, card: &CardOption) -> CheckoutOutcome {
        let Started {
            generation,
            invoice_id,
            session,
        } = match self.start(plan, card).await {
            Ok(started) => started,
            Err(e) => {
                return CheckoutOutcome::Aborted {
                    message: e.user_message(),
                    kind: e.kind(),
                }
            }
        };

        let handle = session.handle().to_string();
        let Some(outcome) = session.wait().await else {
            return CheckoutOutcome::Canceled;
        };
        match self.finish(generation, invoice_id, &handle, &outcome) {
            Some(route) => {
                self.navigator.navigate(&route);
                CheckoutOutcome::Completed { outcome, route }
            }
            None => CheckoutOutcome::Canceled,
        }
    }

    /// Stop any running poll loop and supersede any attempt still in flight
    pub fn teardown(&self) {
        self.supersede();
    }

    /// Cancel the active poll loop and return the generation of the next attempt
    fn supersede(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut active) = self.active.lock() {
            if let Some(previous) = active.take() {
                info!(generation = previous.generation, "Polling cancelled");
                previous.token.cancel();
            }
        }
        generation
    }

    #[instrument(skip(self, plan, card), fields(plan = %plan.plan_code, months = plan.months))]
    async fn start(
        &self,
        plan: &PlanSelection,
        card: &CardOption,
    ) -> CheckoutResult<Started> {
        let generation = self.supersede();

        let source = card.payment_source().ok_or_else(|| {
            CheckoutError::InvalidRequest("Select a card to pay with".to_string())
        })?;

        self.set_state(generation, CheckoutState::Invoicing);
        let invoice = self
            .backend
            .start_subscription(&StartSubscription {
                plan: plan.clone(),
                source,
            })
            .await
            .map_err(|e| self.abort(generation, e))?;
        let raw_invoice_id = invoice
            .invoice_id
            .ok_or(CheckoutError::MissingInvoiceId)
            .map_err(|e| self.abort(generation, e))?;
        let invoice_id = InvoiceId::parse(&raw_invoice_id).map_err(|e| self.abort(generation, e))?;
        self.store.set_pending_invoice(invoice_id);
        info!(invoice_id = %invoice_id, "Invoice created");

        self.set_state(generation, CheckoutState::Confirming { invoice_id });
        let confirmation = self
            .backend
            .confirm_payment(&ConfirmPayment::ByInvoice(invoice_id))
            .await
            .map_err(|e| self.abort(generation, e))?;
        let handle = confirmation
            .handle()
            .map(String::from)
            .ok_or(CheckoutError::MissingPaymentHandle)
            .map_err(|e| self.abort(generation, e))?;

        let token = CancellationToken::new();
        if let Ok(mut active) = self.active.lock() {
            // Checked under the lock so a concurrent teardown cannot miss this token
            if self.is_current(generation) {
                *active = Some(ActivePoll {
                    generation,
                    token: token.clone(),
                });
            } else {
                debug!(generation, "Attempt superseded before polling");
                token.cancel();
            }
        }
        self.set_state(
            generation,
            CheckoutState::Polling {
                invoice_id,
                handle: handle.clone(),
            },
        );
        Ok(Started {
            generation,
            invoice_id,
            session: self.poller.start_with_token(handle, token),
        })
    }

    /// Result route for a terminal poll, or `None` if a newer attempt owns the flow
    fn finish(
        &self,
        generation: u64,
        invoice_id: InvoiceId,
        handle: &str,
        outcome: &PollOutcome,
    ) -> Option<String> {
        {
            let Ok(mut active) = self.active.lock() else {
                return None;
            };
            match active.as_ref() {
                Some(current) if current.generation == generation => {
                    active.take();
                }
                _ => {
                    debug!(generation, "Ignoring result of a superseded attempt");
                    return None;
                }
            }
        }

        let snapshot = outcome.snapshot().clone();
        let route = result_route(
            Some(
                snapshot
                    .invoice_id
                    .clone()
                    .unwrap_or_else(|| invoice_id.to_string())
                    .as_str(),
            ),
            snapshot.payment_id.as_deref().unwrap_or(handle),
            &snapshot.status,
        );

        self.set_state(
            generation,
            if outcome.is_success() {
                CheckoutState::TerminalSuccess { invoice_id, snapshot }
            } else {
                CheckoutState::TerminalFailure { invoice_id, snapshot }
            },
        );
        Some(route)
    }

    fn abort(&self, generation: u64, e: CheckoutError) -> CheckoutError {
        error!(error = %e, kind = ?e.kind(), "Checkout aborted");
        self.set_state(generation, CheckoutState::Idle);
        e
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Publish `next` unless a newer attempt has started
    fn set_state(&self, generation: u64, next: CheckoutState) {
        if let Ok(mut state) = self.state.lock() {
            if self.is_current(generation) {
                *state = next;
            }
        }
    }
}

struct Started {
    generation: u64,
    invoice_id: InvoiceId,
    session: PollSession,
}

impl Drop for CheckoutFlow {
    fn drop(&mut self) {
        self.teardown();
    }
}
