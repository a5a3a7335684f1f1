//! Payment coordinator: the state machine for one payment at a time.
//!
//! # States
//! - Idle: no attempt
//! - Submitting: signed request is in flight
//! - AwaitingConfirmation: endpoint accepted it, polling for finality
//! - Success / Failed: terminal until `reset` or a new `submit`
//!
//! # State Transitions
//! ```text
//! Idle → Submitting: submit(request) passes local validation
//! Submitting → AwaitingConfirmation: endpoint returns a handle
//! Submitting → Failed: submission error
//! Submitting → Idle: payment required (escalation) or endpoint validation error
//! AwaitingConfirmation → Success: confirmed, or confirmations ≥ required
//! AwaitingConfirmation → Failed: failed on chain, status retries exhausted, poll window exceeded
//! AwaitingConfirmation → AwaitingConfirmation: pending, next poll scheduled
//! any → Idle: reset()
//! ```
//!
//! Every scheduled poll carries the id of the attempt it was scheduled for and
//! drops its result if that attempt is no longer current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::blockchain::types::explorer_tx_url;
use crate::config::{PayConfig, PolicyConfig, PollingConfig};
use crate::observability::metrics;
use crate::payments::error::PaymentError;
use crate::payments::scheduler::{PollFuture, PollScheduler};
use crate::payments::transport::PaymentTransport;
use crate::payments::types::{
    AttemptId, PaymentAttempt, PaymentOutcome, PaymentRequest, PaymentState, StatusReport,
    TransactionHandle, TxStatus,
};
use crate::resilience::{retry_with_backoff, RetryPolicy};

/// Roughly 30 years; stands in for a window too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Observable coordinator state. Published on every transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorState {
    pub attempt: Option<PaymentAttempt>,
}

impl CoordinatorState {
    pub fn state(&self) -> PaymentState {
        self.attempt
            .as_ref()
            .map(|a| a.state)
            .unwrap_or(PaymentState::Idle)
    }

    pub fn outcome(&self) -> Option<PaymentOutcome> {
        self.attempt.as_ref().map(PaymentAttempt::outcome)
    }
}

/// Everything a scheduled poll needs to know about its attempt.
#[derive(Debug, Clone)]
struct PollContext {
    attempt: AttemptId,
    handle: TransactionHandle,
    deadline: Instant,
}

/// Coordinates submission and confirmation of payments.
///
/// Cloning is cheap and every clone drives the same state machine.
#[derive(Clone)]
pub struct PaymentCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn PaymentTransport>,
    policy: PolicyConfig,
    polling: PollingConfig,
    retry: RetryPolicy,
    explorer_url: String,
    state: watch::Sender<CoordinatorState>,
    scheduler: PollScheduler,
    next_attempt: AtomicU64,
}

impl PaymentCoordinator {
    pub fn new(transport: Arc<dyn PaymentTransport>, config: &PayConfig) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self {
            inner: Arc::new(Inner {
                transport,
                policy: config.policy.clone(),
                polling: config.polling.clone(),
                retry: RetryPolicy::from(&config.polling.status_retry),
                explorer_url: config.chain.explorer_url.clone(),
                state,
                scheduler: PollScheduler::new(),
                next_attempt: AtomicU64::new(1),
            }),
        }
    }

    /// Submit a payment and wait for the endpoint to accept it.
    ///
    /// On success the coordinator is `AwaitingConfirmation` and keeps polling
    /// in the background; the returned outcome carries the handle. Rejected
    /// with `InvalidState` while another attempt is in flight, in which case
    /// the existing attempt is left untouched.
    pub async fn submit(&self, request: PaymentRequest) -> Result<PaymentOutcome, PaymentError> {
        let (amount, recipient) = request.validate(&self.inner.policy)?;

        let id = AttemptId(self.inner.next_attempt.fetch_add(1, Ordering::SeqCst));
        let mut busy = None;
        self.inner.state.send_if_modified(|current| {
            if let Some(existing) = current.attempt.as_ref().filter(|a| a.state.is_in_flight()) {
                busy = Some(existing.state);
                return false;
            }
            current.attempt = Some(PaymentAttempt::new(id, request.clone()));
            true
        });
        if let Some(state) = busy {
            tracing::warn!(state = %state, "Submit rejected, payment already in progress");
            return Err(PaymentError::InvalidState(state));
        }
        // A replaced terminal attempt has nothing scheduled; this is a no-op then.
        self.inner.scheduler.cancel();

        metrics::record_payment_submitted();
        tracing::info!(attempt = %id, amount = %amount, recipient = %recipient, "Submitting payment");

        match self.inner.transport.submit(&request).await {
            Ok(handle) => self.inner.accept_submission(id, handle),
            Err(err) if err.leaves_coordinator_idle() => {
                self.inner.discard(id);
                match &err {
                    PaymentError::PaymentRequired { amount, payment_url } => {
                        metrics::record_payment_outcome("escalated");
                        tracing::info!(
                            attempt = %id,
                            follow_up_amount = %amount,
                            payment_url = %payment_url,
                            "Endpoint requires an additional payment"
                        );
                    }
                    _ => {
                        metrics::record_payment_outcome("rejected");
                        tracing::info!(attempt = %id, error = %err, "Payment request rejected");
                    }
                }
                Err(err)
            }
            Err(err) => {
                if !self.inner.fail(id, err.clone()) {
                    return Err(PaymentError::Superseded);
                }
                Err(err)
            }
        }
    }

    /// Drop the current attempt and cancel its scheduled poll. Valid from any state.
    pub fn reset(&self) {
        let cancelled = self.inner.scheduler.cancel();
        let previous = self.state();
        self.inner.state.send_modify(|s| s.attempt = None);
        tracing::info!(previous = %previous, cancelled_poll = ?cancelled, "Coordinator reset");
    }

    pub fn state(&self) -> PaymentState {
        self.inner.state.borrow().state()
    }

    pub fn snapshot(&self) -> CoordinatorState {
        self.inner.state.borrow().clone()
    }

    pub fn outcome(&self) -> Option<PaymentOutcome> {
        self.inner.state.borrow().outcome()
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    /// Wait until nothing is in flight and return the settled state.
    pub async fn settled(&self) -> CoordinatorState {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|s| !s.state().is_in_flight()).await.map(|s| (*s).clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Block explorer link for the last known transaction handle.
    pub fn explorer_url(&self) -> Option<String> {
        let state = self.inner.state.borrow();
        let handle = state.attempt.as_ref()?.transaction_handle.as_ref()?;
        Some(explorer_tx_url(&self.inner.explorer_url, handle.as_str()))
    }

    /// Whether a status poll is currently scheduled.
    pub fn poll_scheduled(&self) -> bool {
        self.inner.scheduler.pending_for().is_some()
    }
}

impl Inner {
    fn is_current(&self, id: AttemptId) -> bool {
        self.state
            .borrow()
            .attempt
            .as_ref()
            .is_some_and(|a| a.id == id)
    }

    /// Apply `f` to the attempt if it is still the current one.
    fn update_attempt(&self, id: AttemptId, f: impl FnOnce(&mut PaymentAttempt)) -> bool {
        self.state.send_if_modified(|s| match s.attempt.as_mut() {
            Some(attempt) if attempt.id == id => {
                f(attempt);
                attempt.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    fn discard(&self, id: AttemptId) {
        self.state.send_if_modified(|s| {
            if s.attempt.as_ref().is_some_and(|a| a.id == id) {
                s.attempt = None;
                true
            } else {
                false
            }
        });
    }

    fn fail(&self, id: AttemptId, err: PaymentError) -> bool {
        let code = err.code();
        let message = err.to_string();
        let applied = self.update_attempt(id, |attempt| {
            attempt.state = PaymentState::Failed;
            attempt.last_error = Some(err);
        });
        if applied {
            metrics::record_payment_outcome("failed");
            tracing::warn!(attempt = %id, code, error = %message, "Payment failed");
        } else {
            tracing::debug!(attempt = %id, code, "Dropping failure for superseded attempt");
        }
        applied
    }

    fn accept_submission(
        self: &Arc<Self>,
        id: AttemptId,
        handle: TransactionHandle,
    ) -> Result<PaymentOutcome, PaymentError> {
        let mut outcome = None;
        let applied = self.update_attempt(id, |attempt| {
            attempt.transaction_handle = Some(handle.clone());
            attempt.state = PaymentState::AwaitingConfirmation;
            outcome = Some(attempt.outcome());
        });
        let Some(outcome) = outcome.filter(|_| applied) else {
            tracing::warn!(
                attempt = %id,
                tx_hash = %handle,
                "Submission accepted after reset, ignoring handle"
            );
            return Err(PaymentError::Superseded);
        };

        tracing::info!(attempt = %id, tx_hash = %handle, "Payment submitted, awaiting confirmation");

        let ctx = PollContext {
            attempt: id,
            handle,
            deadline: poll_deadline(Instant::now(), self.polling.max_duration_secs),
        };
        self.schedule_poll(ctx, Duration::from_millis(self.polling.initial_delay_ms));
        Ok(outcome)
    }

    fn schedule_poll(self: &Arc<Self>, ctx: PollContext, delay: Duration) {
        let attempt = ctx.attempt;
        let task = Arc::clone(self).poll(ctx);
        self.scheduler.schedule(attempt, delay, task);
    }

    /// One status poll. Schedules its successor while the transaction is pending.
    fn poll(self: Arc<Self>, ctx: PollContext) -> PollFuture {
        Box::pin(async move {
            if !self.is_current(ctx.attempt) {
                tracing::debug!(attempt = %ctx.attempt, "Skipping poll for superseded attempt");
                return;
            }

            let result = self.check_status(&ctx).await;

            if !self.is_current(ctx.attempt) {
                tracing::debug!(attempt = %ctx.attempt, "Discarding poll result for superseded attempt");
                return;
            }

            match result {
                Ok(report) => self.apply_report(ctx, report),
                Err(err) => {
                    metrics::record_status_poll("error");
                    self.fail(ctx.attempt, err);
                }
            }
        })
    }

    async fn check_status(&self, ctx: &PollContext) -> Result<StatusReport, PaymentError> {
        let transport = &self.transport;
        let handle = &ctx.handle;
        retry_with_backoff(
            &self.retry,
            |err: &PaymentError| {
                let retry = err.is_retryable();
                if retry {
                    metrics::record_status_retry();
                }
                retry
            },
            move |attempt| {
                tracing::debug!(tx_hash = %handle, try_number = attempt, "Checking payment status");
                transport.status(handle)
            },
        )
        .await
        .map_err(|err| match err {
            PaymentError::StatusCheckFailed(_) => err,
            other => PaymentError::StatusCheckFailed(other.to_string()),
        })
    }

    fn apply_report(self: &Arc<Self>, ctx: PollContext, report: StatusReport) {
        let id = ctx.attempt;

        if report.is_final() {
            metrics::record_status_poll("confirmed");
            let applied = self.update_attempt(id, |attempt| {
                attempt.state = PaymentState::Success;
                attempt.confirmations = report.confirmations;
                attempt.required_confirmations = Some(report.required_confirmations);
            });
            if applied {
                metrics::record_payment_outcome("success");
                tracing::info!(
                    attempt = %id,
                    tx_hash = %ctx.handle,
                    confirmations = report.confirmations,
                    "Payment confirmed"
                );
            }
            return;
        }

        match report.status {
            TxStatus::Failed => {
                metrics::record_status_poll("failed");
                self.fail(id, PaymentError::TransactionFailed(ctx.handle.to_string()));
            }
            TxStatus::Pending | TxStatus::Confirmed => {
                metrics::record_status_poll("pending");
                if Instant::now() >= ctx.deadline {
                    self.fail(id, PaymentError::ConfirmationTimeout(self.polling.max_duration_secs));
                    return;
                }

                let applied = self.update_attempt(id, |attempt| {
                    attempt.confirmations = report.confirmations;
                    attempt.required_confirmations = Some(report.required_confirmations);
                });
                if applied {
                    tracing::debug!(
                        attempt = %id,
                        confirmations = report.confirmations,
                        required = report.required_confirmations,
                        "Payment pending"
                    );
                    self.schedule_poll(ctx, Duration::from_millis(self.polling.interval_ms));
                }
            }
        }
    }
}

/// End of the poll window opened at `now`. Saturates instead of overflowing.
fn poll_deadline(now: Instant, window_secs: u64) -> Instant {
    now.checked_add(Duration::from_secs(window_secs))
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
