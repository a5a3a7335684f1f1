//! Scripted transport for driving the coordinator without a network.
//!
//! Compiled for unit tests and behind the `test-util` feature for
//! downstream test suites.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::payments::error::PaymentError;
use crate::payments::transport::PaymentTransport;
use crate::payments::types::{PaymentRequest, StatusReport, TransactionHandle};

type SubmitResult = Result<TransactionHandle, PaymentError>;
type StatusResult = Result<StatusReport, PaymentError>;

#[derive(Default)]
struct Script {
    submits: VecDeque<SubmitResult>,
    statuses: VecDeque<StatusResult>,
    last_status: Option<StatusResult>,
    status_latency: Duration,
}

/// Replays queued results in order.
///
/// Once the status queue runs dry the last status result repeats, so a
/// single `Pending` entry keeps a payment pending indefinitely.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
    hold: ArcSwapOption<Notify>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_submit(&self, result: SubmitResult) {
        self.script.lock().await.submits.push_back(result);
    }

    pub async fn push_status(&self, result: StatusResult) {
        self.script.lock().await.statuses.push_back(result);
    }

    /// Forget queued and repeating status results.
    pub async fn clear_statuses(&self) {
        let mut script = self.script.lock().await;
        script.statuses.clear();
        script.last_status = None;
    }

    /// Delay every status response by `latency`.
    pub async fn set_status_latency(&self, latency: Duration) {
        self.script.lock().await.status_latency = latency;
    }

    /// Make the next submit wait until the returned `Notify` fires.
    pub fn hold_submits(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.hold.store(Some(notify.clone()));
        notify
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentTransport for ScriptedTransport {
    async fn submit(&self, _request: &PaymentRequest) -> Result<TransactionHandle, PaymentError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(notify) = self.hold.swap(None) {
            notify.notified().await;
        }

        self.script
            .lock()
            .await
            .submits
            .pop_front()
            .unwrap_or_else(|| Err(PaymentError::PaymentFailed("no scripted submit result".into())))
    }

    async fn status(&self, _handle: &TransactionHandle) -> Result<StatusReport, PaymentError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let (result, latency) = {
            let mut script = self.script.lock().await;
            let result = match script.statuses.pop_front() {
                Some(result) => {
                    script.last_status = Some(result.clone());
                    Some(result)
                }
                None => script.last_status.clone(),
            };
            (result, script.status_latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        result.unwrap_or_else(|| {
            Err(PaymentError::StatusCheckFailed("no scripted status result".into()))
        })
    }
}
