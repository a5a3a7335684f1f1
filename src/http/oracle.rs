//! Status sources for the reference gateway.
//!
//! The gateway never talks to a chain. Each `GET status/{hash}` asks a
//! [`StatusOracle`] what the transaction looks like right now.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::payments::types::{TransactionHandle, TxStatus};

/// One reading of a transaction's on-chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub status: TxStatus,
    pub confirmations: u32,
    pub block_number: Option<u64>,
    pub gas_used: Option<String>,
    pub gas_fee: Option<String>,
}

impl Observation {
    pub fn pending(confirmations: u32) -> Self {
        Self {
            status: TxStatus::Pending,
            confirmations,
            block_number: None,
            gas_used: None,
            gas_fee: None,
        }
    }

    pub fn confirmed(confirmations: u32, block_number: u64) -> Self {
        Self {
            status: TxStatus::Confirmed,
            confirmations,
            block_number: Some(block_number),
            gas_used: Some("21000".to_string()),
            gas_fee: Some("0.001234".to_string()),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: TxStatus::Failed,
            confirmations: 0,
            block_number: None,
            gas_used: None,
            gas_fee: None,
        }
    }
}

/// Where the gateway gets transaction status from.
#[async_trait]
pub trait StatusOracle: Send + Sync {
    async fn observe(&self, hash: &TransactionHandle, required_confirmations: u32) -> Observation;
}

/// Derives a stable status from the last four hex digits of the hash.
///
/// Digits mod 100 below 10 fail, below 30 stay pending, the rest confirm.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestOracle;

impl DigestOracle {
    fn digest(hash: &str) -> u32 {
        let tail = hash.get(hash.len().saturating_sub(4)..).unwrap_or_default();
        u32::from_str_radix(tail, 16).unwrap_or(0)
    }
}

#[async_trait]
impl StatusOracle for DigestOracle {
    async fn observe(&self, hash: &TransactionHandle, required_confirmations: u32) -> Observation {
        let n = Self::digest(hash.as_str());
        let required = required_confirmations.max(1);

        match n % 100 {
            0..=9 => Observation::failed(),
            10..=29 => Observation::pending(n % required),
            _ => Observation::confirmed(required + n % 50, 12_345_678 + u64::from(n % 1000)),
        }
    }
}

/// Replays a per-hash sequence of observations.
///
/// The last observation of a sequence repeats. Unknown hashes read as
/// pending with no confirmations.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    scripts: DashMap<String, VecDeque<Observation>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sequence for `hash`.
    pub fn script(&self, hash: &str, observations: impl IntoIterator<Item = Observation>) {
        self.scripts
            .insert(hash.to_lowercase(), observations.into_iter().collect());
    }

    /// Script the next hash without knowing it yet.
    ///
    /// Used when the gateway mints the hash; the sequence is moved onto the
    /// real hash by [`ScriptedOracle::claim_default`].
    pub fn script_default(&self, observations: impl IntoIterator<Item = Observation>) {
        self.script("*", observations);
    }

    fn claim_default(&self, hash: &str) {
        if self.scripts.contains_key(hash) {
            return;
        }
        if let Some((_, observations)) = self.scripts.remove("*") {
            self.scripts.insert(hash.to_string(), observations);
        }
    }
}

#[async_trait]
impl StatusOracle for ScriptedOracle {
    async fn observe(&self, hash: &TransactionHandle, _required_confirmations: u32) -> Observation {
        let key = hash.as_str().to_lowercase();
        self.claim_default(&key);

        let Some(mut observations) = self.scripts.get_mut(&key) else {
            return Observation::pending(0);
        };
        if observations.len() > 1 {
            observations.pop_front().unwrap_or_else(|| Observation::pending(0))
        } else {
            observations
                .front()
                .cloned()
                .unwrap_or_else(|| Observation::pending(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(tail: &str) -> TransactionHandle {
        TransactionHandle::new(format!("0x{:0>64}", tail))
    }

    #[tokio::test]
    async fn test_digest_oracle_buckets() {
        let oracle = DigestOracle;

        // 0x0005 = 5
        assert_eq!(oracle.observe(&handle("0005"), 12).await, Observation::failed());

        // 0x0014 = 20 → pending, 20 % 12 confirmations
        assert_eq!(oracle.observe(&handle("0014"), 12).await, Observation::pending(8));

        // 0x0064 = 100 → 100 % 100 = 0 → failed
        assert_eq!(oracle.observe(&handle("0064"), 12).await.status, TxStatus::Failed);

        // 0x0032 = 50 → confirmed with 12 + 0 confirmations
        let confirmed = oracle.observe(&handle("0032"), 12).await;
        assert_eq!(confirmed.status, TxStatus::Confirmed);
        assert_eq!(confirmed.confirmations, 12);
        assert_eq!(confirmed.block_number, Some(12_345_678 + 50));
    }

    #[tokio::test]
    async fn test_digest_oracle_is_stable() {
        let oracle = DigestOracle;
        let hash = handle("beef");
        assert_eq!(oracle.observe(&hash, 12).await, oracle.observe(&hash, 12).await);
    }

    #[tokio::test]
    async fn test_scripted_oracle_replays_and_repeats_last() {
        let oracle = ScriptedOracle::new();
        let hash = handle("abc");
        oracle.script(
            hash.as_str(),
            [Observation::pending(3), Observation::confirmed(14, 1)],
        );

        assert_eq!(oracle.observe(&hash, 12).await, Observation::pending(3));
        assert_eq!(oracle.observe(&hash, 12).await.confirmations, 14);
        assert_eq!(oracle.observe(&hash, 12).await.confirmations, 14);
        assert_eq!(oracle.observe(&handle("def"), 12).await, Observation::pending(0));
    }

    #[tokio::test]
    async fn test_scripted_oracle_default_binds_to_first_hash() {
        let oracle = ScriptedOracle::new();
        oracle.script_default([Observation::failed()]);

        let first = handle("1");
        assert_eq!(oracle.observe(&first, 12).await, Observation::failed());
        assert_eq!(oracle.observe(&first, 12).await, Observation::failed());
        assert_eq!(oracle.observe(&handle("2"), 12).await, Observation::pending(0));
    }
}
