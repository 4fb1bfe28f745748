//! Append-only record of payment attempts.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{
    budget::{DAY_MS, HOUR_MS},
    clock::{Clock, SystemClock},
};

/// A single payment attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
    pub origin: String,
    pub path: String,
    /// Amount in satoshis.
    pub amount: u64,
    /// Proof of payment; empty for failed attempts.
    pub proof: String,
    pub timestamp_ms: u64,
    pub succeeded: bool,
}

/// Spending telemetry for one client.
pub struct SpendingLedger {
    clock: Arc<dyn Clock>,
    attempts: Mutex<Vec<PaymentAttempt>>,
}

impl std::fmt::Debug for SpendingLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpendingLedger")
            .field("attempts", &self.len())
            .finish()
    }
}

impl Default for SpendingLedger {
    fn default() -> Self {
        SpendingLedger::new()
    }
}

impl SpendingLedger {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        SpendingLedger {
            clock,
            attempts: Mutex::new(Vec::new()),
        }
    }

    /// Append an attempt stamped with the current time and return it.
    pub fn record(
        &self,
        origin: impl Into<String>,
        path: impl Into<String>,
        amount: u64,
        proof: impl Into<String>,
        succeeded: bool,
    ) -> PaymentAttempt {
        let attempt = PaymentAttempt {
            origin: origin.into(),
            path: path.into(),
            amount,
            proof: proof.into(),
            timestamp_ms: self.clock.now_ms(),
            succeeded,
        };
        self.attempts.lock().push(attempt.clone());
        attempt
    }

    /// Total of all successful payments.
    pub fn total_spent(&self) -> u64 {
        self.sum_successful(|_| true)
    }

    pub fn spent_last_hour(&self) -> u64 {
        let cutoff = self.clock.now_ms().saturating_sub(HOUR_MS);
        self.sum_successful(|a| a.timestamp_ms > cutoff)
    }

    pub fn spent_last_day(&self) -> u64 {
        let cutoff = self.clock.now_ms().saturating_sub(DAY_MS);
        self.sum_successful(|a| a.timestamp_ms > cutoff)
    }

    /// Successful spend per origin.
    pub fn by_origin(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for attempt in self.attempts.lock().iter().filter(|a| a.succeeded) {
            let total: &mut u64 = totals.entry(attempt.origin.clone()).or_default();
            *total = total.saturating_add(attempt.amount);
        }
        totals
    }

    /// A copy of every attempt, oldest first.
    pub fn records(&self) -> Vec<PaymentAttempt> {
        self.attempts.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render every attempt as a pretty-printed JSON array.
    pub fn serialize(&self) -> String {
        let attempts = self.records();
        serde_json::to_string_pretty(&attempts).unwrap_or_else(|_err| {
            #[cfg(feature = "tracing")]
            tracing::warn!("Failed to serialize spending ledger: {_err}");
            "[]".to_string()
        })
    }

    fn sum_successful(&self, filter: impl Fn(&PaymentAttempt) -> bool) -> u64 {
        self.attempts
            .lock()
            .iter()
            .filter(|a| a.succeeded && filter(a))
            .fold(0u64, |acc, a| acc.saturating_add(a.amount))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use crate::clock::ManualClock;

    use super::*;

    const START: u64 = 1_700_000_000_000;

    #[test]
    fn test_totals_count_only_successful() {
        let ledger = SpendingLedger::with_clock(Arc::new(ManualClock::new(START)));
        ledger.record("https://a.com", "/x", 100, "p1", true);
        ledger.record("https://a.com", "/y", 50, "", false);
        ledger.record("https://b.com", "/z", 25, "p2", true);

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.total_spent(), 125);
        assert_eq!(ledger.spent_last_hour(), 125);
        assert_eq!(ledger.spent_last_day(), 125);
        assert_eq!(
            ledger.by_origin(),
            BTreeMap::from([
                ("https://a.com".to_string(), 100),
                ("https://b.com".to_string(), 25),
            ])
        );
    }

    #[test]
    fn test_time_windows() {
        let clock = Arc::new(ManualClock::new(START));
        let ledger = SpendingLedger::with_clock(clock.clone());
        ledger.record("https://a.com", "/x", 100, "p1", true);
        clock.advance(Duration::from_millis(HOUR_MS));
        ledger.record("https://a.com", "/x", 10, "p2", true);

        assert_eq!(ledger.spent_last_hour(), 10);
        assert_eq!(ledger.spent_last_day(), 110);

        clock.advance(Duration::from_millis(DAY_MS));
        assert_eq!(ledger.spent_last_day(), 0);
        assert_eq!(ledger.total_spent(), 110);
    }

    #[test]
    fn test_records_is_a_copy() {
        let ledger = SpendingLedger::with_clock(Arc::new(ManualClock::new(START)));
        let returned = ledger.record("https://a.com", "/x", 100, "p1", true);

        let mut records = ledger.records();
        assert_eq!(records, vec![returned]);
        records.clear();
        records.push(PaymentAttempt {
            origin: "forged".to_string(),
            path: "/".to_string(),
            amount: 1_000_000,
            proof: String::new(),
            timestamp_ms: 0,
            succeeded: true,
        });

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total_spent(), 100);
    }

    #[test]
    fn test_serialize() {
        let ledger = SpendingLedger::with_clock(Arc::new(ManualClock::new(START)));
        assert_eq!(ledger.serialize(), "[]");

        ledger.record("https://a.com", "/x", 100, "p1", true);
        ledger.record("https://a.com", "/x", 7, "", false);

        let value: serde_json::Value = serde_json::from_str(&ledger.serialize()).unwrap();
        assert_eq!(
            value,
            json!([
                {
                    "origin": "https://a.com",
                    "path": "/x",
                    "amount": 100,
                    "proof": "p1",
                    "timestampMs": START,
                    "succeeded": true
                },
                {
                    "origin": "https://a.com",
                    "path": "/x",
                    "amount": 7,
                    "proof": "",
                    "timestampMs": START,
                    "succeeded": false
                }
            ])
        );
    }
}
