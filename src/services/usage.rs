//! Usage accounting.

use std::collections::BTreeMap;

use serde::Serialize;

/// Confirmation returned by [`UsageRecorder::record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageAck {
    /// Operation the amount was booked against.
    pub operation: String,
    /// Running total for that operation.
    pub total: u64,
}

/// Totals per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    /// Amount booked per operation.
    pub operations: BTreeMap<String, u64>,
    /// Sum over all operations.
    pub total: u64,
}

/// Records how much work each operation did.
pub trait UsageRecorder {
    /// Adds `amount` to `operation`.
    fn record(&mut self, operation: &str, amount: u64) -> UsageAck;

    /// Current totals.
    fn summarize(&self) -> UsageTotals;
}

/// In-memory [`UsageRecorder`].
#[derive(Debug, Default)]
pub struct UsageLedger {
    counters: BTreeMap<String, u64>,
}

impl UsageLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageRecorder for UsageLedger {
    fn record(&mut self, operation: &str, amount: u64) -> UsageAck {
        let total = self.counters.entry(operation.to_string()).or_insert(0);
        *total = total.saturating_add(amount);
        UsageAck {
            operation: operation.to_string(),
            total: *total,
        }
    }

    fn summarize(&self) -> UsageTotals {
        UsageTotals {
            operations: self.counters.clone(),
            total: self.counters.values().fold(0, |acc, v| acc.saturating_add(*v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_per_operation() {
        let mut ledger = UsageLedger::new();
        assert_eq!(ledger.record("calls.list_directory", 1).total, 1);
        assert_eq!(ledger.record("calls.list_directory", 2).total, 3);
        ledger.record("entries", 40);

        let totals = ledger.summarize();
        assert_eq!(totals.operations["calls.list_directory"], 3);
        assert_eq!(totals.total, 43);
    }
}
