//! Simulation metrics.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use serde::Serialize;

/// Simulation metrics.
#[derive(Debug, Clone)]
pub struct SimulationMetrics {
    /// Transactions submitted.
    pub total_transactions: u64,
    /// Transactions mined.
    pub accepted: u64,
    /// Rejected transactions by error code.
    pub reverted: BTreeMap<String, u64>,
    /// Latency samples (µs).
    latency_samples: VecDeque<u64>,
    /// Maximum samples to keep.
    max_samples: usize,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            total_transactions: 0,
            accepted: 0,
            reverted: BTreeMap::new(),
            latency_samples: VecDeque::with_capacity(10000),
            max_samples: 10000,
        }
    }

    /// Record a mined transaction.
    pub fn record_success(&mut self, latency: Duration) {
        self.total_transactions += 1;
        self.accepted += 1;
        self.record_latency(latency);
    }

    /// Record a rejected transaction.
    pub fn record_revert(&mut self, code: &str, latency: Duration) {
        self.total_transactions += 1;
        *self.reverted.entry(code.to_string()).or_insert(0) += 1;
        self.record_latency(latency);
    }

    fn record_latency(&mut self, latency: Duration) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples
            .push_back(u64::try_from(latency.as_micros()).unwrap_or(u64::MAX));
    }

    /// Total rejected transactions.
    pub fn total_reverted(&self) -> u64 {
        self.reverted.values().sum()
    }

    /// Get average latency in µs.
    pub fn average_latency_us(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    /// Get p50 latency.
    pub fn p50_latency_us(&self) -> u64 {
        self.percentile_latency(50)
    }

    /// Get p99 latency.
    pub fn p99_latency_us(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_transactions == 0 {
            return 0.0;
        }

        self.accepted as f64 / self.total_transactions as f64
    }

    /// Summary suitable for logging or JSON output.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_transactions: self.total_transactions,
            accepted: self.accepted,
            reverted: self.reverted.clone(),
            success_rate: self.success_rate(),
            average_latency_us: self.average_latency_us(),
            p50_latency_us: self.p50_latency_us(),
            p99_latency_us: self.p99_latency_us(),
        }
    }
}

impl Default for SimulationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of [`SimulationMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub total_transactions: u64,
    pub accepted: u64,
    pub reverted: BTreeMap<String, u64>,
    pub success_rate: f64,
    pub average_latency_us: u64,
    pub p50_latency_us: u64,
    pub p99_latency_us: u64,
}
