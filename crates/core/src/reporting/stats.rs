//! Counters describing what the reporting pipeline did with each event

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters, one per pipeline outcome
#[derive(Debug, Default)]
pub struct ReportingStats {
    accepted: AtomicU64,
    skipped_no_key: AtomicU64,
    skipped_disabled: AtomicU64,
    sampled_out: AtomicU64,
    dropped_circuit_open: AtomicU64,
    dropped_capacity: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`ReportingStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportingStatsSnapshot {
    /// Events handed to the transport
    pub accepted: u64,
    pub skipped_no_key: u64,
    pub skipped_disabled: u64,
    pub sampled_out: u64,
    pub dropped_circuit_open: u64,
    /// Events dropped because the in-flight cap was reached
    pub dropped_capacity: u64,
    /// Deliveries answered with 2xx
    pub delivered: u64,
    /// Deliveries that failed for any reason
    pub failed: u64,
}

impl ReportingStatsSnapshot {
    /// Accepted deliveries that have not completed yet
    pub fn pending(&self) -> u64 {
        self.accepted.saturating_sub(self.delivered + self.failed)
    }
}

impl ReportingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_no_key(&self) {
        self.skipped_no_key.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_disabled(&self) {
        self.skipped_disabled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sampled_out(&self) {
        self.sampled_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_circuit_open(&self) {
        self.dropped_circuit_open.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_capacity(&self) {
        self.dropped_capacity.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReportingStatsSnapshot {
        ReportingStatsSnapshot {
            accepted: self.accepted.load(Ordering::Acquire),
            skipped_no_key: self.skipped_no_key.load(Ordering::Acquire),
            skipped_disabled: self.skipped_disabled.load(Ordering::Acquire),
            sampled_out: self.sampled_out.load(Ordering::Acquire),
            dropped_circuit_open: self.dropped_circuit_open.load(Ordering::Acquire),
            dropped_capacity: self.dropped_capacity.load(Ordering::Acquire),
            delivered: self.delivered.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.accepted,
            &self.skipped_no_key,
            &self.skipped_disabled,
            &self.sampled_out,
            &self.dropped_circuit_open,
            &self.dropped_capacity,
            &self.delivered,
            &self.failed,
        ] {
            counter.store(0, Ordering::Release);
        }
    }
}
