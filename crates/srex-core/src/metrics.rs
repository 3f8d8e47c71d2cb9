//! Process-wide atomic counters.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::recovery::RecoveryStrategy;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters: no allocations, no locking.
pub struct Metrics {
    stages_executed: AtomicU64,
    retries_issued: AtomicU64,
    recovered_direct: AtomicU64,
    recovered_brace_balanced: AtomicU64,
    recovered_sanitized: AtomicU64,
    recovered_fragment_rebuilt: AtomicU64,
    recovered_default_synthesized: AtomicU64,
    validation_failures: AtomicU64,
    transport_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            stages_executed: AtomicU64::new(0),
            retries_issued: AtomicU64::new(0),
            recovered_direct: AtomicU64::new(0),
            recovered_brace_balanced: AtomicU64::new(0),
            recovered_sanitized: AtomicU64::new(0),
            recovered_fragment_rebuilt: AtomicU64::new(0),
            recovered_default_synthesized: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_stages(&self) {
        self.stages_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "stages_executed", "counter incremented");
    }

    pub fn inc_retries(&self) {
        self.retries_issued.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "retries_issued", "counter incremented");
    }

    /// Count one recovery under `strategy`.
    pub fn inc_recovery(&self, strategy: RecoveryStrategy) {
        self.recovery_counter(strategy).fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "recovery", strategy = strategy.as_str(), "counter incremented");
    }

    pub fn inc_validation_failures(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "validation_failures", "counter incremented");
    }

    pub fn inc_transport_failures(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "transport_failures", "counter incremented");
    }

    fn recovery_counter(&self, strategy: RecoveryStrategy) -> &AtomicU64 {
        match strategy {
            RecoveryStrategy::Direct => &self.recovered_direct,
            RecoveryStrategy::BraceBalanced => &self.recovered_brace_balanced,
            RecoveryStrategy::Sanitized => &self.recovered_sanitized,
            RecoveryStrategy::FragmentRebuilt => &self.recovered_fragment_rebuilt,
            RecoveryStrategy::DefaultSynthesized => &self.recovered_default_synthesized,
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            stages_executed = self.stages_executed(),
            retries_issued = self.retries_issued(),
            recovered_direct = self.recoveries(RecoveryStrategy::Direct),
            recovered_brace_balanced = self.recoveries(RecoveryStrategy::BraceBalanced),
            recovered_sanitized = self.recoveries(RecoveryStrategy::Sanitized),
            recovered_fragment_rebuilt = self.recoveries(RecoveryStrategy::FragmentRebuilt),
            recovered_default_synthesized = self.recoveries(RecoveryStrategy::DefaultSynthesized),
            validation_failures = self.validation_failures(),
            transport_failures = self.transport_failures(),
        );
    }

    pub fn stages_executed(&self) -> u64 {
        self.stages_executed.load(Ordering::Relaxed)
    }

    pub fn retries_issued(&self) -> u64 {
        self.retries_issued.load(Ordering::Relaxed)
    }

    pub fn recoveries(&self, strategy: RecoveryStrategy) -> u64 {
        self.recovery_counter(strategy).load(Ordering::Relaxed)
    }

    pub fn validation_failures(&self) -> u64 {
        self.validation_failures.load(Ordering::Relaxed)
    }

    pub fn transport_failures(&self) -> u64 {
        self.transport_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.stages_executed,
            &self.retries_issued,
            &self.recovered_direct,
            &self.recovered_brace_balanced,
            &self.recovered_sanitized,
            &self.recovered_fragment_rebuilt,
            &self.recovered_default_synthesized,
            &self.validation_failures,
            &self.transport_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_stages();
        m.inc_stages();
        assert_eq!(m.stages_executed(), 2);

        m.inc_recovery(RecoveryStrategy::Sanitized);
        m.inc_recovery(RecoveryStrategy::Sanitized);
        m.inc_recovery(RecoveryStrategy::Direct);
        assert_eq!(m.recoveries(RecoveryStrategy::Sanitized), 2);
        assert_eq!(m.recoveries(RecoveryStrategy::Direct), 1);
        assert_eq!(m.recoveries(RecoveryStrategy::FragmentRebuilt), 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_retries();
        m.inc_validation_failures();
        m.inc_transport_failures();
        m.inc_recovery(RecoveryStrategy::DefaultSynthesized);
        m.reset();
        assert_eq!(m.retries_issued(), 0);
        assert_eq!(m.validation_failures(), 0);
        assert_eq!(m.transport_failures(), 0);
        assert_eq!(m.recoveries(RecoveryStrategy::DefaultSynthesized), 0);
    }
}
