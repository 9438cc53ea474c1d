//! Atomic counters for Vigil observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a loop run).
//!
//! Each catalog/dispatcher pair shares one `Arc<Metrics>`; there is no
//! global instance, so tests stay isolated.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lightweight atomic counters without locking.
#[derive(Debug, Default)]
pub struct Metrics {
    sweeps_run: AtomicU64,
    checks_contained: AtomicU64,
    repairs_attempted: AtomicU64,
    repairs_succeeded: AtomicU64,
    timeouts: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            sweeps_run: AtomicU64::new(0),
            checks_contained: AtomicU64::new(0),
            repairs_attempted: AtomicU64::new(0),
            repairs_succeeded: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    /// Increment the sweeps counter by one.
    pub fn inc_sweeps(&self) {
        self.sweeps_run.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "sweeps_run", "counter incremented");
    }

    /// A check failed and was degraded to `Critical`.
    pub fn inc_checks_contained(&self) {
        self.checks_contained.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "checks_contained", "counter incremented");
    }

    /// Record a dispatched repair and whether it succeeded.
    pub fn record_repair(&self, succeeded: bool) {
        self.repairs_attempted.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            self.repairs_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        tracing::trace!(metric = "repairs", succeeded, "counter incremented");
    }

    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "timeouts", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a loop run, CLI exit)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            sweeps_run = self.sweeps_run(),
            checks_contained = self.checks_contained(),
            repairs_attempted = self.repairs_attempted(),
            repairs_succeeded = self.repairs_succeeded(),
            timeouts = self.timeouts(),
        );
    }

    pub fn sweeps_run(&self) -> u64 {
        self.sweeps_run.load(Ordering::Relaxed)
    }

    pub fn checks_contained(&self) -> u64 {
        self.checks_contained.load(Ordering::Relaxed)
    }

    pub fn repairs_attempted(&self) -> u64 {
        self.repairs_attempted.load(Ordering::Relaxed)
    }

    pub fn repairs_succeeded(&self) -> u64 {
        self.repairs_succeeded.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.sweeps_run.store(0, Ordering::Relaxed);
        self.checks_contained.store(0, Ordering::Relaxed);
        self.repairs_attempted.store(0, Ordering::Relaxed);
        self.repairs_succeeded.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.sweeps_run(), 0);
        m.inc_sweeps();
        m.inc_sweeps();
        assert_eq!(m.sweeps_run(), 2);

        m.record_repair(true);
        m.record_repair(false);
        m.record_repair(true);
        assert_eq!(m.repairs_attempted(), 3);
        assert_eq!(m.repairs_succeeded(), 2);

        m.inc_checks_contained();
        m.inc_timeouts();
        assert_eq!(m.checks_contained(), 1);
        assert_eq!(m.timeouts(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_sweeps();
        m.record_repair(true);
        m.inc_checks_contained();
        m.inc_timeouts();
        m.reset();
        assert_eq!(m.sweeps_run(), 0);
        assert_eq!(m.repairs_attempted(), 0);
        assert_eq!(m.repairs_succeeded(), 0);
        assert_eq!(m.checks_contained(), 0);
        assert_eq!(m.timeouts(), 0);
    }
}
