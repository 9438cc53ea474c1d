//! Module diagnostic catalog.
//!
//! Owns the registered [`ModuleEntry`] list and runs diagnostic sweeps.
//! Checks run one at a time in registration order so successive sweeps are
//! comparable and no two checks overlap a repair. Every check failure is
//! contained here and turned into a `Critical` result.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::classifier::StatusThresholds;
use crate::domain::{DiagnosticResult, Result, VigilError};
use crate::guard::{run_guarded, Guarded};
use crate::metrics::Metrics;
use crate::obs;
use crate::provider::ModuleEntry;

/// Registry of modules plus the canonical classifier.
#[derive(Debug)]
pub struct ModuleCatalog {
    entries: Vec<ModuleEntry>,
    thresholds: StatusThresholds,
    check_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self::new(StatusThresholds::default())
    }
}

impl ModuleCatalog {
    pub fn new(thresholds: StatusThresholds) -> Self {
        Self {
            entries: Vec::new(),
            thresholds,
            check_timeout: None,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Bound each check; a check that overruns is reported `Critical`.
    pub fn with_check_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Share a metrics instance (usually with the dispatcher).
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn thresholds(&self) -> &StatusThresholds {
        &self.thresholds
    }

    /// Register a module. Names are unique.
    pub fn register_module(&mut self, entry: ModuleEntry) -> Result<()> {
        if self.contains(&entry.name) {
            return Err(VigilError::DuplicateModule(entry.name));
        }
        debug!(module = %entry.name, "Registered module");
        self.entries.push(entry);
        Ok(())
    }

    /// Module names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn entry(&self, name: &str) -> Option<&ModuleEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Check a single module by name.
    pub async fn check(&self, name: &str) -> Result<DiagnosticResult> {
        let entry = self
            .entry(name)
            .ok_or_else(|| VigilError::UnknownModule(name.to_string()))?;
        Ok(self.run_entry(entry).await)
    }

    /// One diagnostic sweep over every module, in registration order.
    pub async fn run_all(&self) -> Vec<DiagnosticResult> {
        let mut results = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            results.push(self.run_entry(entry).await);
        }
        self.metrics.inc_sweeps();
        results
    }

    async fn run_entry(&self, entry: &ModuleEntry) -> DiagnosticResult {
        let outcome = run_guarded(entry.check.check(&entry.name), self.check_timeout).await;
        let failure = match outcome {
            Guarded::Completed(Ok(reading)) => {
                return DiagnosticResult::from_reading(&entry.name, reading, |score| {
                    self.thresholds.classify(score)
                });
            }
            Guarded::Completed(Err(err)) => err,
            Guarded::Panicked(msg) => VigilError::check_failed(&entry.name, msg),
            Guarded::TimedOut(limit) => {
                self.metrics.inc_timeouts();
                VigilError::Timeout {
                    operation: "check",
                    module: entry.name.clone(),
                    timeout_ms: limit.as_millis() as u64,
                }
            }
        };

        self.metrics.inc_checks_contained();
        obs::emit_check_contained(&entry.name, &failure);
        DiagnosticResult::critical(&entry.name, format!("check failed: {failure}"))
    }
}

/// Split results into healthy (`Optimal`) and unhealthy, preserving order.
pub fn partition_health(
    results: &[DiagnosticResult],
) -> (Vec<&DiagnosticResult>, Vec<&DiagnosticResult>) {
    results.iter().partition(|r| r.is_healthy())
}
