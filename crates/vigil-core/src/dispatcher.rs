//! Repair dispatcher.
//!
//! Resolves a module name to its repair routine and runs it. Whatever the
//! routine does (returns `false`, errors, panics, overruns its timeout), the
//! dispatcher resolves to a plain `bool`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::catalog::ModuleCatalog;
use crate::guard::{run_guarded, Guarded};

/// Dispatches repairs against a shared catalog.
#[derive(Debug, Clone)]
pub struct RepairDispatcher {
    catalog: Arc<ModuleCatalog>,
    repair_timeout: Option<Duration>,
}

impl RepairDispatcher {
    pub fn new(catalog: Arc<ModuleCatalog>) -> Self {
        Self {
            catalog,
            repair_timeout: None,
        }
    }

    /// Bound each repair; an overrun counts as a failed attempt.
    pub fn with_repair_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.repair_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.catalog
    }

    /// Attempt one repair. Unknown modules resolve to `false`.
    pub async fn repair(&self, module: &str) -> bool {
        let Some(entry) = self.catalog.entry(module) else {
            warn!(module = %module, "Repair requested for unknown module");
            return false;
        };

        let succeeded = match run_guarded(entry.repair.repair(module), self.repair_timeout).await {
            Guarded::Completed(Ok(applied)) => applied,
            Guarded::Completed(Err(err)) => {
                warn!(module = %module, error = %err, "Repair routine failed");
                false
            }
            Guarded::Panicked(msg) => {
                warn!(module = %module, panic = %msg, "Repair routine panicked");
                false
            }
            Guarded::TimedOut(limit) => {
                self.catalog.metrics().inc_timeouts();
                warn!(
                    module = %module,
                    timeout_ms = limit.as_millis() as u64,
                    "Repair routine timed out"
                );
                false
            }
        };

        self.catalog.metrics().record_repair(succeeded);
        debug!(module = %module, succeeded, "Repair resolved");
        succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Reading, Result, VigilError};
    use crate::provider::{HealthProvider, ModuleEntry, RepairRoutine};
    use async_trait::async_trait;

    struct Healthy;

    #[async_trait]
    impl HealthProvider for Healthy {
        async fn check(&self, _module: &str) -> Result<Reading> {
            Ok(Reading::new(100.0, 1.0, "ok"))
        }
    }

    enum Behavior {
        Succeed,
        Decline,
        Error,
        Panic,
        Hang,
    }

    struct Scripted(Behavior);

    #[async_trait]
    impl RepairRoutine for Scripted {
        async fn repair(&self, module: &str) -> Result<bool> {
            match self.0 {
                Behavior::Succeed => Ok(true),
                Behavior::Decline => Ok(false),
                Behavior::Error => Err(VigilError::repair_failed(module, "actuator jammed")),
                Behavior::Panic => panic!("repair exploded"),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(true)
                }
            }
        }
    }

    fn dispatcher(behaviors: Vec<(&str, Behavior)>) -> RepairDispatcher {
        let mut catalog = ModuleCatalog::default();
        for (name, behavior) in behaviors {
            catalog
                .register_module(ModuleEntry::new(
                    name,
                    Arc::new(Healthy),
                    Arc::new(Scripted(behavior)),
                ))
                .expect("register");
        }
        RepairDispatcher::new(Arc::new(catalog))
    }

    #[tokio::test]
    async fn test_unknown_module_is_false() {
        let d = dispatcher(vec![]);
        assert!(!d.repair("nonexistent").await);
        assert_eq!(d.catalog().metrics().repairs_attempted(), 0);
    }

    #[tokio::test]
    async fn test_outcomes_map_to_bool() {
        let d = dispatcher(vec![
            ("ok", Behavior::Succeed),
            ("no", Behavior::Decline),
            ("err", Behavior::Error),
            ("boom", Behavior::Panic),
        ]);
        assert!(d.repair("ok").await);
        assert!(!d.repair("no").await);
        assert!(!d.repair("err").await);
        assert!(!d.repair("boom").await);

        let metrics = d.catalog().metrics();
        assert_eq!(metrics.repairs_attempted(), 4);
        assert_eq!(metrics.repairs_succeeded(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repair_timeout_is_false() {
        let d = dispatcher(vec![("stuck", Behavior::Hang)])
            .with_repair_timeout(Some(Duration::from_secs(5)));
        assert!(!d.repair("stuck").await);
        assert_eq!(d.catalog().metrics().timeouts(), 1);
    }
}
