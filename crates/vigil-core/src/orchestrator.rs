//! Repair orchestration loop.
//!
//! State machine: `Idle → Running → {Converged, Cancelled, CapReached}`.
//!
//! Each iteration runs one diagnostic sweep, repairs every unhealthy module in
//! the order the sweep returned them, then waits a fixed backoff. The loop
//! stops when a sweep comes back all-`Optimal`, when the iteration cap is hit,
//! or at the first iteration boundary after [`RepairLoop::stop`]. A repair
//! failure is counted and never aborts the loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::catalog::ModuleCatalog;
use crate::config::LoopConfig;
use crate::dispatcher::RepairDispatcher;
use crate::domain::{DiagnosticResult, Status};
use crate::notify::{Notification, NotificationSink, NullSink, Severity};
use crate::obs;

/// Lifecycle phase of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Idle,
    Running,
    Converged,
    Cancelled,
    CapReached,
}

impl LoopPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoopPhase::Converged | LoopPhase::Cancelled | LoopPhase::CapReached
        )
    }
}

/// How a run ended. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopOutcome {
    /// Every module reported `Optimal` in one sweep.
    Converged,
    /// `stop()` took effect at an iteration boundary.
    Cancelled,
    /// The iteration cap was reached first; partial success.
    CapReached,
}

impl LoopOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopOutcome::Converged => "converged",
            LoopOutcome::Cancelled => "cancelled",
            LoopOutcome::CapReached => "cap_reached",
        }
    }
}

impl fmt::Display for LoopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LoopOutcome> for LoopPhase {
    fn from(outcome: LoopOutcome) -> Self {
        match outcome {
            LoopOutcome::Converged => LoopPhase::Converged,
            LoopOutcome::Cancelled => LoopPhase::Cancelled,
            LoopOutcome::CapReached => LoopPhase::CapReached,
        }
    }
}

/// Counters owned by the loop controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoopState {
    pub iteration: u32,
    pub max_iterations: u32,
    pub active: bool,
    pub attempted: u32,
    pub succeeded: u32,
}

/// Final account of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopReport {
    pub run_id: Uuid,
    pub outcome: LoopOutcome,
    pub iterations: u32,
    pub attempted: u32,
    pub succeeded: u32,
    /// Modules that were not `Optimal` in the last sweep.
    pub unhealthy: Vec<String>,
    /// Results of the last sweep.
    pub final_results: Vec<DiagnosticResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoopReport {
    /// `succeeded / attempted`, or 1.0 when nothing was attempted.
    pub fn success_ratio(&self) -> f64 {
        if self.attempted == 0 {
            1.0
        } else {
            f64::from(self.succeeded) / f64::from(self.attempted)
        }
    }

    pub fn summary(&self) -> String {
        match self.outcome {
            LoopOutcome::Converged => format!(
                "all modules optimal after {} iteration(s); {}/{} repairs succeeded",
                self.iterations, self.succeeded, self.attempted
            ),
            LoopOutcome::CapReached => format!(
                "safety cap of {} iteration(s) reached; {}/{} repairs succeeded; still unhealthy: {}",
                self.iterations,
                self.succeeded,
                self.attempted,
                self.unhealthy.join(", ")
            ),
            LoopOutcome::Cancelled => format!(
                "cancelled after {} iteration(s); {}/{} repairs succeeded",
                self.iterations, self.succeeded, self.attempted
            ),
        }
    }
}

/// Result of [`RepairLoop::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActive,
}

#[derive(Debug)]
struct Control {
    phase: LoopPhase,
    state: LoopState,
    /// Run that currently owns the `Running` phase.
    run_id: Option<Uuid>,
}

struct Shared {
    control: Mutex<Control>,
    cancel: AtomicBool,
    wake: Notify,
    task: Mutex<Option<JoinHandle<LoopReport>>>,
    last_report: Mutex<Option<LoopReport>>,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_state<R>(&self, f: impl FnOnce(&mut LoopState) -> R) -> R {
        f(&mut self.control().state)
    }
}

/// Owns the `Running` phase of one run.
///
/// Moved into the drive future, so dropping that future (a timeout around
/// `run()`, a losing `select!` arm, an aborted task) still releases the
/// loop as `Cancelled`. [`RunGuard::complete`] hands over to `finish`.
struct RunGuard {
    shared: Arc<Shared>,
    run_id: Uuid,
    armed: bool,
}

impl RunGuard {
    fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut control = self.shared.control();
        if control.run_id != Some(self.run_id) {
            return;
        }
        warn!(run_id = %self.run_id, "Repair loop dropped before finishing");
        control.phase = LoopPhase::Cancelled;
        control.state.active = false;
        control.run_id = None;
    }
}

/// The top-level repair controller.
///
/// Cheap to clone; clones share the same lifecycle.
#[derive(Clone)]
pub struct RepairLoop {
    catalog: Arc<ModuleCatalog>,
    dispatcher: RepairDispatcher,
    sink: Arc<dyn NotificationSink>,
    config: LoopConfig,
    shared: Arc<Shared>,
}

impl fmt::Debug for RepairLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepairLoop")
            .field("modules", &self.catalog.names())
            .field("config", &self.config)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl RepairLoop {
    pub fn new(catalog: Arc<ModuleCatalog>, config: LoopConfig) -> Self {
        let dispatcher =
            RepairDispatcher::new(Arc::clone(&catalog)).with_repair_timeout(config.repair_timeout());
        Self {
            catalog,
            dispatcher,
            sink: Arc::new(NullSink),
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    phase: LoopPhase::Idle,
                    state: LoopState {
                        max_iterations: config.max_iterations,
                        ..LoopState::default()
                    },
                    run_id: None,
                }),
                cancel: AtomicBool::new(false),
                wake: Notify::new(),
                task: Mutex::new(None),
                last_report: Mutex::new(None),
            }),
            config,
        }
    }

    /// Route progress notifications to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.catalog
    }

    pub fn dispatcher(&self) -> &RepairDispatcher {
        &self.dispatcher
    }

    /// Spawn the loop on the current tokio runtime.
    ///
    /// A no-op reporting [`StartOutcome::AlreadyActive`] while a run is in
    /// progress.
    pub fn start(&self) -> StartOutcome {
        let Some(guard) = self.begin() else {
            info!("Repair loop already active");
            self.sink.notify(Notification::new(
                "Repair loop already active",
                format!("iteration {} in progress", self.current_iteration()),
                Severity::Info,
            ));
            return StartOutcome::AlreadyActive;
        };

        let span = obs::loop_span(&guard.run_id.to_string());
        let handle = tokio::spawn(self.clone().drive(guard).instrument(span));
        *self
            .shared
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        StartOutcome::Started
    }

    /// Drive a run to completion on the caller's task.
    ///
    /// Returns `None` if a run is already active. Dropping the returned
    /// future before it completes leaves the loop `Cancelled`.
    pub async fn run(&self) -> Option<LoopReport> {
        let guard = self.begin()?;
        let span = obs::loop_span(&guard.run_id.to_string());
        Some(self.clone().drive(guard).instrument(span).await)
    }

    /// Wait for the spawned run to finish. Without a spawned run, returns the
    /// last finished report, if any.
    pub async fn wait(&self) -> Option<LoopReport> {
        let handle = self
            .shared
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => match handle.await {
                Ok(report) => Some(report),
                Err(err) => {
                    error!(error = %err, "Repair loop task ended abnormally");
                    let mut control = self.shared.control();
                    if control.phase == LoopPhase::Running {
                        control.phase = LoopPhase::Cancelled;
                        control.state.active = false;
                    }
                    None
                }
            },
            None => self.last_report(),
        }
    }

    /// Request cooperative cancellation.
    ///
    /// Takes effect at the next iteration boundary; an in-flight check or
    /// repair always finishes. A stop that lands during the final
    /// iteration's repairs is overtaken by the cap, and the run ends
    /// `CapReached`. Returns `false` if no run is active.
    pub fn stop(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.shared.cancel.store(true, Ordering::SeqCst);
        self.shared.wake.notify_waiters();
        debug!("Stop requested");
        true
    }

    pub fn is_running(&self) -> bool {
        self.phase() == LoopPhase::Running
    }

    pub fn current_iteration(&self) -> u32 {
        self.shared.control().state.iteration
    }

    pub fn phase(&self) -> LoopPhase {
        self.shared.control().phase
    }

    pub fn state(&self) -> LoopState {
        self.shared.control().state
    }

    pub fn last_report(&self) -> Option<LoopReport> {
        self.shared
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Transition to `Running` and reset counters, unless already running.
    fn begin(&self) -> Option<RunGuard> {
        let mut control = self.shared.control();
        if control.phase == LoopPhase::Running {
            return None;
        }
        control.phase = LoopPhase::Running;
        control.state = LoopState {
            iteration: 0,
            max_iterations: self.config.max_iterations,
            active: true,
            attempted: 0,
            succeeded: 0,
        };
        let run_id = Uuid::new_v4();
        control.run_id = Some(run_id);
        self.shared.cancel.store(false, Ordering::SeqCst);
        Some(RunGuard {
            shared: Arc::clone(&self.shared),
            run_id,
            armed: true,
        })
    }

    async fn drive(self, guard: RunGuard) -> LoopReport {
        let run_id = guard.run_id;
        let started_at = Utc::now();
        let max_iterations = self.config.max_iterations;
        obs::emit_loop_started(&run_id.to_string(), self.catalog.len(), max_iterations);
        self.sink.notify(Notification::new(
            "Repair loop started",
            format!(
                "sweeping {} module(s), at most {} iteration(s)",
                self.catalog.len(),
                max_iterations
            ),
            Severity::Info,
        ));

        let mut last_sweep: Vec<DiagnosticResult> = Vec::new();
        let outcome = loop {
            if self.shared.cancel.load(Ordering::SeqCst) {
                break LoopOutcome::Cancelled;
            }
            if self.current_iteration() >= max_iterations {
                break LoopOutcome::CapReached;
            }

            let results = self.catalog.run_all().await;
            let unhealthy: Vec<(String, Status)> = results
                .iter()
                .filter(|r| !r.is_healthy())
                .map(|r| (r.module_name.clone(), r.status))
                .collect();
            obs::emit_sweep_completed(self.current_iteration(), results.len(), unhealthy.len());
            last_sweep = results;

            if unhealthy.is_empty() {
                break LoopOutcome::Converged;
            }

            for (module, status) in &unhealthy {
                let succeeded = self.dispatcher.repair(module).await;
                self.shared.update_state(|s| {
                    s.attempted += 1;
                    if succeeded {
                        s.succeeded += 1;
                    }
                });
                obs::emit_repair_dispatched(module, *status, succeeded);
                if !succeeded {
                    self.sink.notify(Notification::new(
                        format!("Repair failed: {module}"),
                        format!("{module} is {status}; will retry next iteration"),
                        Severity::Warning,
                    ));
                }
            }

            let iteration = self.shared.update_state(|s| {
                s.iteration += 1;
                s.iteration
            });
            if iteration >= max_iterations {
                break LoopOutcome::CapReached;
            }
            self.backoff().await;
        };

        let report = self.finish(run_id, outcome, started_at, last_sweep);
        guard.complete();
        report
    }

    /// Wait the backoff interval, waking early on `stop()`.
    async fn backoff(&self) {
        let delay = self.config.backoff();
        if delay.is_zero() {
            return;
        }
        let notified = self.shared.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.shared.cancel.load(Ordering::SeqCst) {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = &mut notified => debug!("Backoff cut short by stop request"),
        }
    }

    fn finish(
        &self,
        run_id: Uuid,
        outcome: LoopOutcome,
        started_at: DateTime<Utc>,
        last_sweep: Vec<DiagnosticResult>,
    ) -> LoopReport {
        let state = self.state();
        let unhealthy: Vec<String> = last_sweep
            .iter()
            .filter(|r| !r.is_healthy())
            .map(|r| r.module_name.clone())
            .collect();
        let report = LoopReport {
            run_id,
            outcome,
            iterations: state.iteration,
            attempted: state.attempted,
            succeeded: state.succeeded,
            unhealthy,
            final_results: last_sweep,
            started_at,
            finished_at: Utc::now(),
        };

        obs::emit_loop_finished(
            &run_id.to_string(),
            outcome.as_str(),
            report.iterations,
            report.attempted,
            report.succeeded,
        );
        let severity = match outcome {
            LoopOutcome::Converged => Severity::Success,
            LoopOutcome::CapReached => Severity::Warning,
            LoopOutcome::Cancelled => Severity::Info,
        };
        let title = match outcome {
            LoopOutcome::Converged => "System converged",
            LoopOutcome::CapReached => "Repair safety cap reached",
            LoopOutcome::Cancelled => "Repair loop cancelled",
        };
        self.sink
            .notify(Notification::new(title, report.summary(), severity));
        self.catalog.metrics().flush();

        *self
            .shared
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        {
            let mut control = self.shared.control();
            control.phase = outcome.into();
            control.state.active = false;
            control.run_id = None;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Reading, Result};
    use crate::notify::RecordingSink;
    use crate::provider::{HealthProvider, ModuleEntry, RepairRoutine};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Reports `Critical` until `repairs_needed` repairs have been applied.
    struct Countdown {
        remaining: Arc<AtomicU32>,
    }

    #[async_trait]
    impl HealthProvider for Countdown {
        async fn check(&self, _module: &str) -> Result<Reading> {
            let score = if self.remaining.load(Ordering::SeqCst) == 0 {
                100.0
            } else {
                10.0
            };
            Ok(Reading::new(score, 1.0, "countdown"))
        }
    }

    #[async_trait]
    impl RepairRoutine for Countdown {
        async fn repair(&self, _module: &str) -> Result<bool> {
            let _ = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            Ok(true)
        }
    }

    fn countdown_loop(repairs_needed: u32, config: LoopConfig) -> RepairLoop {
        let provider = Arc::new(Countdown {
            remaining: Arc::new(AtomicU32::new(repairs_needed)),
        });
        let mut catalog = ModuleCatalog::default();
        catalog
            .register_module(ModuleEntry::new("countdown", provider.clone(), provider))
            .expect("register");
        RepairLoop::new(Arc::new(catalog), config)
    }

    fn fast() -> LoopConfig {
        LoopConfig {
            backoff_ms: 10,
            ..LoopConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_phase_is_idle() {
        let repair_loop = countdown_loop(0, fast());
        assert_eq!(repair_loop.phase(), LoopPhase::Idle);
        assert!(!repair_loop.is_running());
        assert_eq!(repair_loop.current_iteration(), 0);
        assert!(!repair_loop.stop());
        assert!(repair_loop.wait().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_healthy_converges_without_repairs() {
        let repair_loop = countdown_loop(0, fast());
        let report = repair_loop.run().await.expect("fresh loop");
        assert_eq!(report.outcome, LoopOutcome::Converged);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.attempted, 0);
        assert_eq!(report.success_ratio(), 1.0);
        assert_eq!(repair_loop.phase(), LoopPhase::Converged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_iteration_convergence_counts() {
        let repair_loop = countdown_loop(3, fast());
        let report = repair_loop.run().await.expect("fresh loop");
        assert_eq!(report.outcome, LoopOutcome::Converged);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 3);
        assert!(report.unhealthy.is_empty());
        assert_eq!(repair_loop.state().iteration, 3);
        assert!(!repair_loop.state().active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_reports_already_active() {
        let sink = Arc::new(RecordingSink::new());
        let repair_loop = countdown_loop(5, fast()).with_sink(sink.clone());
        assert_eq!(repair_loop.start(), StartOutcome::Started);
        assert_eq!(repair_loop.start(), StartOutcome::AlreadyActive);
        assert!(repair_loop.is_running());

        let report = repair_loop.wait().await.expect("report");
        assert_eq!(report.outcome, LoopOutcome::Converged);
        assert!(sink
            .notifications()
            .iter()
            .any(|n| n.title == "Repair loop already active"));
        assert_eq!(repair_loop.last_report(), Some(report));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_state() {
        let repair_loop = countdown_loop(2, fast());
        let first = repair_loop.run().await.expect("first run");
        assert_eq!(first.iterations, 2);

        let second = repair_loop.run().await.expect("second run");
        assert_eq!(second.outcome, LoopOutcome::Converged);
        assert_eq!(second.iterations, 0);
        assert_eq!(second.attempted, 0);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_backoff_cancels_at_boundary() {
        let config = LoopConfig {
            backoff_ms: 60_000,
            ..LoopConfig::default()
        };
        let repair_loop = countdown_loop(5, config);
        repair_loop.start();

        // Let the first sweep and repair run; the loop then parks in backoff.
        while repair_loop.current_iteration() < 1 {
            tokio::task::yield_now().await;
        }
        assert!(repair_loop.stop());

        let report = repair_loop.wait().await.expect("report");
        assert_eq!(report.outcome, LoopOutcome::Cancelled);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.unhealthy, vec!["countdown".to_string()]);
        assert!(!repair_loop.is_running());
        assert_eq!(repair_loop.phase(), LoopPhase::Cancelled);
    }

    #[test]
    fn test_report_summary_mentions_unhealthy() {
        let report = LoopReport {
            run_id: Uuid::new_v4(),
            outcome: LoopOutcome::CapReached,
            iterations: 10,
            attempted: 10,
            succeeded: 4,
            unhealthy: vec!["phase-lock".to_string()],
            final_results: Vec::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        assert!(report.summary().contains("phase-lock"));
        assert!((report.success_ratio() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_phase_terminality() {
        assert!(!LoopPhase::Idle.is_terminal());
        assert!(!LoopPhase::Running.is_terminal());
        assert!(LoopPhase::Converged.is_terminal());
        assert_eq!(LoopPhase::from(LoopOutcome::CapReached), LoopPhase::CapReached);
    }
}
