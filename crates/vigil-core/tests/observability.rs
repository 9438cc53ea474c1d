//! Observability tests for the repair loop lifecycle.
//!
//! These tests verify that structured tracing events are emitted for loop
//! start, sweeps, repair dispatch, loop finish, and contained check failures.

use std::sync::Arc;

use async_trait::async_trait;
use tracing_test::traced_test;
use vigil_core::{
    emit_check_contained, emit_loop_finished, emit_loop_started, emit_repair_dispatched,
    emit_sweep_completed, HealthProvider, LoopConfig, ModuleCatalog, ModuleEntry, Reading,
    RepairLoop, RepairRoutine, Result, Status, VigilError,
};

#[traced_test]
#[test]
fn test_emit_loop_started_logs_run_id() {
    emit_loop_started("run-123", 4, 10);
    assert!(logs_contain("loop.started"));
    assert!(logs_contain("run-123"));
}

#[traced_test]
#[test]
fn test_emit_sweep_completed_logs_counts() {
    emit_sweep_completed(2, 4, 1);
    assert!(logs_contain("sweep.completed"));
    assert!(logs_contain("unhealthy=1"));
}

#[traced_test]
#[test]
fn test_emit_repair_dispatched_logs_module_and_status() {
    emit_repair_dispatched("calibration", Status::Unstable, false);
    assert!(logs_contain("repair.dispatched"));
    assert!(logs_contain("calibration"));
}

#[traced_test]
#[test]
fn test_emit_loop_finished_logs_outcome() {
    emit_loop_finished("run-456", "cap_reached", 10, 10, 3);
    assert!(logs_contain("loop.finished"));
    assert!(logs_contain("cap_reached"));
}

#[traced_test]
#[test]
fn test_emit_check_contained_logs_error() {
    let err = VigilError::check_failed("core-link", "socket closed");
    emit_check_contained("core-link", &err);
    assert!(logs_contain("check.contained"));
    assert!(logs_contain("socket closed"));
}

struct Broken;

#[async_trait]
impl HealthProvider for Broken {
    async fn check(&self, module: &str) -> Result<Reading> {
        Err(VigilError::check_failed(module, "sensor offline"))
    }
}

#[async_trait]
impl RepairRoutine for Broken {
    async fn repair(&self, _module: &str) -> Result<bool> {
        Ok(false)
    }
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_loop_run_emits_lifecycle_events() {
    let mut catalog = ModuleCatalog::default();
    catalog
        .register_module(ModuleEntry::new("broken", Arc::new(Broken), Arc::new(Broken)))
        .expect("register");
    let config = LoopConfig {
        max_iterations: 2,
        backoff_ms: 5,
        ..LoopConfig::default()
    };
    let repair_loop = RepairLoop::new(Arc::new(catalog), config);
    let report = repair_loop.run().await.expect("fresh loop");

    assert!(logs_contain("loop.started"));
    assert!(logs_contain("check.contained"));
    assert!(logs_contain("sensor offline"));
    assert!(logs_contain("repair.dispatched"));
    assert!(logs_contain("loop.finished"));
    assert!(logs_contain(&report.run_id.to_string()));
}
