//! Structured observability hooks for the repair loop lifecycle.
//!
//! This module provides:
//! - a loop-scoped span, attached to the drive future with
//!   `tracing::Instrument` so it survives across await points
//! - emission functions for key lifecycle events
//!
//! Events are emitted at `info!` level unless noted. For JSON output, run
//! the CLI with `--json`.

use tracing::{info, warn, Span};

use crate::domain::Status;

/// Span tagging every event of one loop run with its `run_id`.
pub fn loop_span(run_id: &str) -> Span {
    tracing::info_span!("vigil.loop", run_id = %run_id)
}

/// Emit event: loop started.
pub fn emit_loop_started(run_id: &str, modules: usize, max_iterations: u32) {
    info!(
        event = "loop.started",
        run_id = %run_id,
        modules = modules,
        max_iterations = max_iterations,
    );
}

/// Emit event: one diagnostic sweep finished.
pub fn emit_sweep_completed(iteration: u32, total: usize, unhealthy: usize) {
    info!(
        event = "sweep.completed",
        iteration = iteration,
        total = total,
        unhealthy = unhealthy,
    );
}

/// Emit event: a repair was dispatched and resolved.
pub fn emit_repair_dispatched(module: &str, status: Status, succeeded: bool) {
    info!(
        event = "repair.dispatched",
        module = %module,
        status = %status,
        succeeded = succeeded,
    );
}

/// Emit event: loop reached a terminal state.
pub fn emit_loop_finished(
    run_id: &str,
    outcome: &str,
    iterations: u32,
    attempted: u32,
    succeeded: u32,
) {
    info!(
        event = "loop.finished",
        run_id = %run_id,
        outcome = %outcome,
        iterations = iterations,
        attempted = attempted,
        succeeded = succeeded,
    );
}

/// Emit event: a check failure was contained as `Critical` (warning level).
pub fn emit_check_contained(module: &str, error: &dyn std::fmt::Display) {
    warn!(event = "check.contained", module = %module, error = %error);
}
