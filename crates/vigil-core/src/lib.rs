//! Vigil Core Library
//!
//! Diagnostic health checks and self-repair orchestration: a catalog of
//! named modules, a canonical status classifier, a repair dispatcher, and a
//! bounded repair loop that runs until every module is optimal, the
//! iteration cap is reached, or it is stopped.

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod domain;
mod guard;
pub mod metrics;
pub mod modules;
pub mod notify;
pub mod obs;
pub mod orchestrator;
pub mod provider;
pub mod score;
pub mod stability;
pub mod state;
pub mod telemetry;

pub use catalog::{partition_health, ModuleCatalog};
pub use classifier::{classify, StatusThresholds};
pub use config::{LoopConfig, VigilConfig};
pub use dispatcher::RepairDispatcher;
pub use domain::{DiagnosticResult, Reading, Result, Status, VigilError};
pub use metrics::Metrics;
pub use modules::{StandardModules, STANDARD_MODULES};
pub use notify::{Notification, NotificationSink, NullSink, RecordingSink, Severity, TracingSink};
pub use obs::{
    emit_check_contained, emit_loop_finished, emit_loop_started, emit_repair_dispatched,
    emit_sweep_completed, loop_span,
};
pub use orchestrator::{LoopOutcome, LoopPhase, LoopReport, LoopState, RepairLoop, StartOutcome};
pub use provider::{HealthProvider, ModuleEntry, RepairRoutine};
pub use score::{compute, compute_with_bands, ResonanceBand, ScoreInputs};
pub use stability::{
    compute_stability, Participant, StabilityGate, StabilityMetric, StabilityRegistry,
};
pub use state::{ModuleState, ModuleStateStore, StateReader, StateWriter};
pub use telemetry::init_tracing;

/// Vigil version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
