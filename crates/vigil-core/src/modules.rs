//! Built-in modules.
//!
//! Four standard modules measure real state instead of returning random
//! numbers:
//!
//! | module        | check reads                    | repair writes                 |
//! |---------------|--------------------------------|-------------------------------|
//! | `core-link`   | connectivity flag              | reconnects                    |
//! | `calibration` | calibration level              | steps calibration toward 1.0  |
//! | `resonance`   | bounded score of own state     | realigns and retunes to band  |
//! | `phase-lock`  | stability aggregate of cohort  | aligns cohort participants    |
//!
//! Randomness survives only in [`StandardModules::inject_faults`], a seeded
//! simulation aid.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::catalog::ModuleCatalog;
use crate::classifier::StatusThresholds;
use crate::config::VigilConfig;
use crate::domain::{Reading, Result, Status, VigilError, MAX_SCORE};
use crate::metrics::Metrics;
use crate::provider::{HealthProvider, ModuleEntry, RepairRoutine};
use crate::score::{apply_resonance_bonus, base_score, ResonanceBand, ScoreInputs};
use crate::stability::{Participant, StabilityGate, StabilityRegistry, MAX_STABILITY};
use crate::state::{ModuleState, ModuleStateStore, StateReader, StateWriter};

pub const CORE_LINK: &str = "core-link";
pub const CALIBRATION: &str = "calibration";
pub const RESONANCE: &str = "resonance";
pub const PHASE_LOCK: &str = "phase-lock";

/// Standard modules in registration order.
pub const STANDARD_MODULES: [&str; 4] = [CORE_LINK, CALIBRATION, RESONANCE, PHASE_LOCK];

/// Clearance the phase-lock repair raises cohort members to.
pub const ALIGNED_CLEARANCE: f64 = 3.0;

/// Registry handle shared between the phase-lock check and repair.
pub type SharedRegistry = Arc<RwLock<StabilityRegistry>>;

fn missing_state(module: &str) -> VigilError {
    VigilError::check_failed(module, "no state recorded")
}

// ---------------------------------------------------------------------------
// core-link
// ---------------------------------------------------------------------------

pub struct LinkProbe {
    reader: StateReader,
}

#[async_trait]
impl HealthProvider for LinkProbe {
    async fn check(&self, module: &str) -> Result<Reading> {
        let state = self
            .reader
            .snapshot(module)
            .ok_or_else(|| missing_state(module))?;
        if state.connected {
            Ok(Reading::new(MAX_SCORE, 0.95, "link established"))
        } else {
            Ok(Reading::new(0.0, 0.95, "link down").with_hint("re-establish the link"))
        }
    }
}

pub struct LinkRepair {
    writer: StateWriter,
}

#[async_trait]
impl RepairRoutine for LinkRepair {
    async fn repair(&self, _module: &str) -> Result<bool> {
        let reconnected = self.writer.update(|s| {
            let was_down = !s.connected;
            s.connected = true;
            was_down
        });
        if reconnected {
            debug!(module = %self.writer.module(), "Link re-established");
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// calibration
// ---------------------------------------------------------------------------

pub struct CalibrationProbe {
    reader: StateReader,
}

#[async_trait]
impl HealthProvider for CalibrationProbe {
    async fn check(&self, module: &str) -> Result<Reading> {
        let state = self
            .reader
            .snapshot(module)
            .ok_or_else(|| missing_state(module))?;
        let score = state.calibration * MAX_SCORE;
        let reading = Reading::new(
            score,
            0.9,
            format!("calibration at {:.1}%", score.clamp(0.0, MAX_SCORE)),
        );
        if state.calibration < 1.0 {
            Ok(reading.with_hint("recalibrate toward full scale"))
        } else {
            Ok(reading)
        }
    }
}

pub struct CalibrationRepair {
    writer: StateWriter,
    step: f64,
    thresholds: StatusThresholds,
}

#[async_trait]
impl RepairRoutine for CalibrationRepair {
    async fn repair(&self, _module: &str) -> Result<bool> {
        let (before, after) = self.writer.update(|s| {
            let before = if s.calibration.is_finite() {
                s.calibration.clamp(0.0, 1.0)
            } else {
                0.0
            };
            if self.thresholds.classify(before * MAX_SCORE) == Status::Optimal {
                return (before, before);
            }
            s.calibration = (before + self.step).min(1.0);
            (before, s.calibration)
        });
        debug!(before, after, "Calibration stepped");
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// resonance
// ---------------------------------------------------------------------------

/// Weighting and band table for the resonance module.
#[derive(Debug, Clone, PartialEq)]
pub struct ResonanceTuning {
    pub weights: ScoreInputs,
    pub bands: Vec<ResonanceBand>,
}

impl ResonanceTuning {
    /// Weights under which a fully aligned module tuned to the primary band
    /// scores Optimal, and drifts off-band drop it to Stable.
    pub fn standard(bands: Vec<ResonanceBand>) -> Self {
        Self {
            weights: ScoreInputs {
                alignment_index: 1.0,
                coherence_factor: 1.0,
                harmonic_quotient: 1.0,
                intensity: 8.5,
                belief: 1.5,
                trust: 1.5,
                reference_hz: 0.0,
            },
            bands,
        }
    }

    fn inputs(&self, state: &ModuleState) -> ScoreInputs {
        ScoreInputs {
            alignment_index: state.calibration,
            reference_hz: state.reference_hz,
            ..self.weights
        }
    }

    /// `(score in 0–100, confidence)` for a state. Offline scores zero.
    pub fn evaluate(&self, state: &ModuleState) -> (f64, f64) {
        if !state.connected {
            return (0.0, 0.0);
        }
        let inputs = self.inputs(state);
        let base = base_score(&inputs);
        let bonused = apply_resonance_bonus(base, inputs.reference_hz, &self.bands);
        (bonused * MAX_SCORE, base)
    }

    fn in_band(&self, hz: f64) -> bool {
        self.bands.iter().any(|b| b.contains(hz))
    }
}

pub struct ResonanceProbe {
    reader: StateReader,
    tuning: Arc<ResonanceTuning>,
}

#[async_trait]
impl HealthProvider for ResonanceProbe {
    async fn check(&self, module: &str) -> Result<Reading> {
        let state = self
            .reader
            .snapshot(module)
            .ok_or_else(|| missing_state(module))?;
        let (score, confidence) = self.tuning.evaluate(&state);
        if !state.connected {
            return Ok(Reading::new(score, confidence, "resonator offline")
                .with_hint("bring the resonator online"));
        }
        let mut reading = Reading::new(
            score,
            confidence,
            format!(
                "reference {:.1} Hz, alignment {:.2}",
                state.reference_hz, state.calibration
            ),
        );
        if !self.tuning.in_band(state.reference_hz) {
            if let Some(band) = self.tuning.bands.first() {
                reading = reading.with_hint(format!("retune reference to {} Hz", band.center_hz));
            }
        }
        if state.calibration < 1.0 {
            reading = reading.with_hint("realign resonator");
        }
        Ok(reading)
    }
}

pub struct ResonanceRepair {
    writer: StateWriter,
    tuning: Arc<ResonanceTuning>,
    thresholds: StatusThresholds,
}

#[async_trait]
impl RepairRoutine for ResonanceRepair {
    async fn repair(&self, _module: &str) -> Result<bool> {
        self.writer.update(|s| {
            let (score, _) = self.tuning.evaluate(s);
            if self.thresholds.classify(score) == Status::Optimal {
                return;
            }
            s.connected = true;
            s.calibration = 1.0;
            if let Some(band) = self.tuning.bands.first() {
                s.reference_hz = band.center_hz;
            }
        });
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// phase-lock
// ---------------------------------------------------------------------------

pub struct PhaseLockProbe {
    registry: SharedRegistry,
    gate: StabilityGate,
}

#[async_trait]
impl HealthProvider for PhaseLockProbe {
    async fn check(&self, _module: &str) -> Result<Reading> {
        let (metric, missing) = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            (registry.metric(), registry.missing())
        };
        let permitted = self.gate.permits(&metric);
        let mut reading = Reading::new(
            metric.value / MAX_STABILITY * MAX_SCORE,
            if permitted { 0.95 } else { 0.6 },
            format!(
                "stability {:.3}, boost {:.3}, gate {}",
                metric.value,
                metric.boost,
                if permitted { "open" } else { "closed" }
            ),
        );
        for name in &missing {
            reading = reading.with_hint(format!("cohort member {name} is absent"));
        }
        if missing.is_empty() && metric.value < MAX_STABILITY {
            reading = reading.with_hint("align cohort clearance and reach");
        }
        Ok(reading)
    }
}

pub struct PhaseLockRepair {
    registry: SharedRegistry,
    thresholds: StatusThresholds,
}

#[async_trait]
impl RepairRoutine for PhaseLockRepair {
    async fn repair(&self, module: &str) -> Result<bool> {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let missing = registry.missing();
        if !missing.is_empty() {
            warn!(module = %module, missing = ?missing, "Cannot phase-lock an incomplete cohort");
            return Ok(false);
        }
        let score = registry.metric().value / MAX_STABILITY * MAX_SCORE;
        if self.thresholds.classify(score) == Status::Optimal {
            return Ok(true);
        }
        let cohort = registry.cohort().to_vec();
        for name in &cohort {
            if let Some(p) = registry.get_mut(name) {
                p.reach = 1.0;
                if p.clearance.is_nan() || p.clearance < ALIGNED_CLEARANCE {
                    p.clearance = ALIGNED_CLEARANCE;
                }
            }
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// State and registry backing the standard modules.
///
/// Construct once and hand the pieces to the catalog; tests get a fresh
/// instance each.
#[derive(Debug, Clone)]
pub struct StandardModules {
    pub state: ModuleStateStore,
    pub registry: SharedRegistry,
}

impl StandardModules {
    /// Healthy initial state for every standard module and an aligned cohort.
    pub fn new(config: &VigilConfig) -> Result<Self> {
        let state = ModuleStateStore::new();
        for name in STANDARD_MODULES {
            state.seed(name, ModuleState::default());
        }
        if let Some(band) = config.resonance.bands.first() {
            state
                .writer(RESONANCE)
                .update(|s| s.reference_hz = band.center_hz);
        }

        let mut registry = StabilityRegistry::from_names(&config.stability.cohort)?;
        for name in config.stability.cohort.clone() {
            registry.upsert(Participant::new(name, ALIGNED_CLEARANCE, 1.0));
        }

        Ok(Self {
            state,
            registry: Arc::new(RwLock::new(registry)),
        })
    }

    /// Build a catalog with the four standard modules.
    pub fn catalog(&self, config: &VigilConfig, metrics: Arc<Metrics>) -> Result<ModuleCatalog> {
        let thresholds = config.thresholds;
        let tuning = Arc::new(ResonanceTuning::standard(config.resonance.bands.clone()));
        let reader = self.state.reader();

        let mut catalog = ModuleCatalog::new(thresholds)
            .with_check_timeout(config.repair_loop.check_timeout())
            .with_metrics(metrics);

        catalog.register_module(ModuleEntry::new(
            CORE_LINK,
            Arc::new(LinkProbe {
                reader: reader.clone(),
            }),
            Arc::new(LinkRepair {
                writer: self.state.writer(CORE_LINK),
            }),
        ))?;
        catalog.register_module(ModuleEntry::new(
            CALIBRATION,
            Arc::new(CalibrationProbe {
                reader: reader.clone(),
            }),
            Arc::new(CalibrationRepair {
                writer: self.state.writer(CALIBRATION),
                step: config.modules.calibration_step,
                thresholds,
            }),
        ))?;
        catalog.register_module(ModuleEntry::new(
            RESONANCE,
            Arc::new(ResonanceProbe {
                reader,
                tuning: Arc::clone(&tuning),
            }),
            Arc::new(ResonanceRepair {
                writer: self.state.writer(RESONANCE),
                tuning,
                thresholds,
            }),
        ))?;
        catalog.register_module(ModuleEntry::new(
            PHASE_LOCK,
            Arc::new(PhaseLockProbe {
                registry: Arc::clone(&self.registry),
                gate: config.stability.gate(),
            }),
            Arc::new(PhaseLockRepair {
                registry: Arc::clone(&self.registry),
                thresholds,
            }),
        ))?;

        Ok(catalog)
    }

    /// Drive every standard module to `Critical`.
    pub fn degrade_all(&self) {
        self.state.writer(CORE_LINK).update(|s| s.connected = false);
        self.state.writer(CALIBRATION).update(|s| s.calibration = 0.0);
        self.state.writer(RESONANCE).update(|s| s.connected = false);
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        for name in registry.cohort().to_vec() {
            if let Some(p) = registry.get_mut(&name) {
                p.reach = 0.0;
            }
        }
    }

    /// Apply seeded random faults and return the modules that were touched.
    pub fn inject_faults(&self, seed: u64) -> Vec<&'static str> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut touched = Vec::new();

        if rng.gen_bool(0.5) {
            self.state.writer(CORE_LINK).update(|s| s.connected = false);
            touched.push(CORE_LINK);
        }
        if rng.gen_bool(0.7) {
            let level = rng.gen_range(0.05..0.85);
            self.state
                .writer(CALIBRATION)
                .update(|s| s.calibration = level);
            touched.push(CALIBRATION);
        }
        if rng.gen_bool(0.6) {
            let hz = rng.gen_range(300.0..420.0);
            let alignment = rng.gen_range(0.3..0.95);
            self.state.writer(RESONANCE).update(|s| {
                s.reference_hz = hz;
                s.calibration = alignment;
            });
            touched.push(RESONANCE);
        }
        if rng.gen_bool(0.5) {
            let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
            for name in registry.cohort().to_vec() {
                let reach = rng.gen_range(0.1..0.6);
                if let Some(p) = registry.get_mut(&name) {
                    p.reach = reach;
                }
            }
            touched.push(PHASE_LOCK);
        }

        debug!(seed, touched = ?touched, "Injected faults");
        touched
    }
}
