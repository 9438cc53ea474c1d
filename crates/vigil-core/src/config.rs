//! Vigil configuration.
//!
//! Every section is optional in TOML; missing fields fall back to their
//! defaults. Environment overrides are applied after parsing, then the whole
//! config is validated.
//!
//! ```toml
//! [loop]
//! max_iterations = 10
//! backoff_ms = 1000
//! repair_timeout_ms = 30000
//!
//! [thresholds]
//! optimal = 90.0
//! stable = 75.0
//! unstable = 50.0
//!
//! [stability]
//! cohort = ["helm", "ops", "science"]
//! gate_threshold = 0.5
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::StatusThresholds;
use crate::domain::{Result, VigilError};
use crate::score::{default_bands, ResonanceBand};
use crate::stability::{StabilityGate, COHORT_SIZE};

pub const ENV_MAX_ITERATIONS: &str = "VIGIL_MAX_ITERATIONS";
pub const ENV_BACKOFF_MS: &str = "VIGIL_BACKOFF_MS";
pub const ENV_REPAIR_TIMEOUT_MS: &str = "VIGIL_REPAIR_TIMEOUT_MS";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    #[serde(rename = "loop")]
    pub repair_loop: LoopConfig,
    pub thresholds: StatusThresholds,
    pub resonance: ResonanceConfig,
    pub stability: StabilityConfig,
    pub modules: ModulesConfig,
}

/// Repair loop bounds and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Safety cap on repair iterations.
    pub max_iterations: u32,
    /// Wait between iterations.
    pub backoff_ms: u64,
    /// Per-repair timeout; unset means repairs may run indefinitely.
    pub repair_timeout_ms: Option<u64>,
    /// Per-check timeout; unset means checks may run indefinitely.
    pub check_timeout_ms: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            backoff_ms: 1000,
            repair_timeout_ms: None,
            check_timeout_ms: None,
        }
    }
}

impl LoopConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn repair_timeout(&self) -> Option<Duration> {
        self.repair_timeout_ms.map(Duration::from_millis)
    }

    pub fn check_timeout(&self) -> Option<Duration> {
        self.check_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(VigilError::InvalidConfig(
                "loop.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.repair_timeout_ms == Some(0) || self.check_timeout_ms == Some(0) {
            return Err(VigilError::InvalidConfig(
                "timeouts must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resonance band table for the score calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResonanceConfig {
    pub bands: Vec<ResonanceBand>,
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            bands: default_bands(),
        }
    }
}

/// Stability cohort and gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub cohort: Vec<String>,
    pub gate_threshold: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            cohort: vec!["helm".to_string(), "ops".to_string(), "science".to_string()],
            gate_threshold: StabilityGate::default().threshold,
        }
    }
}

impl StabilityConfig {
    pub fn gate(&self) -> StabilityGate {
        StabilityGate::new(self.gate_threshold)
    }
}

/// Tuning for the standard modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// How far one calibration repair moves toward full calibration.
    pub calibration_step: f64,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            calibration_step: 0.35,
        }
    }
}

impl VigilConfig {
    /// Parse and validate a TOML document. Environment overrides are not
    /// applied.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, apply environment overrides, and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&text)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VIGIL_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup(ENV_MAX_ITERATIONS) {
            self.repair_loop.max_iterations = parse_env(ENV_MAX_ITERATIONS, &v)?;
        }
        if let Some(v) = lookup(ENV_BACKOFF_MS) {
            self.repair_loop.backoff_ms = parse_env(ENV_BACKOFF_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_REPAIR_TIMEOUT_MS) {
            self.repair_loop.repair_timeout_ms = Some(parse_env(ENV_REPAIR_TIMEOUT_MS, &v)?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.repair_loop.validate()?;
        self.thresholds.validate()?;
        if self.stability.cohort.len() != COHORT_SIZE {
            return Err(VigilError::InvalidConfig(format!(
                "stability.cohort must name exactly {COHORT_SIZE} participants, got {}",
                self.stability.cohort.len()
            )));
        }
        if !(0.0..=1.0).contains(&self.stability.gate_threshold) {
            return Err(VigilError::InvalidConfig(format!(
                "stability.gate_threshold must lie within [0, 1]: {}",
                self.stability.gate_threshold
            )));
        }
        if !(self.modules.calibration_step > 0.0 && self.modules.calibration_step <= 1.0) {
            return Err(VigilError::InvalidConfig(format!(
                "modules.calibration_step must lie within (0, 1]: {}",
                self.modules.calibration_step
            )));
        }
        for band in &self.resonance.bands {
            if !(band.multiplier.is_finite() && band.multiplier > 0.0)
                || !(band.tolerance_hz.is_finite() && band.tolerance_hz >= 0.0)
            {
                return Err(VigilError::InvalidConfig(format!(
                    "invalid resonance band: {band:?}"
                )));
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| VigilError::InvalidConfig(format!("{key} has invalid value {value:?}")))
}
