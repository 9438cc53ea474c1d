//! Diagnostic readings and the immutable per-sweep results built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::Status;

/// Upper bound of the score scale.
pub const MAX_SCORE: f64 = 100.0;

/// Raw measurement produced by a health provider.
///
/// A reading carries no status; the catalog classifies it with the canonical
/// thresholds so status and score never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Score in 0–100 (clamped on conversion).
    pub score: f64,
    /// Confidence in 0.0–1.0 (clamped on conversion).
    pub confidence: f64,
    /// Human-readable explanation of the measurement.
    pub detail: String,
    /// Suggested remediation steps, empty when healthy.
    pub repair_hints: Vec<String>,
}

impl Reading {
    pub fn new(score: f64, confidence: f64, detail: impl Into<String>) -> Self {
        Self {
            score,
            confidence,
            detail: detail.into(),
            repair_hints: Vec::new(),
        }
    }

    /// Add a repair hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.repair_hints.push(hint.into());
        self
    }
}

/// Result of checking one module during one sweep.
///
/// # Invariants
///
/// `score` lies in `[0, 100]` and `confidence` in `[0, 1]` regardless of what
/// the provider reported; `status` is derived from `score`. Results are
/// snapshots: each sweep produces new values and nothing mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub module_name: String,
    pub status: Status,
    pub score: f64,
    pub confidence: f64,
    pub detail: String,
    pub repair_hints: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl DiagnosticResult {
    /// Build a result from a reading, clamping and classifying it.
    pub fn from_reading(
        module_name: impl Into<String>,
        reading: Reading,
        classify: impl Fn(f64) -> Status,
    ) -> Self {
        let score = clamp_score(reading.score);
        let confidence = clamp_unit(reading.confidence);
        Self {
            module_name: module_name.into(),
            status: classify(score),
            score,
            confidence,
            detail: reading.detail,
            repair_hints: reading.repair_hints,
            checked_at: Utc::now(),
        }
    }

    /// The degraded result used when a check cannot produce a reading.
    pub fn critical(module_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            status: Status::Critical,
            score: 0.0,
            confidence: 0.0,
            detail: detail.into(),
            repair_hints: Vec::new(),
            checked_at: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}

/// Clamp to `[0, 100]`; NaN maps to 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, MAX_SCORE)
    }
}

/// Clamp to `[0, 1]`; NaN maps to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
