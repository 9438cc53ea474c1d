//! Bounded confidence score calculator.
//!
//! The three conviction inputs are combined through `tanh`, so the core term
//! stays in `(-1, 1)` no matter how large the inputs grow. The remaining
//! weighting factors scale that term, and the result is clamped to
//! `[0, 1]`. A resonance-band bonus is applied last and re-clamped.

use serde::{Deserialize, Serialize};

/// Fixed scale applied after the weighting factors.
pub const SCORE_SCALE: f64 = 0.1;

/// Inputs to [`compute`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub alignment_index: f64,
    pub coherence_factor: f64,
    pub harmonic_quotient: f64,
    pub intensity: f64,
    pub belief: f64,
    pub trust: f64,
    /// Reference frequency in Hz, matched against resonance bands.
    pub reference_hz: f64,
}

impl Default for ScoreInputs {
    fn default() -> Self {
        Self {
            alignment_index: 1.0,
            coherence_factor: 1.0,
            harmonic_quotient: 1.0,
            intensity: 1.0,
            belief: 1.0,
            trust: 1.0,
            reference_hz: 0.0,
        }
    }
}

/// A frequency band that earns a multiplicative bonus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResonanceBand {
    pub center_hz: f64,
    pub tolerance_hz: f64,
    /// Multiplier applied on a match, e.g. `1.15` for +15%.
    pub multiplier: f64,
}

impl ResonanceBand {
    pub const fn new(center_hz: f64, tolerance_hz: f64, multiplier: f64) -> Self {
        Self {
            center_hz,
            tolerance_hz,
            multiplier,
        }
    }

    /// Whether `hz` falls inside this band. Non-finite frequencies never match.
    pub fn contains(&self, hz: f64) -> bool {
        hz.is_finite() && (hz - self.center_hz).abs() <= self.tolerance_hz
    }
}

/// Primary band: +15%.
pub const PRIMARY_BAND: ResonanceBand = ResonanceBand::new(432.0, 0.5, 1.15);
/// Secondary band: +8%.
pub const SECONDARY_BAND: ResonanceBand = ResonanceBand::new(528.0, 0.5, 1.08);

/// The two default resonance bands, primary first.
pub fn default_bands() -> Vec<ResonanceBand> {
    vec![PRIMARY_BAND, SECONDARY_BAND]
}

/// Saturating base score, before any resonance bonus. Always in `[0, 1]`.
pub fn base_score(inputs: &ScoreInputs) -> f64 {
    let conviction = (inputs.alignment_index * inputs.belief * inputs.trust).tanh();
    let raw = conviction
        * inputs.coherence_factor
        * inputs.harmonic_quotient
        * inputs.intensity
        * SCORE_SCALE;
    clamp_finite(raw)
}

/// Multiply by the first matching band's bonus and re-clamp.
///
/// `score` is expected to be clamped already; the final clamp keeps the
/// result in `[0, 1]` either way.
pub fn apply_resonance_bonus(score: f64, reference_hz: f64, bands: &[ResonanceBand]) -> f64 {
    match bands.iter().find(|band| band.contains(reference_hz)) {
        Some(band) => clamp_finite(score * band.multiplier),
        None => clamp_finite(score),
    }
}

/// Bounded score with the default resonance bands.
pub fn compute(inputs: &ScoreInputs) -> f64 {
    compute_with_bands(inputs, &[PRIMARY_BAND, SECONDARY_BAND])
}

/// Bounded score with an explicit band table.
pub fn compute_with_bands(inputs: &ScoreInputs, bands: &[ResonanceBand]) -> f64 {
    apply_resonance_bonus(base_score(inputs), inputs.reference_hz, bands)
}

fn clamp_finite(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
