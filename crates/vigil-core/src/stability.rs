//! Cross-participant stability aggregate and the gate built on it.
//!
//! The aggregate is only meaningful for the exact three-member cohort the
//! gating logic expects. Any partial or malformed cohort fails closed to the
//! zero metric.

use std::collections::{BTreeMap, HashSet};
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::domain::{Result, VigilError};

/// Number of participants the aggregate requires.
pub const COHORT_SIZE: usize = 3;

/// Upper bound on the aggregate value.
pub const MAX_STABILITY: f64 = 0.95;

/// Amplification applied to `value` to derive `boost`.
pub const BOOST_FACTOR: f64 = 2.18;

/// Golden ratio.
pub const PHI: f64 = 1.618_033_988_749_895;

/// A named member of the stability cohort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    /// Clearance level; negative values count as zero.
    pub clearance: f64,
    /// Reach in `[0, 1]`; out-of-range values are clamped.
    pub reach: f64,
}

impl Participant {
    pub fn new(name: impl Into<String>, clearance: f64, reach: f64) -> Self {
        Self {
            name: name.into(),
            clearance,
            reach,
        }
    }

    /// Phase angle in `[0, π/2)`. Non-finite inputs yield 0.
    pub fn phase_angle(&self) -> f64 {
        let clearance = if self.clearance.is_finite() {
            self.clearance.max(0.0)
        } else {
            0.0
        };
        let reach = if self.reach.is_finite() {
            self.reach.clamp(0.0, 1.0)
        } else {
            0.0
        };
        (clearance * reach).atan()
    }
}

/// Aggregate stability over the cohort.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StabilityMetric {
    /// In `[0, 0.95]`.
    pub value: f64,
    /// `value × 2.18`.
    pub boost: f64,
}

impl StabilityMetric {
    pub fn zero() -> Self {
        Self::default()
    }

    fn from_value(value: f64) -> Self {
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, MAX_STABILITY)
        };
        Self {
            value,
            boost: value * BOOST_FACTOR,
        }
    }
}

/// Compute the stability aggregate.
///
/// Requires exactly [`COHORT_SIZE`] participants with distinct names;
/// anything else returns [`StabilityMetric::zero`].
pub fn compute_stability(participants: &[Participant]) -> StabilityMetric {
    if participants.len() != COHORT_SIZE {
        return StabilityMetric::zero();
    }
    let distinct: HashSet<&str> = participants.iter().map(|p| p.name.as_str()).collect();
    if distinct.len() != COHORT_SIZE {
        return StabilityMetric::zero();
    }

    let product: f64 = participants.iter().map(Participant::phase_angle).product();
    StabilityMetric::from_value(product * PHI / PI)
}

/// Registry of stability participants, scoped to one fixed cohort.
///
/// Constructed explicitly and shared by handle; there is no process-wide
/// instance.
#[derive(Debug, Clone)]
pub struct StabilityRegistry {
    cohort: [String; COHORT_SIZE],
    participants: BTreeMap<String, Participant>,
}

impl StabilityRegistry {
    /// Create a registry for the given cohort names.
    pub fn new(cohort: [String; COHORT_SIZE]) -> Result<Self> {
        let distinct: HashSet<&str> = cohort.iter().map(String::as_str).collect();
        if distinct.len() != COHORT_SIZE || cohort.iter().any(|n| n.trim().is_empty()) {
            return Err(VigilError::InvalidConfig(format!(
                "stability cohort must name {COHORT_SIZE} distinct, non-empty participants"
            )));
        }
        Ok(Self {
            cohort,
            participants: BTreeMap::new(),
        })
    }

    /// Create a registry from a slice, validating its length.
    pub fn from_names(names: &[String]) -> Result<Self> {
        let cohort: [String; COHORT_SIZE] = names.to_vec().try_into().map_err(|v: Vec<String>| {
            VigilError::InvalidConfig(format!(
                "stability cohort needs exactly {COHORT_SIZE} names, got {}",
                v.len()
            ))
        })?;
        Self::new(cohort)
    }

    pub fn cohort(&self) -> &[String] {
        &self.cohort
    }

    /// Insert or replace a participant by name.
    pub fn upsert(&mut self, participant: Participant) {
        self.participants
            .insert(participant.name.clone(), participant);
    }

    pub fn remove(&mut self, name: &str) -> Option<Participant> {
        self.participants.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Participant> {
        self.participants.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Participant> {
        self.participants.get_mut(name)
    }

    /// Cohort members that are not registered.
    pub fn missing(&self) -> Vec<String> {
        self.cohort
            .iter()
            .filter(|name| !self.participants.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    /// Stability over the cohort; zero if any member is absent.
    pub fn metric(&self) -> StabilityMetric {
        let members: Option<Vec<Participant>> = self
            .cohort
            .iter()
            .map(|name| self.participants.get(name).cloned())
            .collect();
        match members {
            Some(members) => compute_stability(&members),
            None => StabilityMetric::zero(),
        }
    }
}

/// Gate for optional enhanced behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilityGate {
    pub threshold: f64,
}

impl Default for StabilityGate {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl StabilityGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Whether the metric clears the threshold.
    pub fn permits(&self, metric: &StabilityMetric) -> bool {
        metric.value >= self.threshold
    }
}
