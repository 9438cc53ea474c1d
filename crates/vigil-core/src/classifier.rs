//! Status classifier: continuous score to discrete [`Status`].

use serde::{Deserialize, Serialize};

use crate::domain::{Result, Status, VigilError, MAX_SCORE};

/// Ordered cut points. A score strictly above a cut point earns that status.
///
/// # Invariants
///
/// `optimal > stable > unstable`, all within `[0, 100]`. Construct through
/// [`StatusThresholds::new`] or call [`StatusThresholds::validate`] after
/// deserializing to enforce this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusThresholds {
    pub optimal: f64,
    pub stable: f64,
    pub unstable: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            optimal: 90.0,
            stable: 75.0,
            unstable: 50.0,
        }
    }
}

impl StatusThresholds {
    /// Create a validated threshold table.
    pub fn new(optimal: f64, stable: f64, unstable: f64) -> Result<Self> {
        let thresholds = Self {
            optimal,
            stable,
            unstable,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Reject tables that would break monotonicity.
    pub fn validate(&self) -> Result<()> {
        let cuts = [self.optimal, self.stable, self.unstable];
        if cuts.iter().any(|c| !c.is_finite() || *c < 0.0 || *c > MAX_SCORE) {
            return Err(VigilError::InvalidConfig(format!(
                "status thresholds must lie within [0, {MAX_SCORE}]: {cuts:?}"
            )));
        }
        if !(self.optimal > self.stable && self.stable > self.unstable) {
            return Err(VigilError::InvalidConfig(format!(
                "status thresholds must be strictly decreasing (optimal > stable > unstable): {cuts:?}"
            )));
        }
        Ok(())
    }

    /// Classify a score. NaN is `Critical`.
    pub fn classify(&self, score: f64) -> Status {
        if score > self.optimal {
            Status::Optimal
        } else if score > self.stable {
            Status::Stable
        } else if score > self.unstable {
            Status::Unstable
        } else {
            Status::Critical
        }
    }
}

/// Classify with the default table.
pub fn classify(score: f64) -> Status {
    StatusThresholds::default().classify(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cut_points() {
        assert_eq!(classify(100.0), Status::Optimal);
        assert_eq!(classify(90.5), Status::Optimal);
        assert_eq!(classify(90.0), Status::Stable);
        assert_eq!(classify(75.0), Status::Unstable);
        assert_eq!(classify(50.0), Status::Critical);
        assert_eq!(classify(0.0), Status::Critical);
    }

    #[test]
    fn test_total_over_odd_inputs() {
        assert_eq!(classify(f64::NAN), Status::Critical);
        assert_eq!(classify(f64::NEG_INFINITY), Status::Critical);
        assert_eq!(classify(f64::INFINITY), Status::Optimal);
        assert_eq!(classify(-12.0), Status::Critical);
    }

    #[test]
    fn test_alternate_table() {
        let thresholds = StatusThresholds::new(85.0, 70.0, 50.0).expect("valid");
        assert_eq!(thresholds.classify(86.0), Status::Optimal);
        assert_eq!(thresholds.classify(71.0), Status::Stable);
        assert_eq!(classify(86.0), Status::Stable);
    }

    #[test]
    fn test_validate_rejects_non_monotonic() {
        assert!(StatusThresholds::new(75.0, 90.0, 50.0).is_err());
        assert!(StatusThresholds::new(90.0, 90.0, 50.0).is_err());
        assert!(StatusThresholds::new(120.0, 75.0, 50.0).is_err());
        assert!(StatusThresholds::new(90.0, 75.0, f64::NAN).is_err());
    }

    #[test]
    fn test_thresholds_deserialize_with_defaults() {
        let parsed: StatusThresholds =
            serde_json::from_str(r#"{"optimal": 85.0}"#).expect("deserialize");
        assert_eq!(parsed.optimal, 85.0);
        assert_eq!(parsed.stable, 75.0);
        assert!(parsed.validate().is_ok());
    }
}
