//! Discrete health status taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Health status of a module.
///
/// Variants are declared worst-first so the derived ordering reads
/// `Critical < Unstable < Stable < Optimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Critical,
    Unstable,
    Stable,
    Optimal,
}

impl Status {
    /// Only `Optimal` counts as healthy for convergence purposes.
    pub fn is_healthy(self) -> bool {
        self == Status::Optimal
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Critical => "critical",
            Status::Unstable => "unstable",
            Status::Stable => "stable",
            Status::Optimal => "optimal",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
