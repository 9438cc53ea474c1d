//! Domain models for Vigil.
//!
//! Canonical definitions for the core entities:
//! - `Status`: discrete health taxonomy
//! - `Reading`: raw measurement from a health provider
//! - `DiagnosticResult`: classified, immutable per-sweep snapshot

pub mod diagnostic;
pub mod error;
pub mod status;

// Re-export main types and errors
pub use diagnostic::{clamp_score, clamp_unit, DiagnosticResult, Reading, MAX_SCORE};
pub use error::{Result, VigilError};
pub use status::Status;
