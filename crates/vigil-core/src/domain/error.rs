//! Domain-level error taxonomy for Vigil.
//!
//! Most failure modes in the repair path never surface as errors: checks
//! degrade to a `Critical` result and repairs degrade to `false`. The
//! variants below cover registration, configuration, and the inner
//! `Result` a provider or routine hands back before it is contained.

/// Vigil domain errors.
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("module already registered: {0}")]
    DuplicateModule(String),

    #[error("check failed for module {module}: {reason}")]
    CheckFailed { module: String, reason: String },

    #[error("repair failed for module {module}: {reason}")]
    RepairFailed { module: String, reason: String },

    #[error("{operation} for module {module} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        module: String,
        timeout_ms: u64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VigilError {
    /// Shorthand used by providers that want to fail a check with a message.
    pub fn check_failed(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CheckFailed {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand used by repair routines.
    pub fn repair_failed(module: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RepairFailed {
            module: module.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for Vigil domain operations.
pub type Result<T> = std::result::Result<T, VigilError>;
