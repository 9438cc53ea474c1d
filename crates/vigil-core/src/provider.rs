//! Seams between the catalog and whatever measures or repairs a module.
//!
//! Implement [`HealthProvider`] to plug in a real measurement source and
//! [`RepairRoutine`] to plug in remediation. Neither the catalog nor the
//! loop needs to change when an implementation is swapped.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Reading, Result};

/// Produces a health reading for one module.
///
/// Implementations must only read module state. Returning `Err` (or
/// panicking) degrades the module to `Critical` for that sweep.
#[async_trait]
pub trait HealthProvider: Send + Sync {
    async fn check(&self, module: &str) -> Result<Reading>;
}

/// Attempts to repair one module.
///
/// `Ok(true)` means the repair applied (or nothing needed repairing);
/// `Ok(false)` and `Err` both count as a failed attempt.
#[async_trait]
pub trait RepairRoutine: Send + Sync {
    async fn repair(&self, module: &str) -> Result<bool>;
}

/// A named module: one check plus one repair.
#[derive(Clone)]
pub struct ModuleEntry {
    pub name: String,
    pub check: Arc<dyn HealthProvider>,
    pub repair: Arc<dyn RepairRoutine>,
}

impl ModuleEntry {
    pub fn new(
        name: impl Into<String>,
        check: Arc<dyn HealthProvider>,
        repair: Arc<dyn RepairRoutine>,
    ) -> Self {
        Self {
            name: name.into(),
            check,
            repair,
        }
    }
}

impl fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
