//! Per-module mutable state with single-writer handles.
//!
//! Checks receive a [`StateReader`], which can only snapshot state. Each
//! repair routine receives a [`StateWriter`] bound to exactly one module, so
//! the only code able to mutate a module's state is that module's repair.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Mutable fields consumed by checks and written by repairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    /// Connectivity flag.
    pub connected: bool,
    /// Calibration level in `[0, 1]`.
    pub calibration: f64,
    /// Tuned reference frequency in Hz.
    pub reference_hz: f64,
}

impl Default for ModuleState {
    fn default() -> Self {
        Self {
            connected: true,
            calibration: 1.0,
            reference_hz: crate::score::PRIMARY_BAND.center_hz,
        }
    }
}

type StateMap = HashMap<String, ModuleState>;

/// Shared store for every module's state.
#[derive(Debug, Clone, Default)]
pub struct ModuleStateStore {
    inner: Arc<Mutex<StateMap>>,
}

impl ModuleStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a module's state. Intended for setup and fault
    /// injection, before the module's repair routine takes ownership.
    pub fn seed(&self, module: impl Into<String>, state: ModuleState) {
        self.lock().insert(module.into(), state);
    }

    /// Read-only handle for checks.
    pub fn reader(&self) -> StateReader {
        StateReader {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Write handle scoped to a single module.
    pub fn writer(&self, module: impl Into<String>) -> StateWriter {
        StateWriter {
            module: module.into(),
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn snapshot(&self, module: &str) -> Option<ModuleState> {
        self.lock().get(module).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StateMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only view of the store.
#[derive(Debug, Clone)]
pub struct StateReader {
    inner: Arc<Mutex<StateMap>>,
}

impl StateReader {
    pub fn snapshot(&self, module: &str) -> Option<ModuleState> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module)
            .cloned()
    }
}

/// Write handle for one module's state.
#[derive(Debug, Clone)]
pub struct StateWriter {
    module: String,
    inner: Arc<Mutex<StateMap>>,
}

impl StateWriter {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn snapshot(&self) -> Option<ModuleState> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.module)
            .cloned()
    }

    /// Apply `f` to the module's state, creating a default entry if absent.
    /// Returns whatever `f` returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut ModuleState) -> R) -> R {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let state = map.entry(self.module.clone()).or_default();
        f(state)
    }
}
