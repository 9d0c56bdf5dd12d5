//! Cells shared between the tailing worker and the rest of the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Cooperative stop signal for the tailing worker.
///
/// Starts active. Once stopped it stays stopped.
#[derive(Debug, Clone)]
pub struct MonitorFlag(Arc<AtomicBool>);

impl MonitorFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for MonitorFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// The current API key, if one has been validated.
///
/// Read by the worker to decide whether live events may be uploaded and by
/// the delivery task to authorise requests. A poisoned lock is recovered
/// since the guarded value is a plain `Option<String>`.
#[derive(Debug, Clone, Default)]
pub struct CredentialCell(Arc<RwLock<Option<String>>>);

impl CredentialCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        let cell = Self::new();
        cell.set(key);
        cell
    }

    pub fn set(&self, key: impl Into<String>) {
        let mut guard = self.0.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(key.into());
    }

    pub fn clear(&self) {
        let mut guard = self.0.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    pub fn get(&self) -> Option<String> {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_present(&self) -> bool {
        self.0.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}
