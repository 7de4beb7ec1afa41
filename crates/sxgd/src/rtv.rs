//! AMP runtime-version cache.
//!
//! The handler only reads; a refresher owns writes. Reads are lock-held
//! only long enough to clone the string, never across I/O.

use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct RtvCache {
    current: RwLock<String>,
}

impl RtvCache {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(initial.into()),
        }
    }

    /// The current runtime version, possibly empty before first refresh.
    pub fn current(&self) -> String {
        self.current
            .read()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn set(&self, rtv: impl Into<String>) {
        if let Ok(mut current) = self.current.write() {
            *current = rtv.into();
        }
    }
}
