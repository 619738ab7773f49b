//! Handle liveness
//!
//! A store and every result set derived from it share one [`HandleState`].
//! Closing the store flips the flag once; every later call through any of
//! those handles fails with [`Error::Closed`].

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared open/closed flag
#[derive(Debug, Clone, Default)]
pub struct HandleState {
    closed: Arc<AtomicBool>,
}

impl HandleState {
    /// New open handle
    pub fn new() -> Self {
        Self::default()
    }

    /// True once closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mark closed; returns `true` only for the call that performed the transition
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// `Err(Closed)` if the handle was released
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}
