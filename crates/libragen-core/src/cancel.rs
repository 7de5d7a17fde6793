//! Cooperative cancellation for long operations.
//!
//! Builds, downloads, batch embedding, and reranking all take a
//! [`CancelToken`] and poll it at batch boundaries. Cloning a token shares
//! the underlying flag, so a caller can hand one copy to an operation and
//! keep another to trigger the cancel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
