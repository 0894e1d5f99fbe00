use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Liveness token shared between a store and whoever owns it.
///
/// Once aborted, a scope stays aborted. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortScope {
    aborted: Arc<AtomicBool>,
}

impl AbortScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        !self.aborted.load(Ordering::SeqCst)
    }
}
