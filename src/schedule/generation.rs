//! Generation counter used to cancel stale load work.
//!
//! Every reset of a mosaic (reload, resize, teardown) advances its counter.
//! Tasks carry the token of the generation they were scheduled under and
//! check it before touching the framebuffer or the cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonically increasing generation owned by one mosaic instance.
#[derive(Debug, Clone, Default)]
pub struct GenerationCounter {
    current: Arc<AtomicU64>,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every outstanding token.
    pub fn advance(&self) -> GenerationToken {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        GenerationToken {
            current: Arc::clone(&self.current),
            generation,
        }
    }

    /// Token for the current generation.
    pub fn token(&self) -> GenerationToken {
        GenerationToken {
            current: Arc::clone(&self.current),
            generation: self.current(),
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// Snapshot of a generation, cheap to clone into tasks.
#[derive(Debug, Clone)]
pub struct GenerationToken {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl GenerationToken {
    /// Whether no reset has happened since this token was issued.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
