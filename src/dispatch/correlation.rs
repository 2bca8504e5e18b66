//! Correlation id allocation.
//!
//! # Responsibilities
//! - Hand out unique, non-zero, increasing request ids
//! - Stay safe to call from any thread, independent of pool state

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Identifies one logical request from `send` to its terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(NonZeroU64);

impl CorrelationId {
    /// Wrap a raw value. Zero is never a valid id.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id counter.
///
/// Relaxed ordering is sufficient since we only need uniqueness, not synchronization.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicU64,
}

impl IdSequence {
    /// A fresh sequence whose first id is 1.
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// The process-wide sequence used when no other is injected.
    pub fn shared() -> Arc<IdSequence> {
        static SHARED: OnceLock<Arc<IdSequence>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(IdSequence::new())).clone()
    }

    /// Allocate the next id. Skips zero on wrap-around.
    pub fn next_id(&self) -> CorrelationId {
        loop {
            let raw = self.next.fetch_add(1, Ordering::Relaxed);
            if let Some(id) = CorrelationId::from_raw(raw) {
                return id;
            }
        }
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}
