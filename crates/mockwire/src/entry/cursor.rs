//! Response cursor with sticky-last semantics.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Index into an entry's response sequence.
///
/// Advances by one on every answer and saturates on the last response, so an
/// entry with N responses answers `0, 1, .., N-1, N-1, N-1, ..`.
#[derive(Default)]
pub struct ResponseCursor(AtomicUsize);

fn clamp(index: usize, response_count: usize) -> usize {
    index.min(response_count.saturating_sub(1))
}

impl ResponseCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Current index without advancing
    #[must_use]
    pub fn peek(&self, response_count: usize) -> usize {
        clamp(self.0.load(Ordering::Relaxed), response_count)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    /// Returns the index to answer with and moves past it, unless it is the last one.
    #[must_use]
    pub fn advance(&self, response_count: usize) -> usize {
        if response_count == 0 {
            return 0;
        }
        let last = response_count - 1;
        let old = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(clamp(v, response_count).saturating_add(1).min(last))
            })
            .unwrap_or_else(|v| v);
        clamp(old, response_count)
    }
}

impl fmt::Debug for ResponseCursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("ResponseCursor")
            .field(&self.0.load(Ordering::Relaxed))
            .finish()
    }
}
