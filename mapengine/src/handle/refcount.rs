//! Atomic reference count with a closing flag.

use super::HandleError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

const CLOSING: u64 = 1 << 63;
const COUNT_MASK: u64 = CLOSING - 1;

/// Reference count packed with a `closing` flag in one atomic word.
///
/// Every transition is a compare-and-swap on the whole word, so the decision
/// "count is zero, start closing" and any racing `try_acquire` can never both
/// succeed: whichever CAS lands first wins and the other observes its effect.
pub struct RefCount {
    label: String,
    state: AtomicU64,
}

impl RefCount {
    /// Creates an unreferenced, open count.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: AtomicU64::new(0),
        }
    }

    /// Label used in error messages.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Increments the count and returns the new value.
    ///
    /// Fails with [`HandleError::Closing`] once [`try_begin_close`](Self::try_begin_close)
    /// has succeeded.
    pub fn try_acquire(&self) -> Result<usize, HandleError> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & CLOSING != 0 {
                return Err(HandleError::Closing(self.label.clone()));
            }
            let next = current + 1;
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok((next & COUNT_MASK) as usize),
                Err(observed) => current = observed,
            }
        }
    }

    /// Decrements the count and returns the remaining value.
    ///
    /// A release at zero leaves the count untouched and returns
    /// [`HandleError::ReferenceUnderflow`].
    pub fn release(&self) -> Result<usize, HandleError> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & COUNT_MASK == 0 {
                return Err(HandleError::ReferenceUnderflow(self.label.clone()));
            }
            let next = current - 1;
            match self.state.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok((next & COUNT_MASK) as usize),
                Err(observed) => current = observed,
            }
        }
    }

    /// Marks the object as closing if, and only if, it is unreferenced.
    ///
    /// Returns `true` when this call won the transition
    /// `{count: 0, closing: false}` → `{count: 0, closing: true}`.
    pub fn try_begin_close(&self) -> bool {
        self.state
            .compare_exchange(0, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current count.
    pub fn count(&self) -> usize {
        (self.state.load(Ordering::Acquire) & COUNT_MASK) as usize
    }

    /// Whether the count is zero.
    pub fn is_unreferenced(&self) -> bool {
        self.count() == 0
    }

    /// Whether a close has begun.
    pub fn is_closing(&self) -> bool {
        self.state.load(Ordering::Acquire) & CLOSING != 0
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCount")
            .field("label", &self.label)
            .field("count", &self.count())
            .field("closing", &self.is_closing())
            .finish()
    }
}
