//! Cooperative task primitives: cancellation and progress reporting.
//!
//! Long-running engine operations (index build, search, save) run as tokio
//! tasks that check a shared cancel flag at their yield points and report
//! progress through a caller-supplied sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag raised by the owner to stop a long-running operation.
///
/// Clones observe the same flag. Cancellation is cooperative: the running
/// task notices the flag at its next yield point and unwinds with
/// `EngineError::Cancelled` after resetting any partial state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns whether the flag has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Receiver for integer percentage progress ticks.
///
/// The sink is invoked only from within the reporting task, so it does not
/// need to be thread-safe.
pub trait ProgressSink {
    /// Reports progress as a percentage in `0..=100`.
    fn report(&mut self, percent: u32);
}

impl<F: FnMut(u32)> ProgressSink for F {
    fn report(&mut self, percent: u32) {
        self(percent)
    }
}

/// Forwards to an optional sink, deduplicating repeated percentages so
/// callers see each value at most once per change.
pub(crate) struct Progress<'a> {
    sink: Option<&'a mut dyn ProgressSink>,
    last: Option<u32>,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(sink: Option<&'a mut dyn ProgressSink>) -> Self {
        Self { sink, last: None }
    }

    pub(crate) fn report(&mut self, percent: u32) {
        let percent = percent.min(100);
        if self.last == Some(percent) {
            return;
        }
        self.last = Some(percent);
        if let Some(sink) = self.sink.as_mut() {
            sink.report(percent);
        }
    }
}
