//! Completion tracking for asynchronous batches
//!
//! A [`CompletionTracker`] is created for `expected` dispatched operations
//! and settles exactly once: with `Ok(())` after the last successful
//! completion, or with the first error reported. Completions may arrive in
//! any order and on any thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::{BenchError, Result};

/// Single-shot continuation run when the tracker settles
pub type Settle = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// What a call to [`CompletionTracker::notify_one`] did
#[derive(Debug)]
#[must_use = "a Violation notification reports a misbehaving client"]
pub enum Notification {
    /// Counted; more completions are outstanding
    Pending,
    /// This completion was the last one; the continuation fired with `Ok`
    Completed,
    /// This completion carried the first error; the continuation fired with it
    Aborted,
    /// The batch was already aborted; late completion dropped
    Ignored,
    /// More completions than dispatched operations
    Violation(BenchError),
}

/// Counts completions of a batch and fires one continuation
pub struct CompletionTracker {
    expected: usize,
    observed: AtomicUsize,
    notified: AtomicUsize,
    settled: AtomicBool,
    on_settled: Mutex<Option<Settle>>,
}

impl CompletionTracker {
    /// Create a tracker for `expected` operations.
    ///
    /// `expected` must be at least one; an empty batch would never settle.
    pub fn new(expected: usize, on_settled: Settle) -> Result<Self> {
        if expected == 0 {
            return Err(BenchError::Precondition(
                "completion tracker needs at least one operation".to_string(),
            ));
        }

        Ok(Self {
            expected,
            observed: AtomicUsize::new(0),
            notified: AtomicUsize::new(0),
            settled: AtomicBool::new(false),
            on_settled: Mutex::new(Some(on_settled)),
        })
    }

    /// Create a shared tracker whose outcome is delivered on a oneshot channel
    pub fn channel(expected: usize) -> Result<(Arc<Self>, oneshot::Receiver<Result<()>>)> {
        let (tx, rx) = oneshot::channel();
        let tracker = Self::new(
            expected,
            Box::new(move |outcome| {
                // Receiver gone means the stage stopped waiting (timeout)
                let _ = tx.send(outcome);
            }),
        )?;
        Ok((Arc::new(tracker), rx))
    }

    /// Record the outcome of one operation
    pub fn notify_one(&self, outcome: Result<()>) -> Notification {
        let notified = self.notified.fetch_add(1, Ordering::AcqRel) + 1;
        if notified > self.expected {
            error!(
                expected = self.expected,
                notified, "completion reported after every operation was accounted for"
            );
            return Notification::Violation(BenchError::ProtocolViolation {
                expected: self.expected,
                observed: notified,
            });
        }

        match outcome {
            Err(err) => {
                if self.settled.swap(true, Ordering::AcqRel) {
                    debug!(error = %err, "late failure after batch was aborted");
                    return Notification::Ignored;
                }
                self.fire(Err(err));
                Notification::Aborted
            }
            Ok(()) => {
                let observed = self.observed.fetch_add(1, Ordering::AcqRel) + 1;
                if observed < self.expected {
                    return if self.is_settled() {
                        Notification::Ignored
                    } else {
                        Notification::Pending
                    };
                }
                // observed == expected: every notification so far succeeded
                if self.settled.swap(true, Ordering::AcqRel) {
                    return Notification::Ignored;
                }
                self.fire(Ok(()));
                Notification::Completed
            }
        }
    }

    fn fire(&self, outcome: Result<()>) {
        let continuation = self.on_settled.lock().take();
        if let Some(continuation) = continuation {
            continuation(outcome);
        }
    }

    /// Number of operations the batch dispatched
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Successful completions counted so far
    pub fn observed(&self) -> usize {
        self.observed.load(Ordering::Acquire)
    }

    /// Whether the continuation has fired
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CompletionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionTracker")
            .field("expected", &self.expected)
            .field("observed", &self.observed())
            .field("notified", &self.notified.load(Ordering::Acquire))
            .field("settled", &self.is_settled())
            .finish()
    }
}
