//! The all-writes-acknowledged barrier that gates the completion token.
//!
//! A [`CompletionBarrier`] counts submitted groups and their acknowledgments
//! over a closed, finite set of work:
//!
//! ```text
//!             submit / acknowledge
//!   Collecting ───────────────────────┐
//!       │  sealed && acked == submitted│
//!       ▼                              │ failure ack, abort, cancel
//!   Satisfied ──── fire(emit) ───► Terminal
//!       │                              │
//!       └────── abort / cancel ───► Aborted  (never fires)
//! ```
//!
//! The world is closed by [`CompletionBarrier::seal`]: until then more
//! submissions may arrive, so equal counts alone never satisfy the barrier.
//! Emission runs under the barrier lock, which makes it exactly-once and
//! excludes a concurrent abort from slipping in between the check and the
//! write.

use crate::error::ImportError;
use crate::sink::WriteAcknowledgment;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often a waiting barrier re-checks its cancellation token.
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    /// Waiting for submissions, acknowledgments, or the seal.
    Collecting,
    /// Sealed and every submitted group acknowledged successfully.
    Satisfied,
    /// A failure or cancellation was observed; the barrier will never fire.
    Aborted,
    /// The completion token was emitted. Nothing further happens.
    Terminal,
}

/// Why a barrier was aborted. The first reason recorded wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    WriteFailure { row_key: String, cause: String },
    Validation(String),
    Cancelled,
    Failed(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailure { row_key, cause } => {
                write!(f, "write failed for row {row_key:?}: {cause}")
            }
            Self::Validation(message) => write!(f, "{message}"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed(message) => write!(f, "{message}"),
        }
    }
}

/// Shared cancellation flag for one import job.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct BarrierInner {
    state: BarrierState,
    submitted: u64,
    acknowledged: u64,
    sealed: bool,
    reason: Option<AbortReason>,
}

impl BarrierInner {
    fn abort(&mut self, reason: AbortReason) -> bool {
        match self.state {
            BarrierState::Collecting | BarrierState::Satisfied => {
                warn!(
                    %reason,
                    submitted = self.submitted,
                    acknowledged = self.acknowledged,
                    "completion barrier aborted"
                );
                self.state = BarrierState::Aborted;
                self.reason = Some(reason);
                true
            }
            BarrierState::Aborted => false,
            BarrierState::Terminal => {
                warn!(%reason, "abort requested after the completion token was emitted");
                false
            }
        }
    }

    fn settle(&mut self) -> bool {
        if self.state == BarrierState::Collecting
            && self.sealed
            && self.acknowledged == self.submitted
        {
            info!(groups = self.submitted, "all writes acknowledged");
            self.state = BarrierState::Satisfied;
            return true;
        }
        false
    }

    fn aborted_error(&self) -> ImportError {
        ImportError::Aborted(
            self.reason
                .clone()
                .unwrap_or_else(|| AbortReason::Failed("unknown".into())),
        )
    }
}

/// Count-down barrier over the acknowledgments of one bounded import.
pub struct CompletionBarrier {
    inner: Mutex<BarrierInner>,
    changed: Condvar,
    cancel: Option<CancellationToken>,
}

impl Default for CompletionBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionBarrier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BarrierInner {
                state: BarrierState::Collecting,
                submitted: 0,
                acknowledged: 0,
                sealed: false,
                reason: None,
            }),
            changed: Condvar::new(),
            cancel: None,
        }
    }

    /// A barrier that aborts itself once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..Self::new()
        }
    }

    // A panicking worker must not wedge the barrier, so poisoning is ignored;
    // every transition leaves the inner state consistent.
    fn lock(&self) -> MutexGuard<'_, BarrierInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_cancelled(&self, inner: &mut BarrierInner) {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
            && inner.abort(AbortReason::Cancelled)
        {
            self.changed.notify_all();
        }
    }

    #[must_use]
    pub fn state(&self) -> BarrierState {
        self.lock().state
    }

    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.lock().submitted
    }

    #[must_use]
    pub fn acknowledged(&self) -> u64 {
        self.lock().acknowledged
    }

    /// Submitted groups still waiting for an acknowledgment.
    #[must_use]
    pub fn outstanding(&self) -> u64 {
        let inner = self.lock();
        inner.submitted - inner.acknowledged
    }

    #[must_use]
    pub fn abort_reason(&self) -> Option<AbortReason> {
        self.lock().reason.clone()
    }

    /// Announce `groups` more groups that will each be acknowledged.
    ///
    /// # Errors
    ///
    /// Fails with [`ImportError::Aborted`] once the barrier is aborted, and with
    /// [`ImportError::Barrier`] after [`seal`](Self::seal).
    pub fn submit(&self, groups: u64) -> Result<(), ImportError> {
        let mut inner = self.lock();
        if inner.state == BarrierState::Aborted {
            return Err(inner.aborted_error());
        }
        if inner.sealed {
            return Err(ImportError::Barrier(format!(
                "{groups} groups submitted after the input was sealed"
            )));
        }
        inner.submitted += groups;
        Ok(())
    }

    /// Account for one submitted group.
    ///
    /// A failure acknowledgment aborts the barrier. Acknowledgments arriving
    /// after an abort are counted and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Fails with [`ImportError::Barrier`] if more acknowledgments arrive than
    /// groups were submitted.
    pub fn acknowledge(&self, ack: &WriteAcknowledgment) -> Result<(), ImportError> {
        let mut inner = self.lock();
        if inner.acknowledged >= inner.submitted {
            return Err(ImportError::Barrier(format!(
                "acknowledgment for row {:?} without a matching submission",
                ack.row_key_lossy()
            )));
        }
        inner.acknowledged += 1;

        let changed = match ack.cause() {
            Some(cause) => inner.abort(AbortReason::WriteFailure {
                row_key: ack.row_key_lossy(),
                cause: cause.to_string(),
            }),
            None => inner.settle(),
        };
        drop(inner);
        if changed {
            self.changed.notify_all();
        }
        Ok(())
    }

    /// Close the world: no further submissions will be made.
    ///
    /// Sealing an aborted or already-sealed barrier is a no-op.
    pub fn seal(&self) {
        let mut inner = self.lock();
        if inner.sealed {
            return;
        }
        inner.sealed = true;
        debug!(
            submitted = inner.submitted,
            acknowledged = inner.acknowledged,
            "input sealed"
        );
        let changed = inner.settle();
        drop(inner);
        if changed {
            self.changed.notify_all();
        }
    }

    /// Abort the barrier; it will never fire. The first reason is kept.
    pub fn abort(&self, reason: AbortReason) {
        let changed = self.lock().abort(reason);
        if changed {
            self.changed.notify_all();
        }
    }

    /// Block until the barrier is satisfied or aborted.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Aborted`] with the recorded reason; a failure
    /// never turns into an indefinite wait.
    pub fn wait(&self) -> Result<(), ImportError> {
        self.wait_until(None)
    }

    /// Like [`wait`](Self::wait), but give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Besides abort, returns [`ImportError::Barrier`] naming the outstanding
    /// acknowledgments when the timeout elapses. The barrier itself is left
    /// untouched.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), ImportError> {
        self.wait_until(Some(Instant::now() + timeout))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> Result<(), ImportError> {
        let mut inner = self.lock();
        loop {
            self.check_cancelled(&mut inner);
            match inner.state {
                BarrierState::Satisfied | BarrierState::Terminal => return Ok(()),
                BarrierState::Aborted => return Err(inner.aborted_error()),
                BarrierState::Collecting => {}
            }

            let mut slice = if self.cancel.is_some() {
                CANCEL_POLL
            } else {
                Duration::MAX
            };
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(ImportError::Barrier(format!(
                        "timed out with {} of {} acknowledgments outstanding{}",
                        inner.submitted - inner.acknowledged,
                        inner.submitted,
                        if inner.sealed { "" } else { " (input not sealed)" }
                    )));
                }
                slice = slice.min(deadline - now);
            }

            inner = if slice == Duration::MAX {
                self.changed
                    .wait(inner)
                    .unwrap_or_else(PoisonError::into_inner)
            } else {
                self.changed
                    .wait_timeout(inner, slice)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0
            };
        }
    }

    /// Run `emit` exactly once, if and only if the barrier is satisfied.
    ///
    /// Returns `Ok(true)` when `emit` ran and the barrier became terminal, and
    /// `Ok(false)` when it had already fired. A failing `emit` aborts the
    /// barrier.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Barrier`] while still collecting,
    /// [`ImportError::Aborted`] after an abort, or the error from `emit`.
    pub fn fire<F>(&self, emit: F) -> Result<bool, ImportError>
    where
        F: FnOnce() -> Result<(), ImportError>,
    {
        let mut inner = self.lock();
        self.check_cancelled(&mut inner);
        match inner.state {
            BarrierState::Terminal => Ok(false),
            BarrierState::Aborted => Err(inner.aborted_error()),
            BarrierState::Collecting => Err(ImportError::Barrier(format!(
                "fired with {} of {} acknowledgments outstanding",
                inner.submitted - inner.acknowledged,
                inner.submitted
            ))),
            BarrierState::Satisfied => match emit() {
                Ok(()) => {
                    inner.state = BarrierState::Terminal;
                    drop(inner);
                    self.changed.notify_all();
                    Ok(true)
                }
                Err(err) => {
                    inner.abort(AbortReason::Failed(err.to_string()));
                    drop(inner);
                    self.changed.notify_all();
                    Err(err)
                }
            },
        }
    }

    /// Block until satisfied, then [`fire`](Self::fire).
    ///
    /// # Errors
    ///
    /// See [`wait`](Self::wait) and [`fire`](Self::fire).
    pub fn wait_and_fire<F>(&self, emit: F) -> Result<bool, ImportError>
    where
        F: FnOnce() -> Result<(), ImportError>,
    {
        self.wait()?;
        self.fire(emit)
    }
}
