//! Cancellation, progress and background job handle

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::orchestrator::SearchOutcome;
use crate::error::{GridError, Result};

/// Cooperative cancellation flag, checked once per point
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Units of work done, one per consumed point
#[derive(Debug, Clone, Default)]
pub struct Progress {
    done: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn advance(&self, units: u64) {
        self.done.fetch_add(units, Ordering::Relaxed);
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Expected units, 0 when unknown
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Completed fraction in `[0, 1]`, `None` when the total is unknown
    pub fn fraction(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some((self.done() as f64 / total as f64).min(1.0)),
        }
    }
}

/// Handle to a search running on a background thread
pub struct SearchJob<P> {
    grid_key: String,
    cancel: CancellationToken,
    progress: Progress,
    receiver: Receiver<Result<SearchOutcome<P>>>,
    handle: Option<JoinHandle<()>>,
}

impl<P> SearchJob<P> {
    pub(crate) fn new(
        grid_key: String,
        cancel: CancellationToken,
        progress: Progress,
        receiver: Receiver<Result<SearchOutcome<P>>>,
        handle: JoinHandle<()>,
    ) -> Self {
        Self {
            grid_key,
            cancel,
            progress,
            receiver,
            handle: Some(handle),
        }
    }

    pub fn grid_key(&self) -> &str {
        &self.grid_key
    }

    /// Request cancellation; the in-flight build runs to completion first
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Block until the search ends
    pub fn wait(mut self) -> Result<SearchOutcome<P>> {
        let outcome = self.receiver.recv().map_err(|_| {
            GridError::Unexpected("Search thread exited without a result".to_string())
        });
        self.join();
        outcome?
    }

    /// Block for at most `timeout`. Returns `None` if the search is still
    /// running. The outcome can only be taken once.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<SearchOutcome<P>>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => {
                self.join();
                Some(outcome)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.join();
                Some(Err(GridError::Unexpected(
                    "Search result already taken or thread exited".to_string(),
                )))
            }
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(grid = %self.grid_key, "Search thread panicked");
            }
        }
    }
}
