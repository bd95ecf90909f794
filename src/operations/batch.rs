//! Background execution of a batch with pollable status.

use crate::error::TidyResult;
use crate::operations::execute::Executor;
use crate::operations::scan::BookMove;
use crate::operations::ExecutionReport;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Snapshot of a running or finished batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatus {
    pub state: BatchState,
    pub dry_run: bool,
    pub total: usize,
    pub processed: usize,
    pub applied: usize,
    pub errors: usize,
    pub current: Option<String>,
    pub disambiguated: Vec<PathBuf>,
    pub error: Option<String>,
    /// Full tally, set once the batch has finished
    pub report: Option<ExecutionReport>,
}

impl BatchStatus {
    fn new(total: usize, dry_run: bool) -> Self {
        Self {
            state: BatchState::Running,
            dry_run,
            total,
            processed: 0,
            applied: 0,
            errors: 0,
            current: None,
            disambiguated: Vec::new(),
            error: None,
            report: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state != BatchState::Running
    }

    fn finish(&mut self, result: TidyResult<ExecutionReport>) {
        self.current = None;
        match result {
            Ok(report) => {
                self.state = if report.cancelled {
                    BatchState::Cancelled
                } else {
                    BatchState::Completed
                };
                self.processed = report.processed;
                self.applied = report.applied;
                self.errors = report.errors;
                self.disambiguated = report
                    .disambiguated
                    .iter()
                    .map(|d| d.resolved.clone())
                    .collect();
                self.disambiguated.sort();
                self.report = Some(report);
            }
            Err(e) => {
                self.state = BatchState::Failed;
                self.error = Some(e.to_string());
            }
        }
    }
}

/// Handle to a batch running on its own thread
#[derive(Debug)]
pub struct BatchHandle {
    status: Arc<Mutex<BatchStatus>>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl BatchHandle {
    pub fn spawn(executor: Executor, moves: Vec<BookMove>, dry_run: bool) -> Self {
        let status = Arc::new(Mutex::new(BatchStatus::new(moves.len(), dry_run)));
        let cancel = Arc::new(AtomicBool::new(false));

        let thread = {
            let status = Arc::clone(&status);
            let cancel = Arc::clone(&cancel);
            thread::spawn(move || {
                let result = executor.execute_batch(&moves, dry_run, &cancel, |progress| {
                    let mut s = status.lock().unwrap_or_else(|e| e.into_inner());
                    s.processed += 1;
                    if progress.applied {
                        s.applied += 1;
                    } else {
                        s.errors += 1;
                    }
                    s.current = Some(progress.title.clone());
                    s.disambiguated
                        .extend(progress.disambiguated.iter().map(|d| d.resolved.clone()));
                });

                let mut s = status.lock().unwrap_or_else(|e| e.into_inner());
                s.finish(result);
            })
        };

        Self {
            status,
            cancel,
            thread: Some(thread),
        }
    }

    /// Current status; only holds the lock long enough to clone
    pub fn status(&self) -> BatchStatus {
        self.status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Stop scheduling new moves; the move in progress still completes
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// Wait for the worker thread and return the final status
    pub fn join(mut self) -> BatchStatus {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                let mut s = self.status.lock().unwrap_or_else(|e| e.into_inner());
                s.state = BatchState::Failed;
                s.error = Some("batch worker panicked".to_string());
            }
        }
        self.status()
    }
}
