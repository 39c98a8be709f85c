//! Background execution of a single run.
//!
//! A [`Runner`] owns the "is a run active" state. [`Runner::start`] moves a
//! [`BatchTransformer`] onto its own thread and returns a [`RunHandle`]; the
//! display layer drains [`RunHandle::events`] at its own pace. A second start
//! is refused until the worker of the first one has exited.

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;

use crate::{
    RunReport,
    config::{JobParameters, ParameterError},
    core::BatchTransformer,
    progress::{ChannelReporter, ProgressReporter, RunEvent},
};

#[derive(Error, Debug)]
pub enum StartError {
    #[error("A run is already in progress")]
    AlreadyRunning,

    #[error("Invalid parameters: {0}")]
    InvalidParameters(#[from] ParameterError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Starts runs, at most one at a time
#[derive(Debug, Default, Clone)]
pub struct Runner {
    active: Arc<AtomicBool>,
}

/// Clears the active flag when dropped; also covers a worker that panics
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Validate `params` and start a run on a background thread
    pub fn start(&self, params: JobParameters) -> Result<RunHandle, StartError> {
        let mut transformer = BatchTransformer::new(params)?;

        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StartError::AlreadyRunning);
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        let (sender, receiver) = unbounded();
        let worker = thread::Builder::new()
            .name("imgshrink-worker".to_string())
            .spawn(move || {
                let reporter = ChannelReporter::new(sender);
                let report = transformer.run_unfinished(Some(&reporter));
                // The runner is free again by the time `Finished` arrives.
                drop(guard);
                reporter.report(RunEvent::Finished(report.clone()));
                report
            })?;

        Ok(RunHandle {
            events: receiver,
            worker,
        })
    }
}

/// One started run
pub struct RunHandle {
    events: Receiver<RunEvent>,
    worker: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Events in processing order, ending with [`RunEvent::Finished`].
    /// The channel disconnects once the worker is done.
    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    /// Whether the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Block until the worker exits and return its report
    pub fn wait(self) -> Result<RunReport> {
        self.worker
            .join()
            .map_err(|_| anyhow!("Worker thread panicked"))
    }
}
