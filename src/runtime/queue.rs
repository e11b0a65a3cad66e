//! Per-replica device work queue.
//!
//! Each queue owns one worker thread draining a FIFO channel, the analog
//! of one device stream. Submitting returns a [`Completion`] immediately;
//! waiting on it blocks until that unit has run on the worker.

use std::sync::mpsc;
use std::thread;

use crate::error::{ForgeResult, GradForgeError};
use crate::runtime::{DeviceBackend, UnitOfWork};

enum QueueCommand {
    Run {
        unit: UnitOfWork,
        done: mpsc::SyncSender<()>,
    },
    Shutdown,
}

/// Completion handle for one submitted unit of work.
///
/// Consumed by `wait`; dropping it without waiting abandons the signal
/// but not the work — the unit still runs in queue order.
pub struct Completion {
    receiver: mpsc::Receiver<()>,
    backend: DeviceBackend,
    replica: usize,
}

impl Completion {
    /// A handle that is already signaled.
    ///
    /// For [`ExecutionRuntime`](crate::runtime::ExecutionRuntime)
    /// implementations that run the unit synchronously inside `submit`,
    /// such as instrumented test runtimes.
    pub fn ready(backend: DeviceBackend, replica: usize) -> Self {
        let (done, receiver) = mpsc::sync_channel(1);
        let _ = done.send(());
        Completion {
            receiver,
            backend,
            replica,
        }
    }

    /// Block until the submitted unit has finished running.
    pub fn wait(self) -> ForgeResult<()> {
        self.receiver.recv().map_err(|_| {
            GradForgeError::WorkerDisconnected(format!(
                "{} replica {} worker exited before completing its unit",
                self.backend, self.replica
            ))
        })
    }
}

/// One device replica's FIFO work queue.
///
/// Units submitted to the same queue run in submission order. Dropping
/// the queue shuts the worker down after it drains what was already
/// enqueued.
pub struct DeviceQueue {
    backend: DeviceBackend,
    replica: usize,
    sender: mpsc::Sender<QueueCommand>,
    worker: Option<thread::JoinHandle<()>>,
}

impl DeviceQueue {
    /// Spawn the worker thread for one (backend, replica) slot.
    pub fn spawn(backend: DeviceBackend, replica: usize) -> ForgeResult<Self> {
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(format!("{}-replica-{}", backend, replica))
            .spawn(move || worker_loop(receiver, backend, replica))
            .map_err(|e| {
                GradForgeError::InternalError(format!(
                    "failed to spawn worker for {} replica {}: {}",
                    backend, replica, e
                ))
            })?;
        Ok(DeviceQueue {
            backend,
            replica,
            sender,
            worker: Some(worker),
        })
    }

    pub fn backend(&self) -> DeviceBackend {
        self.backend
    }

    pub fn replica(&self) -> usize {
        self.replica
    }

    /// Enqueue one unit of work. Returns immediately with the handle the
    /// caller blocks on.
    pub fn submit(&self, unit: UnitOfWork) -> ForgeResult<Completion> {
        let (done, receiver) = mpsc::sync_channel(1);
        self.sender
            .send(QueueCommand::Run { unit, done })
            .map_err(|_| {
                GradForgeError::WorkerDisconnected(format!(
                    "{} replica {} queue is closed",
                    self.backend, self.replica
                ))
            })?;
        Ok(Completion {
            receiver,
            backend: self.backend,
            replica: self.replica,
        })
    }
}

impl Drop for DeviceQueue {
    fn drop(&mut self) {
        let _ = self.sender.send(QueueCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(
                    "{} replica {} worker panicked during shutdown",
                    self.backend,
                    self.replica
                );
            }
        }
    }
}

fn worker_loop(receiver: mpsc::Receiver<QueueCommand>, backend: DeviceBackend, replica: usize) {
    tracing::debug!("{} replica {} worker started", backend, replica);
    while let Ok(command) = receiver.recv() {
        match command {
            QueueCommand::Run { unit, done } => {
                unit.run();
                // the submitter may have dropped its Completion
                let _ = done.send(());
            }
            QueueCommand::Shutdown => break,
        }
    }
    tracing::debug!("{} replica {} worker stopped", backend, replica);
}
