//! Device execution runtime.
//!
//! One FIFO work queue per device replica slot, an asynchronous unit of
//! work that wraps a replica's kernel, and a completion handle the caller
//! blocks on. The runtime is always passed explicitly into `init` and
//! `evaluate` so tests can substitute an instrumented fake.

pub mod config;
pub mod context;
pub mod queue;

pub use config::RuntimeConfig;
pub use context::DeviceContext;
pub use queue::{Completion, DeviceQueue};

use std::fmt;

use crate::error::ForgeResult;
use crate::kernel::{KernelProvider, ReplicaKernel};

/// A device backend a descriptor can be initialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceBackend {
    Cpu,
    Cuda,
}

impl fmt::Display for DeviceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceBackend::Cpu => write!(f, "cpu"),
            DeviceBackend::Cuda => write!(f, "cuda"),
        }
    }
}

/// One replica's share of an execution pass: run its kernel's forward
/// pass once.
pub struct UnitOfWork {
    kernel: ReplicaKernel,
}

impl UnitOfWork {
    pub fn new(kernel: ReplicaKernel) -> Self {
        UnitOfWork { kernel }
    }

    /// Execute the wrapped kernel. Called from a device worker thread.
    pub fn run(&self) {
        match self.kernel.lock() {
            Ok(mut kernel) => kernel.run_forward(),
            Err(err) => {
                tracing::error!("skipping unit of work, kernel lock poisoned: {}", err);
            }
        }
    }
}

/// The work-queue runtime descriptors submit to.
///
/// `submit` enqueues a unit on the FIFO queue of one (backend, replica)
/// slot and returns immediately; the returned [`Completion`] blocks until
/// that unit has run.
pub trait ExecutionRuntime: Send + Sync {
    /// Number of active device replicas for `backend`.
    fn replica_count(&self, backend: DeviceBackend) -> usize;

    /// Enqueue one unit of work on a replica's queue.
    fn submit(
        &self,
        backend: DeviceBackend,
        replica: usize,
        unit: UnitOfWork,
    ) -> ForgeResult<Completion>;
}

/// Everything a descriptor needs from its environment: the work-queue
/// runtime and the kernel provider.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub runtime: &'a dyn ExecutionRuntime,
    pub kernels: &'a dyn KernelProvider,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(runtime: &'a dyn ExecutionRuntime, kernels: &'a dyn KernelProvider) -> Self {
        ExecutionContext { runtime, kernels }
    }
}
