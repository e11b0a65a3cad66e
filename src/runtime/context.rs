//! Device context: owns every replica queue for every backend.

use std::collections::HashMap;

use crate::error::{ForgeResult, GradForgeError};
use crate::runtime::queue::{Completion, DeviceQueue};
use crate::runtime::{DeviceBackend, ExecutionRuntime, RuntimeConfig, UnitOfWork};

/// The shipped [`ExecutionRuntime`]: a fixed pool of per-replica worker
/// queues, built once from a [`RuntimeConfig`] and passed explicitly to
/// descriptors. Dropping the context shuts every worker down.
pub struct DeviceContext {
    queues: HashMap<DeviceBackend, Vec<DeviceQueue>>,
}

impl DeviceContext {
    pub fn new(config: RuntimeConfig) -> ForgeResult<Self> {
        config.validate()?;

        let mut queues = HashMap::new();
        for (backend, count) in [
            (DeviceBackend::Cpu, config.cpu_replicas),
            (DeviceBackend::Cuda, config.cuda_replicas),
        ] {
            if count == 0 {
                continue;
            }
            tracing::debug!("creating {} {} replica queues", count, backend);
            let mut slots = Vec::with_capacity(count);
            for replica in 0..count {
                slots.push(DeviceQueue::spawn(backend, replica)?);
            }
            queues.insert(backend, slots);
        }
        Ok(DeviceContext { queues })
    }

    /// Shorthand for a CPU-only context with `replicas` slots.
    pub fn with_cpu_replicas(replicas: usize) -> ForgeResult<Self> {
        Self::new(RuntimeConfig::new().with_cpu_replicas(replicas))
    }
}

impl ExecutionRuntime for DeviceContext {
    fn replica_count(&self, backend: DeviceBackend) -> usize {
        self.queues.get(&backend).map_or(0, Vec::len)
    }

    fn submit(
        &self,
        backend: DeviceBackend,
        replica: usize,
        unit: UnitOfWork,
    ) -> ForgeResult<Completion> {
        let queue = self
            .queues
            .get(&backend)
            .and_then(|slots| slots.get(replica))
            .ok_or(GradForgeError::QueueUnavailable { backend, replica })?;
        queue.submit(unit)
    }
}
