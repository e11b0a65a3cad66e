//! Configuration for the device execution runtime.

use crate::error::{ForgeResult, GradForgeError};

/// Replica counts for the device work-queue runtime.
///
/// Each replica slot gets its own FIFO queue and worker. The defaults
/// give a single CPU replica and no CUDA replicas.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of CPU device replicas.
    pub cpu_replicas: usize,

    /// Number of CUDA device replicas.
    pub cuda_replicas: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            cpu_replicas: 1,
            cuda_replicas: 0,
        }
    }
}

impl RuntimeConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CPU replica count
    pub fn with_cpu_replicas(mut self, cpu_replicas: usize) -> Self {
        self.cpu_replicas = cpu_replicas;
        self
    }

    /// Set the CUDA replica count
    pub fn with_cuda_replicas(mut self, cuda_replicas: usize) -> Self {
        self.cuda_replicas = cuda_replicas;
        self
    }

    /// A runtime with no replica slots cannot execute anything.
    pub fn validate(&self) -> ForgeResult<()> {
        if self.cpu_replicas == 0 && self.cuda_replicas == 0 {
            return Err(GradForgeError::InvalidConfiguration(
                "at least one device replica is required".to_string(),
            ));
        }
        Ok(())
    }
}
