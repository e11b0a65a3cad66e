//! Operator descriptors.
//!
//! An `OperatorDescriptor` is one node of the compute graph: symbolic
//! input/output bindings, a parameter bag, an operator kind, and a
//! scalar type. `init` materializes one kernel per device replica
//! through the factory; `evaluate` runs one synchronous pass by
//! fanning one unit of work out to every replica's queue and joining
//! on all of them before returning.

pub mod binding;

pub use binding::TensorBinding;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{ForgeResult, GradForgeError};
use crate::kernel::{factory, Kernel, ReplicaKernel};
use crate::op::{OpKind, ParamBag};
use crate::runtime::{DeviceBackend, ExecutionContext, UnitOfWork};
use crate::tensor::{DType, TensorRegistry};

/// Lifecycle of a descriptor.
///
/// `Binding` only exists while `init` runs; a descriptor observed from
/// outside is `Uninitialized`, `Ready`, or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    Uninitialized,
    Binding,
    Ready,
    Failed,
}

/// One graph node, from symbolic bindings to per-replica kernels.
pub struct OperatorDescriptor {
    name: String,
    kind: OpKind,
    dtype: DType,
    inputs: HashMap<String, TensorBinding>,
    outputs: HashMap<String, TensorBinding>,
    params: ParamBag,
    kernels: HashMap<DeviceBackend, Vec<ReplicaKernel>>,
    pending_input_reshapes: Vec<TensorBinding>,
    pending_output_reshapes: Vec<TensorBinding>,
    state: DescriptorState,
}

impl OperatorDescriptor {
    /// Create a descriptor with only its symbolic bindings populated.
    /// Bindings and parameters are validated during `init`, not here.
    pub fn new(
        name: impl Into<String>,
        kind: OpKind,
        dtype: DType,
        inputs: HashMap<String, TensorBinding>,
        outputs: HashMap<String, TensorBinding>,
        params: ParamBag,
    ) -> Self {
        OperatorDescriptor {
            name: name.into(),
            kind,
            dtype,
            inputs,
            outputs,
            params,
            kernels: HashMap::new(),
            pending_input_reshapes: Vec::new(),
            pending_output_reshapes: Vec::new(),
            state: DescriptorState::Uninitialized,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn data_type(&self) -> DType {
        self.dtype
    }

    pub fn state(&self) -> DescriptorState {
        self.state
    }

    pub fn params(&self) -> &ParamBag {
        &self.params
    }

    /// Number of kernels held for `backend`: zero before a successful
    /// `init`, the backend's replica count after.
    pub fn replica_kernel_count(&self, backend: DeviceBackend) -> usize {
        self.kernels.get(&backend).map_or(0, Vec::len)
    }

    /// Resolve one declared input role and wire it into `kernel`.
    ///
    /// Looks the role up in the declared bindings, the tensor in the
    /// registry, and the storage for (backend, replica). A binding that
    /// declares a reshape resizes the storage now — appending the batch
    /// axis for batch-bearing tensors — and is remembered for
    /// re-reconciliation before every later pass. Mutates storage shape
    /// only, never values.
    pub(crate) fn resolve_input(
        &mut self,
        kernel: &mut dyn Kernel,
        role: &str,
        registry: &TensorRegistry,
        backend: DeviceBackend,
        replica: usize,
    ) -> ForgeResult<()> {
        let binding = self
            .inputs
            .get(role)
            .cloned()
            .ok_or_else(|| GradForgeError::MissingRoleBinding {
                op: self.name.clone(),
                role: role.to_string(),
            })?;

        let storage = Self::resolve_storage(&binding, registry, backend, replica, role, "input")?;
        record_pending(&mut self.pending_input_reshapes, &binding);

        if !kernel.bind_input(role, storage) {
            return Err(GradForgeError::BindingRejected {
                op: self.name.clone(),
                role: role.to_string(),
            });
        }
        Ok(())
    }

    /// Resolve one declared output role and wire it into `kernel`.
    pub(crate) fn resolve_output(
        &mut self,
        kernel: &mut dyn Kernel,
        role: &str,
        registry: &TensorRegistry,
        backend: DeviceBackend,
        replica: usize,
    ) -> ForgeResult<()> {
        let binding = self
            .outputs
            .get(role)
            .cloned()
            .ok_or_else(|| GradForgeError::MissingRoleBinding {
                op: self.name.clone(),
                role: role.to_string(),
            })?;

        let storage = Self::resolve_storage(&binding, registry, backend, replica, role, "output")?;
        record_pending(&mut self.pending_output_reshapes, &binding);

        if !kernel.bind_output(role, storage) {
            return Err(GradForgeError::BindingRejected {
                op: self.name.clone(),
                role: role.to_string(),
            });
        }
        Ok(())
    }

    fn resolve_storage(
        binding: &TensorBinding,
        registry: &TensorRegistry,
        backend: DeviceBackend,
        replica: usize,
        role: &str,
        direction: &str,
    ) -> ForgeResult<crate::tensor::SharedStorage> {
        let entry = registry
            .lookup(binding.tensor())
            .ok_or_else(|| GradForgeError::TensorNotFound(binding.tensor().to_string()))?;
        let storage = entry.storage(backend, replica)?;

        if binding.reshape_required() {
            let target = entry.batched(binding.shape());
            let mut guard = storage.lock()?;
            let from = guard.shape().clone();
            if !guard.reshape(&target) {
                tracing::error!(
                    "reshape failed for {} `{}`, tensor `{}`: {} -> {}",
                    direction,
                    role,
                    binding.tensor(),
                    from,
                    target
                );
                return Err(GradForgeError::ShapeReconciliationFailed {
                    tensor: binding.tensor().to_string(),
                    from,
                    to: target,
                });
            }
        }
        Ok(storage)
    }

    /// Re-apply every pending reshape across all replicas.
    ///
    /// Runs before kernels on every execution pass: the batch axis may
    /// have changed since the last pass. Best-effort, not transactional:
    /// the first failure is logged with the tensor and both shapes, and
    /// the rest of the pass is abandoned without signaling the caller.
    fn reconcile_shapes(
        &self,
        registry: &TensorRegistry,
        backend: DeviceBackend,
        replica_count: usize,
    ) {
        let pending = self
            .pending_input_reshapes
            .iter()
            .chain(self.pending_output_reshapes.iter());

        for binding in pending {
            let entry = match registry.lookup(binding.tensor()) {
                Some(entry) => entry,
                None => {
                    tracing::error!(
                        "reshape skipped, tensor `{}` is no longer registered",
                        binding.tensor()
                    );
                    return;
                }
            };
            let target = entry.batched(binding.shape());

            for replica in 0..replica_count {
                let storage = match entry.storage(backend, replica) {
                    Ok(storage) => storage,
                    Err(err) => {
                        tracing::error!("reshape skipped for `{}`: {}", binding.tensor(), err);
                        return;
                    }
                };
                let mut guard = match storage.lock() {
                    Ok(guard) => guard,
                    Err(err) => {
                        tracing::error!("reshape skipped for `{}`: {}", binding.tensor(), err);
                        return;
                    }
                };
                let from = guard.shape().clone();
                if !guard.reshape(&target) {
                    tracing::error!(
                        "reshape failed for tensor `{}`: {} -> {}",
                        binding.tensor(),
                        from,
                        target
                    );
                    return;
                }
            }
        }
    }

    /// Build, bind, reconcile, and initialize one kernel per device
    /// replica for `backend`.
    ///
    /// Transactional: kernels accumulate in a staging sequence and are
    /// committed only when every replica succeeds, so a failed `init`
    /// leaves the kernel list for the backend empty. The first failure
    /// aborts the whole initialization and is returned.
    pub fn init(
        &mut self,
        ctx: &ExecutionContext<'_>,
        registry: &TensorRegistry,
        backend: DeviceBackend,
    ) -> ForgeResult<()> {
        let replica_count = ctx.runtime.replica_count(backend);
        tracing::debug!(
            "init operator `{}` ({}, {} replicas on {})",
            self.name,
            self.kind,
            replica_count,
            backend
        );

        self.kernels.remove(&backend);
        self.state = DescriptorState::Binding;

        let mut staged: Vec<ReplicaKernel> = Vec::with_capacity(replica_count);
        for replica in 0..replica_count {
            let built = factory::build_kernel(self, ctx.kernels, registry, backend, replica)
                .and_then(|mut kernel| {
                    self.reconcile_shapes(registry, backend, replica_count);
                    if !kernel.initialize() {
                        return Err(GradForgeError::KernelInitFailed {
                            op: self.name.clone(),
                            replica,
                        });
                    }
                    Ok(kernel)
                });

            match built {
                Ok(kernel) => staged.push(Arc::new(Mutex::new(kernel))),
                Err(err) => {
                    tracing::error!("init of operator `{}` failed: {}", self.name, err);
                    self.state = DescriptorState::Failed;
                    return Err(err);
                }
            }
        }

        self.kernels.insert(backend, staged);
        self.state = DescriptorState::Ready;
        Ok(())
    }

    /// Run one synchronous forward pass across all replicas of `backend`.
    ///
    /// Reconciles pending shapes, submits one unit of work per replica
    /// in ascending replica order, then blocks until every submitted
    /// unit has completed. Nothing downstream of this node can start
    /// before every replica has finished. Assumes a successful `init`;
    /// calling it on a descriptor that is not `Ready` for this backend
    /// is a caller error and runs nothing.
    pub fn evaluate(
        &mut self,
        ctx: &ExecutionContext<'_>,
        registry: &TensorRegistry,
        backend: DeviceBackend,
    ) -> ForgeResult<()> {
        self.dispatch(ctx, registry, backend, None)
    }

    /// As `evaluate`, applying hot parameter updates first.
    ///
    /// If this descriptor's kind declares a hot-updatable parameter and
    /// `updates` carries a value for it, the value is applied to each
    /// replica's kernel immediately before that replica's submission.
    /// Kinds without a hot-updatable parameter ignore `updates`
    /// silently; passes already queued never observe the new value.
    pub fn evaluate_with_update(
        &mut self,
        ctx: &ExecutionContext<'_>,
        registry: &TensorRegistry,
        backend: DeviceBackend,
        updates: &ParamBag,
    ) -> ForgeResult<()> {
        self.dispatch(ctx, registry, backend, Some(updates))
    }

    fn dispatch(
        &mut self,
        ctx: &ExecutionContext<'_>,
        registry: &TensorRegistry,
        backend: DeviceBackend,
        updates: Option<&ParamBag>,
    ) -> ForgeResult<()> {
        let kernels = match self.kernels.get(&backend) {
            Some(kernels) => kernels,
            None => return Ok(()),
        };
        let replica_count = kernels.len();

        self.reconcile_shapes(registry, backend, replica_count);

        let hot_rate = match (updates, self.kind.hot_updatable_parameter()) {
            (Some(updates), Some(key)) => updates.float_opt(key)?,
            _ => None,
        };

        let kernels = &self.kernels[&backend];
        let mut completions = Vec::with_capacity(replica_count);
        for (replica, kernel) in kernels.iter().enumerate() {
            if let Some(rate) = hot_rate {
                kernel.lock()?.apply_rate(rate);
            }
            let unit = UnitOfWork::new(kernel.clone());
            completions.push(ctx.runtime.submit(backend, replica, unit)?);
        }

        for completion in completions {
            completion.wait()?;
        }
        Ok(())
    }
}

fn record_pending(pending: &mut Vec<TensorBinding>, binding: &TensorBinding) {
    if !binding.reshape_required() {
        return;
    }
    if !pending.iter().any(|p| p == binding) {
        pending.push(binding.clone());
    }
}
