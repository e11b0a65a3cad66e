//! Dummy kernel provider for host-only testing.
//!
//! Constructs no-op kernels that record everything done to them —
//! construction arguments, bound roles, initialization, forward runs,
//! and applied rates — so descriptor behavior can be asserted without
//! any numeric backend. Fault-injection switches cover construction
//! refusal, binding rejection, and initialization failure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::kernel::{Kernel, KernelParams, KernelProvider};
use crate::op::OpKind;
use crate::runtime::DeviceBackend;
use crate::tensor::{DType, SharedStorage};

/// One recorded construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructedKernel {
    pub kind: OpKind,
    pub dtype: DType,
    pub backend: DeviceBackend,
    pub replica: usize,
    pub params: KernelParams,
}

/// Everything the dummy kernels have observed.
#[derive(Debug, Default, Clone)]
pub struct KernelActivity {
    pub constructed: Vec<ConstructedKernel>,
    pub initialize_count: usize,
    pub forward_runs: usize,
    pub runs_by_replica: HashMap<usize, usize>,
    /// (replica, rate) pairs in application order.
    pub rates_applied: Vec<(usize, f32)>,
    /// (replica, role) pairs in binding order.
    pub bound_inputs: Vec<(usize, String)>,
    pub bound_outputs: Vec<(usize, String)>,
}

/// No-op kernel provider that records activity.
#[derive(Default)]
pub struct DummyKernelProvider {
    activity: Arc<Mutex<KernelActivity>>,
    refuse_construction: bool,
    fail_initialize_on_replica: Option<usize>,
    reject_binding_role: Option<String>,
}

impl DummyKernelProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every construction request, as a provider with no
    /// implementation for the requested combination would.
    pub fn refuse_construction(mut self) -> Self {
        self.refuse_construction = true;
        self
    }

    /// Make kernels built for `replica` fail their `initialize` call.
    pub fn fail_initialize_on_replica(mut self, replica: usize) -> Self {
        self.fail_initialize_on_replica = Some(replica);
        self
    }

    /// Make every kernel reject bindings for `role`.
    pub fn reject_binding_role(mut self, role: impl Into<String>) -> Self {
        self.reject_binding_role = Some(role.into());
        self
    }

    /// Snapshot of recorded activity.
    pub fn activity(&self) -> KernelActivity {
        self.activity.lock().expect("activity lock poisoned").clone()
    }

    /// Clear recorded activity.
    pub fn reset(&self) {
        *self.activity.lock().expect("activity lock poisoned") = KernelActivity::default();
    }
}

impl KernelProvider for DummyKernelProvider {
    fn construct(
        &self,
        kind: OpKind,
        dtype: DType,
        backend: DeviceBackend,
        replica: usize,
        params: &KernelParams,
    ) -> Option<Box<dyn Kernel>> {
        if self.refuse_construction {
            return None;
        }
        self.activity
            .lock()
            .expect("activity lock poisoned")
            .constructed
            .push(ConstructedKernel {
                kind,
                dtype,
                backend,
                replica,
                params: params.clone(),
            });
        Some(Box::new(DummyKernel {
            activity: self.activity.clone(),
            replica,
            fail_initialize: self.fail_initialize_on_replica == Some(replica),
            reject_role: self.reject_binding_role.clone(),
        }))
    }
}

struct DummyKernel {
    activity: Arc<Mutex<KernelActivity>>,
    replica: usize,
    fail_initialize: bool,
    reject_role: Option<String>,
}

impl Kernel for DummyKernel {
    fn bind_input(&mut self, role: &str, _storage: SharedStorage) -> bool {
        if self.reject_role.as_deref() == Some(role) {
            return false;
        }
        self.activity
            .lock()
            .expect("activity lock poisoned")
            .bound_inputs
            .push((self.replica, role.to_string()));
        true
    }

    fn bind_output(&mut self, role: &str, _storage: SharedStorage) -> bool {
        if self.reject_role.as_deref() == Some(role) {
            return false;
        }
        self.activity
            .lock()
            .expect("activity lock poisoned")
            .bound_outputs
            .push((self.replica, role.to_string()));
        true
    }

    fn initialize(&mut self) -> bool {
        if self.fail_initialize {
            return false;
        }
        self.activity
            .lock()
            .expect("activity lock poisoned")
            .initialize_count += 1;
        true
    }

    fn run_forward(&mut self) {
        let mut activity = self.activity.lock().expect("activity lock poisoned");
        activity.forward_runs += 1;
        *activity.runs_by_replica.entry(self.replica).or_insert(0) += 1;
    }

    fn apply_rate(&mut self, rate: f32) {
        self.activity
            .lock()
            .expect("activity lock poisoned")
            .rates_applied
            .push((self.replica, rate));
    }
}
