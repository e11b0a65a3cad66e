//! Kernel contracts.
//!
//! The numeric work behind an operator kind lives outside this crate,
//! behind the [`Kernel`] and [`KernelProvider`] traits. The factory layer
//! here decides *which* kernel to ask for — by kind, scalar type, and
//! device backend — wires its named slots, and owns the result.

pub mod dummy;
pub mod factory;

pub use dummy::{DummyKernelProvider, KernelActivity};
pub use factory::build_kernel;

use std::sync::{Arc, Mutex};

use crate::op::{ActivationMode, OpKind};
use crate::runtime::DeviceBackend;
use crate::tensor::{DType, Shape, SharedStorage};

/// One concrete, device- and scalar-type-specific kernel instance.
///
/// Binding wires resolved storages into named slots; `initialize` runs
/// kernel-level numeric/resource setup once all slots are bound. Bind and
/// initialize report rejection with `false` rather than panicking — the
/// factory turns that into a construction failure.
pub trait Kernel: Send {
    /// Wire a resolved storage into a named input slot.
    fn bind_input(&mut self, role: &str, storage: SharedStorage) -> bool;

    /// Wire a resolved storage into a named output slot.
    fn bind_output(&mut self, role: &str, storage: SharedStorage) -> bool;

    /// Kernel-level numeric/resource initialization after binding.
    fn initialize(&mut self) -> bool;

    /// Run one forward pass over the bound storages.
    fn run_forward(&mut self);

    /// Apply a hot-updated blend rate.
    ///
    /// Only kinds that declare a hot-updatable rate honor this; the
    /// default implementation ignores the value silently.
    fn apply_rate(&mut self, _rate: f32) {}
}

/// A replica's kernel as the descriptor stores it.
///
/// The descriptor is the sole owner; the `Arc` exists so an in-flight
/// unit of work on a device queue can reach the kernel while `evaluate`
/// blocks on the barrier.
pub type ReplicaKernel = Arc<Mutex<Box<dyn Kernel>>>;

/// Kind-specific construction parameters, resolved from the parameter
/// bag by the per-kind factory with documented defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelParams {
    Activation {
        mode: ActivationMode,
    },
    Convolution {
        stride_x: usize,
        stride_y: usize,
        zero_padding_x: usize,
        zero_padding_y: usize,
    },
    DotProduct {
        has_bias: bool,
    },
    ElementwiseAdd {
        rate: f32,
    },
    Reshape {
        new_shape: Shape,
    },
    /// Kinds whose construction takes no parameters.
    None,
}

/// Constructs concrete kernels.
///
/// `construct` returns `None` when no kernel exists for the requested
/// combination; the factory has already rejected scalar types the kind
/// does not support, so a `None` here means the provider itself has no
/// implementation to offer.
pub trait KernelProvider: Send + Sync {
    fn construct(
        &self,
        kind: OpKind,
        dtype: DType,
        backend: DeviceBackend,
        replica: usize,
        params: &KernelParams,
    ) -> Option<Box<dyn Kernel>>;
}
