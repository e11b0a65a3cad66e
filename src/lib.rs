//! gradforge - Multi-Device Compute-Graph Node Runtime
//!
//! One operator descriptor per graph node: symbolic tensor bindings are
//! resolved into per-device-replica storage, a per-kind factory builds
//! one concrete kernel per replica, and each execution pass fans one
//! unit of work out to every replica's FIFO queue and joins on all of
//! them before returning.

pub mod descriptor;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod op;
pub mod runtime;
pub mod tensor;

pub use descriptor::{DescriptorState, OperatorDescriptor, TensorBinding};
pub use error::{ErrorCategory, ForgeResult, GradForgeError};
pub use kernel::{DummyKernelProvider, Kernel, KernelParams, KernelProvider};
pub use op::{keys, ActivationMode, OpKind, ParamBag, ParamValue};
pub use runtime::{
    Completion, DeviceBackend, DeviceContext, ExecutionContext, ExecutionRuntime, RuntimeConfig,
    UnitOfWork,
};
pub use tensor::{DType, Shape, TensorEntry, TensorRegistry};
