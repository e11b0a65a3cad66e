//! Unified error handling for gradforge
//!
//! One crate-wide error type covering every failure mode of the node
//! runtime: role bindings missing from a descriptor, scalar types a kind
//! does not support, parameter-bag problems, shape reconciliation, and
//! the device-queue runtime. The `category()` method classifies errors
//! for handling decisions.

use std::fmt;

use crate::op::OpKind;
use crate::tensor::{DType, Shape};

/// Unified error type for gradforge
///
/// Factory and binding failures are plain values of this type; `init` is
/// the single point that aggregates them into an overall success/failure
/// decision for a descriptor.
#[derive(Debug, thiserror::Error)]
pub enum GradForgeError {
    // ========== Construction / Binding Errors ==========
    /// A role required by the operator kind is absent from the descriptor's declared bindings
    #[error("operator `{op}` has no binding for required role `{role}`")]
    MissingRoleBinding { op: String, role: String },

    /// The operator kind does not support the descriptor's scalar type
    #[error("{kind} does not support data type {dtype}")]
    UnsupportedDataType { kind: OpKind, dtype: DType },

    /// A parameter the kind requires is absent from the parameter bag
    #[error("operator `{op}` is missing required parameter `{name}`")]
    MissingRequiredParameter { op: String, name: String },

    /// A parameter is present but holds a different value variant
    #[error("parameter `{name}` has the wrong type: expected {expected}")]
    ParameterTypeMismatch {
        name: String,
        expected: &'static str,
    },

    /// The kernel provider declined to construct a kernel
    #[error("no kernel available for {kind} with data type {dtype}")]
    KernelConstructionFailed { kind: OpKind, dtype: DType },

    /// The kernel rejected a resolved storage for one of its slots
    #[error("kernel for `{op}` rejected binding for role `{role}`")]
    BindingRejected { op: String, role: String },

    /// Kernel-level numeric/resource initialization failed
    #[error("kernel initialization failed for `{op}` on replica {replica}")]
    KernelInitFailed { op: String, replica: usize },

    // ========== Tensor / Shape Errors ==========
    /// Tensor name not present in the registry
    #[error("tensor not found: {0}")]
    TensorNotFound(String),

    /// Replica index outside the materialized range for a tensor
    #[error("tensor `{tensor}` has no storage for replica {replica} (have {count})")]
    ReplicaOutOfRange {
        tensor: String,
        replica: usize,
        count: usize,
    },

    /// Storage could not take the target shape
    #[error("reshape failed for tensor `{tensor}`: {from} -> {to}")]
    ShapeReconciliationFailed {
        tensor: String,
        from: Shape,
        to: Shape,
    },

    // ========== Runtime Errors ==========
    /// No work queue exists for the given backend/replica slot
    #[error("no device queue for {backend} replica {replica}")]
    QueueUnavailable {
        backend: crate::runtime::DeviceBackend,
        replica: usize,
    },

    /// A device worker went away while work was outstanding
    #[error("device worker disconnected: {0}")]
    WorkerDisconnected(String),

    /// Invalid runtime configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ========== Internal Errors ==========
    /// Lock poisoned (indicates a bug or a panicked worker)
    #[error("internal lock poisoned: {0}")]
    LockPoisoned(String),

    /// Internal error (indicates a bug)
    #[error("internal error: {0}")]
    InternalError(String),
}

impl GradForgeError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            // Construction errors - the descriptor or its parameter bag is wrong
            GradForgeError::MissingRoleBinding { .. }
            | GradForgeError::UnsupportedDataType { .. }
            | GradForgeError::MissingRequiredParameter { .. }
            | GradForgeError::ParameterTypeMismatch { .. }
            | GradForgeError::KernelConstructionFailed { .. }
            | GradForgeError::BindingRejected { .. }
            | GradForgeError::KernelInitFailed { .. } => ErrorCategory::Construction,

            // Shape/tensor errors - registry contents disagree with the descriptor
            GradForgeError::TensorNotFound(_)
            | GradForgeError::ReplicaOutOfRange { .. }
            | GradForgeError::ShapeReconciliationFailed { .. } => ErrorCategory::Shape,

            // Runtime errors - the device queues themselves
            GradForgeError::QueueUnavailable { .. }
            | GradForgeError::WorkerDisconnected(_)
            | GradForgeError::InvalidConfiguration(_) => ErrorCategory::Runtime,

            GradForgeError::LockPoisoned(_) | GradForgeError::InternalError(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Check if this error arose while building/binding a descriptor
    pub fn is_construction_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Construction)
    }

    /// Check if this is an internal error (indicates a bug)
    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Descriptor construction or binding problem - fix the graph definition
    Construction,
    /// Tensor/shape problem - registry and descriptor disagree
    Shape,
    /// Device-queue runtime problem
    Runtime,
    /// Internal error - indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Construction => write!(f, "Construction"),
            ErrorCategory::Shape => write!(f, "Shape"),
            ErrorCategory::Runtime => write!(f, "Runtime"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for GradForgeError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        GradForgeError::LockPoisoned(err.to_string())
    }
}

/// Convenience Result alias used throughout the crate
pub type ForgeResult<T> = std::result::Result<T, GradForgeError>;
