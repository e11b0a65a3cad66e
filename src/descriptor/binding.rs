//! Symbolic tensor bindings.

use crate::tensor::Shape;

/// A descriptor's symbolic handle on one tensor: the tensor's registry
/// name, the shape this operator expects for the role, and whether the
/// backing storage must be resized to that shape before kernels run.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorBinding {
    tensor: String,
    shape: Shape,
    reshape_required: bool,
}

impl TensorBinding {
    pub fn new(tensor: impl Into<String>, shape: impl Into<Shape>) -> Self {
        TensorBinding {
            tensor: tensor.into(),
            shape: shape.into(),
            reshape_required: false,
        }
    }

    /// Mark the backing storage as needing a resize to this binding's
    /// shape at bind time and before every execution pass.
    pub fn with_reshape(mut self) -> Self {
        self.reshape_required = true;
        self
    }

    pub fn tensor(&self) -> &str {
        &self.tensor
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn reshape_required(&self) -> bool {
        self.reshape_required
    }
}
