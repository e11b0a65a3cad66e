//! Tensor shapes.

use std::fmt;

/// An n-dimensional tensor shape.
///
/// Shapes appear in binding declarations, in reconciliation diagnostics,
/// and as the `NewShape` parameter of the reshape operator. The batch
/// dimension, when a tensor carries one, is appended as the last axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Total number of elements. An empty shape holds zero elements.
    pub fn element_count(&self) -> usize {
        if self.0.is_empty() {
            0
        } else {
            self.0.iter().copied().product()
        }
    }

    /// This shape with a batch axis of size `batch` appended.
    pub fn with_batch(&self, batch: usize) -> Shape {
        let mut dims = self.0.clone();
        dims.push(batch);
        Shape(dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape(dims.to_vec())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, "]")
    }
}
