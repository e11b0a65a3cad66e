//! Per-replica tensor storage.

use std::sync::{Arc, Mutex};

use crate::tensor::{DType, Shape};

/// Storage shared between the registry, the descriptor, and bound kernels.
///
/// Every device replica owns a disjoint instance, so the lock is never
/// contended across replicas; it exists so a kernel running on a device
/// queue and the reconciliation pass on the calling thread can reach the
/// same buffer.
pub type SharedStorage = Arc<Mutex<TensorStorage>>;

/// One device replica's backing buffer for one tensor.
///
/// Holds the element buffer and its current shape. Reshaping resizes the
/// buffer to the new element count; values are not preserved across a
/// resize and are never touched by the binding layer.
#[derive(Debug)]
pub struct TensorStorage {
    name: String,
    dtype: DType,
    shape: Shape,
    data: Vec<u8>,
}

impl TensorStorage {
    pub fn new(name: impl Into<String>, shape: Shape, dtype: DType) -> Self {
        let byte_len = shape.element_count() * dtype.size_in_bytes();
        TensorStorage {
            name: name.into(),
            dtype,
            shape,
            data: vec![0; byte_len],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn element_count(&self) -> usize {
        self.shape.element_count()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Resize this storage to `target`.
    ///
    /// Returns false when the target shape holds no elements; a kernel
    /// slot cannot be backed by empty storage. On success the buffer is
    /// reallocated to the new element count and the shape updated.
    pub fn reshape(&mut self, target: &Shape) -> bool {
        if target.element_count() == 0 {
            return false;
        }
        if *target == self.shape {
            return true;
        }
        self.data
            .resize(target.element_count() * self.dtype.size_in_bytes(), 0);
        self.shape = target.clone();
        true
    }
}

/// Wrap a storage for sharing with kernels and device queues.
pub fn shared(storage: TensorStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}
