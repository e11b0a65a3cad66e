//! Name-keyed tensor registry.
//!
//! The registry is owned by the graph builder; descriptors resolve their
//! symbolic bindings against it during `init` and reconciliation. Each
//! entry owns one storage instance per (backend, replica) slot, created
//! by `materialize`, and knows whether its tensor carries an implicit
//! batch dimension.

use std::collections::HashMap;

use crate::error::{ForgeResult, GradForgeError};
use crate::runtime::DeviceBackend;
use crate::tensor::storage::shared;
use crate::tensor::{DType, Shape, SharedStorage, TensorStorage};

/// One named tensor: declared shape, batch behavior, and per-replica storage.
#[derive(Debug)]
pub struct TensorEntry {
    name: String,
    shape: Shape,
    dtype: DType,
    /// Batch size for batch-bearing tensors; `None` means the tensor has
    /// no implicit batch axis.
    batch_size: Option<usize>,
    storages: HashMap<DeviceBackend, Vec<SharedStorage>>,
}

impl TensorEntry {
    pub fn new(name: impl Into<String>, shape: impl Into<Shape>, dtype: DType) -> Self {
        TensorEntry {
            name: name.into(),
            shape: shape.into(),
            dtype,
            batch_size: None,
            storages: HashMap::new(),
        }
    }

    /// Mark this tensor batch-bearing with the given batch size. The
    /// batch axis is appended after the declared dims on every storage.
    pub fn with_batch(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Declared shape without the batch axis.
    pub fn base_shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_batch_bearing(&self) -> bool {
        self.batch_size.is_some()
    }

    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    /// The shape storages are allocated with: declared dims plus the
    /// batch axis when one is carried.
    pub fn allocated_shape(&self) -> Shape {
        match self.batch_size {
            Some(batch) => self.shape.with_batch(batch),
            None => self.shape.clone(),
        }
    }

    /// Apply a binding's target shape to this tensor: the batch axis is
    /// appended when the tensor is batch-bearing.
    pub fn batched(&self, target: &Shape) -> Shape {
        match self.batch_size {
            Some(batch) => target.with_batch(batch),
            None => target.clone(),
        }
    }

    /// Create `replica_count` storage instances for `backend`. Existing
    /// storages for that backend are replaced.
    pub fn materialize(&mut self, backend: DeviceBackend, replica_count: usize) {
        let shape = self.allocated_shape();
        let storages = (0..replica_count)
            .map(|_| shared(TensorStorage::new(self.name.clone(), shape.clone(), self.dtype)))
            .collect();
        self.storages.insert(backend, storages);
    }

    /// Fetch the storage instance for one (backend, replica) slot.
    pub fn storage(&self, backend: DeviceBackend, replica: usize) -> ForgeResult<SharedStorage> {
        let replicas = self
            .storages
            .get(&backend)
            .ok_or_else(|| GradForgeError::ReplicaOutOfRange {
                tensor: self.name.clone(),
                replica,
                count: 0,
            })?;
        replicas
            .get(replica)
            .cloned()
            .ok_or_else(|| GradForgeError::ReplicaOutOfRange {
                tensor: self.name.clone(),
                replica,
                count: replicas.len(),
            })
    }

    /// Number of materialized replicas for `backend`.
    pub fn replica_count(&self, backend: DeviceBackend) -> usize {
        self.storages.get(&backend).map_or(0, Vec::len)
    }
}

/// Maps tensor names to their entries.
#[derive(Debug, Default)]
pub struct TensorRegistry {
    entries: HashMap<String, TensorEntry>,
}

impl TensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tensor. Names are unique; a second registration of the
    /// same name is a configuration error.
    pub fn insert(&mut self, entry: TensorEntry) -> ForgeResult<()> {
        if self.entries.contains_key(entry.name()) {
            return Err(GradForgeError::InvalidConfiguration(format!(
                "tensor `{}` is already registered",
                entry.name()
            )));
        }
        self.entries.insert(entry.name().to_string(), entry);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&TensorEntry> {
        self.entries.get(name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut TensorEntry> {
        self.entries.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materialize every entry for `backend` with `replica_count` storages.
    pub fn materialize(&mut self, backend: DeviceBackend, replica_count: usize) {
        tracing::debug!(
            "materializing {} tensors for {} with {} replicas",
            self.entries.len(),
            backend,
            replica_count
        );
        for entry in self.entries.values_mut() {
            entry.materialize(backend, replica_count);
        }
    }

    /// Update the batch size of every batch-bearing tensor.
    ///
    /// Storages are not resized here; descriptors re-reconcile shapes at
    /// the start of their next execution pass, which is where a changed
    /// batch size takes effect.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        for entry in self.entries.values_mut() {
            if entry.batch_size.is_some() {
                entry.batch_size = Some(batch_size);
            }
        }
    }
}
