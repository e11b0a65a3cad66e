//! Common test utilities
//!
//! Shared fixtures for descriptor tests: building a registry with one
//! tensor per required role of an operator kind, the exact role-binding
//! maps the kind's factory expects, and a parameter bag carrying the
//! kind's required parameters.

#![allow(dead_code)]

use std::collections::HashMap;

use gradforge::kernel::factory::{required_inputs, required_outputs};
use gradforge::{
    ActivationMode, DType, DeviceBackend, OpKind, OperatorDescriptor, ParamBag, ParamValue,
    Shape, TensorBinding, TensorEntry, TensorRegistry,
};

/// Tensor name used for a role's backing tensor.
pub fn tensor_for_role(role: &str) -> String {
    format!("t_{}", role)
}

/// Role → binding map over `roles`, one distinct tensor per role.
pub fn bindings_for(roles: &[&str]) -> HashMap<String, TensorBinding> {
    roles
        .iter()
        .map(|role| {
            (
                role.to_string(),
                TensorBinding::new(tensor_for_role(role), [4]),
            )
        })
        .collect()
}

/// A parameter bag carrying exactly the parameters `kind` requires.
pub fn required_params(kind: OpKind) -> ParamBag {
    match kind {
        OpKind::Activation | OpKind::ActivationDerivative => ParamBag::new().with(
            gradforge::keys::MODE,
            ParamValue::Mode(ActivationMode::Sigmoid),
        ),
        OpKind::Reshape => ParamBag::new().with(
            gradforge::keys::NEW_SHAPE,
            ParamValue::Dims(Shape::from([2, 2])),
        ),
        _ => ParamBag::new(),
    }
}

/// A descriptor for `kind` declaring exactly its required roles.
pub fn descriptor_for(kind: OpKind, dtype: DType, backend: DeviceBackend) -> OperatorDescriptor {
    OperatorDescriptor::new(
        format!("{}-node", kind),
        kind,
        dtype,
        bindings_for(required_inputs(kind, backend)),
        bindings_for(required_outputs(kind, backend)),
        required_params(kind),
    )
}

/// A registry with one `[4]` tensor per required role of `kind`,
/// materialized for `backend` with `replicas` storage instances.
pub fn registry_for(kind: OpKind, backend: DeviceBackend, replicas: usize) -> TensorRegistry {
    let mut registry = TensorRegistry::new();
    for role in required_inputs(kind, backend)
        .iter()
        .chain(required_outputs(kind, backend))
    {
        registry
            .insert(TensorEntry::new(tensor_for_role(role), [4], DType::F32))
            .expect("unique tensor per role");
    }
    registry.materialize(backend, replicas);
    registry
}
