//! Descriptor initialization tests across the full operator-kind grid

mod common;

use std::collections::HashMap;

use common::{bindings_for, descriptor_for, registry_for, required_params};
use gradforge::kernel::factory::{required_inputs, required_outputs};
use gradforge::{
    ActivationMode, DType, DescriptorState, DeviceBackend, DeviceContext, DummyKernelProvider,
    ExecutionContext, GradForgeError, OpKind, OperatorDescriptor, ParamBag, ParamValue,
    TensorBinding, TensorEntry, TensorRegistry,
};

const BACKEND: DeviceBackend = DeviceBackend::Cpu;

#[test]
fn every_kind_initializes_with_exact_required_roles_for_float_types() {
    let runtime = DeviceContext::with_cpu_replicas(2).expect("runtime");

    for kind in OpKind::ALL {
        for dtype in [DType::F32, DType::F64] {
            let provider = DummyKernelProvider::new();
            let ctx = ExecutionContext::new(&runtime, &provider);
            let registry = registry_for(kind, BACKEND, 2);

            let mut desc = descriptor_for(kind, dtype, BACKEND);
            desc.init(&ctx, &registry, BACKEND)
                .unwrap_or_else(|e| panic!("init failed for {} {}: {}", kind, dtype, e));

            assert_eq!(desc.state(), DescriptorState::Ready, "{} {}", kind, dtype);
            assert_eq!(desc.replica_kernel_count(BACKEND), 2, "{} {}", kind, dtype);
            assert_eq!(provider.activity().constructed.len(), 2, "{} {}", kind, dtype);
        }
    }
}

#[test]
fn omitting_any_single_required_role_fails_init_and_commits_no_kernels() {
    let runtime = DeviceContext::with_cpu_replicas(2).expect("runtime");

    for kind in OpKind::ALL {
        let inputs = required_inputs(kind, BACKEND);
        let outputs = required_outputs(kind, BACKEND);

        for omitted in inputs.iter().chain(outputs) {
            let provider = DummyKernelProvider::new();
            let ctx = ExecutionContext::new(&runtime, &provider);
            let registry = registry_for(kind, BACKEND, 2);

            let mut input_bindings = bindings_for(inputs);
            let mut output_bindings = bindings_for(outputs);
            input_bindings.remove(*omitted);
            output_bindings.remove(*omitted);

            let mut desc = OperatorDescriptor::new(
                format!("{}-missing-{}", kind, omitted),
                kind,
                DType::F32,
                input_bindings,
                output_bindings,
                required_params(kind),
            );

            let err = desc
                .init(&ctx, &registry, BACKEND)
                .expect_err(&format!("{} without {} must fail", kind, omitted));
            assert!(
                matches!(err, GradForgeError::MissingRoleBinding { .. }),
                "{} without {}: unexpected error {}",
                kind,
                omitted,
                err
            );
            assert_eq!(desc.state(), DescriptorState::Failed);
            assert_eq!(desc.replica_kernel_count(BACKEND), 0);
        }
    }
}

#[test]
fn kernel_list_length_matches_replica_count() {
    for replicas in [1, 3, 4] {
        let runtime = DeviceContext::with_cpu_replicas(replicas).expect("runtime");
        let provider = DummyKernelProvider::new();
        let ctx = ExecutionContext::new(&runtime, &provider);
        let registry = registry_for(OpKind::ElementwiseAdd, BACKEND, replicas);

        let mut desc = descriptor_for(OpKind::ElementwiseAdd, DType::F32, BACKEND);
        desc.init(&ctx, &registry, BACKEND).expect("init");
        assert_eq!(desc.replica_kernel_count(BACKEND), replicas);
    }
}

// Scenario A: a sigmoid activation with its two roles bound initializes
// and evaluates one forward pass per replica.
#[test]
fn scenario_a_sigmoid_activation_init_and_evaluate() {
    let runtime = DeviceContext::with_cpu_replicas(2).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);

    let mut registry = TensorRegistry::new();
    registry
        .insert(TensorEntry::new("h1", [4], DType::F32))
        .unwrap();
    registry
        .insert(TensorEntry::new("h2", [4], DType::F32))
        .unwrap();
    registry.materialize(BACKEND, 2);

    let mut desc = OperatorDescriptor::new(
        "act1",
        OpKind::Activation,
        DType::F32,
        HashMap::from([("Input".to_string(), TensorBinding::new("h1", [4]))]),
        HashMap::from([("Output".to_string(), TensorBinding::new("h2", [4]))]),
        ParamBag::new().with(
            gradforge::keys::MODE,
            ParamValue::Mode(ActivationMode::Sigmoid),
        ),
    );

    desc.init(&ctx, &registry, BACKEND).expect("init");
    desc.evaluate(&ctx, &registry, BACKEND).expect("evaluate");

    let activity = provider.activity();
    assert_eq!(activity.forward_runs, 2);
    assert_eq!(activity.runs_by_replica.get(&0), Some(&1));
    assert_eq!(activity.runs_by_replica.get(&1), Some(&1));
}

// Scenario B: an activation without its Mode parameter creates zero
// kernels for any replica.
#[test]
fn scenario_b_activation_without_mode_fails() {
    let runtime = DeviceContext::with_cpu_replicas(2).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::Activation, BACKEND, 2);

    let mut desc = OperatorDescriptor::new(
        "act-no-mode",
        OpKind::Activation,
        DType::F32,
        bindings_for(required_inputs(OpKind::Activation, BACKEND)),
        bindings_for(required_outputs(OpKind::Activation, BACKEND)),
        ParamBag::new(),
    );

    let err = desc.init(&ctx, &registry, BACKEND).unwrap_err();
    assert!(matches!(
        err,
        GradForgeError::MissingRequiredParameter { .. }
    ));
    assert_eq!(desc.replica_kernel_count(BACKEND), 0);
    assert!(provider.activity().constructed.is_empty());
}

// Scenario C: a convolution derivative missing its BiasGrad output.
#[test]
fn scenario_c_convolution_derivative_missing_bias_grad_fails() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::ConvolutionDerivative, BACKEND, 1);

    let mut outputs = bindings_for(required_outputs(OpKind::ConvolutionDerivative, BACKEND));
    outputs.remove("BiasGrad");

    let mut desc = OperatorDescriptor::new(
        "conv-back",
        OpKind::ConvolutionDerivative,
        DType::F32,
        bindings_for(required_inputs(OpKind::ConvolutionDerivative, BACKEND)),
        outputs,
        ParamBag::new(),
    );

    let err = desc.init(&ctx, &registry, BACKEND).unwrap_err();
    assert!(matches!(
        err,
        GradForgeError::MissingRoleBinding { ref role, .. } if role == "BiasGrad"
    ));
    assert_eq!(desc.replica_kernel_count(BACKEND), 0);
}

// Scenario D: U32 activation is refused regardless of bindings.
#[test]
fn scenario_d_unsigned_activation_is_refused() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::Activation, BACKEND, 1);

    let mut desc = descriptor_for(OpKind::Activation, DType::U32, BACKEND);
    let err = desc.init(&ctx, &registry, BACKEND).unwrap_err();
    assert!(matches!(err, GradForgeError::UnsupportedDataType { .. }));
    // refused before any construction was attempted
    assert!(provider.activity().constructed.is_empty());
}

#[test]
fn duplicate_and_reshape_accept_unsigned_data() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");

    for kind in [OpKind::Duplicate, OpKind::Reshape] {
        let provider = DummyKernelProvider::new();
        let ctx = ExecutionContext::new(&runtime, &provider);
        let registry = registry_for(kind, BACKEND, 1);

        let mut desc = descriptor_for(kind, DType::U32, BACKEND);
        desc.init(&ctx, &registry, BACKEND)
            .unwrap_or_else(|e| panic!("{} with u32 should initialize: {}", kind, e));
        assert_eq!(desc.replica_kernel_count(BACKEND), 1);
    }
}

#[test]
fn later_replica_failure_rolls_back_earlier_replicas() {
    let runtime = DeviceContext::with_cpu_replicas(3).expect("runtime");
    let provider = DummyKernelProvider::new().fail_initialize_on_replica(2);
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::MaxPooling, BACKEND, 3);

    let mut desc = descriptor_for(OpKind::MaxPooling, DType::F32, BACKEND);
    let err = desc.init(&ctx, &registry, BACKEND).unwrap_err();
    assert!(matches!(
        err,
        GradForgeError::KernelInitFailed { replica: 2, .. }
    ));

    // replicas 0 and 1 were built and bound, but the staging sequence
    // was released as a whole
    assert_eq!(desc.state(), DescriptorState::Failed);
    assert_eq!(desc.replica_kernel_count(BACKEND), 0);
    assert_eq!(provider.activity().constructed.len(), 3);
    assert_eq!(provider.activity().initialize_count, 2);
}

#[test]
fn provider_refusal_fails_init() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new().refuse_construction();
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::CrossEntropyLoss, BACKEND, 1);

    let mut desc = descriptor_for(OpKind::CrossEntropyLoss, DType::F32, BACKEND);
    let err = desc.init(&ctx, &registry, BACKEND).unwrap_err();
    assert!(matches!(
        err,
        GradForgeError::KernelConstructionFailed { .. }
    ));
    assert_eq!(desc.replica_kernel_count(BACKEND), 0);
}

#[test]
fn kernel_binding_rejection_fails_init() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new().reject_binding_role("Weight");
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::DotProductWithBias, BACKEND, 1);

    let mut desc = descriptor_for(OpKind::DotProductWithBias, DType::F32, BACKEND);
    let err = desc.init(&ctx, &registry, BACKEND).unwrap_err();
    assert!(matches!(
        err,
        GradForgeError::BindingRejected { ref role, .. } if role == "Weight"
    ));
    assert_eq!(desc.replica_kernel_count(BACKEND), 0);
}

#[test]
fn missing_tensor_in_registry_fails_init() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);

    // registry is missing every tensor the descriptor names
    let registry = TensorRegistry::new();
    let mut desc = descriptor_for(OpKind::ElementwiseAdd, DType::F32, BACKEND);
    let err = desc.init(&ctx, &registry, BACKEND).unwrap_err();
    assert!(matches!(err, GradForgeError::TensorNotFound(_)));
}
