//! Kernel factory dispatch tests over the public API

mod common;

use common::{descriptor_for, registry_for, required_params};
use gradforge::{
    DType, DeviceBackend, DeviceContext, DummyKernelProvider, ExecutionContext, GradForgeError,
    KernelParams, OpKind, ParamValue, RuntimeConfig, Shape,
};

#[test]
fn unsigned_data_is_refused_for_every_kind_but_duplicate_and_reshape() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");

    for kind in OpKind::ALL {
        let provider = DummyKernelProvider::new();
        let ctx = ExecutionContext::new(&runtime, &provider);
        let registry = registry_for(kind, DeviceBackend::Cpu, 1);

        let mut desc = descriptor_for(kind, DType::U32, DeviceBackend::Cpu);
        let result = desc.init(&ctx, &registry, DeviceBackend::Cpu);

        if matches!(kind, OpKind::Duplicate | OpKind::Reshape) {
            result.unwrap_or_else(|e| panic!("{} must accept u32: {}", kind, e));
        } else {
            let err = result.expect_err(&format!("{} must refuse u32", kind));
            assert!(
                matches!(err, GradForgeError::UnsupportedDataType { .. }),
                "{}: unexpected error {}",
                kind,
                err
            );
            assert!(
                provider.activity().constructed.is_empty(),
                "{}: refused before construction",
                kind
            );
        }
    }
}

#[test]
fn construction_parameters_carry_documented_defaults() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");

    let cases = [
        (
            OpKind::Convolution,
            KernelParams::Convolution {
                stride_x: 1,
                stride_y: 1,
                zero_padding_x: 0,
                zero_padding_y: 0,
            },
        ),
        (OpKind::DotProductWithBias, KernelParams::DotProduct { has_bias: true }),
        (OpKind::ElementwiseAdd, KernelParams::ElementwiseAdd { rate: 1.0 }),
        (OpKind::CrossEntropyLoss, KernelParams::None),
    ];

    for (kind, expected) in cases {
        let provider = DummyKernelProvider::new();
        let ctx = ExecutionContext::new(&runtime, &provider);
        let registry = registry_for(kind, DeviceBackend::Cpu, 1);

        let mut desc = descriptor_for(kind, DType::F32, DeviceBackend::Cpu);
        desc.init(&ctx, &registry, DeviceBackend::Cpu).expect("init");

        let activity = provider.activity();
        assert_eq!(activity.constructed.len(), 1);
        assert_eq!(activity.constructed[0].params, expected, "{}", kind);
    }
}

#[test]
fn explicit_parameters_override_defaults() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::Convolution, DeviceBackend::Cpu, 1);

    let mut desc = gradforge::OperatorDescriptor::new(
        "conv1",
        OpKind::Convolution,
        DType::F32,
        common::bindings_for(gradforge::kernel::factory::required_inputs(
            OpKind::Convolution,
            DeviceBackend::Cpu,
        )),
        common::bindings_for(gradforge::kernel::factory::required_outputs(
            OpKind::Convolution,
            DeviceBackend::Cpu,
        )),
        required_params(OpKind::Convolution)
            .with(gradforge::keys::STRIDE_X, ParamValue::UInt(2))
            .with(gradforge::keys::STRIDE_Y, ParamValue::UInt(2))
            .with(gradforge::keys::ZERO_PADDING_X, ParamValue::UInt(1))
            .with(gradforge::keys::ZERO_PADDING_Y, ParamValue::UInt(1)),
    );
    desc.init(&ctx, &registry, DeviceBackend::Cpu).expect("init");

    assert_eq!(
        provider.activity().constructed[0].params,
        KernelParams::Convolution {
            stride_x: 2,
            stride_y: 2,
            zero_padding_x: 1,
            zero_padding_y: 1,
        }
    );
}

#[test]
fn wrong_typed_parameter_fails_construction() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::ElementwiseAdd, DeviceBackend::Cpu, 1);

    let mut desc = gradforge::OperatorDescriptor::new(
        "add1",
        OpKind::ElementwiseAdd,
        DType::F32,
        common::bindings_for(gradforge::kernel::factory::required_inputs(
            OpKind::ElementwiseAdd,
            DeviceBackend::Cpu,
        )),
        common::bindings_for(gradforge::kernel::factory::required_outputs(
            OpKind::ElementwiseAdd,
            DeviceBackend::Cpu,
        )),
        gradforge::ParamBag::new().with(gradforge::keys::RATE, ParamValue::Bool(true)),
    );

    let err = desc.init(&ctx, &registry, DeviceBackend::Cpu).unwrap_err();
    assert!(matches!(err, GradForgeError::ParameterTypeMismatch { .. }));
    assert!(provider.activity().constructed.is_empty());
}

#[test]
fn roles_are_bound_in_the_kinds_fixed_order() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::ConvolutionDerivative, DeviceBackend::Cpu, 1);

    let mut desc = descriptor_for(OpKind::ConvolutionDerivative, DType::F32, DeviceBackend::Cpu);
    desc.init(&ctx, &registry, DeviceBackend::Cpu).expect("init");

    let activity = provider.activity();
    let input_roles: Vec<&str> = activity
        .bound_inputs
        .iter()
        .map(|(_, role)| role.as_str())
        .collect();
    let output_roles: Vec<&str> = activity
        .bound_outputs
        .iter()
        .map(|(_, role)| role.as_str())
        .collect();
    assert_eq!(input_roles, ["PrevActivation", "FeatureMap", "OutputGrad"]);
    assert_eq!(output_roles, ["FeatureMapGrad", "BiasGrad", "InputGrad"]);
}

#[test]
fn max_pooling_derivative_binds_backend_specific_roles() {
    let runtime = DeviceContext::new(
        RuntimeConfig::new()
            .with_cpu_replicas(1)
            .with_cuda_replicas(1),
    )
    .expect("runtime");

    // CPU form replays the pooling switches
    {
        let provider = DummyKernelProvider::new();
        let ctx = ExecutionContext::new(&runtime, &provider);
        let registry = registry_for(OpKind::MaxPoolingDerivative, DeviceBackend::Cpu, 1);

        let mut desc = descriptor_for(OpKind::MaxPoolingDerivative, DType::F32, DeviceBackend::Cpu);
        desc.init(&ctx, &registry, DeviceBackend::Cpu).expect("init");

        let activity = provider.activity();
        let roles: Vec<&str> = activity
            .bound_inputs
            .iter()
            .map(|(_, role)| role.as_str())
            .collect::<Vec<_>>();
        assert_eq!(roles, ["OutputGrad", "SwitchX", "SwitchY"]);
    }

    // CUDA form recomputes from the forward tensors
    {
        let provider = DummyKernelProvider::new();
        let ctx = ExecutionContext::new(&runtime, &provider);
        let registry = registry_for(OpKind::MaxPoolingDerivative, DeviceBackend::Cuda, 1);

        let mut desc =
            descriptor_for(OpKind::MaxPoolingDerivative, DType::F32, DeviceBackend::Cuda);
        desc.init(&ctx, &registry, DeviceBackend::Cuda).expect("init");

        let activity = provider.activity();
        let roles: Vec<&str> = activity
            .bound_inputs
            .iter()
            .map(|(_, role)| role.as_str())
            .collect::<Vec<_>>();
        assert_eq!(roles, ["Output", "OutputGrad", "Input"]);
    }
}

#[test]
fn reshape_kind_requires_its_new_shape_parameter() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::Reshape, DeviceBackend::Cpu, 1);

    let mut desc = gradforge::OperatorDescriptor::new(
        "reshape1",
        OpKind::Reshape,
        DType::F32,
        common::bindings_for(gradforge::kernel::factory::required_inputs(
            OpKind::Reshape,
            DeviceBackend::Cpu,
        )),
        std::collections::HashMap::new(),
        gradforge::ParamBag::new(),
    );

    let err = desc.init(&ctx, &registry, DeviceBackend::Cpu).unwrap_err();
    assert!(matches!(
        err,
        GradForgeError::MissingRequiredParameter { ref name, .. } if name == "NewShape"
    ));
}

#[test]
fn reshape_parameter_reaches_the_provider() {
    let runtime = DeviceContext::with_cpu_replicas(1).expect("runtime");
    let provider = DummyKernelProvider::new();
    let ctx = ExecutionContext::new(&runtime, &provider);
    let registry = registry_for(OpKind::Reshape, DeviceBackend::Cpu, 1);

    let mut desc = descriptor_for(OpKind::Reshape, DType::F64, DeviceBackend::Cpu);
    desc.init(&ctx, &registry, DeviceBackend::Cpu).expect("init");

    assert_eq!(
        provider.activity().constructed[0].params,
        KernelParams::Reshape {
            new_shape: Shape::from([2, 2])
        }
    );
}
