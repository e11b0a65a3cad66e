//! Per-kind kernel factory dispatch.
//!
//! A registry maps each operator kind to a builder that knows the
//! kind's supported scalar types, its required input/output roles in
//! fixed resolution order (per backend where the sets differ), and how
//! to lower the parameter bag into construction parameters. Building a
//! replica's kernel walks: dtype gate, parameter resolution, provider
//! construction, then role binding — the first failure drops the
//! just-built kernel so no partial state ever reaches the registry.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::descriptor::OperatorDescriptor;
use crate::error::{ForgeResult, GradForgeError};
use crate::kernel::{Kernel, KernelParams, KernelProvider};
use crate::op::{keys, OpKind, ParamBag};
use crate::runtime::DeviceBackend;
use crate::tensor::{DType, TensorRegistry};

/// Per-kind construction knowledge.
///
/// Default `supports` admits the floating-point types; only the kinds
/// that move raw elements (Duplicate, Reshape) widen it.
trait KindBuilder: Send + Sync {
    fn supports(&self, dtype: DType) -> bool {
        dtype.is_float()
    }

    /// Required input roles in resolution order.
    fn required_inputs(&self, backend: DeviceBackend) -> &'static [&'static str];

    /// Required output roles in resolution order.
    fn required_outputs(&self, backend: DeviceBackend) -> &'static [&'static str];

    /// Lower the parameter bag, applying the kind's documented defaults.
    fn resolve_params(&self, op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
        let _ = (op, bag);
        Ok(KernelParams::None)
    }
}

struct ActivationBuilder;

impl KindBuilder for ActivationBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Input"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Output"]
    }
    fn resolve_params(&self, op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
        let mode = bag.require_mode(op, keys::MODE)?;
        Ok(KernelParams::Activation { mode })
    }
}

struct ActivationDerivativeBuilder;

impl KindBuilder for ActivationDerivativeBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Output", "OutputDelta"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["InputDelta"]
    }
    fn resolve_params(&self, op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
        let mode = bag.require_mode(op, keys::MODE)?;
        Ok(KernelParams::Activation { mode })
    }
}

/// Shared by Convolution and ConvolutionDerivative: stride defaults to 1
/// and zero padding to 0 on each axis, each key read independently.
fn convolution_params(bag: &ParamBag) -> ForgeResult<KernelParams> {
    Ok(KernelParams::Convolution {
        stride_x: bag.uint_or(keys::STRIDE_X, 1)?,
        stride_y: bag.uint_or(keys::STRIDE_Y, 1)?,
        zero_padding_x: bag.uint_or(keys::ZERO_PADDING_X, 0)?,
        zero_padding_y: bag.uint_or(keys::ZERO_PADDING_Y, 0)?,
    })
}

struct ConvolutionBuilder;

impl KindBuilder for ConvolutionBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Input", "FeatureMap", "Bias"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Output"]
    }
    fn resolve_params(&self, _op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
        convolution_params(bag)
    }
}

struct ConvolutionDerivativeBuilder;

impl KindBuilder for ConvolutionDerivativeBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["PrevActivation", "FeatureMap", "OutputGrad"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["FeatureMapGrad", "BiasGrad", "InputGrad"]
    }
    fn resolve_params(&self, _op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
        convolution_params(bag)
    }
}

struct CrossEntropyLossBuilder;

impl KindBuilder for CrossEntropyLossBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Input", "Label"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Cost"]
    }
}

struct DotProductWithBiasBuilder;

impl KindBuilder for DotProductWithBiasBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Input", "Weight", "Bias"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Output"]
    }
    fn resolve_params(&self, _op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
        Ok(KernelParams::DotProduct {
            has_bias: bag.bool_or(keys::HAS_BIAS, true)?,
        })
    }
}

struct DotProductWithBiasDerivativeBuilder;

impl KindBuilder for DotProductWithBiasDerivativeBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["InputActivation", "OutputDelta", "Weight"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["WeightGrad", "BiasGrad", "InputDelta"]
    }
    fn resolve_params(&self, _op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
        Ok(KernelParams::DotProduct {
            has_bias: bag.bool_or(keys::HAS_BIAS, true)?,
        })
    }
}

struct ElementwiseAddBuilder;

impl KindBuilder for ElementwiseAddBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["OperandA", "OperandB"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Result"]
    }
    fn resolve_params(&self, _op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
        Ok(KernelParams::ElementwiseAdd {
            rate: bag.float_or(keys::RATE, 1.0)?,
        })
    }
}

struct MaxPoolingBuilder;

impl KindBuilder for MaxPoolingBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Input"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Output", "SwitchX", "SwitchY"]
    }
}

struct MaxPoolingDerivativeBuilder;

impl KindBuilder for MaxPoolingDerivativeBuilder {
    // The CPU kernel replays the pooling switches; the CUDA kernel
    // recomputes from the forward tensors instead.
    fn required_inputs(&self, backend: DeviceBackend) -> &'static [&'static str] {
        match backend {
            DeviceBackend::Cpu => &["OutputGrad", "SwitchX", "SwitchY"],
            DeviceBackend::Cuda => &["Output", "OutputGrad", "Input"],
        }
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["InputGrad"]
    }
}

struct SigmoidCrossEntropyLossDerivativeBuilder;

impl KindBuilder for SigmoidCrossEntropyLossDerivativeBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Input", "Label"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Output"]
    }
}

struct SoftmaxLogLossBuilder;

impl KindBuilder for SoftmaxLogLossBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Input", "Label"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Cost", "Output"]
    }
}

struct SoftmaxLogLossDerivativeBuilder;

impl KindBuilder for SoftmaxLogLossDerivativeBuilder {
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Output", "Label"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["InputGrad"]
    }
}

struct DuplicateBuilder;

impl KindBuilder for DuplicateBuilder {
    fn supports(&self, _dtype: DType) -> bool {
        true
    }
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["From"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["To"]
    }
}

struct ReshapeBuilder;

impl KindBuilder for ReshapeBuilder {
    fn supports(&self, _dtype: DType) -> bool {
        true
    }
    fn required_inputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &["Tensor"]
    }
    fn required_outputs(&self, _backend: DeviceBackend) -> &'static [&'static str] {
        &[]
    }
    fn resolve_params(&self, op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
        let new_shape = bag.require_dims(op, keys::NEW_SHAPE)?;
        Ok(KernelParams::Reshape { new_shape })
    }
}

static BUILDERS: Lazy<HashMap<OpKind, &'static (dyn KindBuilder)>> = Lazy::new(|| {
    let mut builders: HashMap<OpKind, &'static (dyn KindBuilder)> = HashMap::new();
    builders.insert(OpKind::Activation, &ActivationBuilder);
    builders.insert(OpKind::ActivationDerivative, &ActivationDerivativeBuilder);
    builders.insert(OpKind::Convolution, &ConvolutionBuilder);
    builders.insert(OpKind::ConvolutionDerivative, &ConvolutionDerivativeBuilder);
    builders.insert(OpKind::CrossEntropyLoss, &CrossEntropyLossBuilder);
    builders.insert(OpKind::DotProductWithBias, &DotProductWithBiasBuilder);
    builders.insert(
        OpKind::DotProductWithBiasDerivative,
        &DotProductWithBiasDerivativeBuilder,
    );
    builders.insert(OpKind::ElementwiseAdd, &ElementwiseAddBuilder);
    builders.insert(OpKind::MaxPooling, &MaxPoolingBuilder);
    builders.insert(OpKind::MaxPoolingDerivative, &MaxPoolingDerivativeBuilder);
    builders.insert(
        OpKind::SigmoidCrossEntropyLossDerivative,
        &SigmoidCrossEntropyLossDerivativeBuilder,
    );
    builders.insert(OpKind::SoftmaxLogLoss, &SoftmaxLogLossBuilder);
    builders.insert(
        OpKind::SoftmaxLogLossDerivative,
        &SoftmaxLogLossDerivativeBuilder,
    );
    builders.insert(OpKind::Duplicate, &DuplicateBuilder);
    builders.insert(OpKind::Reshape, &ReshapeBuilder);
    builders
});

fn builder_for(kind: OpKind) -> &'static dyn KindBuilder {
    BUILDERS[&kind]
}

/// Whether `kind` can be specialized for `dtype`.
pub fn supports_dtype(kind: OpKind, dtype: DType) -> bool {
    builder_for(kind).supports(dtype)
}

/// The input roles `kind` requires on `backend`, in resolution order.
pub fn required_inputs(kind: OpKind, backend: DeviceBackend) -> &'static [&'static str] {
    builder_for(kind).required_inputs(backend)
}

/// The output roles `kind` requires on `backend`, in resolution order.
pub fn required_outputs(kind: OpKind, backend: DeviceBackend) -> &'static [&'static str] {
    builder_for(kind).required_outputs(backend)
}

/// Lower a descriptor's parameter bag into construction parameters for
/// its kind, applying defaults and rejecting missing required keys.
pub fn resolve_params(kind: OpKind, op: &str, bag: &ParamBag) -> ForgeResult<KernelParams> {
    builder_for(kind).resolve_params(op, bag)
}

/// Build and bind one replica's kernel for a descriptor.
///
/// Runs the full construction sequence: dtype gate, parameter
/// resolution, provider construction, then resolution of every required
/// input and output role in the kind's fixed order. Any failure drops
/// the partially bound kernel and surfaces the error; the tensor
/// registry never observes a half-wired kernel.
pub fn build_kernel(
    desc: &mut OperatorDescriptor,
    provider: &dyn KernelProvider,
    registry: &TensorRegistry,
    backend: DeviceBackend,
    replica: usize,
) -> ForgeResult<Box<dyn Kernel>> {
    let kind = desc.kind();
    let dtype = desc.data_type();
    let builder = builder_for(kind);

    if !builder.supports(dtype) {
        return Err(GradForgeError::UnsupportedDataType { kind, dtype });
    }

    let params = builder.resolve_params(desc.name(), desc.params())?;

    let mut kernel = provider
        .construct(kind, dtype, backend, replica, &params)
        .ok_or(GradForgeError::KernelConstructionFailed { kind, dtype })?;

    for role in builder.required_inputs(backend) {
        desc.resolve_input(kernel.as_mut(), role, registry, backend, replica)?;
    }
    for role in builder.required_outputs(backend) {
        desc.resolve_output(kernel.as_mut(), role, registry, backend, replica)?;
    }

    Ok(kernel)
}
