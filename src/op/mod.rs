//! Operator kinds.
//!
//! An operator kind fixes the exact set of named input/output roles a
//! descriptor must declare, which scalar types it can be specialized
//! for, and whether any of its parameters may be updated between
//! execution passes without re-binding.

pub mod params;

pub use params::{keys, ParamBag, ParamValue};

use std::fmt;

/// The fixed category of computation one descriptor performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Activation,
    ActivationDerivative,
    Convolution,
    ConvolutionDerivative,
    CrossEntropyLoss,
    DotProductWithBias,
    DotProductWithBiasDerivative,
    ElementwiseAdd,
    MaxPooling,
    MaxPoolingDerivative,
    SigmoidCrossEntropyLossDerivative,
    SoftmaxLogLoss,
    SoftmaxLogLossDerivative,
    Duplicate,
    Reshape,
}

impl OpKind {
    /// Every operator kind, in declaration order. Handy for exhaustive
    /// per-kind test grids.
    pub const ALL: [OpKind; 15] = [
        OpKind::Activation,
        OpKind::ActivationDerivative,
        OpKind::Convolution,
        OpKind::ConvolutionDerivative,
        OpKind::CrossEntropyLoss,
        OpKind::DotProductWithBias,
        OpKind::DotProductWithBiasDerivative,
        OpKind::ElementwiseAdd,
        OpKind::MaxPooling,
        OpKind::MaxPoolingDerivative,
        OpKind::SigmoidCrossEntropyLossDerivative,
        OpKind::SoftmaxLogLoss,
        OpKind::SoftmaxLogLossDerivative,
        OpKind::Duplicate,
        OpKind::Reshape,
    ];

    /// The parameter this kind allows to change between execution passes
    /// without re-binding, if any.
    pub fn hot_updatable_parameter(&self) -> Option<&'static str> {
        match self {
            OpKind::ElementwiseAdd => Some(keys::RATE),
            _ => None,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpKind::Activation => "Activation",
            OpKind::ActivationDerivative => "ActivationDerivative",
            OpKind::Convolution => "Convolution",
            OpKind::ConvolutionDerivative => "ConvolutionDerivative",
            OpKind::CrossEntropyLoss => "CrossEntropyLoss",
            OpKind::DotProductWithBias => "DotProductWithBias",
            OpKind::DotProductWithBiasDerivative => "DotProductWithBiasDerivative",
            OpKind::ElementwiseAdd => "ElementwiseAdd",
            OpKind::MaxPooling => "MaxPooling",
            OpKind::MaxPoolingDerivative => "MaxPoolingDerivative",
            OpKind::SigmoidCrossEntropyLossDerivative => "SigmoidCrossEntropyLossDerivative",
            OpKind::SoftmaxLogLoss => "SoftmaxLogLoss",
            OpKind::SoftmaxLogLossDerivative => "SoftmaxLogLossDerivative",
            OpKind::Duplicate => "Duplicate",
            OpKind::Reshape => "Reshape",
        };
        write!(f, "{}", s)
    }
}

/// Transfer function selected by the activation family's `Mode` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationMode {
    Sigmoid,
    Relu,
    Tanh,
    ClippedRelu,
}

impl fmt::Display for ActivationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivationMode::Sigmoid => "sigmoid",
            ActivationMode::Relu => "relu",
            ActivationMode::Tanh => "tanh",
            ActivationMode::ClippedRelu => "clipped_relu",
        };
        write!(f, "{}", s)
    }
}
