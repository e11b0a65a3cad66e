//! Operator parameter bag.
//!
//! Parameters travel from the graph builder to the kernel factory as a
//! closed tagged variant, so every lookup is an exhaustive match: a key
//! that is present with the wrong variant is a construction error, never
//! a silent fallback to a default.

use std::collections::HashMap;

use crate::error::{ForgeResult, GradForgeError};
use crate::op::ActivationMode;
use crate::tensor::Shape;

/// Well-known parameter keys.
pub mod keys {
    pub const MODE: &str = "Mode";
    pub const STRIDE_X: &str = "StrideX";
    pub const STRIDE_Y: &str = "StrideY";
    pub const ZERO_PADDING_X: &str = "ZeroPaddingX";
    pub const ZERO_PADDING_Y: &str = "ZeroPaddingY";
    pub const HAS_BIAS: &str = "HasBias";
    pub const RATE: &str = "Rate";
    pub const NEW_SHAPE: &str = "NewShape";
}

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    UInt(usize),
    Float(f32),
    Bool(bool),
    Mode(ActivationMode),
    Dims(Shape),
}

/// Named, heterogeneous configuration attached to one operator node.
#[derive(Debug, Clone, Default)]
pub struct ParamBag {
    values: HashMap<String, ParamValue>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Optional unsigned integer with a documented default.
    pub fn uint_or(&self, name: &str, default: usize) -> ForgeResult<usize> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::UInt(v)) => Ok(*v),
            Some(_) => Err(GradForgeError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: "unsigned integer",
            }),
        }
    }

    /// Optional float with a documented default.
    pub fn float_or(&self, name: &str, default: f32) -> ForgeResult<f32> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(_) => Err(GradForgeError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: "float",
            }),
        }
    }

    /// Optional bool with a documented default.
    pub fn bool_or(&self, name: &str, default: bool) -> ForgeResult<bool> {
        match self.values.get(name) {
            None => Ok(default),
            Some(ParamValue::Bool(v)) => Ok(*v),
            Some(_) => Err(GradForgeError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: "bool",
            }),
        }
    }

    /// Optional float with no default; `None` when the key is absent.
    pub fn float_opt(&self, name: &str) -> ForgeResult<Option<f32>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Float(v)) => Ok(Some(*v)),
            Some(_) => Err(GradForgeError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: "float",
            }),
        }
    }

    /// Required activation mode; absence is a construction failure.
    pub fn require_mode(&self, op: &str, name: &str) -> ForgeResult<ActivationMode> {
        match self.values.get(name) {
            None => Err(GradForgeError::MissingRequiredParameter {
                op: op.to_string(),
                name: name.to_string(),
            }),
            Some(ParamValue::Mode(mode)) => Ok(*mode),
            Some(_) => Err(GradForgeError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: "activation mode",
            }),
        }
    }

    /// Required shape; absence is a construction failure.
    pub fn require_dims(&self, op: &str, name: &str) -> ForgeResult<Shape> {
        match self.values.get(name) {
            None => Err(GradForgeError::MissingRequiredParameter {
                op: op.to_string(),
                name: name.to_string(),
            }),
            Some(ParamValue::Dims(shape)) => Ok(shape.clone()),
            Some(_) => Err(GradForgeError::ParameterTypeMismatch {
                name: name.to_string(),
                expected: "shape",
            }),
        }
    }
}
