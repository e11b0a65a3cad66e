//! Scalar data types for tensor storage and kernel specialization.

use std::fmt;

/// Scalar element type carried by a descriptor and its tensors.
///
/// The data type selects which concrete kernel specialization the factory
/// instantiates. Most operator kinds only support the floating-point
/// types; `U32` is accepted by `Duplicate` and `Reshape` alone, and the
/// factory refuses it everywhere else before any kernel is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    U32,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
            DType::U32 => 4,
        }
    }

    /// Whether this dtype is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::U32 => "u32",
        };
        write!(f, "{}", s)
    }
}
