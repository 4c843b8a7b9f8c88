//! Error types for sparc

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using sparc's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sparc operations
#[derive(Error, Debug)]
pub enum Error {
    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Invalid dimension index
    #[error("Invalid dimension {dim} for tensor with {ndim} dimensions")]
    InvalidDimension {
        /// The invalid dimension
        dim: isize,
        /// Number of dimensions
        ndim: usize,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// DType mismatch between operands
    #[error("DType mismatch: {lhs:?} vs {rhs:?}")]
    DTypeMismatch {
        /// Left-hand side dtype
        lhs: DType,
        /// Right-hand side dtype
        rhs: DType,
    },

    /// Device mismatch between operands
    #[error("Device mismatch: tensors must be on the same device")]
    DeviceMismatch,

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Tensor is not contiguous when contiguous memory is required
    #[error("Operation requires contiguous tensor")]
    NotContiguous,

    /// Structural invariant violation of a sparse compressed tensor
    ///
    /// Covers shape, rank, dtype, and contiguity failures detected before
    /// any index data is read. The buffer name is resolved through the
    /// layout descriptor, so CSR and CSC tensors report `crow_indices` and
    /// `ccol_indices` respectively.
    #[error("Invalid sparse structure in '{buffer}': {reason}")]
    InvalidSparseStructure {
        /// Name of the offending buffer (or "size" for the declared shape)
        buffer: &'static str,
        /// Reason with expected vs actual values
        reason: String,
    },

    /// Content invariant violation in sparse index data
    ///
    /// Raised by the validator's per-batch scan of compressed and plain
    /// index buffers: monotonicity, bounds, or uniqueness failures.
    #[error("Invalid sparse indices in '{buffer}' at batch {batch}, position {offset}: {reason}")]
    InvalidSparseIndices {
        /// Name of the offending index buffer
        buffer: &'static str,
        /// Flattened batch index of the failing slice
        batch: usize,
        /// Offset within the slice's last axis
        offset: usize,
        /// Reason with the violated relation
        reason: String,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Feature not yet implemented
    #[error("Not implemented: {feature}")]
    NotImplemented {
        /// Description of the unimplemented feature
        feature: &'static str,
    },
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create a structural sparse invariant error
    pub fn invalid_structure(buffer: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSparseStructure {
            buffer,
            reason: reason.into(),
        }
    }

    /// Create a content sparse invariant error
    pub fn invalid_indices(
        buffer: &'static str,
        batch: usize,
        offset: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSparseIndices {
            buffer,
            batch,
            offset,
            reason: reason.into(),
        }
    }
}
