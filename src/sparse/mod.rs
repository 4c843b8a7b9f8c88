//! Sparse compressed tensor support
//!
//! This module provides the compressed sparse format family (CSR, CSC, BSR,
//! BSC), generalized across optional leading batch dimensions and trailing
//! dense dimensions, with a fixed block size for the blocked variants.
//!
//! Four cooperating pieces:
//!
//! - [`SparseLayout`] — per-variant layout descriptor (block dimensions,
//!   row/column majorness, buffer naming).
//! - [`validate_sparse_compressed_args`] — the invariant validator: accepts
//!   raw buffers plus a claimed shape or rejects them with a precise
//!   diagnosis.
//! - [`estimate_sparse_compressed_size`] — derives the minimal enclosing
//!   shape when the caller supplies none.
//! - [`SparseCompressedTensor`] — the validated tensor plus derived
//!   operations (resize, copy, clone, select, accessors).
//!
//! # Usage
//!
//! ```
//! use sparc::prelude::*;
//! use sparc::runtime::cpu::CpuDevice;
//!
//! let device = CpuDevice::new();
//! let crow = Tensor::<CpuRuntime>::from_slice(&[0i64, 1, 2, 3], &[4], &device);
//! let col = Tensor::<CpuRuntime>::from_slice(&[0i64, 1, 2], &[3], &device);
//! let values = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 1.0, 1.0], &[3], &device);
//!
//! let t = SparseCompressedTensor::csr(crow, col, values, vec![3, 3])?;
//! assert_eq!(t.nnz(), 3);
//! # Ok::<(), sparc::error::Error>(())
//! ```

mod compressed;
mod estimate;
mod layout;
mod validate;

pub use compressed::SparseCompressedTensor;
pub use estimate::estimate_sparse_compressed_size;
pub use layout::SparseLayout;
pub use validate::{
    validate_sparse_bsc_args, validate_sparse_bsr_args, validate_sparse_compressed_args,
    validate_sparse_csc_args, validate_sparse_csr_args,
};

/// Macro for dispatch over the admissible sparse index dtypes (i32, i64).
///
/// Binds `T` to the corresponding Rust type and executes the block; any
/// other dtype returns `UnsupportedDType`.
macro_rules! dispatch_index_dtype {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {
        match $dtype {
            $crate::dtype::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::dtype::DType::I64 => {
                type $T = i64;
                $body
            }
            other => {
                return Err($crate::error::Error::UnsupportedDType {
                    dtype: other,
                    op: $error_op,
                })
            }
        }
    };
}

pub(crate) use dispatch_index_dtype;
