//! # sparc
//!
//! **Sparse compressed tensor core for Rust.**
//!
//! sparc provides the construction and invariant-checking logic for sparse
//! compressed matrix formats (CSR, CSC, BSR, BSC), generalized across
//! optional leading batch dimensions and trailing dense dimensions, with a
//! fixed block size for the blocked variants.
//!
//! Given raw index/value buffers and a claimed logical shape, the validator
//! either rejects them with a precise diagnosis or accepts them as a
//! well-formed sparse compressed tensor; conversely, the shape estimator
//! derives a minimal enclosing shape when the caller does not supply one.
//!
//! ## Features
//!
//! - **Four-format family**: CSR, CSC, BSR, BSC handled uniformly through
//!   one layout descriptor
//! - **Batched and dense-valued**: leading batch dimensions over independent
//!   matrices, trailing dense payload per stored element
//! - **Checked and trusted construction**: a validating public constructor
//!   plus an explicit unchecked fast path for internal call sites
//! - **Derived operations**: resize, bulk copy, deep clone, batch select,
//!   dense expansion
//! - **Device-generic**: buffers live behind the `Runtime` trait; the CPU
//!   backend is included
//!
//! ## Quick Start
//!
//! ```
//! use sparc::prelude::*;
//! use sparc::runtime::cpu::CpuDevice;
//!
//! let device = CpuDevice::new();
//!
//! // 3x3 identity in CSR form
//! let crow = Tensor::<CpuRuntime>::from_slice(&[0i64, 1, 2, 3], &[4], &device);
//! let col = Tensor::<CpuRuntime>::from_slice(&[0i64, 1, 2], &[3], &device);
//! let values = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 1.0, 1.0], &[3], &device);
//!
//! let t = SparseCompressedTensor::csr(crow, col, values, vec![3, 3])?;
//! assert_eq!(t.nnz(), 3);
//! # Ok::<(), sparc::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): parallel fan-out of the per-batch content checks

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dtype;
pub mod error;
pub mod runtime;
pub mod sparse;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::runtime::cpu::CpuRuntime;
    pub use crate::runtime::{Device, Runtime, RuntimeClient};
    pub use crate::sparse::{SparseCompressedTensor, SparseLayout};
    pub use crate::tensor::Tensor;
}
