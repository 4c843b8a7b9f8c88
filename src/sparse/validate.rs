//! Invariant validation for sparse compressed tensors
//!
//! The validator consumes raw index/value buffers plus a claimed logical
//! shape and either accepts them as a well-formed sparse compressed tensor
//! or rejects them with a precise diagnosis. Checks run strictly ordered so
//! cheap structural failures surface before any O(n) scan of index data,
//! and the first violation short-circuits.

use super::dispatch_index_dtype;
use super::layout::SparseLayout;
use crate::dtype::DTypeSet;
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};
use crate::tensor::Tensor;

/// Number of base (matrix) dimensions of every sparse compressed tensor
pub(crate) const BASE_NDIM: usize = 2;

/// Check the rank arithmetic shared by the validator and the estimator
///
/// Verifies that the compressed indices carry at least one dimension, that
/// both index buffers have equal rank, and that the values rank leaves a
/// non-negative number of dense dimensions. Returns
/// `(batch_ndim, dense_ndim)`.
pub(crate) fn rank_arithmetic<R: Runtime>(
    compressed_indices: &Tensor<R>,
    plain_indices: &Tensor<R>,
    values: &Tensor<R>,
    layout: SparseLayout,
) -> Result<(usize, usize)> {
    let compressed_name = layout.compressed_indices_name();
    let plain_name = layout.plain_indices_name();

    if compressed_indices.ndim() < 1 {
        return Err(Error::invalid_structure(
            compressed_name,
            format!(
                "{compressed_name} must have dimensionality >= 1 but got {}",
                compressed_indices.ndim()
            ),
        ));
    }
    let batch_ndim = compressed_indices.ndim() - 1;

    if compressed_indices.ndim() != plain_indices.ndim() {
        return Err(Error::invalid_structure(
            plain_name,
            format!(
                "{compressed_name} and {plain_name} dimensionalities must be equal but got {} and {}, respectively",
                compressed_indices.ndim(),
                plain_indices.ndim()
            ),
        ));
    }

    let block_ndim = layout.block_ndim();
    if values.ndim() < batch_ndim + block_ndim + 1 {
        return Err(Error::invalid_structure(
            "values",
            format!(
                "values must have dimensionality > sum of batch and block dimensionalities (={batch_ndim} + {block_ndim}) but got {}",
                values.ndim()
            ),
        ));
    }
    let dense_ndim = values.ndim() - batch_ndim - block_ndim - 1;

    Ok((batch_ndim, dense_ndim))
}

/// Block size implied by the values shape
///
/// For blocked layouts the two axes after the nnz axis give the block
/// shape, each taken as 1 if that axis does not exist (degenerate). For
/// non-blocked layouts the block size is fixed at (1, 1), which unifies the
/// CSR/CSC invariants with the BSR/BSC ones.
pub(crate) fn values_blocksize<R: Runtime>(
    values: &Tensor<R>,
    batch_ndim: usize,
    block_ndim: usize,
) -> [usize; 2] {
    if block_ndim == 2 {
        [
            values.shape().get(batch_ndim + 1).copied().unwrap_or(1).max(1),
            values.shape().get(batch_ndim + 2).copied().unwrap_or(1).max(1),
        ]
    } else {
        [1, 1]
    }
}

/// Number of stored elements implied by the values shape
pub(crate) fn values_nnz<R: Runtime>(values: &Tensor<R>, batch_ndim: usize) -> usize {
    if values.numel() != 0 {
        values.shape()[batch_ndim]
    } else {
        0
    }
}

/// Validate the arguments to sparse compressed tensor factory functions
///
/// Accepts buffers for any of the four layouts (CSR, CSC, BSR, BSC),
/// generalized over batch and dense dimensions. On failure the error names
/// the offending buffer through the layout descriptor and carries the
/// actual vs expected values; content errors additionally carry the batch
/// index and local offset.
///
/// Validation never mutates its inputs. Index buffers on a non-host device
/// are scanned through a transient host copy.
pub fn validate_sparse_compressed_args<R: Runtime>(
    compressed_indices: &Tensor<R>,
    plain_indices: &Tensor<R>,
    values: &Tensor<R>,
    size: &[usize],
    layout: SparseLayout,
) -> Result<()> {
    let compressed_name = layout.compressed_indices_name();
    let plain_name = layout.plain_indices_name();

    // Storage invariants: contiguity first, then index dtypes. Offsets into
    // the index buffers are read by raw linear position, so non-trivial
    // strides are rejected outright.
    for (tensor, name) in [
        (compressed_indices, compressed_name),
        (plain_indices, plain_name),
        (values, "values"),
    ] {
        if !tensor.is_contiguous() {
            return Err(Error::invalid_structure(
                name,
                format!("expected {name} to be a contiguous tensor"),
            ));
        }
    }

    if compressed_indices.dtype() != plain_indices.dtype() {
        return Err(Error::invalid_structure(
            plain_name,
            format!(
                "{compressed_name} and {plain_name} must have the same dtype, but got {} and {}, respectively",
                compressed_indices.dtype(),
                plain_indices.dtype()
            ),
        ));
    }
    let index_dtype = compressed_indices.dtype();
    if !DTypeSet::INDEX.contains(index_dtype) {
        return Err(Error::invalid_structure(
            compressed_name,
            format!(
                "{compressed_name} and {plain_name} dtype must be i32 or i64, but got {index_dtype}"
            ),
        ));
    }

    // Rank invariants
    let (batch_ndim, dense_ndim) =
        rank_arithmetic(compressed_indices, plain_indices, values, layout)?;
    let block_ndim = layout.block_ndim();

    if size.len() != batch_ndim + BASE_NDIM + dense_ndim {
        return Err(Error::invalid_structure(
            "size",
            format!(
                "tensor dimensionality must be sum of batch, base, and dense dimensionalities (={batch_ndim} + {BASE_NDIM} + {dense_ndim}) but got {}",
                size.len()
            ),
        ));
    }

    // All batch sizes must be the same and consistent with the tensor batch size
    let batchsize = &size[..batch_ndim];
    for (tensor, name) in [
        (compressed_indices, compressed_name),
        (plain_indices, plain_name),
        (values, "values"),
    ] {
        let buffer_batch = &tensor.shape()[..batch_ndim];
        if buffer_batch != batchsize {
            return Err(Error::invalid_structure(
                name,
                format!(
                    "batch dimensions of {name} (={buffer_batch:?}) must be equal to tensor batch dimensions (={batchsize:?})"
                ),
            ));
        }
    }

    // A tensor constitutes of full blocks
    let blocksize = values_blocksize(values, batch_ndim, block_ndim);
    for i in 0..block_ndim {
        if size[batch_ndim + i] % blocksize[i] != 0 {
            return Err(Error::invalid_structure(
                "size",
                format!(
                    "tensor shape[{}] (={}) must be divisible with blocksize[{i}] (={}) as defined by values shape",
                    batch_ndim + i,
                    size[batch_ndim + i],
                    blocksize[i]
                ),
            ));
        }
    }

    let nrows = size[batch_ndim] / blocksize[0];
    let ncols = size[batch_ndim + 1] / blocksize[1];
    let (ncompressed, nplain) = if layout.is_row_major() {
        (nrows, ncols)
    } else {
        (ncols, nrows)
    };

    // Count invariants relating the declared size to the buffer shapes
    let compressed_last = compressed_indices.shape()[batch_ndim];
    if compressed_last != ncompressed + 1 {
        return Err(Error::invalid_structure(
            compressed_name,
            format!(
                "{compressed_name}.shape[-1] must be equal to the number of {}s + 1 (={}), but got {compressed_last}",
                layout.compressed_dim_name(),
                ncompressed + 1
            ),
        ));
    }

    let nnz = values_nnz(values, batch_ndim);
    let plain_last = plain_indices.shape()[batch_ndim];
    if plain_last != nnz {
        return Err(Error::invalid_structure(
            plain_name,
            format!(
                "{plain_name}.shape[-1] must be equal to nnz (={nnz}) as defined by values.shape[{batch_ndim}], but got {plain_last}"
            ),
        ));
    }

    // Content invariants: skipped for the degenerate all-zero matrix
    if plain_indices.numel() > 0 {
        let batch_count: usize = compressed_indices.shape()[..batch_ndim].iter().product();
        dispatch_index_dtype!(index_dtype, I => {
            let compressed_host: Vec<I> = compressed_indices.to_vec();
            let plain_host: Vec<I> = plain_indices.to_vec();
            check_batch_content::<I>(
                &compressed_host,
                &plain_host,
                batch_count,
                ncompressed,
                nplain,
                nnz,
                layout,
            )?;
        }, "validate_sparse_compressed_args");
    }

    // Device invariants: all three buffers must reside on one device. The
    // set of supported compute devices is the set of Runtime
    // implementations, so membership is enforced by the type parameter.
    if !compressed_indices.device().is_same(values.device())
        || !plain_indices.device().is_same(values.device())
    {
        return Err(Error::DeviceMismatch);
    }

    Ok(())
}

/// Per-batch scan of the index buffers
///
/// Walks the compressed offsets once per batch slice and, for each run, the
/// corresponding plain indices, checking monotonicity, bounds, and strict
/// increase within a run. Index arithmetic is over the owned host copies:
/// the batch strides are `ncompressed + 1` and `nnz`, which the structural
/// checks have already pinned down.
///
/// Batch slices are independent, so the scan fans out across them; the
/// reported error is always the one for the lowest failing batch index.
fn check_batch_content<I>(
    compressed: &[I],
    plain: &[I],
    batch_count: usize,
    ncompressed: usize,
    nplain: usize,
    nnz: usize,
    layout: SparseLayout,
) -> Result<()>
where
    I: Copy + Into<i64> + Send + Sync,
{
    let compressed_name = layout.compressed_indices_name();
    let plain_name = layout.plain_indices_name();
    let compressed_stride = ncompressed + 1;
    let plain_stride = nnz;

    let check_slice = |batch_id: usize| -> Result<()> {
        let c = &compressed[batch_id * compressed_stride..(batch_id + 1) * compressed_stride];
        let p = &plain[batch_id * plain_stride..(batch_id + 1) * plain_stride];

        let mut start: i64 = c[0].into();
        if start != 0 {
            return Err(Error::invalid_indices(
                compressed_name,
                batch_id,
                0,
                format!("{compressed_name}[..., 0] (={start}) == 0 is unsatisfied"),
            ));
        }
        for i in 1..=ncompressed {
            let end: i64 = c[i].into();
            if end > nnz as i64 {
                return Err(Error::invalid_indices(
                    compressed_name,
                    batch_id,
                    i,
                    format!("{compressed_name}[..., {i}] (={end}) <= nnz (={nnz}) is unsatisfied"),
                ));
            }
            if start > end {
                return Err(Error::invalid_indices(
                    compressed_name,
                    batch_id,
                    i,
                    format!(
                        "{compressed_name} must be an ordered sequence, but {compressed_name}[..., {}] (={start}) <= {compressed_name}[..., {i}] (={end}) is unsatisfied",
                        i - 1
                    ),
                ));
            }
            if end - start > nplain as i64 {
                return Err(Error::invalid_indices(
                    compressed_name,
                    batch_id,
                    i,
                    format!(
                        "{compressed_name}[..., {i}] (={end}) - {compressed_name}[..., {}] (={start}) <= number of {}s (={nplain}) is unsatisfied",
                        i - 1,
                        layout.plain_dim_name()
                    ),
                ));
            }
            let mut last_plain: i64 = -1;
            for n in start..end {
                let plain_index: i64 = p[n as usize].into();
                if plain_index < 0 || plain_index >= nplain as i64 {
                    return Err(Error::invalid_indices(
                        plain_name,
                        batch_id,
                        n as usize,
                        format!(
                            "{plain_name}[..., {n}] (={plain_index}) is out of range (0, {nplain})"
                        ),
                    ));
                }
                if plain_index <= last_plain {
                    return Err(Error::invalid_indices(
                        plain_name,
                        batch_id,
                        n as usize,
                        format!(
                            "{plain_name} must be an ordered sequence of distinct integers, but {plain_name}[..., {}] (={last_plain}) < {plain_name}[..., {n}] (={plain_index}) is unsatisfied",
                            n - 1
                        ),
                    ));
                }
                last_plain = plain_index;
            }
            start = end;
        }
        if start != nnz as i64 {
            return Err(Error::invalid_indices(
                compressed_name,
                batch_id,
                ncompressed,
                format!(
                    "{compressed_name}[..., {ncompressed}] (={start}) == nnz (={nnz}) is unsatisfied"
                ),
            ));
        }
        Ok(())
    };

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        let first_err = (0..batch_count)
            .into_par_iter()
            .filter_map(|batch_id| check_slice(batch_id).err().map(|err| (batch_id, err)))
            .min_by_key(|(batch_id, _)| *batch_id);
        return match first_err {
            Some((_, err)) => Err(err),
            None => Ok(()),
        };
    }

    #[cfg(not(feature = "rayon"))]
    {
        for batch_id in 0..batch_count {
            check_slice(batch_id)?;
        }
        Ok(())
    }
}

/// Validate the arguments to the CSR tensor factory functions
pub fn validate_sparse_csr_args<R: Runtime>(
    crow_indices: &Tensor<R>,
    col_indices: &Tensor<R>,
    values: &Tensor<R>,
    size: &[usize],
) -> Result<()> {
    validate_sparse_compressed_args(crow_indices, col_indices, values, size, SparseLayout::Csr)
}

/// Validate the arguments to the CSC tensor factory functions
pub fn validate_sparse_csc_args<R: Runtime>(
    ccol_indices: &Tensor<R>,
    row_indices: &Tensor<R>,
    values: &Tensor<R>,
    size: &[usize],
) -> Result<()> {
    validate_sparse_compressed_args(ccol_indices, row_indices, values, size, SparseLayout::Csc)
}

/// Validate the arguments to the BSR tensor factory functions
pub fn validate_sparse_bsr_args<R: Runtime>(
    crow_indices: &Tensor<R>,
    col_indices: &Tensor<R>,
    values: &Tensor<R>,
    size: &[usize],
) -> Result<()> {
    validate_sparse_compressed_args(crow_indices, col_indices, values, size, SparseLayout::Bsr)
}

/// Validate the arguments to the BSC tensor factory functions
pub fn validate_sparse_bsc_args<R: Runtime>(
    ccol_indices: &Tensor<R>,
    row_indices: &Tensor<R>,
    values: &Tensor<R>,
    size: &[usize],
) -> Result<()> {
    validate_sparse_compressed_args(ccol_indices, row_indices, values, size, SparseLayout::Bsc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    fn csr_3x3_identity(
        device: &CpuDevice,
    ) -> (Tensor<CpuRuntime>, Tensor<CpuRuntime>, Tensor<CpuRuntime>) {
        let crow = Tensor::from_slice(&[0i64, 1, 2, 3], &[4], device);
        let col = Tensor::from_slice(&[0i64, 1, 2], &[3], device);
        let values = Tensor::from_slice(&[1.0f32, 1.0, 1.0], &[3], device);
        (crow, col, values)
    }

    #[test]
    fn test_valid_csr() {
        let device = CpuDevice::new();
        let (crow, col, values) = csr_3x3_identity(&device);
        assert!(validate_sparse_csr_args(&crow, &col, &values, &[3, 3]).is_ok());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let device = CpuDevice::new();
        let (crow, col, values) = csr_3x3_identity(&device);
        assert!(validate_sparse_csr_args(&crow, &col, &values, &[3, 3]).is_ok());
        assert!(validate_sparse_csr_args(&crow, &col, &values, &[3, 3]).is_ok());
    }

    #[test]
    fn test_nonzero_first_entry_fails() {
        let device = CpuDevice::new();
        let crow = Tensor::<CpuRuntime>::from_slice(&[1i64, 1, 2, 3], &[4], &device);
        let col = Tensor::from_slice(&[0i64, 1, 2], &[3], &device);
        let values = Tensor::from_slice(&[1.0f32, 1.0, 1.0], &[3], &device);

        let err = validate_sparse_csr_args(&crow, &col, &values, &[3, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSparseIndices {
                buffer: "crow_indices",
                offset: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_non_monotonic_cites_position() {
        let device = CpuDevice::new();
        let crow = Tensor::<CpuRuntime>::from_slice(&[0i64, 2, 1, 3], &[4], &device);
        let col = Tensor::from_slice(&[0i64, 1, 2], &[3], &device);
        let values = Tensor::from_slice(&[1.0f32, 1.0, 1.0], &[3], &device);

        let err = validate_sparse_csr_args(&crow, &col, &values, &[3, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSparseIndices {
                buffer: "crow_indices",
                offset: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_plain_index_fails() {
        let device = CpuDevice::new();
        let crow = Tensor::<CpuRuntime>::from_slice(&[0i64, 2, 3], &[3], &device);
        let col = Tensor::from_slice(&[1i64, 1, 0], &[3], &device);
        let values = Tensor::from_slice(&[1.0f32, 2.0, 3.0], &[3], &device);

        let err = validate_sparse_csr_args(&crow, &col, &values, &[2, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSparseIndices {
                buffer: "col_indices",
                offset: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_index_dtype_mismatch() {
        let device = CpuDevice::new();
        let crow = Tensor::<CpuRuntime>::from_slice(&[0i64, 1, 2, 3], &[4], &device);
        let col = Tensor::from_slice(&[0i32, 1, 2], &[3], &device);
        let values = Tensor::from_slice(&[1.0f32, 1.0, 1.0], &[3], &device);

        let err = validate_sparse_csr_args(&crow, &col, &values, &[3, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidSparseStructure { .. }));
    }

    #[test]
    fn test_csc_errors_name_ccol_indices() {
        let device = CpuDevice::new();
        let ccol = Tensor::<CpuRuntime>::from_slice(&[1i64, 1, 2, 3], &[4], &device);
        let row = Tensor::from_slice(&[0i64, 1, 2], &[3], &device);
        let values = Tensor::from_slice(&[1.0f32, 1.0, 1.0], &[3], &device);

        let err = validate_sparse_csc_args(&ccol, &row, &values, &[3, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSparseIndices {
                buffer: "ccol_indices",
                ..
            }
        ));
    }

    #[test]
    fn test_batched_lowest_failing_batch_reported() {
        let device = CpuDevice::new();
        // Two batches; both have a bad first entry, batch 0 must be reported
        let crow = Tensor::<CpuRuntime>::from_slice(&[1i64, 1, 2, 1, 1, 2], &[2, 3], &device);
        let col = Tensor::from_slice(&[0i64, 1, 0, 1], &[2, 2], &device);
        let values = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &device);

        let err = validate_sparse_csr_args(&crow, &col, &values, &[2, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidSparseIndices { batch: 0, .. }
        ));
    }
}
