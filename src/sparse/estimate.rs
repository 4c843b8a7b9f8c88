//! Minimal shape estimation for sparse compressed tensors
//!
//! Supports "construct without an explicit size" by deriving the smallest
//! logical shape consistent with the index and value buffers. Estimation
//! and validation are independent passes; callers always re-validate the
//! estimate before accepting a tensor.

use super::dispatch_index_dtype;
use super::layout::SparseLayout;
use super::validate::{rank_arithmetic, values_blocksize, BASE_NDIM};
use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// Estimate the minimal logical shape enclosing the given buffers
///
/// The compressed count is read off the last axis of `compressed_indices`;
/// the plain count is `max(plain_indices) + 1`, a full O(nnz) scan that
/// dominates the cost of estimation. Base extents are the counts multiplied
/// by the block size, assembled with the batch dimensions of
/// `compressed_indices` and the trailing dense dimensions of `values`.
pub fn estimate_sparse_compressed_size<R: Runtime>(
    compressed_indices: &Tensor<R>,
    plain_indices: &Tensor<R>,
    values: &Tensor<R>,
    layout: SparseLayout,
) -> Result<Vec<usize>> {
    let (batch_ndim, dense_ndim) =
        rank_arithmetic(compressed_indices, plain_indices, values, layout)?;
    let block_ndim = layout.block_ndim();
    let blocksize = values_blocksize(values, batch_ndim, block_ndim);

    let mut size: Vec<usize> = compressed_indices.shape()[..batch_ndim].to_vec();

    let compressed_last = compressed_indices.shape()[batch_ndim];
    let ncompressed = compressed_last.saturating_sub(1);

    let nplain = if plain_indices.numel() > 0 {
        dispatch_index_dtype!(plain_indices.dtype(), I => {
            let host: Vec<I> = plain_indices.contiguous().to_vec();
            let max = host
                .iter()
                .map(|&v| Into::<i64>::into(v))
                .max()
                .unwrap_or(-1);
            (max + 1).max(0) as usize
        }, "estimate_sparse_compressed_size")
    } else {
        0
    };

    if layout.is_row_major() {
        size.push(ncompressed * blocksize[0]);
        size.push(nplain * blocksize[1]);
    } else {
        size.push(nplain * blocksize[0]);
        size.push(ncompressed * blocksize[1]);
    }

    for i in 0..dense_ndim {
        let j = batch_ndim + 1 + block_ndim + i;
        size.push(values.shape().get(j).copied().unwrap_or(1));
    }

    debug_assert_eq!(size.len(), batch_ndim + BASE_NDIM + dense_ndim);

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_estimate_csr() {
        let device = CpuDevice::new();
        let crow = Tensor::<CpuRuntime>::from_slice(&[0i64, 2, 3, 5], &[4], &device);
        let col = Tensor::from_slice(&[0i64, 2, 2, 0, 1], &[5], &device);
        let values = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0], &[5], &device);

        let size =
            estimate_sparse_compressed_size(&crow, &col, &values, SparseLayout::Csr).unwrap();
        assert_eq!(size, vec![3, 3]);
    }

    #[test]
    fn test_estimate_csc_swaps_axes() {
        let device = CpuDevice::new();
        let ccol = Tensor::<CpuRuntime>::from_slice(&[0i64, 1, 2], &[3], &device);
        let row = Tensor::from_slice(&[4i64, 0], &[2], &device);
        let values = Tensor::from_slice(&[1.0f32, 2.0], &[2], &device);

        let size =
            estimate_sparse_compressed_size(&ccol, &row, &values, SparseLayout::Csc).unwrap();
        // rows from max(row_indices)+1, columns from the offset table
        assert_eq!(size, vec![5, 2]);
    }

    #[test]
    fn test_estimate_bsr_multiplies_blocksize() {
        let device = CpuDevice::new();
        let crow = Tensor::<CpuRuntime>::from_slice(&[0i64, 1, 2], &[3], &device);
        let col = Tensor::from_slice(&[0i64, 1], &[2], &device);
        let values =
            Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], &[2, 2, 2], &device);

        let size =
            estimate_sparse_compressed_size(&crow, &col, &values, SparseLayout::Bsr).unwrap();
        assert_eq!(size, vec![4, 4]);
    }

    #[test]
    fn test_estimate_empty_plain_indices() {
        let device = CpuDevice::new();
        let crow = Tensor::<CpuRuntime>::from_slice(&[0i64, 0, 0], &[3], &device);
        let col = Tensor::<CpuRuntime>::from_slice(&[] as &[i64], &[0], &device);
        let values = Tensor::<CpuRuntime>::from_slice(&[] as &[f32], &[0], &device);

        let size =
            estimate_sparse_compressed_size(&crow, &col, &values, SparseLayout::Csr).unwrap();
        assert_eq!(size, vec![2, 0]);
    }

    #[test]
    fn test_estimate_dense_dims() {
        let device = CpuDevice::new();
        let crow = Tensor::<CpuRuntime>::from_slice(&[0i64, 1, 2], &[3], &device);
        let col = Tensor::from_slice(&[0i64, 1], &[2], &device);
        // two non-zeros, each carrying a dense payload of 3
        let values = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], &device);

        let size =
            estimate_sparse_compressed_size(&crow, &col, &values, SparseLayout::Csr).unwrap();
        assert_eq!(size, vec![2, 2, 3]);
    }
}
