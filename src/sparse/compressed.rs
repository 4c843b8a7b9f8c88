//! Sparse compressed tensor: construction and derived operations

use std::fmt;

use super::dispatch_index_dtype;
use super::estimate::estimate_sparse_compressed_size;
use super::layout::SparseLayout;
use super::validate::{
    validate_sparse_compressed_args, values_blocksize, BASE_NDIM,
};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// Sparse compressed tensor
///
/// A (possibly batched) 2-D matrix of (possibly block-shaped, possibly
/// dense-valued) elements, represented by three co-located buffers plus a
/// logical shape:
///
/// - `compressed_indices`: batch + `[compressed_count + 1]`, a monotonic
///   prefix-count table of offsets into the other two buffers.
/// - `plain_indices`: batch + `[nnz]`, the other axis's coordinate of each
///   stored element, strictly increasing within each run.
/// - `values`: batch + `[nnz]` + block + dense, the stored data.
///
/// The checked constructors guarantee the format invariants hold; the
/// `*_unchecked` constructors are a trusted fast path for internal call
/// sites that have already established them.
#[derive(Clone)]
pub struct SparseCompressedTensor<R: Runtime> {
    compressed_indices: Tensor<R>,
    plain_indices: Tensor<R>,
    values: Tensor<R>,
    size: Vec<usize>,
    layout: SparseLayout,
}

impl<R: Runtime> SparseCompressedTensor<R> {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Assemble a sparse compressed tensor without validation
    ///
    /// Trusted internal fast path: the caller is responsible for the format
    /// invariants. Derived operations that preserve invariants by
    /// construction (batch `select`, `deep_clone`, `empty`, `resize_`) go
    /// through here instead of re-validating.
    pub fn from_parts_unchecked(
        compressed_indices: Tensor<R>,
        plain_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
        layout: SparseLayout,
    ) -> Self {
        Self {
            compressed_indices,
            plain_indices,
            values,
            size,
            layout,
        }
    }

    /// Validate the given buffers against `size` and construct
    ///
    /// The public checked entry point. Construction either completes with
    /// every invariant holding or returns an error; a partially validated
    /// tensor is never produced.
    pub fn new(
        compressed_indices: Tensor<R>,
        plain_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
        layout: SparseLayout,
    ) -> Result<Self> {
        validate_sparse_compressed_args(
            &compressed_indices,
            &plain_indices,
            &values,
            &size,
            layout,
        )?;
        Ok(Self::from_parts_unchecked(
            compressed_indices,
            plain_indices,
            values,
            size,
            layout,
        ))
    }

    /// Construct with the minimal size consistent with the buffers
    ///
    /// Estimates the enclosing shape from the index buffers, then runs the
    /// full validator against the estimate. Estimation and validation are
    /// independent passes; the estimate is never trusted on write.
    pub fn with_inferred_size(
        compressed_indices: Tensor<R>,
        plain_indices: Tensor<R>,
        values: Tensor<R>,
        layout: SparseLayout,
    ) -> Result<Self> {
        let size = estimate_sparse_compressed_size(
            &compressed_indices,
            &plain_indices,
            &values,
            layout,
        )?;
        Self::new(compressed_indices, plain_indices, values, size, layout)
    }

    /// Checked CSR constructor
    pub fn csr(
        crow_indices: Tensor<R>,
        col_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
    ) -> Result<Self> {
        Self::new(crow_indices, col_indices, values, size, SparseLayout::Csr)
    }

    /// Checked CSC constructor
    pub fn csc(
        ccol_indices: Tensor<R>,
        row_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
    ) -> Result<Self> {
        Self::new(ccol_indices, row_indices, values, size, SparseLayout::Csc)
    }

    /// Checked BSR constructor
    pub fn bsr(
        crow_indices: Tensor<R>,
        col_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
    ) -> Result<Self> {
        Self::new(crow_indices, col_indices, values, size, SparseLayout::Bsr)
    }

    /// Checked BSC constructor
    pub fn bsc(
        ccol_indices: Tensor<R>,
        row_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
    ) -> Result<Self> {
        Self::new(ccol_indices, row_indices, values, size, SparseLayout::Bsc)
    }

    /// Trusted CSR constructor (no validation)
    pub fn csr_unchecked(
        crow_indices: Tensor<R>,
        col_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
    ) -> Self {
        Self::from_parts_unchecked(crow_indices, col_indices, values, size, SparseLayout::Csr)
    }

    /// Trusted CSC constructor (no validation)
    pub fn csc_unchecked(
        ccol_indices: Tensor<R>,
        row_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
    ) -> Self {
        Self::from_parts_unchecked(ccol_indices, row_indices, values, size, SparseLayout::Csc)
    }

    /// Trusted BSR constructor (no validation)
    pub fn bsr_unchecked(
        crow_indices: Tensor<R>,
        col_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
    ) -> Self {
        Self::from_parts_unchecked(crow_indices, col_indices, values, size, SparseLayout::Bsr)
    }

    /// Trusted BSC constructor (no validation)
    pub fn bsc_unchecked(
        ccol_indices: Tensor<R>,
        row_indices: Tensor<R>,
        values: Tensor<R>,
        size: Vec<usize>,
    ) -> Self {
        Self::from_parts_unchecked(ccol_indices, row_indices, values, size, SparseLayout::Bsc)
    }

    /// Allocate an all-zero sparse compressed tensor of the given size
    ///
    /// `size` consists of batch plus base dimensions. The compressed index
    /// buffer is zeroed (every slot empty) and the plain index and value
    /// buffers hold `nnz = 0` elements. Performs no validation; the result
    /// is well-formed by construction.
    ///
    /// Blocked layouts are rejected: a block size cannot be derived from a
    /// plain size.
    pub fn empty(
        size: &[usize],
        dtype: DType,
        layout: SparseLayout,
        device: &R::Device,
    ) -> Result<Self> {
        if layout.is_blocked() {
            return Err(Error::InvalidArgument {
                arg: "layout",
                reason: format!(
                    "empty cannot create a {layout} tensor; the block size cannot be derived from a plain size"
                ),
            });
        }
        if size.len() < BASE_NDIM {
            return Err(Error::InvalidArgument {
                arg: "size",
                reason: format!(
                    "only batched sparse compressed tensors are supported, but got size {size:?}"
                ),
            });
        }

        let batch = &size[..size.len() - BASE_NDIM];
        let nnz = 0usize;

        let mut compressed_shape = batch.to_vec();
        compressed_shape.push(size[layout.compressed_dim_index(size)] + 1);
        let mut plain_shape = batch.to_vec();
        plain_shape.push(nnz);

        let compressed_indices =
            Tensor::try_zeros(&compressed_shape, DType::default_index(), device)?;
        let plain_indices = Tensor::try_empty(&plain_shape, DType::default_index(), device)?;
        let values = Tensor::try_empty(&plain_shape, dtype, device)?;

        Ok(Self::from_parts_unchecked(
            compressed_indices,
            plain_indices,
            values,
            size.to_vec(),
            layout,
        ))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the storage layout
    #[inline]
    pub fn layout(&self) -> SparseLayout {
        self.layout
    }

    /// Returns the logical shape (batch + base + dense dimensions)
    #[inline]
    pub fn size(&self) -> &[usize] {
        &self.size
    }

    /// Returns the number of stored elements per batch slice
    #[inline]
    pub fn nnz(&self) -> usize {
        let shape = self.plain_indices.shape();
        shape[shape.len() - 1]
    }

    /// Returns the values buffer
    #[inline]
    pub fn values(&self) -> &Tensor<R> {
        &self.values
    }

    /// Returns the compressed-axis index buffer
    #[inline]
    pub fn compressed_indices(&self) -> &Tensor<R> {
        &self.compressed_indices
    }

    /// Returns the plain-axis index buffer
    #[inline]
    pub fn plain_indices(&self) -> &Tensor<R> {
        &self.plain_indices
    }

    /// Returns the compressed row offsets (CSR/BSR only)
    ///
    /// Fails fast for column-major layouts, which have no row offset table.
    pub fn crow_indices(&self) -> Result<&Tensor<R>> {
        if self.layout.is_row_major() {
            Ok(&self.compressed_indices)
        } else {
            Err(Error::InvalidArgument {
                arg: "layout",
                reason: format!("crow_indices is not defined for the {} layout", self.layout),
            })
        }
    }

    /// Returns the column indices (CSR/BSR only)
    pub fn col_indices(&self) -> Result<&Tensor<R>> {
        if self.layout.is_row_major() {
            Ok(&self.plain_indices)
        } else {
            Err(Error::InvalidArgument {
                arg: "layout",
                reason: format!("col_indices is not defined for the {} layout", self.layout),
            })
        }
    }

    /// Returns the compressed column offsets (CSC/BSC only)
    pub fn ccol_indices(&self) -> Result<&Tensor<R>> {
        if self.layout.is_row_major() {
            Err(Error::InvalidArgument {
                arg: "layout",
                reason: format!("ccol_indices is not defined for the {} layout", self.layout),
            })
        } else {
            Ok(&self.compressed_indices)
        }
    }

    /// Returns the row indices (CSC/BSC only)
    pub fn row_indices(&self) -> Result<&Tensor<R>> {
        if self.layout.is_row_major() {
            Err(Error::InvalidArgument {
                arg: "layout",
                reason: format!("row_indices is not defined for the {} layout", self.layout),
            })
        } else {
            Ok(&self.plain_indices)
        }
    }

    /// Returns the dtype of the values buffer
    #[inline]
    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Returns the device holding all three buffers
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.values.device()
    }

    /// Number of leading batch dimensions
    #[inline]
    pub fn batch_ndim(&self) -> usize {
        self.compressed_indices.ndim() - 1
    }

    /// Number of sparse (base) dimensions; always 2
    #[inline]
    pub fn sparse_dim(&self) -> usize {
        BASE_NDIM
    }

    /// Number of trailing dense dimensions of the values
    #[inline]
    pub fn dense_ndim(&self) -> usize {
        self.values.ndim() - self.batch_ndim() - self.layout.block_ndim() - 1
    }

    /// Block size; (1, 1) for non-blocked layouts
    #[inline]
    pub fn blocksize(&self) -> [usize; 2] {
        values_blocksize(&self.values, self.batch_ndim(), self.layout.block_ndim())
    }

    /// Structural equality of the logical shapes only
    #[inline]
    pub fn same_size(&self, other: &Self) -> bool {
        self.size == other.size
    }

    /// Returns true if the tensor stores no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    /// Returns the memory usage of the three buffers in bytes (approximate)
    pub fn memory_usage(&self) -> usize {
        self.compressed_indices.numel() * self.compressed_indices.dtype().size_in_bytes()
            + self.plain_indices.numel() * self.plain_indices.dtype().size_in_bytes()
            + self.values.numel() * self.values.dtype().size_in_bytes()
    }

    // =========================================================================
    // Derived operations
    // =========================================================================

    /// Deep-copy all three buffers, preserving layout, size, dtype, and device
    ///
    /// Unlike `clone` (which shares storage), the result owns private
    /// copies. The buffers are rebuilt through the trusted path: a copy of
    /// validated buffers cannot break the invariants.
    pub fn deep_clone(&self) -> Result<Self> {
        Ok(Self::from_parts_unchecked(
            self.compressed_indices.deep_clone()?,
            self.plain_indices.deep_clone()?,
            self.values.deep_clone()?,
            self.size.clone(),
            self.layout,
        ))
    }

    /// Resize to `new_size`, resetting the stored elements
    ///
    /// The rank is preserved, dense dimensions must stay unchanged, and the
    /// trailing base (column) dimension may only grow: index values already
    /// stored could reference now-out-of-range positions after a shrink.
    /// For blocked layouts the new base extents must remain divisible by
    /// the block size.
    ///
    /// The index and value buffers are reallocated for the new size with
    /// `nnz = 0`; block and dense value axes are preserved.
    pub fn resize_(&mut self, new_size: &[usize]) -> Result<()> {
        if new_size.len() != self.size.len() {
            return Err(Error::shape_mismatch(&self.size, new_size));
        }
        let batch_ndim = self.batch_ndim();
        let block_ndim = self.layout.block_ndim();

        if new_size[batch_ndim + BASE_NDIM..] != self.size[batch_ndim + BASE_NDIM..] {
            return Err(Error::InvalidArgument {
                arg: "new_size",
                reason: format!(
                    "resizing dense dimensions is not supported; requested {:?} but the current dense dimensions are {:?}",
                    &new_size[batch_ndim + BASE_NDIM..],
                    &self.size[batch_ndim + BASE_NDIM..]
                ),
            });
        }

        let last_base = batch_ndim + 1;
        if new_size[last_base] < self.size[last_base] {
            return Err(Error::InvalidArgument {
                arg: "new_size",
                reason: format!(
                    "resizing columns of sparse compressed tensors to a smaller value is not supported; the original number of columns is {} while the requested new number of columns is {}",
                    self.size[last_base], new_size[last_base]
                ),
            });
        }

        let blocksize = self.blocksize();
        for i in 0..block_ndim {
            if new_size[batch_ndim + i] % blocksize[i] != 0 {
                return Err(Error::invalid_structure(
                    "size",
                    format!(
                        "tensor shape[{}] (={}) must be divisible with blocksize[{i}] (={}) as defined by values shape",
                        batch_ndim + i,
                        new_size[batch_ndim + i],
                        blocksize[i]
                    ),
                ));
            }
        }

        let ncompressed = if self.layout.is_row_major() {
            new_size[batch_ndim] / blocksize[0]
        } else {
            new_size[batch_ndim + 1] / blocksize[1]
        };

        let index_dtype = self.compressed_indices.dtype();
        let value_dtype = self.values.dtype();
        let device = self.values.device().clone();

        let batch = &new_size[..batch_ndim];
        let mut compressed_shape = batch.to_vec();
        compressed_shape.push(ncompressed + 1);
        let mut plain_shape = batch.to_vec();
        plain_shape.push(0);
        let mut values_shape = batch.to_vec();
        values_shape.push(0);
        values_shape.extend_from_slice(&blocksize[..block_ndim]);
        values_shape.extend_from_slice(&self.size[batch_ndim + BASE_NDIM..]);

        self.compressed_indices = Tensor::try_zeros(&compressed_shape, index_dtype, &device)?;
        self.plain_indices = Tensor::try_empty(&plain_shape, index_dtype, &device)?;
        self.values = Tensor::try_empty(&values_shape, value_dtype, &device)?;
        self.size = new_size.to_vec();
        Ok(())
    }

    /// Overwrite this tensor's buffers with the contents of `src`
    ///
    /// Requires identical layout, identical nnz, and a matching extent
    /// along the compressed dimension; blocked layouts additionally require
    /// identical block sizes. Value-shape compatibility beyond the element
    /// count is delegated to the underlying buffer copy.
    ///
    /// The three buffer copies carry no ordering dependency among each
    /// other; with `non_blocking` a backend with asynchronous transfers may
    /// overlap them, and all three are joined before this call returns. On
    /// the CPU backend transfers complete synchronously.
    pub fn copy_(&mut self, src: &Self, non_blocking: bool) -> Result<()> {
        let _ = non_blocking;
        if self.layout != src.layout {
            return Err(Error::InvalidArgument {
                arg: "src",
                reason: format!(
                    "copy of sparse compressed tensors having different layouts is not supported; self layout is {} and src layout is {}",
                    self.layout, src.layout
                ),
            });
        }
        if self.nnz() != src.nnz() {
            return Err(Error::InvalidArgument {
                arg: "src",
                reason: format!(
                    "only sparse compressed tensors with the same number of specified elements are supported; self nnz is {} and src nnz is {}",
                    self.nnz(),
                    src.nnz()
                ),
            });
        }
        let compressed_dim = self.batch_ndim() + usize::from(!self.layout.is_row_major());
        let src_compressed_dim = src.batch_ndim() + usize::from(!src.layout.is_row_major());
        if self.size[compressed_dim] != src.size[src_compressed_dim] {
            return Err(Error::InvalidArgument {
                arg: "src",
                reason: format!(
                    "expected shapes of self and src to match along dimension {compressed_dim} for the {} layout, but the corresponding dimensions are {} and {}, respectively",
                    self.layout, self.size[compressed_dim], src.size[src_compressed_dim]
                ),
            });
        }
        if self.layout.is_blocked() && self.blocksize() != src.blocksize() {
            return Err(Error::InvalidArgument {
                arg: "src",
                reason: format!(
                    "copy of sparse compressed tensors having different block sizes is not supported; self and src block sizes are {:?} and {:?}, respectively",
                    self.blocksize(),
                    src.blocksize()
                ),
            });
        }

        self.compressed_indices.copy_(&src.compressed_indices)?;
        self.plain_indices.copy_(&src.plain_indices)?;
        self.values.copy_(&src.values)?;
        Ok(())
    }

    /// Select one index along a dimension
    ///
    /// Restricted to the CSR and BSR layouts. Selecting a batch dimension
    /// slices all three buffers along that axis and rebuilds the tensor one
    /// rank lower; the sliced buffers cannot violate the content invariants,
    /// so the result goes through the trusted path. Negative `dim` and
    /// `index` wrap.
    ///
    /// Selecting a base (row/column) dimension does not produce a sparse
    /// compressed tensor and is delegated to [`Self::select_dense`] for
    /// unbatched CSR tensors; every other base or dense dimension select
    /// fails with `NotImplemented` rather than producing wrong data.
    pub fn select(&self, dim: isize, index: isize) -> Result<Self> {
        if !matches!(self.layout, SparseLayout::Csr | SparseLayout::Bsr) {
            return Err(Error::NotImplemented {
                feature: "select currently only supports the CSR and BSR layouts",
            });
        }
        let (d, i) = self.wrap_dim_index(dim, index)?;
        let batch_ndim = self.batch_ndim();

        if d < batch_ndim {
            let mut new_size = self.size.clone();
            new_size.remove(d);
            // Materialize contiguous copies so the storage invariants keep
            // holding for the sliced buffers.
            Ok(Self::from_parts_unchecked(
                self.compressed_indices.select(d as isize, i)?.contiguous(),
                self.plain_indices.select(d as isize, i)?.contiguous(),
                self.values.select(d as isize, i)?.contiguous(),
                new_size,
                self.layout,
            ))
        } else if d < batch_ndim + BASE_NDIM {
            Err(Error::NotImplemented {
                feature: "selecting rows or columns yields a dense result; use select_dense on unbatched CSR tensors",
            })
        } else {
            Err(Error::NotImplemented {
                feature: "selecting dense dimensions of sparse compressed tensors",
            })
        }
    }

    /// Select a row or column of an unbatched 2-rank CSR tensor
    ///
    /// The delegated conversion path for base-dimension selection: the
    /// tensor is expanded through [`Self::to_dense`] and the requested
    /// row/column is returned as a dense tensor. Batched tensors and other
    /// layouts are rejected.
    pub fn select_dense(&self, dim: isize, index: isize) -> Result<Tensor<R>> {
        if self.layout != SparseLayout::Csr {
            return Err(Error::NotImplemented {
                feature: "selecting rows or columns is currently only supported for CSR tensors",
            });
        }
        if self.size.len() != BASE_NDIM {
            return Err(Error::NotImplemented {
                feature: "selecting rows or columns is not implemented for batched sparse CSR tensors",
            });
        }
        let (d, i) = self.wrap_dim_index(dim, index)?;
        Ok(self.to_dense()?.select(d as isize, i)?.contiguous())
    }

    /// Expand an unbatched sparse compressed matrix to a dense tensor
    ///
    /// Supports all four layouts including block expansion. The tensor must
    /// hold scalar elements (no dense dimensions) and no batch dimensions.
    /// Expects validated buffers; out-of-range indices in an unchecked
    /// tensor are not diagnosed here.
    pub fn to_dense(&self) -> Result<Tensor<R>> {
        if self.batch_ndim() != 0 || self.dense_ndim() != 0 {
            return Err(Error::NotImplemented {
                feature: "to_dense for batched or dense-valued sparse compressed tensors",
            });
        }

        let [block_rows, block_cols] = self.blocksize();
        let nrows = self.size[0];
        let ncols = self.size[1];
        let ncompressed = self.compressed_indices.shape()[0].saturating_sub(1);

        let compressed = host_indices_i64(&self.compressed_indices)?;
        let plain = host_indices_i64(&self.plain_indices)?;
        let device = self.values.device();

        crate::dispatch_dtype!(self.dtype(), T => {
            let vals: Vec<T> = self.values.contiguous().to_vec();
            let mut out = vec![<T as Element>::zero(); nrows * ncols];
            let block_len = block_rows * block_cols;

            for ci in 0..ncompressed {
                let start = compressed[ci] as usize;
                let end = compressed[ci + 1] as usize;
                for n in start..end {
                    let pi = plain[n] as usize;
                    let (block_row, block_col) = if self.layout.is_row_major() {
                        (ci, pi)
                    } else {
                        (pi, ci)
                    };
                    for bi in 0..block_rows {
                        for bj in 0..block_cols {
                            let row = block_row * block_rows + bi;
                            let col = block_col * block_cols + bj;
                            out[row * ncols + col] = vals[n * block_len + bi * block_cols + bj];
                        }
                    }
                }
            }

            Tensor::try_from_slice(&out, &[nrows, ncols], device)
        }, "to_dense")
    }

    /// Wrap negative `dim`/`index` and bounds-check both
    fn wrap_dim_index(&self, dim: isize, index: isize) -> Result<(usize, usize)> {
        let ndim = self.size.len();
        let d = if dim < 0 { dim + ndim as isize } else { dim };
        if d < 0 || d >= ndim as isize {
            return Err(Error::InvalidDimension { dim, ndim });
        }
        let d = d as usize;

        let extent = self.size[d] as isize;
        let i = if index < 0 { index + extent } else { index };
        if i < 0 || i >= extent {
            return Err(Error::InvalidArgument {
                arg: "index",
                reason: format!(
                    "index {index} out of range for tensor of size {:?} at dimension {d}",
                    self.size
                ),
            });
        }
        Ok((d, i as usize))
    }
}

/// Copy an index buffer to the host, widened to i64
fn host_indices_i64<R: Runtime>(tensor: &Tensor<R>) -> Result<Vec<i64>> {
    dispatch_index_dtype!(tensor.dtype(), I => {
        let host: Vec<I> = tensor.contiguous().to_vec();
        Ok(host.into_iter().map(Into::<i64>::into).collect())
    }, "host_indices_i64")
}

impl<R: Runtime> fmt::Debug for SparseCompressedTensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseCompressedTensor")
            .field("layout", &self.layout)
            .field("size", &self.size)
            .field("nnz", &self.nnz())
            .field("dtype", &self.dtype())
            .finish()
    }
}

impl<R: Runtime> fmt::Display for SparseCompressedTensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SparseCompressedTensor({:?}, nnz={}, layout={}, dtype={})",
            self.size,
            self.nnz(),
            self.layout,
            self.dtype()
        )
    }
}
