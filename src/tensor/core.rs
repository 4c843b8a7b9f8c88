//! Core Tensor type

use super::{Layout, Storage, TensorId};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};
use std::fmt;

/// N-dimensional array stored on a compute device
///
/// `Tensor` is the buffer abstraction underlying the sparse compressed
/// core. It consists of:
/// - **Storage**: Reference-counted device memory
/// - **Layout**: Shape, strides, and offset defining the view into storage
/// - **DType**: Element type (determined at runtime)
///
/// # Zero-Copy Views
///
/// Operations like `narrow`, `squeeze`, and `select` create new tensors
/// that share the same underlying storage. This is achieved through:
/// - Arc-wrapped storage (reference counting)
/// - Modified layout (different strides/offset)
pub struct Tensor<R: Runtime> {
    /// Unique ID for diagnostics
    id: TensorId,
    /// Device memory
    storage: Storage<R>,
    /// Shape, strides, offset
    layout: Layout,
}

impl<R: Runtime> Tensor<R> {
    /// Create a tensor from storage and layout
    pub fn from_parts(storage: Storage<R>, layout: Layout) -> Self {
        Self {
            id: TensorId::new(),
            storage,
            layout,
        }
    }

    /// Create a tensor from a slice of data
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of the `shape`
    /// dimensions. For a fallible alternative, use [`Self::try_from_slice`].
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize], device: &R::Device) -> Self {
        Self::try_from_slice(data, shape, device).expect("Tensor::from_slice failed")
    }

    /// Create a tensor from a slice of data (fallible version)
    ///
    /// Returns an error if `data.len()` does not equal the product of the
    /// `shape` dimensions, or if memory allocation fails.
    pub fn try_from_slice<T: Element>(
        data: &[T],
        shape: &[usize],
        device: &R::Device,
    ) -> Result<Self> {
        let expected_len: usize = shape.iter().product();
        if data.len() != expected_len {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }

        let storage = Storage::from_slice(data, device)?;
        let layout = Layout::contiguous(shape);

        Ok(Self {
            id: TensorId::new(),
            storage,
            layout,
        })
    }

    /// Create an uninitialized tensor
    ///
    /// # Safety
    /// The contents are uninitialized. Reading before writing is undefined behavior.
    pub fn empty(shape: &[usize], dtype: DType, device: &R::Device) -> Self {
        Self::try_empty(shape, dtype, device).expect("Tensor::empty failed")
    }

    /// Create an uninitialized tensor (fallible version)
    pub fn try_empty(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        let len: usize = shape.iter().product();
        let storage = Storage::new(len, dtype, device)?;
        let layout = Layout::contiguous(shape);

        Ok(Self {
            id: TensorId::new(),
            storage,
            layout,
        })
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize], dtype: DType, device: &R::Device) -> Self {
        Self::try_zeros(shape, dtype, device).expect("Tensor::zeros failed")
    }

    /// Create a tensor filled with zeros (fallible version)
    pub fn try_zeros(shape: &[usize], dtype: DType, device: &R::Device) -> Result<Self> {
        let len: usize = shape.iter().product();
        let bytes = vec![0u8; len * dtype.size_in_bytes()];
        let storage = Storage::from_bytes(&bytes, dtype, device)?;
        let layout = Layout::contiguous(shape);

        Ok(Self {
            id: TensorId::new(),
            storage,
            layout,
        })
    }

    // ===== Accessors =====

    /// Get the tensor ID
    #[inline]
    pub fn id(&self) -> TensorId {
        self.id
    }

    /// Get the storage
    #[inline]
    pub fn storage(&self) -> &Storage<R> {
        &self.storage
    }

    /// Get the layout
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Get the number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Get the total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.elem_count()
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.storage.device()
    }

    /// Check if the tensor is contiguous in memory
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Get size along a dimension (supports negative indexing)
    pub fn size(&self, dim: isize) -> Option<usize> {
        self.layout.dim(dim)
    }

    // ===== View Operations (Zero-Copy) =====

    /// Narrow a dimension (zero-copy slice)
    ///
    /// Returns a view of the tensor narrowed to a contiguous subset of
    /// elements along a single dimension.
    ///
    /// # Arguments
    /// * `dim` - Dimension to narrow (supports negative indexing)
    /// * `start` - Starting index in that dimension
    /// * `length` - Number of elements to keep
    pub fn narrow(&self, dim: isize, start: usize, length: usize) -> Result<Self> {
        let dim_idx = self
            .layout
            .normalize_dim(dim)
            .ok_or(Error::InvalidDimension {
                dim,
                ndim: self.ndim(),
            })?;

        let new_layout =
            self.layout
                .narrow(dim_idx, start, length)
                .ok_or_else(|| Error::ShapeMismatch {
                    expected: vec![self.shape()[dim_idx]],
                    got: vec![start, length],
                })?;

        Ok(Self {
            id: TensorId::new(),
            storage: self.storage.clone(),
            layout: new_layout,
        })
    }

    /// Remove dimensions of size 1
    pub fn squeeze(&self, dim: Option<isize>) -> Self {
        Self {
            id: TensorId::new(),
            storage: self.storage.clone(),
            layout: self.layout.squeeze(dim),
        }
    }

    /// Select one index along a dimension, dropping that dimension (zero-copy)
    ///
    /// The result is a view one rank lower. It is generally not contiguous;
    /// call [`Self::contiguous`] to materialize it.
    pub fn select(&self, dim: isize, index: usize) -> Result<Self> {
        let dim_idx = self
            .layout
            .normalize_dim(dim)
            .ok_or(Error::InvalidDimension {
                dim,
                ndim: self.ndim(),
            })?;

        let narrowed = self.narrow(dim_idx as isize, index, 1)?;
        Ok(narrowed.squeeze(Some(dim_idx as isize)))
    }

    /// Make tensor contiguous (copy if needed)
    ///
    /// If the tensor is already contiguous, returns a view (zero-copy).
    /// Otherwise, allocates new storage and copies the data to a contiguous
    /// layout via `Runtime::copy_strided`.
    pub fn contiguous(&self) -> Self {
        if self.is_contiguous() {
            self.clone()
        } else {
            let dtype = self.dtype();
            let device = self.storage.device();
            let numel = self.numel();

            let new_storage =
                Storage::new(numel, dtype, device).expect("Tensor::contiguous allocation failed");
            let new_layout = Layout::contiguous(self.shape());

            let elem_size = dtype.size_in_bytes();
            let src_byte_offset = self.layout.offset() * elem_size;

            R::copy_strided(
                self.storage.ptr(),
                src_byte_offset,
                new_storage.ptr(),
                self.shape(),
                self.strides(),
                elem_size,
                device,
            )
            .expect("copy_strided failed in contiguous()");

            Self {
                id: TensorId::new(),
                storage: new_storage,
                layout: new_layout,
            }
        }
    }

    // ===== Data Access =====

    /// Copy tensor data to a Vec on the host
    ///
    /// For contiguous tensors, this copies only the viewed portion of the
    /// storage, respecting the tensor's shape and offset.
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Vec<T> {
        assert!(
            self.is_contiguous(),
            "Tensor must be contiguous to copy to vec"
        );

        let numel = self.numel();
        let offset = self.layout.offset();
        let elem_size = std::mem::size_of::<T>();
        let byte_offset = offset * elem_size;

        // Allocate with correct alignment for T, then cast to bytes for copy.
        // This avoids alignment violations that would occur if we allocated
        // a Vec<u8> and cast to stricter-aligned types like f64/i64.
        let mut result = vec![T::zeroed(); numel];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut result);
        let src_ptr = self.storage.ptr() as usize + byte_offset;
        R::copy_from_device(src_ptr as u64, bytes, self.storage.device())
            .expect("copy_from_device failed in to_vec()");
        result
    }

    /// Overwrite this tensor's data with the contents of `src`
    ///
    /// Both tensors must be contiguous, hold the same dtype, and contain the
    /// same number of elements; shapes are otherwise not compared (the
    /// caller decides what reinterpretation means). Cross-device copies are
    /// routed through host memory.
    pub fn copy_(&self, src: &Tensor<R>) -> Result<()> {
        if self.dtype() != src.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: self.dtype(),
                rhs: src.dtype(),
            });
        }
        if self.numel() != src.numel() {
            return Err(Error::ShapeMismatch {
                expected: self.shape().to_vec(),
                got: src.shape().to_vec(),
            });
        }
        if !self.is_contiguous() || !src.is_contiguous() {
            return Err(Error::NotContiguous);
        }

        let size_bytes = self.numel() * self.dtype().size_in_bytes();
        if size_bytes == 0 {
            return Ok(());
        }

        if src.device().is_same(self.device()) {
            R::copy_within_device(src.storage.ptr(), self.storage.ptr(), size_bytes, self.device())
        } else {
            let mut host = vec![0u8; size_bytes];
            R::copy_from_device(src.storage.ptr(), &mut host, src.device())?;
            R::copy_to_device(&host, self.storage.ptr(), self.device())
        }
    }

    /// Deep-copy this tensor into freshly allocated storage
    ///
    /// Unlike `clone` (which shares storage), the result owns a private
    /// copy of the viewed data, materialized contiguous.
    pub fn deep_clone(&self) -> Result<Self> {
        let src = self.contiguous();
        let storage = Storage::new(src.numel(), src.dtype(), src.device())?;
        let size_bytes = src.numel() * src.dtype().size_in_bytes();
        R::copy_within_device(src.storage.ptr(), storage.ptr(), size_bytes, src.device())?;

        Ok(Self {
            id: TensorId::new(),
            storage,
            layout: Layout::contiguous(src.shape()),
        })
    }
}

impl<R: Runtime> Clone for Tensor<R> {
    /// Clone creates a new tensor sharing the same storage (zero-copy)
    fn clone(&self) -> Self {
        Self {
            id: TensorId::new(),
            storage: self.storage.clone(),
            layout: self.layout.clone(),
        }
    }
}

impl<R: Runtime> fmt::Debug for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id)
            .field("shape", &self.shape())
            .field("dtype", &self.dtype())
            .field("contiguous", &self.is_contiguous())
            .finish()
    }
}

impl<R: Runtime> fmt::Display for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({:?}, dtype={})", self.shape(), self.dtype())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_from_slice() {
        let device = CpuDevice::new();
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let tensor = Tensor::<CpuRuntime>::from_slice(&data, &[2, 3], &device);

        assert_eq!(tensor.shape(), &[2, 3]);
        assert_eq!(tensor.dtype(), DType::F32);
        assert!(tensor.is_contiguous());
        assert_eq!(tensor.numel(), 6);

        let result: Vec<f32> = tensor.to_vec();
        assert_eq!(result, data);
    }

    #[test]
    fn test_from_slice_shape_mismatch() {
        let device = CpuDevice::new();
        let result = Tensor::<CpuRuntime>::try_from_slice(&[1.0f32, 2.0], &[3], &device);
        assert!(result.is_err());
    }

    #[test]
    fn test_zeros() {
        let device = CpuDevice::new();
        let tensor = Tensor::<CpuRuntime>::zeros(&[2, 3], DType::I64, &device);

        assert_eq!(tensor.shape(), &[2, 3]);
        assert_eq!(tensor.dtype(), DType::I64);

        let result: Vec<i64> = tensor.to_vec();
        assert_eq!(result, [0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_select() {
        let device = CpuDevice::new();
        // 2x3 matrix: [[1, 2, 3], [4, 5, 6]]
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let tensor = Tensor::<CpuRuntime>::from_slice(&data, &[2, 3], &device);

        let row = tensor.select(0, 1).unwrap().contiguous();
        assert_eq!(row.shape(), &[3]);
        let result: Vec<f32> = row.to_vec();
        assert_eq!(result, [4.0, 5.0, 6.0]);

        let col = tensor.select(1, 2).unwrap().contiguous();
        assert_eq!(col.shape(), &[2]);
        let result: Vec<f32> = col.to_vec();
        assert_eq!(result, [3.0, 6.0]);
    }

    #[test]
    fn test_select_middle_dim() {
        let device = CpuDevice::new();
        let data: Vec<i64> = (0..24).collect();
        let tensor = Tensor::<CpuRuntime>::from_slice(&data, &[2, 3, 4], &device);

        let slice = tensor.select(1, 1).unwrap().contiguous();
        assert_eq!(slice.shape(), &[2, 4]);
        let result: Vec<i64> = slice.to_vec();
        assert_eq!(result, [4, 5, 6, 7, 16, 17, 18, 19]);
    }

    #[test]
    fn test_copy_() {
        let device = CpuDevice::new();
        let dst = Tensor::<CpuRuntime>::zeros(&[4], DType::F32, &device);
        let src = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[4], &device);

        dst.copy_(&src).unwrap();
        let result: Vec<f32> = dst.to_vec();
        assert_eq!(result, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_copy_rejects_mismatch() {
        let device = CpuDevice::new();
        let dst = Tensor::<CpuRuntime>::zeros(&[4], DType::F32, &device);

        let short = Tensor::<CpuRuntime>::from_slice(&[1.0f32], &[1], &device);
        assert!(dst.copy_(&short).is_err());

        let wrong_dtype = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &[4], &device);
        assert!(dst.copy_(&wrong_dtype).is_err());
    }

    #[test]
    fn test_deep_clone() {
        let device = CpuDevice::new();
        let src = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &device);
        let copy = src.deep_clone().unwrap();

        assert_eq!(copy.shape(), src.shape());
        assert_ne!(copy.storage().ptr(), src.storage().ptr());

        let result: Vec<f32> = copy.to_vec();
        assert_eq!(result, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_empty_tensor() {
        let device = CpuDevice::new();
        let tensor = Tensor::<CpuRuntime>::empty(&[0], DType::F32, &device);
        assert_eq!(tensor.numel(), 0);
        let result: Vec<f32> = tensor.to_vec();
        assert!(result.is_empty());
    }
}
