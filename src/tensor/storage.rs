//! Storage: device memory management with Arc-based sharing

use crate::dtype::{DType, Element};
use crate::error::Result;
use crate::runtime::Runtime;
use std::sync::Arc;

/// Storage for tensor data on a device
///
/// Storage wraps device memory with reference counting, enabling zero-copy
/// views (narrow, squeeze, etc.) that share the underlying buffer.
///
/// Memory is automatically deallocated when the last reference is dropped.
pub struct Storage<R: Runtime> {
    inner: Arc<StorageInner<R>>,
}

struct StorageInner<R: Runtime> {
    /// Raw device pointer (GPU address or CPU ptr cast to u64)
    ptr: u64,
    /// Number of elements (not bytes)
    len: usize,
    /// Element type
    dtype: DType,
    /// Device where memory is allocated
    device: R::Device,
}

impl<R: Runtime> Storage<R> {
    /// Create new storage with allocated memory
    ///
    /// Allocates `len` elements of type `dtype` on the specified device.
    pub fn new(len: usize, dtype: DType, device: &R::Device) -> Result<Self> {
        let size_bytes = len * dtype.size_in_bytes();
        let ptr = R::allocate(size_bytes, device)?;

        Ok(Self {
            inner: Arc::new(StorageInner {
                ptr,
                len,
                dtype,
                device: device.clone(),
            }),
        })
    }

    /// Create storage from existing data with inferred dtype
    ///
    /// Copies `data` to the device. The dtype is inferred from the Element type.
    pub fn from_slice<T: Element>(data: &[T], device: &R::Device) -> Result<Self> {
        let dtype = T::DTYPE;
        let len = data.len();

        let bytes = bytemuck::cast_slice(data);
        let ptr = R::allocate(bytes.len(), device)?;

        R::copy_to_device(bytes, ptr, device)?;

        Ok(Self {
            inner: Arc::new(StorageInner {
                ptr,
                len,
                dtype,
                device: device.clone(),
            }),
        })
    }

    /// Create storage from raw bytes with explicit dtype
    ///
    /// Use this when you have raw bytes and know the dtype.
    pub fn from_bytes(data: &[u8], dtype: DType, device: &R::Device) -> Result<Self> {
        let len = data.len() / dtype.size_in_bytes();
        let ptr = R::allocate(data.len(), device)?;

        R::copy_to_device(data, ptr, device)?;

        Ok(Self {
            inner: Arc::new(StorageInner {
                ptr,
                len,
                dtype,
                device: device.clone(),
            }),
        })
    }

    /// Get the raw device pointer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.inner.ptr
    }

    /// Get the number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Check if storage is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.inner.device
    }

    /// Get size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.len * self.inner.dtype.size_in_bytes()
    }
}

impl<R: Runtime> Clone for Storage<R> {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Runtime> Drop for StorageInner<R> {
    fn drop(&mut self) {
        if self.ptr != 0 {
            R::deallocate(
                self.ptr,
                self.len * self.dtype.size_in_bytes(),
                &self.device,
            );
        }
    }
}

impl<R: Runtime> std::fmt::Debug for Storage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("ptr", &format!("0x{:x}", self.inner.ptr))
            .field("len", &self.inner.len)
            .field("dtype", &self.inner.dtype)
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

// Storage tests are in the tensor core module (require a concrete runtime)
