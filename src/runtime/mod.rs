//! Runtime backends for tensor storage
//!
//! This module defines the `Runtime` trait and provides the CPU reference
//! implementation.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (identifies a specific compute unit)
//! ├── Client (dispatches operations, owns stream/queue)
//! └── Allocator (memory management)
//! ```

mod allocator;

pub mod cpu;

pub use allocator::{Allocator, DefaultAllocator};

use crate::error::Result;

/// Core trait for compute backends
///
/// `Runtime` abstracts over different compute devices (CPU, GPU, etc.).
/// It uses static dispatch via generics for zero-cost abstraction. The set
/// of supported compute devices is exactly the set of `Runtime`
/// implementations.
///
/// # Associated Types
///
/// - `Device`: Identifies a specific compute unit
/// - `Client`: Handles operation dispatch and synchronization
/// - `Allocator`: Memory management
///
/// # Example
///
/// ```ignore
/// let device = CpuRuntime::default_device();
/// let ptr = CpuRuntime::allocate(1024, &device)?;
/// // ... use memory ...
/// CpuRuntime::deallocate(ptr, 1024, &device);
/// ```
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Client for dispatching operations
    type Client: RuntimeClient<Self>;

    /// Memory allocator type
    type Allocator: Allocator;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Allocate device memory
    ///
    /// Returns a device pointer (u64) that can be used for operations.
    /// Returns `Err(OutOfMemory)` if allocation fails.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64>;

    /// Deallocate device memory
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy data from host to device
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()>;

    /// Copy data from device to host
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Copy data within device (device to device)
    fn copy_within_device(src: u64, dst: u64, size_bytes: usize, device: &Self::Device)
        -> Result<()>;

    /// Copy strided data to a contiguous buffer
    ///
    /// This is the proper way to make a non-contiguous tensor contiguous.
    ///
    /// # Parameters
    /// - `src_handle`: Source buffer handle
    /// - `src_byte_offset`: Byte offset into source buffer
    /// - `dst_handle`: Destination buffer handle
    /// - `shape`: Shape of the tensor
    /// - `strides`: Strides of the source tensor (in elements, not bytes)
    /// - `elem_size`: Size of each element in bytes
    fn copy_strided(
        src_handle: u64,
        src_byte_offset: usize,
        dst_handle: u64,
        shape: &[usize],
        strides: &[isize],
        elem_size: usize,
        device: &Self::Device,
    ) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    fn default_client(device: &Self::Device) -> Self::Client;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Trait for runtime clients that handle operation dispatch
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Synchronize: wait for all pending operations to complete
    fn synchronize(&self);

    /// Get the allocator for this client
    fn allocator(&self) -> &R::Allocator;
}
