//! CPU runtime implementation
//!
//! The CPU runtime uses standard heap allocation and is the reference
//! backend for all sparse compressed tensor operations. Memory transfers
//! are plain memcpys and complete synchronously.

mod client;
mod device;
mod runtime;

pub use client::{CpuAllocator, CpuClient};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
