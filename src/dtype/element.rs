//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};

/// Trait for types that can be elements of a tensor
///
/// This trait connects Rust's type system to sparc's runtime dtype system.
/// It's implemented for all primitive numeric types.
///
/// # Bounds
/// - `Copy + Clone + Send + Sync + 'static` - Basic trait requirements
/// - `Pod + Zeroable` - Safe memory transmutation (bytemuck)
/// - `PartialOrd` - Comparison for index scans
pub trait Element:
    Copy + Clone + Send + Sync + Pod + Zeroable + 'static + PartialOrd
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $dtype:expr, $zero:expr, $one:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn zero() -> Self {
                $zero
            }

            #[inline]
            fn one() -> Self {
                $one
            }
        }
    };
}

impl_element!(f64, DType::F64, 0.0, 1.0);
impl_element!(f32, DType::F32, 0.0, 1.0);
impl_element!(i64, DType::I64, 0, 1);
impl_element!(i32, DType::I32, 0, 1);
impl_element!(i16, DType::I16, 0, 1);
impl_element!(i8, DType::I8, 0, 1);
impl_element!(u64, DType::U64, 0, 1);
impl_element!(u32, DType::U32, 0, 1);
impl_element!(u16, DType::U16, 0, 1);
impl_element!(u8, DType::U8, 0, 1);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_dtype_mapping() {
        assert_eq!(<f32 as Element>::DTYPE, DType::F32);
        assert_eq!(<f64 as Element>::DTYPE, DType::F64);
        assert_eq!(<i64 as Element>::DTYPE, DType::I64);
        assert_eq!(<i32 as Element>::DTYPE, DType::I32);
        assert_eq!(<u8 as Element>::DTYPE, DType::U8);
    }

    #[test]
    fn test_zero_one() {
        assert_eq!(<f32 as Element>::zero(), 0.0);
        assert_eq!(<i64 as Element>::one(), 1);
    }
}
