//! Layout descriptor for the sparse compressed format family

use std::fmt;

/// Sparse compressed storage layout
///
/// One tagged variant per member of the compressed format family. All
/// algorithms in this crate are written once against this descriptor
/// instead of being duplicated per variant.
///
/// - **CSR/CSC**: scalar elements, one offset table over rows/columns.
/// - **BSR/BSC**: each stored element is a fixed-size 2-D block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SparseLayout {
    /// Compressed Sparse Row
    ///
    /// Row offsets + column indices + values.
    /// Best for: row slicing, SpMV, most sparse operations
    Csr,

    /// Compressed Sparse Column
    ///
    /// Column offsets + row indices + values.
    /// Best for: column slicing, transposed operations
    Csc,

    /// Blocked Sparse Row
    ///
    /// CSR over a grid of fixed-size dense blocks.
    Bsr,

    /// Blocked Sparse Column
    ///
    /// CSC over a grid of fixed-size dense blocks.
    Bsc,
}

impl SparseLayout {
    /// Number of block dimensions: 0 for CSR/CSC, 2 for BSR/BSC
    #[inline]
    pub const fn block_ndim(self) -> usize {
        match self {
            SparseLayout::Csr | SparseLayout::Csc => 0,
            SparseLayout::Bsr | SparseLayout::Bsc => 2,
        }
    }

    /// Returns true if stored elements are blocks (BSR/BSC)
    #[inline]
    pub const fn is_blocked(self) -> bool {
        self.block_ndim() == 2
    }

    /// Returns true if the compressed axis is the row axis (CSR/BSR)
    #[inline]
    pub const fn is_row_major(self) -> bool {
        matches!(self, SparseLayout::Csr | SparseLayout::Bsr)
    }

    /// Returns the format name as a string
    pub const fn name(self) -> &'static str {
        match self {
            SparseLayout::Csr => "CSR",
            SparseLayout::Csc => "CSC",
            SparseLayout::Bsr => "BSR",
            SparseLayout::Bsc => "BSC",
        }
    }

    /// Display name of the compressed-axis index buffer
    ///
    /// Used in error messages so CSR/BSR tensors report `crow_indices` and
    /// CSC/BSC tensors report `ccol_indices`.
    pub const fn compressed_indices_name(self) -> &'static str {
        if self.is_row_major() {
            "crow_indices"
        } else {
            "ccol_indices"
        }
    }

    /// Display name of the plain-axis index buffer
    pub const fn plain_indices_name(self) -> &'static str {
        if self.is_row_major() {
            "col_indices"
        } else {
            "row_indices"
        }
    }

    /// Display name of the compressed dimension ("row" or "column")
    pub const fn compressed_dim_name(self) -> &'static str {
        if self.is_row_major() {
            "row"
        } else {
            "column"
        }
    }

    /// Display name of the plain dimension
    pub const fn plain_dim_name(self) -> &'static str {
        if self.is_row_major() {
            "column"
        } else {
            "row"
        }
    }

    /// Index within `size` of the dimension the compressed count addresses
    ///
    /// Second-to-last dimension for row-major layouts, last for
    /// column-major. `size` must consist of batch plus base dimensions
    /// (no trailing dense dimensions).
    #[inline]
    pub fn compressed_dim_index(self, size: &[usize]) -> usize {
        debug_assert!(size.len() >= 2);
        if self.is_row_major() {
            size.len() - 2
        } else {
            size.len() - 1
        }
    }
}

impl fmt::Display for SparseLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_display() {
        assert_eq!(SparseLayout::Csr.to_string(), "CSR");
        assert_eq!(SparseLayout::Csc.to_string(), "CSC");
        assert_eq!(SparseLayout::Bsr.to_string(), "BSR");
        assert_eq!(SparseLayout::Bsc.to_string(), "BSC");
    }

    #[test]
    fn test_block_ndim() {
        assert_eq!(SparseLayout::Csr.block_ndim(), 0);
        assert_eq!(SparseLayout::Csc.block_ndim(), 0);
        assert_eq!(SparseLayout::Bsr.block_ndim(), 2);
        assert_eq!(SparseLayout::Bsc.block_ndim(), 2);
        assert!(SparseLayout::Bsr.is_blocked());
        assert!(!SparseLayout::Csr.is_blocked());
    }

    #[test]
    fn test_majorness() {
        assert!(SparseLayout::Csr.is_row_major());
        assert!(SparseLayout::Bsr.is_row_major());
        assert!(!SparseLayout::Csc.is_row_major());
        assert!(!SparseLayout::Bsc.is_row_major());
    }

    #[test]
    fn test_buffer_names() {
        assert_eq!(SparseLayout::Csr.compressed_indices_name(), "crow_indices");
        assert_eq!(SparseLayout::Csr.plain_indices_name(), "col_indices");
        assert_eq!(SparseLayout::Bsc.compressed_indices_name(), "ccol_indices");
        assert_eq!(SparseLayout::Bsc.plain_indices_name(), "row_indices");
        assert_eq!(SparseLayout::Csc.compressed_dim_name(), "column");
        assert_eq!(SparseLayout::Csc.plain_dim_name(), "row");
    }

    #[test]
    fn test_compressed_dim_index() {
        assert_eq!(SparseLayout::Csr.compressed_dim_index(&[3, 4]), 0);
        assert_eq!(SparseLayout::Csc.compressed_dim_index(&[3, 4]), 1);
        assert_eq!(SparseLayout::Bsr.compressed_dim_index(&[2, 6, 4]), 1);
        assert_eq!(SparseLayout::Bsc.compressed_dim_index(&[2, 6, 4]), 2);
    }
}
