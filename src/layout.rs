use log::warn;
use crate::lattice::D3Q19;

/// Strided structure-of-arrays addressing.
///
/// Cells are grouped in blocks of `stride`. Inside a block, the populations
/// of one direction are contiguous, so neighbouring work items touch
/// neighbouring addresses. Stride 1 degenerates to array-of-structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    stride: usize,
    shift: u32,
    cells: usize,
}

impl Layout {
    /// `stride` is rounded down to a power of two.
    pub fn new(cells: usize, stride: usize) -> Self {
        let stride = stride.max(1);
        let rounded = previous_power_of_two(stride);
        if rounded != stride {
            warn!("stride {} is rounded to the previous power of two: {}", stride, rounded);
        }
        Self {
            stride: rounded,
            shift: rounded.trailing_zeros(),
            cells,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn cells(&self) -> usize {
        self.cells
    }

    pub fn blocks(&self) -> usize {
        self.cells.div_ceil(self.stride)
    }

    /// Floats per block of `stride` cells.
    pub fn block_len(&self) -> usize {
        self.stride * D3Q19::Q
    }

    /// Buffer length, padded to a whole number of blocks.
    pub fn len(&self) -> usize {
        self.blocks() * self.block_len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells == 0
    }

    #[inline]
    pub fn index(&self, cell: usize, q: usize) -> usize {
        ((cell >> self.shift) * D3Q19::Q + q) * self.stride + (cell & (self.stride - 1))
    }

    /// Index relative to the start of the cell's block.
    #[inline]
    pub fn block_offset(&self, cell: usize, q: usize) -> usize {
        q * self.stride + (cell & (self.stride - 1))
    }
}

fn previous_power_of_two(x: usize) -> usize {
    1 << x.ilog2()
}
