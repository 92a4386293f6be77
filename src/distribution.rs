use anyhow::{Result, ensure};
use crate::{Float, lattice::D3Q19, layout::Layout};

/// One full-grid population buffer in the strided layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Distributions {
    layout: Layout,
    data: Vec<Float>,
}

impl Distributions {
    pub fn new(layout: Layout, fill: Float) -> Self {
        Self {
            layout,
            data: vec![fill; layout.len()],
        }
    }

    /// Wraps a buffer read back from a device.
    pub fn from_raw(layout: Layout, data: Vec<Float>) -> Result<Self> {
        ensure!(
            data.len() == layout.len(),
            "distribution buffer holds {} values, layout expects {}",
            data.len(),
            layout.len()
        );
        Ok(Self { layout, data })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn cells(&self) -> usize {
        self.layout.cells()
    }

    #[inline]
    pub fn get(&self, cell: usize, q: usize) -> Float {
        self.data[self.layout.index(cell, q)]
    }

    #[inline]
    pub fn set(&mut self, cell: usize, q: usize, value: Float) {
        let idx = self.layout.index(cell, q);
        self.data[idx] = value;
    }

    pub fn cell(&self, cell: usize) -> [Float; 19] {
        std::array::from_fn(|q| self.get(cell, q))
    }

    pub fn set_cell(&mut self, cell: usize, f: &[Float; 19]) {
        for (q, &value) in f.iter().enumerate() {
            self.set(cell, q, value);
        }
    }

    pub fn as_slice(&self) -> &[Float] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Float] {
        &mut self.data
    }
}

/// Mutable view of one block of `stride` consecutive cells.
pub struct BlockMut<'a> {
    layout: Layout,
    first: usize,
    data: &'a mut [Float],
}

impl<'a> BlockMut<'a> {
    pub fn new(layout: Layout, block: usize, data: &'a mut [Float]) -> Self {
        debug_assert_eq!(data.len(), layout.block_len());
        Self {
            layout,
            first: block * layout.stride(),
            data,
        }
    }

    /// Cells of the grid that live in this block; the padding tail is excluded.
    pub fn cells(&self) -> std::ops::Range<usize> {
        self.first..(self.first + self.layout.stride()).min(self.layout.cells())
    }

    #[inline]
    pub fn load(&self, cell: usize) -> [Float; 19] {
        std::array::from_fn(|q| self.data[self.layout.block_offset(cell, q)])
    }

    #[inline]
    pub fn store(&mut self, cell: usize, f: &[Float; 19]) {
        for q in 0..D3Q19::Q {
            self.data[self.layout.block_offset(cell, q)] = f[q];
        }
    }

    #[inline]
    pub fn set(&mut self, cell: usize, q: usize, value: Float) {
        self.data[self.layout.block_offset(cell, q)] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_round_trip_through_layout() {
        let layout = Layout::new(40, 8);
        let mut dist = Distributions::new(layout, 0.0);
        let f: [Float; 19] = std::array::from_fn(|q| q as Float * 0.5);
        dist.set_cell(21, &f);
        assert_eq!(dist.cell(21), f);
        assert_eq!(dist.cell(20), [0.0; 19]);
        assert_eq!(dist.get(21, 4), 2.0);
    }

    #[test]
    fn from_raw_checks_length() {
        let layout = Layout::new(10, 4);
        assert!(Distributions::from_raw(layout, vec![0.0; layout.len()]).is_ok());
        assert!(Distributions::from_raw(layout, vec![0.0; 10 * 19]).is_err());
    }

    #[test]
    fn blocks_see_the_same_cells_as_the_buffer() {
        let layout = Layout::new(10, 4);
        let mut dist = Distributions::new(layout, 0.0);
        for (block, chunk) in dist.as_mut_slice().chunks_mut(layout.block_len()).enumerate() {
            let mut view = BlockMut::new(layout, block, chunk);
            for cell in view.cells() {
                view.set(cell, 3, cell as Float);
            }
        }
        for cell in 0..10 {
            assert_eq!(dist.get(cell, 3), cell as Float);
        }

        let last = dist.as_mut_slice().chunks_mut(layout.block_len()).nth(2).unwrap();
        assert_eq!(BlockMut::new(layout, 2, last).cells(), 8..10);
    }
}
