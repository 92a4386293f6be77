use rayon::prelude::*;
use crate::{
    distribution::{BlockMut, Distributions},
    grid::CellMap,
    lattice::D3Q19,
};

/// Gathers post-collision populations into the target buffer:
/// `target[cell][q] = source[cell - e_q][q]` for every non-wall cell.
///
/// `source` is only read and `target` only written, so cells may be visited
/// in any order. Wall cells of `target` keep whatever they held.
pub fn apply(source: &Distributions, target: &mut Distributions, map: &CellMap) {
    let grid = map.grid();
    let layout = target.layout();
    debug_assert_eq!(layout, source.layout());

    target
        .as_mut_slice()
        .par_chunks_mut(layout.block_len())
        .enumerate()
        .for_each(|(block, chunk)| {
            let mut view = BlockMut::new(layout, block, chunk);
            for cell in view.cells() {
                if map.get(cell).is_wall() {
                    continue;
                }
                for (q, dir) in D3Q19::DIRECTIONS.iter().enumerate() {
                    // The wall shell guarantees an upstream cell for every non-wall cell.
                    if let Some(src) = grid.upstream(cell, dir.e) {
                        view.set(cell, q, source.get(src, q));
                    }
                }
            }
        });
}
