//! Per-cell update rules and the data-parallel passes that apply them.
//!
//! Every pass hands whole layout blocks to rayon workers. A block owns a
//! contiguous slice of the buffer it writes, so workers never alias.

pub mod boundary;
pub mod collision;
pub mod init;
pub mod streaming;

use nalgebra::Vector3;
use rayon::prelude::*;
use crate::{
    Float,
    cell::CellType,
    config::Config,
    distribution::{BlockMut, Distributions},
    grid::CellMap,
};

/// Scalars every pass needs, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    pub omega: Float,
    pub wall_velocity: Vector3<Float>,
}

impl StepParams {
    pub fn from_config(config: &Config) -> Self {
        let [ux, uy, uz] = config.physics.wall_velocity;
        Self {
            omega: config.omega(),
            wall_velocity: Vector3::new(ux, uy, uz),
        }
    }
}

/// Applies `op` in place to every cell selected by `select`.
pub(crate) fn for_each_cell_mut<S, F>(dist: &mut Distributions, map: &CellMap, select: S, op: F)
where
    S: Fn(CellType) -> bool + Sync,
    F: Fn(CellType, &mut [Float; 19]) + Sync,
{
    let layout = dist.layout();
    dist.as_mut_slice()
        .par_chunks_mut(layout.block_len())
        .enumerate()
        .for_each(|(block, chunk)| {
            let mut view = BlockMut::new(layout, block, chunk);
            for cell in view.cells() {
                let kind = map.get(cell);
                if !select(kind) {
                    continue;
                }
                let mut f = view.load(cell);
                op(kind, &mut f);
                view.store(cell, &f);
            }
        });
}
