use rayon::prelude::*;
use crate::{
    Float,
    distribution::Distributions,
    grid::CellMap,
    lattice::CellMoments,
};

/// Density and velocity per cell, derived from one distribution buffer.
/// Wall cells carry no fluid and report NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroscopicFields {
    pub rho: Vec<Float>,
    pub velocity: Vec<[Float; 3]>,
}

impl MacroscopicFields {
    pub fn compute(dist: &Distributions, map: &CellMap) -> Self {
        let (rho, velocity) = (0..map.len())
            .into_par_iter()
            .map(|cell| {
                if map.get(cell).is_wall() {
                    return (Float::NAN, [Float::NAN; 3]);
                }
                let moments = CellMoments::from_populations(&dist.cell(cell));
                let u = moments.velocity();
                (moments.rho, [u.x, u.y, u.z])
            })
            .unzip();
        Self { rho, velocity }
    }

    /// Sum of density over every non-wall cell, accumulated in f64.
    pub fn total_mass(&self, map: &CellMap) -> f64 {
        self.rho
            .iter()
            .zip(map.as_slice())
            .filter(|(_, kind)| !kind.is_wall())
            .map(|(&rho, _)| rho as f64)
            .sum()
    }

    pub fn max_speed(&self, map: &CellMap) -> Float {
        self.velocity
            .iter()
            .zip(map.as_slice())
            .filter(|(_, kind)| !kind.is_wall())
            .map(|(u, _)| (u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt())
            .fold(0.0, Float::max)
    }
}

/// Read-only view handed to output collaborators at a sampling point.
pub struct Snapshot<'a> {
    pub iteration: usize,
    pub fields: &'a MacroscopicFields,
    pub distributions: &'a Distributions,
    pub map: &'a CellMap,
}
