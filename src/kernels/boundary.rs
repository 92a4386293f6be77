use nalgebra::Vector3;
use crate::{
    Float,
    cell::CellType,
    distribution::Distributions,
    grid::CellMap,
    lattice::D3Q19,
};
use super::{StepParams, for_each_cell_mut};

/// Boundary correction of a single cell, applied before collision.
///
/// Moving cells are overwritten with the equilibrium at the wall velocity and
/// the density they currently hold. Every other boundary cell, corners
/// included, reflects its populations by exchanging each complementary pair.
#[inline]
pub fn apply_cell(kind: CellType, f: &mut [Float; 19], wall_velocity: &Vector3<Float>) {
    if kind.is_moving() {
        let rho: Float = f.iter().sum();
        *f = D3Q19::equilibria(rho, wall_velocity);
    } else {
        bounce_back(f);
    }
}

#[inline]
pub fn bounce_back(f: &mut [Float; 19]) {
    for &(a, b) in &D3Q19::BOUNCE_BACK_PAIRS {
        f.swap(a, b);
    }
}

/// Boundary pass over the collide buffer. Fluid and wall cells are untouched.
pub fn apply(collide: &mut Distributions, map: &CellMap, params: &StepParams) {
    let u_wall = params.wall_velocity;
    for_each_cell_mut(collide, map, CellType::is_boundary, |kind, f| {
        apply_cell(kind, f, &u_wall)
    });
}
