use nalgebra::Vector3;
use crate::{
    Float,
    distribution::Distributions,
    grid::CellMap,
    lattice::D3Q19,
    layout::Layout,
};

/// Builds the two buffers of a fresh run: `[collide, target]`.
///
/// Fluid and boundary cells of the collide buffer start at equilibrium with
/// density `rho` (moving cells at `wall_velocity`, the rest at rest). Wall
/// cells of both buffers hold the rest equilibrium: they are never updated
/// and only feed streaming as upstream sources. Non-wall cells of the target
/// buffer are NaN until streaming writes them.
pub fn initialize(
    layout: Layout,
    map: &CellMap,
    rho: Float,
    wall_velocity: &Vector3<Float>,
) -> [Distributions; 2] {
    let mut collide = Distributions::new(layout, Float::NAN);
    let mut target = Distributions::new(layout, Float::NAN);

    let at_rest = D3Q19::equilibria(rho, &Vector3::zeros());
    let driven = D3Q19::equilibria(rho, wall_velocity);

    for (cell, kind) in map.as_slice().iter().enumerate() {
        if kind.is_wall() {
            collide.set_cell(cell, &at_rest);
            target.set_cell(cell, &at_rest);
        } else if kind.is_moving() {
            collide.set_cell(cell, &driven);
        } else {
            collide.set_cell(cell, &at_rest);
        }
    }

    [collide, target]
}
