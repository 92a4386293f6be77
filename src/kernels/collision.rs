use nalgebra::Vector3;
use crate::{
    Float,
    cell::CellType,
    distribution::Distributions,
    grid::CellMap,
    lattice::{CellMoments, D3Q19},
};
use super::{StepParams, for_each_cell_mut};

/// BGK relaxation of one cell towards its local equilibrium.
///
/// Moving cells relax towards the wall velocity but keep the density their
/// populations sum to.
#[inline]
pub fn collide_cell(kind: CellType, f: &mut [Float; 19], omega: Float, wall_velocity: &Vector3<Float>) {
    let moments = CellMoments::from_populations(f);
    let u = if kind.is_moving() {
        *wall_velocity
    } else {
        moments.velocity()
    };
    for (q, fi) in f.iter_mut().enumerate() {
        let feq = D3Q19::equilibrium(q, moments.rho, &u);
        *fi -= (*fi - feq) * omega;
    }
}

/// Collision pass over the collide buffer, fluid and moving cells only.
pub fn apply(collide: &mut Distributions, map: &CellMap, params: &StepParams) {
    let omega = params.omega;
    let u_wall = params.wall_velocity;
    for_each_cell_mut(collide, map, CellType::collides, |kind, f| {
        collide_cell(kind, f, omega, &u_wall)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn equilibrium_is_a_fixed_point() {
        let u = Vector3::new(0.02, -0.01, 0.03);
        let mut f = D3Q19::equilibria(1.01, &u);
        let before = f;
        collide_cell(CellType::FLUID, &mut f, 1.8, &Vector3::zeros());
        for (a, b) in f.iter().zip(before.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn conserves_mass_and_momentum() {
        let mut f = D3Q19::equilibria(1.0, &Vector3::new(0.03, 0.0, 0.0));
        // Perturb away from equilibrium without changing the moments.
        f[1] += 0.002;
        f[3] += 0.002;
        f[0] -= 0.004;
        let before = CellMoments::from_populations(&f);
        collide_cell(CellType::FLUID, &mut f, 1.2, &Vector3::zeros());
        let after = CellMoments::from_populations(&f);
        assert_relative_eq!(after.rho, before.rho, epsilon = 1e-6);
        assert_relative_eq!(after.momentum, before.momentum, epsilon = 1e-6);
    }

    #[test]
    fn unit_rate_lands_on_equilibrium() {
        let mut f: [Float; 19] = std::array::from_fn(|q| D3Q19::DIRECTIONS[q].weight * (1.0 + 0.01 * q as Float));
        let moments = CellMoments::from_populations(&f);
        collide_cell(CellType::FLUID, &mut f, 1.0, &Vector3::zeros());
        let expected = D3Q19::equilibria(moments.rho, &moments.velocity());
        for (a, b) in f.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn moving_cell_relaxes_towards_wall_velocity() {
        let u_wall = Vector3::new(0.05, 0.0, 0.0);
        let mut f = D3Q19::equilibria(0.98, &Vector3::zeros());
        collide_cell(CellType::FRONT | CellType::MOVING, &mut f, 1.0, &u_wall);
        let moments = CellMoments::from_populations(&f);
        assert_relative_eq!(moments.rho, 0.98, epsilon = 1e-6);
        assert_relative_eq!(moments.velocity(), u_wall, epsilon = 1e-6);
    }
}
