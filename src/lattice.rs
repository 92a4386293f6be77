use nalgebra::Vector3;
use crate::Float;

/// One discrete velocity of the stencil together with its quadrature weight
/// and the index of the direction pointing the other way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction {
    pub e: [i32; 3],
    pub weight: Float,
    pub opposite: usize,
}

impl Direction {
    const fn new(e: [i32; 3], weight: Float, opposite: usize) -> Self {
        Self { e, weight, opposite }
    }

    pub fn velocity(&self) -> Vector3<Float> {
        Vector3::new(self.e[0] as Float, self.e[1] as Float, self.e[2] as Float)
    }
}

const W_REST: Float = 1.0 / 3.0;
const W_AXIS: Float = 1.0 / 18.0;
const W_DIAG: Float = 1.0 / 36.0;

/// D3Q19 Lattice-Boltzmann model constants
pub struct D3Q19;

impl D3Q19 {
    /// Number of discrete velocities
    pub const Q: usize = 19;

    pub const DIRECTIONS: [Direction; 19] = [
        // Rest
        Direction::new([0, 0, 0], W_REST, 0),
        // Axis neighbours (6)
        Direction::new([1, 0, 0], W_AXIS, 3),
        Direction::new([0, 1, 0], W_AXIS, 4),
        Direction::new([-1, 0, 0], W_AXIS, 1),
        Direction::new([0, -1, 0], W_AXIS, 2),
        Direction::new([0, 0, 1], W_AXIS, 6),
        Direction::new([0, 0, -1], W_AXIS, 5),
        // Face diagonals (12)
        Direction::new([1, 1, 0], W_DIAG, 9),
        Direction::new([-1, 1, 0], W_DIAG, 10),
        Direction::new([-1, -1, 0], W_DIAG, 7),
        Direction::new([1, -1, 0], W_DIAG, 8),
        Direction::new([1, 0, 1], W_DIAG, 13),
        Direction::new([0, 1, 1], W_DIAG, 14),
        Direction::new([-1, 0, -1], W_DIAG, 11),
        Direction::new([0, -1, -1], W_DIAG, 12),
        Direction::new([1, 0, -1], W_DIAG, 17),
        Direction::new([0, 1, -1], W_DIAG, 18),
        Direction::new([-1, 0, 1], W_DIAG, 15),
        Direction::new([0, -1, 1], W_DIAG, 16),
    ];

    /// The nine complementary pairs exchanged by bounce-back; the rest
    /// direction is its own opposite and is left alone.
    pub const BOUNCE_BACK_PAIRS: [(usize, usize); 9] = [
        (1, 3), (2, 4), (5, 6), (7, 9), (8, 10),
        (11, 13), (12, 14), (15, 17), (16, 18),
    ];

    /// Equilibrium population of direction `i` for density `rho` and velocity `u`.
    #[inline]
    pub fn equilibrium(i: usize, rho: Float, u: &Vector3<Float>) -> Float {
        let dir = &Self::DIRECTIONS[i];
        let eu = dir.velocity().dot(u);
        let u2 = u.norm_squared();
        dir.weight * rho * (1.0 + 3.0 * eu + 4.5 * eu * eu - 1.5 * u2)
    }

    /// All nineteen equilibrium populations at once.
    pub fn equilibria(rho: Float, u: &Vector3<Float>) -> [Float; 19] {
        std::array::from_fn(|i| Self::equilibrium(i, rho, u))
    }
}

/// Zeroth and first moments of one cell's populations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMoments {
    pub rho: Float,
    pub momentum: Vector3<Float>,
}

impl CellMoments {
    pub fn from_populations(f: &[Float; 19]) -> Self {
        let mut rho = 0.0;
        let mut momentum = Vector3::zeros();
        for (dir, &fi) in D3Q19::DIRECTIONS.iter().zip(f.iter()) {
            rho += fi;
            momentum += dir.velocity() * fi;
        }
        Self { rho, momentum }
    }

    /// Macroscopic velocity. No guard against vanishing density: a cell with
    /// rho == 0 is already broken and NaN is the honest answer.
    pub fn velocity(&self) -> Vector3<Float> {
        self.momentum / self.rho
    }
}
