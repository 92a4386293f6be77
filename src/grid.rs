use crate::cell::CellType;
use crate::config::Face;

/// Cubic lattice of side `dim`, linear-indexed as `x + y*dim + z*dim*dim`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    dim: usize,
}

impl Grid {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn cells(&self) -> usize {
        self.dim * self.dim * self.dim
    }

    /// Linear index of `(x, y, z)`, or `None` outside the lattice.
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        let n = self.dim;
        (x < n && y < n && z < n).then(|| x + y * n + z * n * n)
    }

    #[inline]
    pub fn coords(&self, id: usize) -> (usize, usize, usize) {
        let n = self.dim;
        (id % n, (id / n) % n, id / (n * n))
    }

    /// Cell at `id + offset`, or `None` when that leaves the lattice.
    /// There is no periodic wraparound.
    #[inline]
    pub fn neighbor(&self, id: usize, offset: [i32; 3]) -> Option<usize> {
        let (x, y, z) = self.coords(id);
        let shift = |c: usize, d: i32| c.checked_add_signed(d as isize);
        self.index(shift(x, offset[0])?, shift(y, offset[1])?, shift(z, offset[2])?)
    }

    /// The cell a population travelling along `e` arrives from.
    #[inline]
    pub fn upstream(&self, id: usize, e: [i32; 3]) -> Option<usize> {
        self.neighbor(id, [-e[0], -e[1], -e[2]])
    }
}

/// Classification of a single cell. Pure function of its coordinates.
pub fn classify_cell(dim: usize, x: usize, y: usize, z: usize, moving_face: Option<Face>) -> CellType {
    let outer = dim - 1;
    if [x, y, z].iter().any(|&c| c == 0 || c == outer) {
        return CellType::WALL;
    }

    let inner = dim - 2;
    let mut cell = CellType::empty();
    if x == 1 {
        cell |= CellType::LEFT;
    }
    if x == inner {
        cell |= CellType::RIGHT;
    }
    if y == 1 {
        cell |= CellType::BOTTOM;
    }
    if y == inner {
        cell |= CellType::TOP;
    }
    if z == 1 {
        cell |= CellType::BACK;
    }
    if z == inner {
        cell |= CellType::FRONT;
    }

    if cell.is_empty() {
        return CellType::FLUID;
    }
    if cell.face_count() >= 2 {
        cell |= CellType::CORNER;
    }
    if let Some(face) = moving_face {
        if cell.contains(CellType::from(face)) {
            cell |= CellType::MOVING;
        }
    }
    cell
}

/// Immutable per-cell classification map, built once at setup.
#[derive(Debug, Clone, PartialEq)]
pub struct CellMap {
    grid: Grid,
    cells: Vec<CellType>,
}

impl CellMap {
    pub fn classify(grid: Grid, moving_face: Option<Face>) -> Self {
        let n = grid.dim();
        let cells = (0..grid.cells())
            .map(|id| {
                let (x, y, z) = grid.coords(id);
                classify_cell(n, x, y, z, moving_face)
            })
            .collect();
        Self { grid, cells }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    #[inline]
    pub fn get(&self, id: usize) -> CellType {
        self.cells[id]
    }

    pub fn at(&self, x: usize, y: usize, z: usize) -> Option<CellType> {
        self.grid.index(x, y, z).map(|id| self.cells[id])
    }

    pub fn as_slice(&self) -> &[CellType] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn count(&self, predicate: impl Fn(CellType) -> bool) -> usize {
        self.cells.iter().filter(|&&c| predicate(c)).count()
    }

    /// Raw flag words, as uploaded to the device.
    pub fn bits(&self) -> Vec<u32> {
        self.cells.iter().map(|c| c.bits()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip() {
        let grid = Grid::new(5);
        for id in 0..grid.cells() {
            let (x, y, z) = grid.coords(id);
            assert_eq!(grid.index(x, y, z), Some(id));
        }
        assert_eq!(grid.index(5, 0, 0), None);
        assert_eq!(grid.index(0, 0, 5), None);
    }

    #[test]
    fn neighbor_is_bounds_checked() {
        let grid = Grid::new(4);
        let origin = grid.index(0, 0, 0).unwrap();
        assert_eq!(grid.neighbor(origin, [-1, 0, 0]), None);
        assert_eq!(grid.neighbor(origin, [1, 1, 1]), grid.index(1, 1, 1));

        let far = grid.index(3, 3, 3).unwrap();
        assert_eq!(grid.neighbor(far, [1, 0, 0]), None);
        assert_eq!(grid.upstream(far, [1, 0, -1]), None);
        assert_eq!(grid.upstream(far, [1, 1, 0]), grid.index(2, 2, 3));
    }

    #[test]
    fn shell_is_wall_and_interior_is_fluid() {
        let map = CellMap::classify(Grid::new(8), Some(Face::Front));
        assert_eq!(map.at(0, 3, 3), Some(CellType::WALL));
        assert_eq!(map.at(7, 7, 7), Some(CellType::WALL));
        assert_eq!(map.at(3, 4, 2), Some(CellType::FLUID));
        assert_eq!(map.count(CellType::is_wall), 8 * 8 * 8 - 6 * 6 * 6);
        assert_eq!(map.count(CellType::is_fluid), 4 * 4 * 4);
    }

    #[test]
    fn faces_corners_and_lid() {
        let map = CellMap::classify(Grid::new(8), Some(Face::Front));

        let left = map.at(1, 3, 3).unwrap();
        assert_eq!(left, CellType::LEFT);

        let lid = map.at(3, 3, 6).unwrap();
        assert_eq!(lid, CellType::FRONT | CellType::MOVING);

        let edge = map.at(1, 6, 3).unwrap();
        assert_eq!(edge, CellType::LEFT | CellType::TOP | CellType::CORNER);

        let lid_vertex = map.at(6, 1, 6).unwrap();
        assert!(lid_vertex.is_corner());
        assert!(lid_vertex.is_moving());
        assert_eq!(lid_vertex.face_count(), 3);

        // Only the driven face moves.
        assert_eq!(map.count(CellType::is_moving), 6 * 6);
        assert!(map.as_slice().iter().all(|c| !c.is_moving() || c.contains(CellType::FRONT)));
    }

    #[test]
    fn closed_cavity_has_no_moving_cells() {
        let map = CellMap::classify(Grid::new(6), None);
        assert_eq!(map.count(CellType::is_moving), 0);
        assert_eq!(map.count(CellType::bounces_back), 4 * 4 * 4 - 2 * 2 * 2);
    }

    #[test]
    fn smallest_grid_is_a_single_vertex_cell() {
        let map = CellMap::classify(Grid::new(3), Some(Face::Front));
        let centre = map.at(1, 1, 1).unwrap();
        assert_eq!(centre.face_count(), 6);
        assert!(centre.is_corner());
        assert!(centre.is_moving());
        assert_eq!(map.count(CellType::is_wall), 26);
    }

    #[test]
    fn classification_is_idempotent() {
        let grid = Grid::new(9);
        let first = CellMap::classify(grid, Some(Face::Front));
        let second = CellMap::classify(grid, Some(Face::Front));
        assert_eq!(first, second);
        assert_eq!(first.bits(), second.bits());
    }
}
