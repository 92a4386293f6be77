use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use crate::config::Face;

bitflags! {
    /// Classification tag of one lattice cell.
    ///
    /// Face flags are OR-composed: a cell on an edge or vertex of the
    /// boundary shell carries every face it touches, plus `CORNER`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CellType: u32 {
        const FLUID = 1 << 0;
        const MOVING = 1 << 1;
        const CORNER = 1 << 2;
        const WALL = 1 << 3;

        const LEFT = 1 << 4;
        const RIGHT = 1 << 5;
        const TOP = 1 << 6;
        const BOTTOM = 1 << 7;
        const FRONT = 1 << 8;
        const BACK = 1 << 9;

        const FACES = Self::LEFT.bits()
            | Self::RIGHT.bits()
            | Self::TOP.bits()
            | Self::BOTTOM.bits()
            | Self::FRONT.bits()
            | Self::BACK.bits();
    }
}

impl CellType {
    pub fn is_fluid(self) -> bool {
        self.contains(Self::FLUID)
    }

    pub fn is_wall(self) -> bool {
        self.contains(Self::WALL)
    }

    pub fn is_corner(self) -> bool {
        self.contains(Self::CORNER)
    }

    /// Any cell of the first shell inside the walls, moving or not.
    pub fn is_boundary(self) -> bool {
        self.intersects(Self::FACES)
    }

    pub fn is_moving(self) -> bool {
        self.contains(Self::MOVING)
    }

    /// Cells the BGK operator relaxes.
    pub fn collides(self) -> bool {
        self.intersects(Self::FLUID | Self::MOVING)
    }

    /// Cells whose populations are reflected in place.
    pub fn bounces_back(self) -> bool {
        self.is_boundary() && !self.is_moving()
    }

    pub fn face_count(self) -> u32 {
        self.intersection(Self::FACES).bits().count_ones()
    }

    /// Integer code used by the cell-map dump.
    pub fn dump_code(self) -> u8 {
        if self.is_wall() {
            4
        } else if self.is_moving() {
            2
        } else if self.is_corner() {
            5
        } else if self.is_boundary() {
            3
        } else {
            1
        }
    }
}

impl From<Face> for CellType {
    fn from(face: Face) -> Self {
        match face {
            Face::Left => CellType::LEFT,
            Face::Right => CellType::RIGHT,
            Face::Bottom => CellType::BOTTOM,
            Face::Top => CellType::TOP,
            Face::Back => CellType::BACK,
            Face::Front => CellType::FRONT,
        }
    }
}
