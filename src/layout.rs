//! Cell ↔ world transforms for the board.
//!
//! Columns run along world +x and rows along world +z, both scaled by
//! `cell_size` from `origin`.  Wall entities sit `wall_offset` cells from the
//! cell centre toward their side.

use serde::{Deserialize, Serialize};

use crate::types::{Direction, DoorKey, GridCell, Vec3, WallKey};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridLayout {
    /// World position of cell `[0,0]`.
    pub origin: Vec3,
    /// World size of one cell side.
    pub cell_size: f32,
    /// Sub-cell offset of wall entities, as a fraction of `cell_size`.
    pub wall_offset: f32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            origin: Vec3::new(-7.0, 1.7, -5.2),
            cell_size: 2.0,
            wall_offset: 0.5,
        }
    }
}

impl GridLayout {
    pub fn cell_to_world(&self, cell: GridCell) -> Vec3 {
        Vec3::new(
            self.origin.x + cell.col as f32 * self.cell_size,
            self.origin.y,
            self.origin.z + cell.row as f32 * self.cell_size,
        )
    }

    pub fn wall_to_world(&self, key: WallKey) -> Vec3 {
        let centre = self.cell_to_world(key.cell);
        let d = self.wall_offset * self.cell_size;
        match key.direction {
            Direction::North => Vec3::new(centre.x, centre.y, centre.z + d),
            Direction::East => Vec3::new(centre.x + d, centre.y, centre.z),
            Direction::South => Vec3::new(centre.x, centre.y, centre.z - d),
            Direction::West => Vec3::new(centre.x - d, centre.y, centre.z),
        }
    }

    pub fn door_to_world(&self, key: DoorKey) -> Vec3 {
        let (a, b) = key.endpoints();
        let pa = self.cell_to_world(a);
        let pb = self.cell_to_world(b);
        Vec3::new(
            (pa.x + pb.x) * 0.5,
            (pa.y + pb.y) * 0.5,
            (pa.z + pb.z) * 0.5,
        )
    }

    pub fn world_to_cell(&self, pos: Vec3) -> GridCell {
        GridCell::new(
            ((pos.z - self.origin.z) / self.cell_size).round() as i32,
            ((pos.x - self.origin.x) / self.cell_size).round() as i32,
        )
    }

    /// Wall key for a pre-placed wall object at `pos`: nearest cell, then the
    /// dominant offset axis picks the side.
    pub fn wall_key_at(&self, pos: Vec3) -> WallKey {
        let cell = self.world_to_cell(pos);
        let centre = self.cell_to_world(cell);
        let dx = pos.x - centre.x;
        let dz = pos.z - centre.z;

        let direction = if dz.abs() > dx.abs() {
            if dz > 0.0 {
                Direction::North
            } else {
                Direction::South
            }
        } else if dx > 0.0 {
            Direction::East
        } else {
            Direction::West
        };

        WallKey::new(cell, direction)
    }
}
