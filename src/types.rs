//! Core client types shared across all modules.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Step toward `target` by at most `max_delta`, never overshooting.
    pub fn move_towards(self, target: Vec3, max_delta: f32) -> Vec3 {
        let dist = self.distance(target);
        if dist <= max_delta || dist == 0.0 {
            return target;
        }
        let t = max_delta / dist;
        Vec3::new(
            self.x + (target.x - self.x) * t,
            self.y + (target.y - self.y) * t,
            self.z + (target.z - self.z) * t,
        )
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Grid addressing
// ---------------------------------------------------------------------------

/// A board cell.  The outer index of every snapshot grid is `row`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct GridCell {
    pub row: i32,
    pub col: i32,
}

impl GridCell {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The adjacent cell on `direction`, or `None` off the end of `i32`.
    pub fn neighbor(self, direction: Direction) -> Option<GridCell> {
        let (row, col) = match direction {
            Direction::North => (self.row.checked_add(1)?, self.col),
            Direction::East => (self.row, self.col.checked_add(1)?),
            Direction::South => (self.row.checked_sub(1)?, self.col),
            Direction::West => (self.row, self.col.checked_sub(1)?),
        };
        Some(GridCell::new(row, col))
    }
}

impl From<[i32; 2]> for GridCell {
    fn from(p: [i32; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

impl std::fmt::Display for GridCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.row, self.col)
    }
}

/// Wall side of a cell.  North and East point along +row and +col; the
/// discriminant is the index used by `walls_damage[row][col][direction]`,
/// which the simulation orders col + 1, row + 1, col - 1, row - 1.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// col + 1
    East = 0,
    /// row + 1
    North = 1,
    /// col - 1
    West = 2,
    /// row - 1
    South = 3,
}

impl Direction {
    /// In `walls_damage` index order.
    pub const ALL: [Direction; 4] = [
        Direction::East,
        Direction::North,
        Direction::West,
        Direction::South,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Direction from `from` to an orthogonally adjacent `to`.
    pub fn between(from: GridCell, to: GridCell) -> Option<Direction> {
        let dr = i64::from(to.row) - i64::from(from.row);
        let dc = i64::from(to.col) - i64::from(from.col);
        match (dr, dc) {
            (1, 0) => Some(Direction::North),
            (0, 1) => Some(Direction::East),
            (-1, 0) => Some(Direction::South),
            (0, -1) => Some(Direction::West),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct WallKey {
    pub cell: GridCell,
    pub direction: Direction,
}

impl WallKey {
    pub fn new(cell: GridCell, direction: Direction) -> Self {
        Self { cell, direction }
    }

    /// The same wall seen from the neighbouring cell.
    pub fn mirrored(self) -> Option<WallKey> {
        let cell = self.cell.neighbor(self.direction)?;
        Some(WallKey::new(cell, self.direction.opposite()))
    }
}

impl std::fmt::Display for WallKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:?}", self.cell, self.direction)
    }
}

/// A door between two adjacent cells.  Endpoint order is normalised so that
/// `(a, b)` and `(b, a)` name the same door.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DoorKey {
    a: GridCell,
    b: GridCell,
}

impl DoorKey {
    pub fn new(a: GridCell, b: GridCell) -> ClientResult<Self> {
        if Direction::between(a, b).is_none() {
            return Err(ClientError::Schema(format!(
                "door endpoints {} and {} are not adjacent",
                a, b
            )));
        }
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Ok(Self { a, b })
    }

    pub fn endpoints(&self) -> (GridCell, GridCell) {
        (self.a, self.b)
    }
}

impl std::fmt::Display for DoorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.a, self.b)
    }
}

// ---------------------------------------------------------------------------
// Rendered entities
// ---------------------------------------------------------------------------

/// Visual archetype the scene instantiates.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Smoke,
    Fire,
    Poi,
    Victim,
    FalseAlarm,
    Agent,
    Wall,
    Door,
}

/// Opaque handle issued by a [`Scene`](crate::scene::Scene).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

impl std::fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// Converts a numeric snapshot code (`2` or `2.0`) into an integer tag.
fn integral_code(raw: f64, what: &str) -> ClientResult<u8> {
    if raw.fract() != 0.0 || !(0.0..=255.0).contains(&raw) {
        return Err(ClientError::Schema(format!("{} code {} is not a tag", what, raw)));
    }
    Ok(raw as u8)
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum FireValue {
    Clear,
    Smoke,
    Fire,
}

impl FireValue {
    pub fn from_code(raw: f64) -> ClientResult<Self> {
        match integral_code(raw, "fire")? {
            0 => Ok(FireValue::Clear),
            1 => Ok(FireValue::Smoke),
            2 => Ok(FireValue::Fire),
            other => Err(ClientError::Schema(format!("unknown fire code {}", other))),
        }
    }
}

/// Victims and false alarms look identical until revealed by an event.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum PoiValue {
    Empty,
    Hidden,
}

impl PoiValue {
    pub fn from_code(raw: f64) -> ClientResult<Self> {
        match integral_code(raw, "poi")? {
            0 => Ok(PoiValue::Empty),
            1 | 2 => Ok(PoiValue::Hidden),
            other => Err(ClientError::Schema(format!("unknown poi code {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum WallDamage {
    Intact = 0,
    Damaged = 1,
    Demolished = 2,
}

impl WallDamage {
    pub fn from_code(raw: f64) -> ClientResult<Self> {
        match integral_code(raw, "wall damage")? {
            0 => Ok(WallDamage::Intact),
            1 => Ok(WallDamage::Damaged),
            2 => Ok(WallDamage::Demolished),
            other => Err(ClientError::Schema(format!("unknown wall damage {}", other))),
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum DoorState {
    Closed = 0,
    Open = 1,
    Destroyed = 2,
}

impl DoorState {
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> DoorState {
        match level {
            0 => DoorState::Closed,
            1 => DoorState::Open,
            _ => DoorState::Destroyed,
        }
    }
}
