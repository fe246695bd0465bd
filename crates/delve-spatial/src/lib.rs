//! Spatial layer of the sandbox world.
//!
//! Provides grid coordinates, the dense tile grid, the collision-cell index
//! over solid tiles and the sparse map of placed structures (machines,
//! pipes and inserters), including multi-tile footprints and adjacency.

use serde::{Deserialize, Serialize};

pub mod collision;
pub mod grid;
pub mod object_map;

pub use collision::{CollisionIndex, Rect};
pub use grid::{GridError, TileGrid};
pub use object_map::ObjectMap;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A tile coordinate. `x` grows to the right, `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The adjacent position in `dir`.
    pub fn step(self, dir: Direction) -> GridPosition {
        let (dx, dy) = dir.offset();
        GridPosition::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Squared Euclidean distance to another position.
    pub fn distance_squared(&self, other: &GridPosition) -> u64 {
        let dx = (self.x - other.x).unsigned_abs() as u64;
        let dy = (self.y - other.y).unsigned_abs() as u64;
        dx * dx + dy * dy
    }

    /// The four orthogonal neighbours, in [`Direction::all`] order.
    pub fn neighbors_4(self) -> [GridPosition; 4] {
        Direction::all().map(|dir| self.step(dir))
    }
}

/// The size of a placed structure, in tiles. The origin is the top-left
/// tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A 1x1 structure.
    pub fn single() -> Self {
        Self::new(1, 1)
    }

    /// All tiles covered by this footprint at `origin`, row by row.
    pub fn tiles(&self, origin: GridPosition) -> impl Iterator<Item = GridPosition> {
        let w = self.width as i32;
        let h = self.height as i32;
        let (ox, oy) = (origin.x, origin.y);
        (0..h).flat_map(move |dy| (0..w).map(move |dx| GridPosition::new(ox + dx, oy + dy)))
    }

    /// The row of tiles directly beneath the footprint.
    pub fn row_below(&self, origin: GridPosition) -> impl Iterator<Item = GridPosition> {
        let y = origin.y + self.height as i32;
        (0..self.width as i32).map(move |dx| GridPosition::new(origin.x + dx, y))
    }

    /// Tiles outside the footprint that share an edge with it.
    pub fn border(&self, origin: GridPosition) -> Vec<GridPosition> {
        let w = self.width as i32;
        let h = self.height as i32;
        let mut out = Vec::with_capacity(2 * (w + h) as usize);
        for dx in 0..w {
            out.push(GridPosition::new(origin.x + dx, origin.y - 1));
            out.push(GridPosition::new(origin.x + dx, origin.y + h));
        }
        for dy in 0..h {
            out.push(GridPosition::new(origin.x - 1, origin.y + dy));
            out.push(GridPosition::new(origin.x + w, origin.y + dy));
        }
        out
    }

    pub fn contains(&self, origin: GridPosition, pos: GridPosition) -> bool {
        pos.x >= origin.x
            && pos.y >= origin.y
            && pos.x < origin.x + self.width as i32
            && pos.y < origin.y + self.height as i32
    }
}

/// Cardinal directions. Ordered north, east, south, west.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction (y grows downward).
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Screen angle in degrees, clockwise from east.
    pub fn angle(self) -> u32 {
        match self {
            Direction::East => 0,
            Direction::South => 90,
            Direction::West => 180,
            Direction::North => 270,
        }
    }
}

/// Errors from object map operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SpatialError {
    #[error("position is occupied")]
    Occupied,
    #[error("object is not placed")]
    NotPlaced,
    #[error("object is already placed")]
    AlreadyPlaced,
}
