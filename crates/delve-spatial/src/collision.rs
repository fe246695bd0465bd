//! Broad-phase collision index over solid tiles.
//!
//! The world is divided into square cells of `cell_size x cell_size` tiles.
//! Each cell keeps the world-space rectangles of the solid tiles inside it,
//! so a query only has to look at the few cells an entity's bounding box
//! spans.

use crate::GridPosition;
use crate::grid::TileGrid;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in world units. `(x, y)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// The world-space rectangle covered by one tile.
    pub fn from_tile(pos: GridPosition, tile_size: f32) -> Self {
        Self::new(
            pos.x as f32 * tile_size,
            pos.y as f32 * tile_size,
            tile_size,
            tile_size,
        )
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Strict overlap. Rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    tile: GridPosition,
    rect: Rect,
}

/// Cell -> solid tile rectangles, kept in lockstep with a [`TileGrid`].
#[derive(Debug, Clone)]
pub struct CollisionIndex {
    cell_size: u32,
    tile_size: f32,
    width: u32,
    height: u32,
    cols: u32,
    rows: u32,
    cells: Vec<Vec<Entry>>,
    len: usize,
}

impl CollisionIndex {
    /// An index with no solid tiles for a `width x height` tile world.
    /// `cell_size` is clamped to at least one tile.
    pub fn empty(width: u32, height: u32, cell_size: u32, tile_size: f32) -> Self {
        let cell_size = cell_size.max(1);
        let cols = width.div_ceil(cell_size).max(1);
        let rows = height.div_ceil(cell_size).max(1);
        Self {
            cell_size,
            tile_size,
            width,
            height,
            cols,
            rows,
            cells: vec![Vec::new(); (cols * rows) as usize],
            len: 0,
        }
    }

    /// Index every solid tile of `grid`.
    pub fn build(grid: &TileGrid, cell_size: u32, tile_size: f32) -> Self {
        let mut index = Self::empty(grid.width(), grid.height(), cell_size, tile_size);
        for (pos, tile) in grid.iter() {
            if tile.is_solid() {
                index.update(pos, true);
            }
        }
        index
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Number of cells horizontally and vertically.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }

    fn in_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn cell_of(&self, pos: GridPosition) -> usize {
        let cx = pos.x as u32 / self.cell_size;
        let cy = pos.y as u32 / self.cell_size;
        (cy * self.cols + cx) as usize
    }

    /// Insert (`added`) or remove one tile's rectangle. Adding a present
    /// tile or removing an absent one changes nothing. Out-of-bounds
    /// positions are ignored.
    pub fn update(&mut self, pos: GridPosition, added: bool) {
        if !self.in_bounds(pos) {
            return;
        }
        let cell = self.cell_of(pos);
        let entries = &mut self.cells[cell];
        let existing = entries.iter().position(|e| e.tile == pos);
        match (added, existing) {
            (true, None) => {
                entries.push(Entry {
                    tile: pos,
                    rect: Rect::from_tile(pos, self.tile_size),
                });
                self.len += 1;
            }
            (false, Some(i)) => {
                entries.swap_remove(i);
                self.len -= 1;
            }
            _ => {}
        }
    }

    pub fn contains_tile(&self, pos: GridPosition) -> bool {
        self.in_bounds(pos) && self.cells[self.cell_of(pos)].iter().any(|e| e.tile == pos)
    }

    /// Rectangles in cell `(cx, cy)`. Empty for cells outside the world.
    pub fn rects_in_cell(&self, cx: u32, cy: u32) -> Vec<Rect> {
        if cx >= self.cols || cy >= self.rows {
            return Vec::new();
        }
        self.cells[(cy * self.cols + cx) as usize]
            .iter()
            .map(|e| e.rect)
            .collect()
    }

    /// Cell range spanned by `rect`, clamped to the world.
    fn cell_range(&self, rect: &Rect) -> (u32, u32, u32, u32) {
        let span = self.tile_size * self.cell_size as f32;
        let (x0, x1) = (rect.x.min(rect.right()), rect.x.max(rect.right()));
        let (y0, y1) = (rect.y.min(rect.bottom()), rect.y.max(rect.bottom()));
        let clamp = |v: f32, max: u32| -> u32 {
            if span <= 0.0 || v.is_nan() || v < 0.0 {
                return 0;
            }
            ((v / span).floor() as u32).min(max - 1)
        };
        (
            clamp(x0, self.cols),
            clamp(y0, self.rows),
            clamp(x1, self.cols),
            clamp(y1, self.rows),
        )
    }

    fn entries_near<'a>(&'a self, rect: &Rect) -> impl Iterator<Item = &'a Entry> + 'a {
        let (cx0, cy0, cx1, cy1) = self.cell_range(rect);
        (cy0..=cy1).flat_map(move |cy| {
            (cx0..=cx1).flat_map(move |cx| self.cells[(cy * self.cols + cx) as usize].iter())
        })
    }

    /// Every rectangle in the cells `rect` spans. A superset of the tiles
    /// that actually overlap it; never misses one.
    pub fn query(&self, rect: &Rect) -> Vec<Rect> {
        self.entries_near(rect).map(|e| e.rect).collect()
    }

    /// Tile positions of the rectangles returned by [`query`](Self::query).
    pub fn query_tiles(&self, rect: &Rect) -> Vec<GridPosition> {
        self.entries_near(rect).map(|e| e.tile).collect()
    }

    /// Only the rectangles that strictly overlap `rect`.
    pub fn overlapping(&self, rect: &Rect) -> Vec<Rect> {
        self.entries_near(rect)
            .filter(|e| e.rect.intersects(rect))
            .map(|e| e.rect)
            .collect()
    }

    /// Total number of indexed tiles.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the index holds exactly the solid tiles of `grid`.
    pub fn is_consistent_with(&self, grid: &TileGrid) -> bool {
        let solid = grid.iter().filter(|(_, t)| t.is_solid()).count();
        solid == self.len
            && grid
                .iter()
                .all(|(pos, tile)| tile.is_solid() == self.contains_tile(pos))
    }
}
