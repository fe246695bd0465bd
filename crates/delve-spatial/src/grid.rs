//! Dense tile grid.

use crate::GridPosition;
use delve_core::id::TileId;

/// Errors from rebuilding a grid out of persisted rows.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GridError {
    #[error("grid must have at least one row and one column")]
    Empty,
    #[error("row {row} has {found} tiles, expected {expected}")]
    Ragged { row: usize, expected: usize, found: usize },
    #[error("unknown tile id {id} at ({x}, {y})")]
    UnknownTile { x: usize, y: usize, id: u16 },
}

/// `width x height` tile IDs, stored row-major. Every cell always holds
/// exactly one ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    cells: Vec<TileId>,
}

impl TileGrid {
    pub fn new(width: u32, height: u32, fill: TileId) -> Self {
        Self {
            width,
            height,
            cells: vec![fill; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPosition) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: GridPosition) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }

    pub fn get(&self, pos: GridPosition) -> Option<TileId> {
        self.index(pos).map(|i| self.cells[i])
    }

    /// Whether the tile at `pos` is solid. Out-of-bounds positions are not.
    pub fn is_solid(&self, pos: GridPosition) -> bool {
        self.get(pos).is_some_and(TileId::is_solid)
    }

    /// Write a tile and return the one it replaced. Out-of-bounds writes
    /// return `None` and change nothing.
    pub fn set(&mut self, pos: GridPosition, tile: TileId) -> Option<TileId> {
        let i = self.index(pos)?;
        Some(std::mem::replace(&mut self.cells[i], tile))
    }

    /// Every in-bounds position, row by row.
    pub fn positions(&self) -> impl Iterator<Item = GridPosition> + use<> {
        let (w, h) = (self.width as i32, self.height as i32);
        (0..h).flat_map(move |y| (0..w).map(move |x| GridPosition::new(x, y)))
    }

    /// `(position, tile)` pairs, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (GridPosition, TileId)> + '_ {
        self.positions().zip(self.cells.iter().copied())
    }

    /// Overwrite a whole column, top to bottom. Extra values are ignored.
    pub fn fill_column(&mut self, x: u32, column: &[TileId]) {
        if x >= self.width {
            return;
        }
        for (y, &tile) in column.iter().enumerate().take(self.height as usize) {
            self.cells[y * self.width as usize + x as usize] = tile;
        }
    }

    /// Raw IDs as nested rows (`rows[y][x]`), the persisted layout.
    pub fn to_rows(&self) -> Vec<Vec<u16>> {
        self.cells
            .chunks(self.width.max(1) as usize)
            .map(|row| row.iter().map(|t| t.0).collect())
            .collect()
    }

    /// Rebuild a grid from nested rows. Rejects ragged input and IDs that
    /// are not below `tile_count`.
    pub fn from_rows(rows: &[Vec<u16>], tile_count: usize) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err(GridError::Empty);
        }
        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(GridError::Ragged {
                    row: y,
                    expected: width,
                    found: row.len(),
                });
            }
            for (x, &id) in row.iter().enumerate() {
                if id as usize >= tile_count {
                    return Err(GridError::UnknownTile { x, y, id });
                }
                cells.push(TileId(id));
            }
        }
        Ok(Self {
            width: width as u32,
            height: height as u32,
            cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRT: TileId = TileId(3);

    #[test]
    fn get_and_set() {
        let mut grid = TileGrid::new(4, 3, TileId::AIR);
        let p = GridPosition::new(2, 1);
        assert_eq!(grid.set(p, DIRT), Some(TileId::AIR));
        assert_eq!(grid.get(p), Some(DIRT));
        assert!(grid.is_solid(p));
        assert!(!grid.is_solid(GridPosition::new(0, 0)));
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut grid = TileGrid::new(4, 3, TileId::AIR);
        for p in [
            GridPosition::new(-1, 0),
            GridPosition::new(0, -1),
            GridPosition::new(4, 0),
            GridPosition::new(0, 3),
        ] {
            assert_eq!(grid.get(p), None);
            assert_eq!(grid.set(p, DIRT), None);
            assert!(!grid.is_solid(p));
        }
        assert!(grid.iter().all(|(_, t)| t == TileId::AIR));
    }

    #[test]
    fn rows_round_trip() {
        let mut grid = TileGrid::new(3, 2, TileId::AIR);
        grid.set(GridPosition::new(2, 1), DIRT);
        let rows = grid.to_rows();
        assert_eq!(rows, vec![vec![0, 0, 0], vec![0, 0, 3]]);
        assert_eq!(TileGrid::from_rows(&rows, 4).unwrap(), grid);
    }

    #[test]
    fn from_rows_validates() {
        assert_eq!(TileGrid::from_rows(&[], 4), Err(GridError::Empty));
        assert_eq!(
            TileGrid::from_rows(&[vec![0, 0], vec![0]], 4),
            Err(GridError::Ragged {
                row: 1,
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            TileGrid::from_rows(&[vec![0, 9]], 4),
            Err(GridError::UnknownTile { x: 1, y: 0, id: 9 })
        );
    }

    #[test]
    fn fill_column_writes_top_to_bottom() {
        let mut grid = TileGrid::new(2, 3, TileId::AIR);
        grid.fill_column(1, &[TileId::AIR, DIRT, DIRT, DIRT]);
        assert_eq!(grid.get(GridPosition::new(1, 0)), Some(TileId::AIR));
        assert_eq!(grid.get(GridPosition::new(1, 2)), Some(DIRT));
        assert_eq!(grid.get(GridPosition::new(0, 2)), Some(TileId::AIR));
        grid.fill_column(5, &[DIRT]);
    }
}
