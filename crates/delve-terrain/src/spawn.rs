//! Spawn point selection.

use crate::height::HeightMap;
use delve_core::id::TileId;
use delve_spatial::{GridPosition, TileGrid};

/// A surface point something can stand on: the tile and its left and right
/// neighbours are solid, and the three tiles directly above them are air.
pub fn is_valid_spawn_point(grid: &TileGrid, pos: GridPosition) -> bool {
    (-1..=1).all(|dx| {
        let ground = GridPosition::new(pos.x + dx, pos.y);
        let above = GridPosition::new(pos.x + dx, pos.y - 1);
        grid.is_solid(ground) && grid.get(above) == Some(TileId::AIR)
    })
}

/// Column offsets from the centre in search order: 0, +1, -1, +2, -2, ...
fn search_order(width: u32) -> impl Iterator<Item = i64> {
    let center = (width / 2) as i64;
    (0..=width as i64)
        .flat_map(|d| if d == 0 { vec![0] } else { vec![d, -d] })
        .map(move |d| center + d)
        .filter(move |&x| x >= 0 && x < width as i64)
}

/// The valid spawn point nearest the centre column, or the centre column's
/// surface when there is none.
pub fn find_spawn(grid: &TileGrid, heights: &HeightMap) -> GridPosition {
    let width = grid.width();
    let world_height = grid.height();
    let surface = |x: u32| {
        let y = heights.surface_row(x, world_height).unwrap_or(0);
        GridPosition::new(x as i32, y as i32)
    };
    search_order(width)
        .map(|x| surface(x as u32))
        .find(|&pos| is_valid_spawn_point(grid, pos))
        .unwrap_or_else(|| surface(width / 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRT: TileId = TileId(3);

    fn flat(width: u32, height: u32, surface: u32) -> (TileGrid, HeightMap) {
        let mut grid = TileGrid::new(width, height, TileId::AIR);
        for x in 0..width {
            for y in surface..height {
                grid.set(GridPosition::new(x as i32, y as i32), DIRT);
            }
        }
        (grid, HeightMap::new(vec![surface as f64; width as usize]))
    }

    #[test]
    fn search_order_alternates_around_center() {
        let order: Vec<_> = search_order(5).collect();
        assert_eq!(order, vec![2, 3, 1, 4, 0]);
        assert_eq!(search_order(1).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn flat_ground_spawns_at_center() {
        let (grid, heights) = flat(20, 10, 5);
        assert_eq!(find_spawn(&grid, &heights), GridPosition::new(10, 5));
    }

    #[test]
    fn obstructed_center_moves_outward() {
        let (mut grid, heights) = flat(20, 10, 5);
        // A block on top of the centre column invalidates x = 9, 10, 11.
        grid.set(GridPosition::new(10, 4), DIRT);
        assert_eq!(find_spawn(&grid, &heights), GridPosition::new(12, 5));
    }

    #[test]
    fn falls_back_to_center_when_nothing_fits() {
        // Everything is solid, so no column has air above it.
        let grid = TileGrid::new(8, 6, DIRT);
        let heights = HeightMap::new(vec![3.0; 8]);
        assert_eq!(find_spawn(&grid, &heights), GridPosition::new(4, 3));
    }

    #[test]
    fn world_edge_is_never_valid() {
        let (grid, _) = flat(6, 6, 3);
        assert!(!is_valid_spawn_point(&grid, GridPosition::new(0, 3)));
        assert!(!is_valid_spawn_point(&grid, GridPosition::new(5, 3)));
        assert!(is_valid_spawn_point(&grid, GridPosition::new(1, 3)));
    }
}
