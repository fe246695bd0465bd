//! Sparse map of placed structures.
//!
//! Maintains a bidirectional mapping:
//! - `tiles`: position -> object (which structure occupies each tile)
//! - `origins`: object -> top-left position
//! - `footprints`: object -> footprint

use crate::{Direction, Footprint, GridPosition, SpatialError};
use delve_core::id::ObjectId;
use slotmap::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default, Clone)]
pub struct ObjectMap {
    tiles: BTreeMap<GridPosition, ObjectId>,
    origins: SecondaryMap<ObjectId, GridPosition>,
    footprints: SecondaryMap<ObjectId, Footprint>,
}

impl ObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Placement --

    /// Place a structure. Origin is the top-left corner.
    pub fn place(
        &mut self,
        object: ObjectId,
        origin: GridPosition,
        footprint: Footprint,
    ) -> Result<(), SpatialError> {
        if self.origins.contains_key(object) {
            return Err(SpatialError::AlreadyPlaced);
        }
        if !self.can_place(origin, footprint) {
            return Err(SpatialError::Occupied);
        }
        for tile in footprint.tiles(origin) {
            self.tiles.insert(tile, object);
        }
        self.origins.insert(object, origin);
        self.footprints.insert(object, footprint);
        Ok(())
    }

    /// Remove a structure. Returns its origin.
    pub fn remove(&mut self, object: ObjectId) -> Result<GridPosition, SpatialError> {
        let origin = self.origins.remove(object).ok_or(SpatialError::NotPlaced)?;
        let footprint = self
            .footprints
            .remove(object)
            .ok_or(SpatialError::NotPlaced)?;
        for tile in footprint.tiles(origin) {
            self.tiles.remove(&tile);
        }
        Ok(origin)
    }

    pub fn can_place(&self, origin: GridPosition, footprint: Footprint) -> bool {
        footprint
            .tiles(origin)
            .all(|tile| !self.tiles.contains_key(&tile))
    }

    // -- Point queries --

    pub fn object_at(&self, pos: GridPosition) -> Option<ObjectId> {
        self.tiles.get(&pos).copied()
    }

    pub fn origin(&self, object: ObjectId) -> Option<GridPosition> {
        self.origins.get(object).copied()
    }

    pub fn footprint(&self, object: ObjectId) -> Option<Footprint> {
        self.footprints.get(object).copied()
    }

    pub fn is_occupied(&self, pos: GridPosition) -> bool {
        self.tiles.contains_key(&pos)
    }

    // -- Adjacency --

    /// Unique objects sharing an edge with the given footprint, in
    /// ascending ID order. Tiles of `exclude` are skipped.
    pub fn objects_around(
        &self,
        origin: GridPosition,
        footprint: Footprint,
        exclude: Option<ObjectId>,
    ) -> Vec<ObjectId> {
        let found: BTreeSet<ObjectId> = footprint
            .border(origin)
            .into_iter()
            .filter_map(|pos| self.object_at(pos))
            .filter(|&id| Some(id) != exclude)
            .collect();
        found.into_iter().collect()
    }

    /// 4-directional neighbours of a placed object: one entry per
    /// (direction, neighbour) pair.
    pub fn neighbors_4(&self, object: ObjectId) -> Vec<(Direction, ObjectId)> {
        let (Some(origin), Some(footprint)) = (self.origin(object), self.footprint(object)) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        let mut result = Vec::new();
        for dir in Direction::all() {
            for tile in footprint.tiles(origin) {
                let next = tile.step(dir);
                if footprint.contains(origin, next) {
                    continue;
                }
                if let Some(other) = self.object_at(next) {
                    if seen.insert((dir, other)) {
                        result.push((dir, other));
                    }
                }
            }
        }
        result
    }

    // -- Stats --

    /// Number of placed objects.
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Total number of occupied tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Placed objects with their origins.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, GridPosition)> + '_ {
        self.origins.iter().map(|(id, &pos)| (id, pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn make_objects(count: usize) -> (SlotMap<ObjectId, ()>, Vec<ObjectId>) {
        let mut sm = SlotMap::with_key();
        let ids = (0..count).map(|_| sm.insert(())).collect();
        (sm, ids)
    }

    // ---- Test 1: multi-tile placement covers the footprint ----
    #[test]
    fn place_2x2() {
        let (_sm, ids) = make_objects(1);
        let mut map = ObjectMap::new();
        let origin = GridPosition::new(5, 5);
        map.place(ids[0], origin, Footprint::new(2, 2)).unwrap();

        for pos in Footprint::new(2, 2).tiles(origin) {
            assert_eq!(map.object_at(pos), Some(ids[0]));
        }
        assert_eq!(map.object_at(GridPosition::new(7, 5)), None);
        assert_eq!(map.origin(ids[0]), Some(origin));
        assert_eq!(map.tile_count(), 4);
        assert_eq!(map.len(), 1);
    }

    // ---- Test 2: overlap and double placement are rejected ----
    #[test]
    fn place_errors() {
        let (_sm, ids) = make_objects(2);
        let mut map = ObjectMap::new();
        map.place(ids[0], GridPosition::new(0, 0), Footprint::new(2, 2))
            .unwrap();
        assert_eq!(
            map.place(ids[1], GridPosition::new(1, 1), Footprint::single()),
            Err(SpatialError::Occupied)
        );
        assert_eq!(
            map.place(ids[0], GridPosition::new(9, 9), Footprint::single()),
            Err(SpatialError::AlreadyPlaced)
        );
        assert_eq!(map.object_at(GridPosition::new(9, 9)), None);
    }

    // ---- Test 3: removal frees every tile ----
    #[test]
    fn remove_clears_footprint() {
        let (_sm, ids) = make_objects(1);
        let mut map = ObjectMap::new();
        let origin = GridPosition::new(2, 3);
        map.place(ids[0], origin, Footprint::new(2, 2)).unwrap();
        assert_eq!(map.remove(ids[0]), Ok(origin));
        assert!(map.is_empty());
        assert_eq!(map.tile_count(), 0);
        assert_eq!(map.remove(ids[0]), Err(SpatialError::NotPlaced));
    }

    // ---- Test 4: adjacency ----
    #[test]
    fn neighbors_and_surroundings() {
        let (_sm, ids) = make_objects(4);
        let mut map = ObjectMap::new();
        // 2x2 machine at (0,0), pipe east of it, pipe south of it, pipe
        // diagonal (not adjacent).
        map.place(ids[0], GridPosition::new(0, 0), Footprint::new(2, 2))
            .unwrap();
        map.place(ids[1], GridPosition::new(2, 1), Footprint::single())
            .unwrap();
        map.place(ids[2], GridPosition::new(0, 2), Footprint::single())
            .unwrap();
        map.place(ids[3], GridPosition::new(2, 2), Footprint::single())
            .unwrap();

        let n = map.neighbors_4(ids[0]);
        assert_eq!(n.len(), 2);
        assert!(n.contains(&(Direction::East, ids[1])));
        assert!(n.contains(&(Direction::South, ids[2])));

        let around = map.objects_around(GridPosition::new(0, 0), Footprint::new(2, 2), Some(ids[0]));
        assert_eq!(around.len(), 2);
        assert!(!around.contains(&ids[3]));

        let pipe_n = map.neighbors_4(ids[3]);
        assert!(pipe_n.contains(&(Direction::North, ids[1])));
        assert!(!pipe_n.contains(&(Direction::West, ids[2])));
    }
}
