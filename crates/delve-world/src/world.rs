//! The `World` facade.
//!
//! Owns the tile grid, height map, collision index, object map and every
//! placed structure, and keeps them consistent with each other:
//!
//! - every solid grid cell has exactly one rectangle in the collision index
//! - every structure in the object map has an entry in `structures`
//! - transport links are recomputed around anything placed or removed

use crate::config::WorldConfig;
use crate::structure::Structure;
use crate::transport::{self, NodeKind, TransportNode, TransportTimings};
use delve_core::fixed::f64_to_fixed64;
use delve_core::id::{ItemId, MachineKindId, ObjectId, TileId};
use delve_core::machine::Machine;
use delve_core::registry::{MachineRole, Placement, Registry, TileKind};
use delve_spatial::{
    CollisionIndex, Direction, Footprint, GridError, GridPosition, ObjectMap, Rect, TileGrid,
};
use delve_terrain::spawn::find_spawn;
use delve_terrain::{HeightMap, TerrainError, TerrainGenerator};
use log::{debug, info};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::BTreeMap;
use std::sync::Arc;

// ===========================================================================
// Errors and results
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("invalid world config: {0}")]
    Config(&'static str),
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("save does not fit: {0}")]
    SaveMismatch(String),
}

/// Why a placement was refused. A refused placement changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("position is outside the world")]
    OutOfBounds,
    #[error("position is out of the player's reach")]
    OutOfReach,
    #[error("position is occupied")]
    Occupied,
    #[error("nothing solid to attach to")]
    Unsupported,
    #[error("item {0:?} cannot be placed")]
    NotPlaceable(ItemId),
    #[error("unknown item {0:?}")]
    UnknownItem(ItemId),
    #[error("no variant {variant} for this structure")]
    InvalidVariant { variant: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placed {
    Tile(TileId),
    Structure(ObjectId),
}

/// What a removal hands back to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    /// The item the removed tile or structure turns back into.
    pub item: Option<ItemId>,
    /// Contents of the removed structure.
    pub spilled: Vec<(ItemId, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineOutcome {
    /// Nothing minable here.
    Nothing,
    Damaged { remaining: u32 },
    Broken { tile: TileId, drop: Option<ItemId> },
}

/// Summary of one world tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub activated: u32,
    pub deactivated: u32,
    /// Production cycles completed.
    pub produced: u32,
    /// Items moved by pipes and inserters.
    pub transfers: u32,
}

// ===========================================================================
// World
// ===========================================================================

#[derive(Debug, Clone)]
pub struct World {
    pub(crate) registry: Arc<Registry>,
    pub(crate) config: WorldConfig,
    pub(crate) timings: TransportTimings,
    pub(crate) seed: u64,
    pub(crate) grid: TileGrid,
    pub(crate) heights: HeightMap,
    pub(crate) trees: Vec<GridPosition>,
    pub(crate) spawn: GridPosition,
    pub(crate) biome_order: BTreeMap<String, u32>,
    pub(crate) collision: CollisionIndex,
    pub(crate) objects: ObjectMap,
    pub(crate) structures: SlotMap<ObjectId, Structure>,
    /// Placement sequence number of each structure.
    pub(crate) placed_seq: SecondaryMap<ObjectId, u64>,
    pub(crate) next_seq: u64,
    /// Accumulated mining effort per tile.
    pub(crate) damage: BTreeMap<GridPosition, u32>,
}

impl World {
    /// Generate a fresh world from `terrain`.
    pub fn generate(
        registry: Arc<Registry>,
        config: WorldConfig,
        terrain: &TerrainGenerator,
        seed: u64,
    ) -> Result<Self, WorldError> {
        if let Some(problem) = config.problem() {
            return Err(WorldError::Config(problem));
        }
        let generated = terrain.generate(config.width, config.height, seed)?;
        let world = Self::from_parts(
            registry,
            config,
            seed,
            generated.grid,
            generated.heights,
            generated.trees,
            generated.spawn,
            generated.biome_order,
        );
        info!(
            "generated {}x{} world (seed {seed}): {} solid tiles, {} trees, spawn at ({}, {})",
            world.grid.width(),
            world.grid.height(),
            world.collision.len(),
            world.trees.len(),
            world.spawn.x,
            world.spawn.y,
        );
        Ok(world)
    }

    /// Wrap a hand-built grid. Heights are the first solid row of each
    /// column, tree bases are collected from the grid, and the spawn point
    /// is searched the same way generation does.
    pub fn from_grid(
        registry: Arc<Registry>,
        mut config: WorldConfig,
        mut grid: TileGrid,
    ) -> Result<Self, WorldError> {
        config.width = grid.width();
        config.height = grid.height();
        if let Some(problem) = config.problem() {
            return Err(WorldError::Config(problem));
        }
        if let Some((pos, id)) = grid.iter().find(|(_, id)| id.0 as usize >= registry.tile_count()) {
            return Err(WorldError::Grid(GridError::UnknownTile {
                x: pos.x as usize,
                y: pos.y as usize,
                id: id.0,
            }));
        }
        // No machines yet, so any filler is stray.
        let filler: Vec<GridPosition> = grid
            .iter()
            .filter(|&(_, tile)| tile == TileId::EXTENDED)
            .map(|(pos, _)| pos)
            .collect();
        for pos in filler {
            grid.set(pos, TileId::AIR);
        }

        let columns = (0..grid.width() as i32).map(|x| {
            (0..grid.height() as i32)
                .find(|&y| grid.is_solid(GridPosition::new(x, y)))
                .unwrap_or(grid.height() as i32 - 1) as f64
        });
        let heights = HeightMap::new(columns.collect());
        let spawn = find_spawn(&grid, &heights);
        let trees = grid
            .iter()
            .filter(|&(_, tile)| tile == TileId::TREE_BASE)
            .map(|(pos, _)| pos)
            .collect();
        Ok(Self::from_parts(registry, config, 0, grid, heights, trees, spawn, BTreeMap::new()))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        registry: Arc<Registry>,
        config: WorldConfig,
        seed: u64,
        grid: TileGrid,
        heights: HeightMap,
        trees: Vec<GridPosition>,
        spawn: GridPosition,
        biome_order: BTreeMap<String, u32>,
    ) -> Self {
        let collision = CollisionIndex::build(&grid, config.cell_size, config.tile_size);
        let timings = config.transport.timings();
        Self {
            registry,
            config,
            timings,
            seed,
            grid,
            heights,
            trees,
            spawn,
            biome_order,
            collision,
            objects: ObjectMap::new(),
            structures: SlotMap::with_key(),
            placed_seq: SecondaryMap::new(),
            next_seq: 0,
            damage: BTreeMap::new(),
        }
    }

    // -- Placement --

    /// Place `item` at `pos` using variant 0.
    pub fn place(&mut self, pos: GridPosition, item: ItemId) -> Result<Placed, PlacementError> {
        self.place_variant(pos, item, 0)
    }

    /// Place on behalf of a player standing at `player`. Targets farther
    /// than `reach_radius` tiles are refused.
    pub fn place_from(
        &mut self,
        player: GridPosition,
        pos: GridPosition,
        item: ItemId,
    ) -> Result<Placed, PlacementError> {
        let reach = u64::from(self.config.reach_radius);
        if player.distance_squared(&pos) > reach * reach {
            debug!("placement at {pos:?} out of reach from {player:?}");
            return Err(PlacementError::OutOfReach);
        }
        self.place(pos, item)
    }

    /// Place `item` at `pos`. `variant` selects the connection layout of
    /// pipes and inserters and is ignored for everything else.
    pub fn place_variant(
        &mut self,
        pos: GridPosition,
        item: ItemId,
        variant: u8,
    ) -> Result<Placed, PlacementError> {
        let placement = self
            .registry
            .item(item)
            .ok_or(PlacementError::UnknownItem(item))?
            .placement;
        let result = match placement {
            Placement::None => Err(PlacementError::NotPlaceable(item)),
            Placement::Tile(tile) => self.place_tile(pos, tile).map(|()| Placed::Tile(tile)),
            Placement::Machine(kind) => self.place_machine(pos, kind).map(Placed::Structure),
            Placement::Pipe => self.place_node(pos, NodeKind::Pipe, variant).map(Placed::Structure),
            Placement::Inserter => self
                .place_node(pos, NodeKind::Inserter, variant)
                .map(Placed::Structure),
        };
        if let Err(e) = &result {
            debug!("placement at {pos:?} rejected: {e}");
        }
        result
    }

    fn check_free(&self, pos: GridPosition) -> Result<(), PlacementError> {
        match self.grid.get(pos) {
            None => Err(PlacementError::OutOfBounds),
            Some(tile) if tile != TileId::AIR || self.objects.is_occupied(pos) => {
                Err(PlacementError::Occupied)
            }
            Some(_) => Ok(()),
        }
    }

    fn place_tile(&mut self, pos: GridPosition, tile: TileId) -> Result<(), PlacementError> {
        self.check_free(pos)?;
        if !pos.neighbors_4().iter().any(|&n| self.grid.is_solid(n)) {
            return Err(PlacementError::Unsupported);
        }
        self.set_tile(pos, tile);
        Ok(())
    }

    fn place_machine(&mut self, origin: GridPosition, kind: MachineKindId) -> Result<ObjectId, PlacementError> {
        let registry = Arc::clone(&self.registry);
        let def = registry.machine(kind).ok_or(PlacementError::Unsupported)?;
        let footprint = Footprint::new(def.width, def.height);
        for pos in footprint.tiles(origin) {
            self.check_free(pos)?;
        }
        if !footprint.row_below(origin).all(|p| self.grid.is_solid(p)) {
            return Err(PlacementError::Unsupported);
        }
        self.insert_machine(kind, origin).ok_or(PlacementError::Occupied)
    }

    /// Add a machine without checking the ground. Writes its tiles and
    /// picks up the ore under it.
    pub(crate) fn insert_machine(&mut self, kind: MachineKindId, origin: GridPosition) -> Option<ObjectId> {
        let registry = Arc::clone(&self.registry);
        let def = registry.machine(kind)?;
        let footprint = Footprint::new(def.width, def.height);
        if !footprint.tiles(origin).all(|p| self.grid.in_bounds(p)) {
            return None;
        }

        let mut machine = Machine::new(kind, def);
        if matches!(def.role, MachineRole::Drill { .. }) {
            machine.set_drill_target(self.ore_below(origin, footprint));
        }
        let id = self.structures.insert(Structure::Machine(machine));
        if self.objects.place(id, origin, footprint).is_err() {
            self.structures.remove(id);
            return None;
        }
        for pos in footprint.tiles(origin) {
            let tile = if pos == origin { def.tile } else { TileId::EXTENDED };
            self.set_tile(pos, tile);
        }
        self.record_placement(id);
        self.relink_around(origin, footprint, Some(id));
        debug!("placed {} at {origin:?}", def.name);
        Some(id)
    }

    /// Drop of the first ore tile in the row under a footprint.
    fn ore_below(&self, origin: GridPosition, footprint: Footprint) -> Option<ItemId> {
        footprint
            .row_below(origin)
            .filter_map(|p| self.grid.get(p))
            .filter_map(|t| self.registry.tile(t))
            .find(|def| def.kind == TileKind::Ore)
            .and_then(|def| def.drop)
    }

    fn place_node(&mut self, pos: GridPosition, kind: NodeKind, variant: u8) -> Result<ObjectId, PlacementError> {
        if kind.offsets(variant).is_none() {
            return Err(PlacementError::InvalidVariant { variant });
        }
        self.check_free(pos)?;
        let node = TransportNode::new(kind, pos, variant).ok_or(PlacementError::InvalidVariant { variant })?;
        self.insert_node(node).ok_or(PlacementError::Occupied)
    }

    pub(crate) fn insert_node(&mut self, node: TransportNode) -> Option<ObjectId> {
        let pos = node.pos();
        if !self.grid.in_bounds(pos) {
            return None;
        }
        let id = self.structures.insert(Structure::Node(node));
        if self.objects.place(id, pos, Footprint::single()).is_err() {
            self.structures.remove(id);
            return None;
        }
        self.record_placement(id);
        transport::relink(&mut self.structures, &self.objects, id);
        self.relink_around(pos, Footprint::single(), Some(id));
        Some(id)
    }

    fn record_placement(&mut self, id: ObjectId) {
        self.placed_seq.insert(id, self.next_seq);
        self.next_seq += 1;
    }

    fn relink_around(&mut self, origin: GridPosition, footprint: Footprint, exclude: Option<ObjectId>) {
        for neighbor in self.objects.objects_around(origin, footprint, exclude) {
            transport::relink(&mut self.structures, &self.objects, neighbor);
        }
    }

    pub(crate) fn relink_all(&mut self) {
        let ids: Vec<ObjectId> = self.structures.keys().collect();
        for id in ids {
            transport::relink(&mut self.structures, &self.objects, id);
        }
    }

    /// Write a tile and keep the collision index and any drill resting on
    /// it in step.
    fn set_tile(&mut self, pos: GridPosition, tile: TileId) {
        if self.grid.set(pos, tile).is_some() {
            self.collision.update(pos, tile.is_solid());
            self.retarget_drill_above(pos);
        }
    }

    /// Re-pick the ore of a drill whose footprint sits directly on `pos`.
    fn retarget_drill_above(&mut self, pos: GridPosition) {
        let Some(id) = self.objects.object_at(pos.step(Direction::North)) else {
            return;
        };
        let (Some(origin), Some(footprint)) = (self.objects.origin(id), self.objects.footprint(id)) else {
            return;
        };
        if !footprint.row_below(origin).any(|p| p == pos) {
            return;
        }
        let target = self.ore_below(origin, footprint);
        let Some(Structure::Machine(machine)) = self.structures.get_mut(id) else {
            return;
        };
        let is_drill = self
            .registry
            .machine(machine.kind())
            .is_some_and(|def| matches!(def.role, MachineRole::Drill { .. }));
        if is_drill && machine.drill_target() != target {
            debug!("drill {id:?} now targets {target:?}");
            machine.set_drill_target(target);
        }
    }

    /// Turn filler tiles that no machine covers back into air.
    pub(crate) fn clear_orphaned_filler(&mut self) -> usize {
        let orphans: Vec<GridPosition> = self
            .grid
            .iter()
            .filter(|&(pos, tile)| tile == TileId::EXTENDED && !self.objects.is_occupied(pos))
            .map(|(pos, _)| pos)
            .collect();
        for &pos in &orphans {
            self.set_tile(pos, TileId::AIR);
        }
        orphans.len()
    }

    // -- Removal and mining --

    /// Remove whatever is at `pos`: a structure if one covers it, otherwise
    /// the tile. Air and machine filler cannot be removed on their own.
    pub fn remove(&mut self, pos: GridPosition) -> Option<Removed> {
        if let Some(id) = self.objects.object_at(pos) {
            return self.remove_structure(id);
        }
        let tile = self.grid.get(pos)?;
        if tile == TileId::AIR || tile == TileId::EXTENDED {
            return None;
        }
        self.clear_tile(pos, tile);
        Some(Removed {
            item: self.registry.tile(tile).and_then(|def| def.drop),
            spilled: Vec::new(),
        })
    }

    fn clear_tile(&mut self, pos: GridPosition, tile: TileId) {
        self.set_tile(pos, TileId::AIR);
        self.damage.remove(&pos);
        if tile == TileId::TREE_BASE {
            self.trees.retain(|&t| t != pos);
        }
    }

    fn remove_structure(&mut self, id: ObjectId) -> Option<Removed> {
        let footprint = self.objects.footprint(id)?;
        let origin = self.objects.remove(id).ok()?;
        let structure = self.structures.remove(id)?;
        self.placed_seq.remove(id);

        let mut spilled = Vec::new();
        match &structure {
            Structure::Machine(machine) => {
                for pos in footprint.tiles(origin) {
                    self.set_tile(pos, TileId::AIR);
                }
                let inventory = machine.inventory();
                let slots = inventory.inputs().iter().map(|s| &s.slot);
                for slot in slots.chain(std::iter::once(inventory.output())) {
                    if let Some(item) = slot.item() {
                        spilled.push((item, slot.amount()));
                    }
                }
            }
            Structure::Node(node) => spilled.extend(node.item().map(|item| (item, 1))),
        }
        self.relink_around(origin, footprint, None);
        debug!("removed structure at {origin:?}");

        Some(Removed {
            item: self.registry.item_for_structure(structure.kind()),
            spilled,
        })
    }

    /// Hit the tile at `pos` with `power` mining effort. Effort accumulates
    /// until it reaches the tile's hardness, then the tile breaks.
    pub fn mine(&mut self, pos: GridPosition, power: u32) -> MineOutcome {
        if self.objects.is_occupied(pos) {
            return MineOutcome::Nothing;
        }
        let Some(tile) = self.grid.get(pos) else {
            return MineOutcome::Nothing;
        };
        if tile == TileId::AIR || tile == TileId::EXTENDED {
            return MineOutcome::Nothing;
        }
        let def = self.registry.tile(tile);
        let hardness = def.map_or(0, |d| d.hardness);
        let dealt = self.damage.entry(pos).or_insert(0);
        *dealt = dealt.saturating_add(power);
        if *dealt < hardness {
            return MineOutcome::Damaged {
                remaining: hardness - *dealt,
            };
        }
        let drop = def.and_then(|d| d.drop);
        self.clear_tile(pos, tile);
        MineOutcome::Broken { tile, drop }
    }

    // -- Simulation --

    /// Advance machines, then pipes and inserters, by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> TickReport {
        let dt = f64_to_fixed64(dt);
        let mut report = TickReport::default();
        let registry = &self.registry;

        for (id, structure) in self.structures.iter_mut() {
            let Structure::Machine(machine) = structure else {
                continue;
            };
            let Some(def) = registry.machine(machine.kind()) else {
                continue;
            };
            let result = machine.tick(def, registry, dt);
            if result.activated {
                debug!("{} {id:?} started", def.name);
                report.activated += 1;
            }
            if result.deactivated {
                debug!("{} {id:?} stopped", def.name);
                report.deactivated += 1;
            }
            report.produced += result.produced;
        }

        report.transfers = transport::tick(&mut self.structures, &self.timings, dt).transfers;
        report
    }

    // -- Player transfers --

    /// Put items into a machine slot. Returns the amount stored.
    pub fn deposit(&mut self, object: ObjectId, slot: &str, item: ItemId, amount: u32) -> u32 {
        self.machine_mut(object)
            .map_or(0, |m| m.inventory_mut().deposit(slot, item, amount))
    }

    /// Take up to `amount` items out of a machine slot.
    pub fn extract(&mut self, object: ObjectId, slot: &str, amount: u32) -> Option<(ItemId, u32)> {
        self.machine_mut(object)?.inventory_mut().extract(slot, amount)
    }

    pub fn give_to_node(&mut self, object: ObjectId, item: ItemId) -> bool {
        self.node_mut(object).is_some_and(|n| n.give(item))
    }

    pub fn take_from_node(&mut self, object: ObjectId) -> Option<ItemId> {
        self.node_mut(object)?.take()
    }

    /// Rotate the pipe or inserter at `pos`. Returns the new direction.
    pub fn cycle_direction(&mut self, pos: GridPosition) -> Option<Direction> {
        let id = self.objects.object_at(pos)?;
        self.node_mut(id)?.cycle_direction()
    }

    pub fn set_direction(&mut self, pos: GridPosition, dir: Direction) -> bool {
        let Some(id) = self.objects.object_at(pos) else {
            return false;
        };
        self.node_mut(id).is_some_and(|n| n.set_direction(dir))
    }

    // -- Queries --

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn tile_at(&self, pos: GridPosition) -> Option<TileId> {
        self.grid.get(pos)
    }

    pub fn tile_name(&self, id: TileId) -> Option<&str> {
        self.registry.tile_name(id)
    }

    pub fn heights(&self) -> &HeightMap {
        &self.heights
    }

    pub fn trees(&self) -> &[GridPosition] {
        &self.trees
    }

    pub fn spawn(&self) -> GridPosition {
        self.spawn
    }

    pub fn biome_order(&self) -> &BTreeMap<String, u32> {
        &self.biome_order
    }

    pub fn collision_index(&self) -> &CollisionIndex {
        &self.collision
    }

    /// Solid tile rectangles that may overlap `rect`.
    pub fn collision_candidates(&self, rect: &Rect) -> Vec<Rect> {
        self.collision.query(rect)
    }

    /// Solid tile rectangles that do overlap `rect`.
    pub fn collisions(&self, rect: &Rect) -> Vec<Rect> {
        self.collision.overlapping(rect)
    }

    pub fn objects(&self) -> &ObjectMap {
        &self.objects
    }

    pub fn structure_at(&self, pos: GridPosition) -> Option<ObjectId> {
        self.objects.object_at(pos)
    }

    pub fn structure(&self, id: ObjectId) -> Option<&Structure> {
        self.structures.get(id)
    }

    pub fn machine(&self, id: ObjectId) -> Option<&Machine> {
        self.structures.get(id)?.as_machine()
    }

    fn machine_mut(&mut self, id: ObjectId) -> Option<&mut Machine> {
        self.structures.get_mut(id)?.as_machine_mut()
    }

    pub fn node(&self, id: ObjectId) -> Option<&TransportNode> {
        self.structures.get(id)?.as_node()
    }

    fn node_mut(&mut self, id: ObjectId) -> Option<&mut TransportNode> {
        self.structures.get_mut(id)?.as_node_mut()
    }

    pub fn machines(&self) -> impl Iterator<Item = (ObjectId, &Machine)> + '_ {
        self.structures
            .iter()
            .filter_map(|(id, s)| s.as_machine().map(|m| (id, m)))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (ObjectId, &TransportNode)> + '_ {
        self.structures
            .iter()
            .filter_map(|(id, s)| s.as_node().map(|n| (id, n)))
    }

    /// Structure count.
    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    /// Cross-check grid, collision index, object map and transport links.
    pub fn is_consistent(&self) -> bool {
        if !self.collision.is_consistent_with(&self.grid) {
            return false;
        }
        if self.objects.len() != self.structures.len() {
            return false;
        }
        let placed = self.objects.iter().all(|(id, _)| self.structures.contains_key(id));
        let filler_backed = self
            .grid
            .iter()
            .filter(|&(_, tile)| tile == TileId::EXTENDED)
            .all(|(pos, _)| self.objects.is_occupied(pos));
        let reciprocal = self.nodes().all(|(id, node)| {
            node.links().iter().all(|(&dir, &link)| match link {
                transport::Link::Node(other) => self
                    .node(other)
                    .is_some_and(|n| n.link(dir.opposite()) == Some(transport::Link::Node(id))),
                transport::Link::Machine(other) => self.machine(other).is_some(),
            })
        });
        let links_current = self.nodes().all(|(_, node)| {
            *node.links() == transport::compute_links(&self.structures, &self.objects, node)
        });
        placed && filler_backed && reciprocal && links_current
    }
}
