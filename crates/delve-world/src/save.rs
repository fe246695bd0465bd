//! Persisted world state.
//!
//! A [`WorldSave`] is a plain record of everything needed to rebuild a
//! world: the tile grid as nested rows, the height profile, trees, spawn,
//! biome order and every placed structure. Items and machine kinds are
//! stored by name so saves survive registry reordering.
//!
//! Two encodings are offered: JSON via `serde_json`, and a compact binary
//! form via `bitcode` behind a magic/version header. Pending production
//! and inserter timers are not persisted; restored machines start idle.

use crate::config::WorldConfig;
use crate::structure::Structure;
use crate::transport::{NodeKind, TransportNode};
use crate::world::{World, WorldError};
use delve_core::id::ItemId;
use delve_core::inventory::{OUTPUT_SLOT, Slot};
use delve_core::registry::{Placement, Registry};
use delve_spatial::{Direction, GridPosition, TileGrid};
use delve_terrain::HeightMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a binary world save.
pub const SAVE_MAGIC: u32 = 0xDE17_0001;

/// Current binary format version.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("save from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub name: String,
    pub item: Option<String>,
    pub amount: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    /// Placement order across all structures.
    pub index: u64,
    /// Origin (top-left) tile.
    pub tile: [i32; 2],
    pub inputs: Vec<SlotRecord>,
    pub output: SlotRecord,
    pub drill_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRecord {
    pub index: u64,
    /// Name of the item that places this structure.
    pub item: String,
    pub tile: [i32; 2],
    pub variant: u8,
    pub direction: Option<Direction>,
    pub held: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSave {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    /// Row-major tile IDs, `tiles[y][x]`.
    pub tiles: Vec<Vec<u16>>,
    pub heights: Vec<f64>,
    pub trees: Vec<[i32; 2]>,
    pub spawn: [i32; 2],
    pub biome_order: BTreeMap<String, u32>,
    /// Machine kind name -> machines of that kind.
    pub machines: BTreeMap<String, Vec<MachineRecord>>,
    pub transports: Vec<TransportRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SaveHeader {
    magic: u32,
    version: u32,
}

impl SaveHeader {
    fn current() -> Self {
        Self {
            magic: SAVE_MAGIC,
            version: FORMAT_VERSION,
        }
    }

    fn validate(&self) -> Result<(), SaveError> {
        if self.magic != SAVE_MAGIC {
            return Err(SaveError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(SaveError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(SaveError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct SaveFile {
    header: SaveHeader,
    save: WorldSave,
}

fn pos_of(tile: [i32; 2]) -> GridPosition {
    GridPosition::new(tile[0], tile[1])
}

fn tile_of(pos: GridPosition) -> [i32; 2] {
    [pos.x, pos.y]
}

impl WorldSave {
    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SaveError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Binary encoding with a versioned header.
    pub fn encode(&self) -> Result<Vec<u8>, SaveError> {
        let file = SaveFile {
            header: SaveHeader::current(),
            save: self.clone(),
        };
        bitcode::serialize(&file).map_err(|e| SaveError::Encode(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> Result<Self, SaveError> {
        let file: SaveFile =
            bitcode::deserialize(data).map_err(|e| SaveError::Decode(e.to_string()))?;
        file.header.validate()?;
        Ok(file.save)
    }
}

// ---------------------------------------------------------------------------
// World <-> save
// ---------------------------------------------------------------------------

fn slot_record(registry: &Registry, name: &str, slot: &Slot) -> SlotRecord {
    SlotRecord {
        name: name.to_string(),
        item: slot
            .item()
            .and_then(|i| registry.item_name(i))
            .map(str::to_string),
        amount: slot.amount(),
    }
}

impl World {
    /// Snapshot the world into a save record.
    pub fn to_save(&self) -> WorldSave {
        let registry = &self.registry;
        let item_name = |id: ItemId| registry.item_name(id).map(str::to_string);
        let mut machines: BTreeMap<String, Vec<MachineRecord>> = BTreeMap::new();
        let mut transports = Vec::new();

        for (id, origin) in self.objects.iter() {
            let index = self.placed_seq.get(id).copied().unwrap_or_default();
            match self.structures.get(id) {
                Some(Structure::Machine(machine)) => {
                    let Some(def) = registry.machine(machine.kind()) else {
                        continue;
                    };
                    let inventory = machine.inventory();
                    machines.entry(def.name.clone()).or_default().push(MachineRecord {
                        index,
                        tile: tile_of(origin),
                        inputs: inventory
                            .inputs()
                            .iter()
                            .map(|s| slot_record(registry, &s.name, &s.slot))
                            .collect(),
                        output: slot_record(registry, OUTPUT_SLOT, inventory.output()),
                        drill_target: machine.drill_target().and_then(item_name),
                    });
                }
                Some(Structure::Node(node)) => {
                    let Some(item) = registry
                        .item_for_structure(node.kind().structure_kind())
                        .and_then(item_name)
                    else {
                        continue;
                    };
                    transports.push(TransportRecord {
                        index,
                        item,
                        tile: tile_of(origin),
                        variant: node.variant(),
                        direction: node.direction(),
                        held: node.item().and_then(item_name),
                    });
                }
                None => {}
            }
        }
        for records in machines.values_mut() {
            records.sort_by_key(|r| r.index);
        }
        transports.sort_by_key(|r| r.index);

        WorldSave {
            width: self.grid.width(),
            height: self.grid.height(),
            seed: self.seed,
            tiles: self.grid.to_rows(),
            heights: self.heights.as_slice().to_vec(),
            trees: self.trees.iter().copied().map(tile_of).collect(),
            spawn: tile_of(self.spawn),
            biome_order: self.biome_order.clone(),
            machines,
            transports,
        }
    }

    /// Rebuild a world from a save. Structures that no longer fit (unknown
    /// kinds, overlapping footprints) are skipped with a warning, and the
    /// filler tiles a skipped machine left in the grid become air.
    pub fn from_save(
        registry: Arc<Registry>,
        mut config: WorldConfig,
        save: &WorldSave,
    ) -> Result<Self, WorldError> {
        let grid = TileGrid::from_rows(&save.tiles, registry.tile_count())?;
        if grid.width() != save.width || grid.height() != save.height {
            return Err(WorldError::SaveMismatch(format!(
                "grid is {}x{}, header says {}x{}",
                grid.width(),
                grid.height(),
                save.width,
                save.height
            )));
        }
        if save.heights.len() != save.width as usize {
            return Err(WorldError::SaveMismatch(format!(
                "{} heights for {} columns",
                save.heights.len(),
                save.width
            )));
        }
        config.width = save.width;
        config.height = save.height;
        if let Some(problem) = config.problem() {
            return Err(WorldError::Config(problem));
        }

        let mut world = World::from_parts(
            Arc::clone(&registry),
            config,
            save.seed,
            grid,
            HeightMap::new(save.heights.clone()),
            save.trees.iter().copied().map(pos_of).collect(),
            pos_of(save.spawn),
            save.biome_order.clone(),
        );

        // Re-place in the original order so relative ObjectId order holds.
        enum Pending<'a> {
            Machine(&'a str, &'a MachineRecord),
            Transport(&'a TransportRecord),
        }
        let mut pending: Vec<(u64, Pending)> = save
            .machines
            .iter()
            .flat_map(|(kind, records)| records.iter().map(move |r| (r.index, Pending::Machine(kind.as_str(), r))))
            .chain(save.transports.iter().map(|r| (r.index, Pending::Transport(r))))
            .collect();
        pending.sort_by_key(|(index, _)| *index);

        let item_id = |name: &Option<String>| name.as_deref().and_then(|n| registry.item_id(n));
        let mut restored = 0usize;
        for (_, record) in pending {
            let ok = match record {
                Pending::Machine(kind, r) => world.restore_machine(&registry, kind, r, item_id),
                Pending::Transport(r) => world.restore_transport(&registry, r, item_id),
            };
            if ok {
                restored += 1;
            }
        }
        let cleared = world.clear_orphaned_filler();
        if cleared > 0 {
            warn!("cleared {cleared} filler tiles left by skipped machines");
        }
        world.relink_all();

        info!(
            "restored {}x{} world (seed {}) with {restored} structures",
            save.width, save.height, save.seed
        );
        Ok(world)
    }

    fn restore_machine(
        &mut self,
        registry: &Registry,
        kind_name: &str,
        record: &MachineRecord,
        item_id: impl Fn(&Option<String>) -> Option<ItemId>,
    ) -> bool {
        let origin = pos_of(record.tile);
        let Some(kind) = registry.machine_id(kind_name) else {
            warn!("skipping unknown machine kind '{kind_name}' at {origin:?}");
            return false;
        };
        let Some(id) = self.insert_machine(kind, origin) else {
            warn!("skipping {kind_name} at {origin:?}: footprint does not fit");
            return false;
        };
        let Some(machine) = self.structures.get_mut(id).and_then(Structure::as_machine_mut) else {
            return false;
        };
        let inventory = machine.inventory_mut();
        for slot in record.inputs.iter().chain(std::iter::once(&record.output)) {
            let restored = inventory
                .slot_mut(&slot.name)
                .is_some_and(|s| s.restore(item_id(&slot.item), slot.amount));
            if !restored {
                warn!(
                    "{kind_name} at {origin:?}: dropping contents of slot '{}'",
                    slot.name
                );
            }
        }
        if record.drill_target.is_some() {
            machine.set_drill_target(item_id(&record.drill_target));
        }
        true
    }

    fn restore_transport(
        &mut self,
        registry: &Registry,
        record: &TransportRecord,
        item_id: impl Fn(&Option<String>) -> Option<ItemId>,
    ) -> bool {
        let pos = pos_of(record.tile);
        let kind = match registry.item_id(&record.item).and_then(|i| registry.item(i)) {
            Some(def) if def.placement == Placement::Pipe => NodeKind::Pipe,
            Some(def) if def.placement == Placement::Inserter => NodeKind::Inserter,
            _ => {
                warn!("skipping unknown transport item '{}' at {pos:?}", record.item);
                return false;
            }
        };
        let Some(mut node) = TransportNode::new(kind, pos, record.variant) else {
            warn!("skipping {} at {pos:?}: no variant {}", record.item, record.variant);
            return false;
        };
        node.restore(record.direction, item_id(&record.held));
        if self.insert_node(node).is_none() {
            warn!("skipping {} at {pos:?}: tile is taken", record.item);
            return false;
        }
        true
    }
}
