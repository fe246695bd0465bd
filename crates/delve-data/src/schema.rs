//! Serde data file structs for game content definitions.
//!
//! These structs define the on-disk format for tiles, items, recipes,
//! machines and world settings. They are deserialized from RON, JSON, or
//! TOML files and then resolved into registry types by the loader. Biomes
//! use [`delve_terrain::BiomeDef`] directly.

use delve_terrain::BandConfig;
use delve_world::WorldConfig;
use serde::Deserialize;

// ===========================================================================
// Tiles
// ===========================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKindData {
    #[default]
    Terrain,
    Ore,
    Placeholder,
}

/// A tile type definition in a data file.
///
/// An entry named after a reserved tile (`tree_base`, ...) only sets that
/// tile's drop.
#[derive(Debug, Clone, Deserialize)]
pub struct TileData {
    pub name: String,
    #[serde(default)]
    pub kind: TileKindData,
    #[serde(default = "default_hardness")]
    pub hardness: u32,
    /// Item handed out when mined.
    #[serde(default)]
    pub drop: Option<String>,
    /// Also register an item of the same name that places this tile.
    #[serde(default)]
    pub placeable: bool,
}

fn default_hardness() -> u32 {
    1
}

// ===========================================================================
// Items
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureData {
    Pipe,
    Inserter,
}

/// A free-standing item. Items for placeable tiles and machines are
/// created automatically and only need an entry here to be listed first.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    #[serde(default)]
    pub structure: Option<StructureData>,
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A smelting recipe: `(item, quantity)` in, `(item, quantity)` out.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub name: String,
    pub input: (String, u32),
    pub output: (String, u32),
    /// Seconds per cycle at speed 1.
    pub time: f64,
}

// ===========================================================================
// Machines
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SlotData {
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    pub accepts: Vec<String>,
}

fn default_capacity() -> u32 {
    50
}

fn default_size() -> u32 {
    1
}

fn default_speed() -> f64 {
    1.0
}

/// A machine kind. Without `fuel_slot` it is electric; with `mine_time`
/// it is a drill, otherwise a smelter running `recipes`.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineData {
    pub name: String,
    #[serde(default = "default_size")]
    pub width: u32,
    #[serde(default = "default_size")]
    pub height: u32,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub fuel_slot: Option<String>,
    #[serde(default)]
    pub mine_time: Option<f64>,
    #[serde(default)]
    pub inputs: Vec<SlotData>,
    #[serde(default = "default_capacity")]
    pub output_capacity: u32,
    #[serde(default)]
    pub recipes: Vec<String>,
}

// ===========================================================================
// World
// ===========================================================================

/// World settings file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorldData {
    pub seed: u64,
    pub world: WorldConfig,
    pub bands: BandConfig,
}
