use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a placed structure (machine, pipe or inserter).
    pub struct ObjectId;
}

/// Identifies a tile type in the registry. Stored once per grid cell, so
/// it is kept small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId(pub u16);

impl TileId {
    /// Empty space. Never solid.
    pub const AIR: TileId = TileId(0);
    /// Filler for the non-origin cells of a multi-tile machine.
    pub const EXTENDED: TileId = TileId(1);
    /// Marks the surface tile a tree grows from.
    pub const TREE_BASE: TileId = TileId(2);

    /// Whether this tile blocks movement. Everything except air does,
    /// placeholders included.
    pub fn is_solid(self) -> bool {
        self != TileId::AIR
    }
}

/// Identifies an item type in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Identifies a smelting recipe in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// Identifies a machine variant descriptor in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineKindId(pub u32);
