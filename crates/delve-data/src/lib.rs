//! Data-driven game content for Delve.
//!
//! Tiles, items, recipes, machines, biomes and world settings are read from
//! a directory of RON, TOML or JSON files, cross-referenced by name, and
//! resolved into a frozen [`delve_core::registry::Registry`] plus a
//! validated [`delve_terrain::TerrainGenerator`].
//!
//! ```ignore
//! let data = delve_data::load_game_data(Path::new("data"))?;
//! let world = data.generate_world()?;
//! ```

pub mod loader;
pub mod schema;

pub use loader::{load_game_data, DataLoadError, GameData};
