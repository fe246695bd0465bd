//! Procedural terrain for the sandbox world.
//!
//! [`TerrainGenerator`] turns a list of [`BiomeDef`]s into a dense tile
//! grid: a fractal-noise height profile per surface biome, depth banded
//! materials below the surface, weighted ore placement in the deep band,
//! trees on flat ground and a spawn point near the centre.

pub mod biome;
pub mod generator;
pub mod height;
pub mod spawn;

pub use biome::{BandConfig, BiomeDef, BiomeLayer, BiomeSegment, Elevation, NoiseParams, OreWeight};
pub use generator::{GeneratedTerrain, TerrainError, TerrainGenerator};
pub use height::HeightMap;
