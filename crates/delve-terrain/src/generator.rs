//! World synthesis: heights, depth bands, ores, trees and spawn.
//!
//! Every column draws from its own RNG stream derived from `(seed, x)`, so
//! the output does not depend on the order columns are filled in and the
//! `parallel` feature produces the same world as the sequential path.

use crate::biome::*;
use crate::height::{self, HeightMap};
use crate::spawn;
use delve_core::id::TileId;
use delve_core::registry::Registry;
use delve_core::rng::SimRng;
use delve_spatial::{GridPosition, TileGrid};
use std::collections::{BTreeMap, BTreeSet};

const NOISE_SALT: u64 = 0x6E6F_6973_6500_0001;
const TREE_SALT: u64 = 0x7472_6565_0000_0002;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TerrainError {
    #[error("no biomes configured")]
    NoBiomes,
    #[error("at least one surface biome is required")]
    NoSurfaceBiome,
    #[error("more than one base biome: {0} and {1}")]
    MultipleBaseBiomes(String, String),
    #[error("duplicate biome name: {0}")]
    DuplicateBiome(String),
    #[error("required tile '{0}' is not registered")]
    MissingTile(String),
    #[error("biome '{biome}' refers to unknown tile '{tile}'")]
    UnknownTile { biome: String, tile: String },
    #[error("biome '{0}' has no common tiles")]
    EmptyCommon(String),
    #[error("biome '{biome}' is misconfigured: {reason}")]
    InvalidBiome { biome: String, reason: &'static str },
    #[error("depth band thresholds are invalid")]
    InvalidBands,
    #[error("world size {width}x{height} is too small")]
    InvalidWorldSize { width: u32, height: u32 },
}

/// A biome with its tile names resolved.
#[derive(Debug, Clone)]
struct ResolvedBiome {
    name: String,
    order: u32,
    noise: NoiseParams,
    elevation: Elevation,
    common: Vec<TileId>,
    rare: Vec<TileId>,
    /// Descending weight; equal weights in declaration order.
    ores: Vec<(TileId, f64)>,
    stone_weight: f64,
    tree_prob: f64,
}

/// Everything generation produces.
#[derive(Debug, Clone)]
pub struct GeneratedTerrain {
    pub grid: TileGrid,
    pub heights: HeightMap,
    pub trees: Vec<GridPosition>,
    pub spawn: GridPosition,
    /// Biome name -> declared position.
    pub biome_order: BTreeMap<String, u32>,
    pub segments: Vec<BiomeSegment>,
}

impl GeneratedTerrain {
    /// The surface biome of column `x`.
    pub fn biome_at(&self, x: u32) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.contains(x))
            .map(|s| s.biome.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    dirt: TileId,
    stone: TileId,
    surface: Vec<(ResolvedBiome, u32)>,
    base: Option<(ResolvedBiome, f64)>,
    bands: BandConfig,
}

fn check_probability(biome: &str, value: f64, reason: &'static str) -> Result<(), TerrainError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TerrainError::InvalidBiome {
            biome: biome.to_string(),
            reason,
        })
    }
}

fn resolve_biome(registry: &Registry, def: &BiomeDef, order: u32) -> Result<ResolvedBiome, TerrainError> {
    let lookup = |name: &String| {
        registry.tile_id(name).ok_or_else(|| TerrainError::UnknownTile {
            biome: def.name.clone(),
            tile: name.clone(),
        })
    };

    let e = def.elevation;
    if !(e.top.is_finite() && e.bottom.is_finite() && e.top >= 0.0 && e.top <= e.bottom) {
        return Err(TerrainError::InvalidBiome {
            biome: def.name.clone(),
            reason: "elevation band must satisfy 0 <= top <= bottom",
        });
    }
    check_probability(&def.name, def.stone_weight, "stone_weight must be in [0, 1]")?;
    check_probability(&def.name, def.tree_prob, "tree_prob must be in [0, 1]")?;
    if def.common.is_empty() {
        return Err(TerrainError::EmptyCommon(def.name.clone()));
    }

    let common = def.common.iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
    let rare = def.rare.iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
    let mut ores = Vec::with_capacity(def.ores.len());
    for ore in &def.ores {
        if !ore.weight.is_finite() {
            return Err(TerrainError::InvalidBiome {
                biome: def.name.clone(),
                reason: "ore weights must be finite",
            });
        }
        ores.push((lookup(&ore.tile)?, ore.weight));
    }
    // Stable: equal weights keep declaration order.
    ores.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(ResolvedBiome {
        name: def.name.clone(),
        order,
        noise: def.noise.clone(),
        elevation: e,
        common,
        rare,
        ores,
        stone_weight: def.stone_weight,
        tree_prob: def.tree_prob,
    })
}

impl TerrainGenerator {
    /// Resolve biome tile names against the registry. Any configuration
    /// problem is reported here rather than during generation.
    pub fn new(
        registry: &Registry,
        biomes: Vec<BiomeDef>,
        bands: BandConfig,
    ) -> Result<Self, TerrainError> {
        if biomes.is_empty() {
            return Err(TerrainError::NoBiomes);
        }
        if !bands.is_valid() {
            return Err(TerrainError::InvalidBands);
        }
        let dirt = registry
            .tile_id("dirt")
            .ok_or_else(|| TerrainError::MissingTile("dirt".into()))?;
        let stone = registry
            .tile_id("stone")
            .ok_or_else(|| TerrainError::MissingTile("stone".into()))?;

        let mut names = BTreeSet::new();
        let mut surface = Vec::new();
        let mut base: Option<(ResolvedBiome, f64)> = None;
        for (order, def) in biomes.iter().enumerate() {
            if !names.insert(def.name.as_str()) {
                return Err(TerrainError::DuplicateBiome(def.name.clone()));
            }
            let resolved = resolve_biome(registry, def, order as u32)?;
            match def.layer {
                BiomeLayer::Surface { columns } => surface.push((resolved, columns)),
                BiomeLayer::Base { start_depth } => {
                    if let Some((existing, _)) = &base {
                        return Err(TerrainError::MultipleBaseBiomes(
                            existing.name.clone(),
                            def.name.clone(),
                        ));
                    }
                    check_probability(&def.name, start_depth, "start_depth must be in [0, 1]")?;
                    base = Some((resolved, start_depth));
                }
            }
        }
        if surface.is_empty() {
            return Err(TerrainError::NoSurfaceBiome);
        }

        Ok(Self {
            dirt,
            stone,
            surface,
            base,
            bands,
        })
    }

    pub fn bands(&self) -> &BandConfig {
        &self.bands
    }

    /// Names of all biomes, in declared order.
    pub fn biome_order(&self) -> BTreeMap<String, u32> {
        self.surface
            .iter()
            .map(|(b, _)| b)
            .chain(self.base.iter().map(|(b, _)| b))
            .map(|b| (b.name.clone(), b.order))
            .collect()
    }

    /// Generate a `width x height` world from `seed`.
    pub fn generate(&self, width: u32, height: u32, seed: u64) -> Result<GeneratedTerrain, TerrainError> {
        if width == 0 || height < 2 {
            return Err(TerrainError::InvalidWorldSize { width, height });
        }

        // 1. Lay out surface biomes and sample heights per segment.
        let widths: Vec<u32> = self.surface.iter().map(|(_, cols)| *cols).collect();
        let layout = layout_segments(&widths, width);
        let mut heights = Vec::with_capacity(width as usize);
        let mut column_biome = Vec::with_capacity(width as usize);
        let mut segments = Vec::with_capacity(layout.len());
        for (index, start, end) in layout {
            let biome = &self.surface[index].0;
            let noise_seed = SimRng::for_stream(seed ^ NOISE_SALT, index as u64).next_u32();
            heights.extend(height::sample_heights(
                &biome.noise,
                &biome.elevation,
                noise_seed,
                start,
                end,
            ));
            column_biome.extend(std::iter::repeat_n(index, (end - start) as usize));
            segments.push(BiomeSegment {
                biome: biome.name.clone(),
                start,
                end,
            });
        }
        let heights = HeightMap::new(heights);

        // 2. Fill columns.
        let fill = |x: u32| {
            let surface = heights.surface_row(x, height).unwrap_or(height - 1);
            let biome = &self.surface[column_biome[x as usize]].0;
            self.fill_column(x, surface, height, seed, biome)
        };
        #[cfg(feature = "parallel")]
        let columns: Vec<Vec<TileId>> = {
            use rayon::prelude::*;
            (0..width).into_par_iter().map(fill).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let columns: Vec<Vec<TileId>> = (0..width).map(fill).collect();

        let mut grid = TileGrid::new(width, height, TileId::AIR);
        for (x, column) in columns.iter().enumerate() {
            grid.fill_column(x as u32, column);
        }

        // 3. Trees.
        let mut trees = Vec::new();
        for x in 0..width {
            let biome = &self.surface[column_biome[x as usize]].0;
            if biome.tree_prob <= 0.0 {
                continue;
            }
            let mut rng = SimRng::for_stream(seed ^ TREE_SALT, x as u64);
            if !rng.chance(biome.tree_prob) {
                continue;
            }
            let y = heights.surface_row(x, height).unwrap_or(height - 1);
            let pos = GridPosition::new(x as i32, y as i32);
            if spawn::is_valid_spawn_point(&grid, pos) {
                grid.set(pos, TileId::TREE_BASE);
                trees.push(pos);
            }
        }

        // 4. Spawn.
        let spawn = spawn::find_spawn(&grid, &heights);

        log::info!(
            "generated {width}x{height} world (seed {seed}): {} segments, {} trees, spawn at ({}, {})",
            segments.len(),
            trees.len(),
            spawn.x,
            spawn.y
        );

        Ok(GeneratedTerrain {
            grid,
            heights,
            trees,
            spawn,
            biome_order: self.biome_order(),
            segments,
        })
    }

    fn fill_column(&self, x: u32, surface: u32, height: u32, seed: u64, biome: &ResolvedBiome) -> Vec<TileId> {
        let mut rng = SimRng::for_stream(seed, x as u64);
        let world_h = height as f64;
        (0..height)
            .map(|y| {
                if y < surface {
                    return TileId::AIR;
                }
                if y == surface {
                    return self.dirt;
                }
                let rel = (y - surface) as f64 / world_h;
                let biome = match &self.base {
                    Some((base, start_depth)) if y as f64 / world_h >= *start_depth => base,
                    _ => biome,
                };
                self.pick_tile(biome, rel, &mut rng)
            })
            .collect()
    }

    fn stone_or_dirt(&self, biome: &ResolvedBiome, rng: &mut SimRng) -> TileId {
        if rng.chance(biome.stone_weight) {
            self.stone
        } else {
            self.dirt
        }
    }

    fn pick_tile(&self, biome: &ResolvedBiome, rel: f64, rng: &mut SimRng) -> TileId {
        let bands = &self.bands;
        if rel < bands.dirt_depth {
            self.dirt
        } else if rel < bands.mixed_depth {
            self.stone_or_dirt(biome, rng)
        } else if rel < bands.rare_depth {
            if !biome.rare.is_empty() && rng.chance(bands.rare_chance) {
                biome.rare[rng.index(biome.rare.len())]
            } else {
                self.stone_or_dirt(biome, rng)
            }
        } else {
            self.pick_ore(biome, rng)
        }
    }

    /// Deep band: gated weighted ore selection, falling back to a common
    /// tile.
    fn pick_ore(&self, biome: &ResolvedBiome, rng: &mut SimRng) -> TileId {
        if rng.chance(self.bands.ore_chance) {
            for &(ore, weight) in &biome.ores {
                if rng.range_inclusive(0, self.bands.ore_roll_max) as f64 <= weight {
                    return ore;
                }
            }
        }
        biome.common[rng.index(biome.common.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::test_utils::standard_registry;

    fn plains(columns: u32) -> BiomeDef {
        BiomeDef {
            name: "plains".into(),
            layer: BiomeLayer::Surface { columns },
            noise: NoiseParams::default(),
            elevation: Elevation { top: 10.0, bottom: 40.0 },
            common: vec!["stone".into()],
            rare: vec!["sandstone".into(), "ice".into()],
            ores: vec![
                OreWeight { tile: "coal".into(), weight: 6.0 },
                OreWeight { tile: "iron_ore".into(), weight: 4.0 },
            ],
            stone_weight: 0.5,
            tree_prob: 0.0,
        }
    }

    #[test]
    fn rejects_unknown_tile() {
        let reg = standard_registry();
        let mut biome = plains(100);
        biome.ores.push(OreWeight { tile: "mithril".into(), weight: 1.0 });
        let err = TerrainGenerator::new(&reg, vec![biome], BandConfig::default()).unwrap_err();
        assert_eq!(
            err,
            TerrainError::UnknownTile { biome: "plains".into(), tile: "mithril".into() }
        );
    }

    #[test]
    fn rejects_bad_configuration() {
        let reg = standard_registry();
        assert_eq!(
            TerrainGenerator::new(&reg, vec![], BandConfig::default()).unwrap_err(),
            TerrainError::NoBiomes
        );

        let mut inverted = plains(100);
        inverted.elevation = Elevation { top: 40.0, bottom: 10.0 };
        assert!(matches!(
            TerrainGenerator::new(&reg, vec![inverted], BandConfig::default()),
            Err(TerrainError::InvalidBiome { .. })
        ));

        let mut empty = plains(100);
        empty.common.clear();
        assert_eq!(
            TerrainGenerator::new(&reg, vec![empty], BandConfig::default()).unwrap_err(),
            TerrainError::EmptyCommon("plains".into())
        );

        let mut base = plains(0);
        base.name = "underworld".into();
        base.layer = BiomeLayer::Base { start_depth: 0.7 };
        assert_eq!(
            TerrainGenerator::new(&reg, vec![base], BandConfig::default()).unwrap_err(),
            TerrainError::NoSurfaceBiome
        );

        assert_eq!(
            TerrainGenerator::new(&reg, vec![plains(5), plains(5)], BandConfig::default()).unwrap_err(),
            TerrainError::DuplicateBiome("plains".into())
        );
    }

    #[test]
    fn rejects_degenerate_world_size() {
        let reg = standard_registry();
        let tg = TerrainGenerator::new(&reg, vec![plains(10)], BandConfig::default()).unwrap();
        assert!(tg.generate(0, 10, 1).is_err());
        assert!(tg.generate(10, 1, 1).is_err());
    }

    #[test]
    fn ore_order_is_stable_for_equal_weights() {
        let reg = standard_registry();
        let mut biome = plains(10);
        biome.ores = vec![
            OreWeight { tile: "copper_ore".into(), weight: 3.0 },
            OreWeight { tile: "coal".into(), weight: 5.0 },
            OreWeight { tile: "iron_ore".into(), weight: 3.0 },
        ];
        let tg = TerrainGenerator::new(&reg, vec![biome], BandConfig::default()).unwrap();
        let ores: Vec<TileId> = tg.surface[0].0.ores.iter().map(|(t, _)| *t).collect();
        let expected: Vec<TileId> = ["coal", "copper_ore", "iron_ore"]
            .iter()
            .map(|n| reg.tile_id(n).unwrap())
            .collect();
        assert_eq!(ores, expected);
    }

    #[test]
    fn guaranteed_ore_always_wins() {
        let reg = standard_registry();
        let mut biome = plains(10);
        biome.ores = vec![OreWeight { tile: "iron_ore".into(), weight: 10.0 }];
        let bands = BandConfig { ore_chance: 1.0, ..BandConfig::default() };
        let tg = TerrainGenerator::new(&reg, vec![biome], bands).unwrap();
        let iron = reg.tile_id("iron_ore").unwrap();
        let mut rng = SimRng::new(3);
        for _ in 0..100 {
            assert_eq!(tg.pick_ore(&tg.surface[0].0, &mut rng), iron);
        }
    }

    #[test]
    fn closed_gate_falls_back_to_common() {
        let reg = standard_registry();
        let bands = BandConfig { ore_chance: 0.0, ..BandConfig::default() };
        let tg = TerrainGenerator::new(&reg, vec![plains(10)], bands).unwrap();
        let stone = reg.tile_id("stone").unwrap();
        let mut rng = SimRng::new(3);
        for _ in 0..100 {
            assert_eq!(tg.pick_ore(&tg.surface[0].0, &mut rng), stone);
        }
    }

    #[test]
    fn base_biome_takes_over_deep_rows() {
        let reg = standard_registry();
        let mut base = plains(0);
        base.name = "underworld".into();
        base.layer = BiomeLayer::Base { start_depth: 0.8 };
        base.common = vec!["ice".into()];
        base.ores.clear();
        let mut top = plains(40);
        top.elevation = Elevation { top: 5.0, bottom: 5.0 };
        top.ores.clear();
        let tg = TerrainGenerator::new(&reg, vec![top, base], BandConfig::default()).unwrap();
        let world = tg.generate(40, 50, 11).unwrap();

        let ice = reg.tile_id("ice").unwrap();
        let stone = reg.tile_id("stone").unwrap();
        for x in 0..40 {
            for y in 40..50 {
                assert_eq!(world.grid.get(GridPosition::new(x, y)), Some(ice));
            }
            // Deep band above the base layer uses the surface biome.
            for y in 30..40 {
                assert_eq!(world.grid.get(GridPosition::new(x, y)), Some(stone));
            }
        }
        assert_eq!(world.biome_order.get("underworld"), Some(&1));
    }

    #[test]
    fn trees_grow_on_flat_ground() {
        let reg = standard_registry();
        let mut biome = plains(30);
        biome.elevation = Elevation { top: 8.0, bottom: 8.0 };
        biome.tree_prob = 1.0;
        let tg = TerrainGenerator::new(&reg, vec![biome], BandConfig::default()).unwrap();
        let world = tg.generate(30, 20, 5).unwrap();
        // Every column except the two edges is a valid spawn point.
        assert_eq!(world.trees.len(), 28);
        for tree in &world.trees {
            assert_eq!(tree.y, 8);
            assert_eq!(world.grid.get(*tree), Some(TileId::TREE_BASE));
        }
    }
}
