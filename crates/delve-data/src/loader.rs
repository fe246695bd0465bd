//! Turns a directory of content files into a [`GameData`].
//!
//! Each content kind lives in one file named after it (`tiles`, `items`,
//! `recipes`, `machines`, `biomes`, `world`) with a `.ron`, `.toml` or
//! `.json` extension. Names are resolved to ids in dependency order and
//! the result is frozen into a [`Registry`].

use crate::schema::{
    ItemData, MachineData, RecipeData, StructureData, TileData, TileKindData, WorldData,
};
use delve_core::fixed::f64_to_fixed64;
use delve_core::id::{ItemId, MachineKindId, RecipeId, TileId};
use delve_core::registry::{
    FuelSource, MachineKindDef, MachineRole, Placement, Registry, RegistryBuilder, RegistryError,
    SlotSpec, TileKind,
};
use delve_terrain::{BiomeDef, TerrainError, TerrainGenerator};
use delve_world::{World, WorldConfig, WorldError, WorldSave};
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("{dir} has no {file}.ron, {file}.toml or {file}.json")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("{file}: expected a .ron, .toml or .json extension")]
    UnsupportedFormat { file: PathBuf },

    /// The same content file exists in more than one format.
    #[error("{a} and {b} describe the same content")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("{file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name used in `file` was never declared as `expected_kind`.
    #[error("{file}: no {expected_kind} named '{name}'")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A name is declared twice, or clashes with a reserved name.
    #[error("{file}: '{name}' is already taken")]
    DuplicateName { file: PathBuf, name: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Biomes reference tiles the registry does not know.
    #[error(transparent)]
    Terrain(#[from] TerrainError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Formats and file lookup
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const ALL: [(Format, &'static str); 3] =
        [(Format::Ron, "ron"), (Format::Toml, "toml"), (Format::Json, "json")];
}

/// Picks the format from the file extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .iter()
        .find(|(_, known)| Some(*known) == ext)
        .map(|(format, _)| *format)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

/// Finds `dir/{base_name}.{ron,toml,json}`. At most one of them may exist.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = Format::ALL
        .iter()
        .map(|(_, ext)| dir.join(format!("{base_name}.{ext}")))
        .filter(|path| path.exists());

    let first = present.next();
    if let (Some(a), Some(b)) = (&first, present.next()) {
        return Err(DataLoadError::ConflictingFormats {
            a: a.clone(),
            b: b.clone(),
        });
    }
    Ok(first)
}

pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

fn read(path: &Path) -> Result<(Format, String), DataLoadError> {
    let format = detect_format(path)?;
    Ok((format, std::fs::read_to_string(path)?))
}

/// Reads a whole file as one `T`.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let (format, text) = read(path)?;
    match format {
        Format::Ron => ron::from_str(&text).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&text).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&text).map_err(|e| parse_error(path, e)),
    }
}

/// Reads a list of definitions. RON and JSON files hold a bare list; TOML
/// has no top-level arrays, so the list sits under `toml_key`
/// (`[[tiles]]`, `[[machines]]`, ...).
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let (format, text) = read(path)?;
    match format {
        Format::Ron => return ron::from_str(&text).map_err(|e| parse_error(path, e)),
        Format::Json => return serde_json::from_str(&text).map_err(|e| parse_error(path, e)),
        Format::Toml => {}
    }

    let mut table: toml::Table = toml::from_str(&text).map_err(|e| parse_error(path, e))?;
    match table.remove(toml_key) {
        Some(list) => list.try_into().map_err(|e: toml::de::Error| parse_error(path, e)),
        None if table.is_empty() => Ok(Vec::new()),
        None => Err(parse_error(path, format!("expected a `{toml_key}` array"))),
    }
}

// ===========================================================================
// Name lookup
// ===========================================================================

pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    match map.contains_key(name) {
        true => Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        }),
        false => Ok(()),
    }
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Everything needed to start a game: the frozen registry, a validated
/// terrain generator and the world settings.
#[derive(Debug, Clone)]
pub struct GameData {
    pub registry: Arc<Registry>,
    pub terrain: TerrainGenerator,
    pub world: WorldConfig,
    pub seed: u64,
}

impl GameData {
    /// Generate a world with the configured seed.
    pub fn generate_world(&self) -> Result<World, WorldError> {
        self.generate_world_with_seed(self.seed)
    }

    pub fn generate_world_with_seed(&self, seed: u64) -> Result<World, WorldError> {
        World::generate(
            Arc::clone(&self.registry),
            self.world.clone(),
            &self.terrain,
            seed,
        )
    }

    /// Rebuild a saved world against this registry.
    pub fn restore_world(&self, save: &WorldSave) -> Result<World, WorldError> {
        World::from_save(Arc::clone(&self.registry), self.world.clone(), save)
    }
}

/// Names resolved so far, keyed the way data files refer to them.
#[derive(Default)]
struct Names {
    tiles: HashMap<String, TileId>,
    items: HashMap<String, ItemId>,
    /// Items declared as pipes or inserters; they cannot also place a tile
    /// or machine.
    structured: HashSet<String>,
    recipes: HashMap<String, RecipeId>,
    machines: HashMap<String, MachineKindId>,
}

impl Names {
    /// Register an item that places something, reusing a free-standing
    /// item of the same name from the items file.
    fn placing_item(
        &mut self,
        builder: &mut RegistryBuilder,
        name: &str,
        placement: Placement,
        file: &Path,
    ) -> Result<ItemId, DataLoadError> {
        if self.structured.contains(name) {
            return Err(DataLoadError::DuplicateName {
                file: file.to_path_buf(),
                name: name.to_string(),
            });
        }
        match self.items.get(name) {
            Some(&id) => {
                builder.set_item_placement(id, placement)?;
                Ok(id)
            }
            None => {
                let id = builder.register_item(name, placement);
                self.items.insert(name.to_string(), id);
                Ok(id)
            }
        }
    }

    fn item(&self, name: &str, file: &Path) -> Result<ItemId, DataLoadError> {
        resolve_name(&self.items, name, file, "item").copied()
    }
}

fn load_tiles(
    builder: &mut RegistryBuilder,
    names: &mut Names,
    tiles: &[TileData],
    file: &Path,
) -> Result<(), DataLoadError> {
    for tile in tiles {
        if tile.name == "tree_base" {
            continue;
        }
        if builder.tile_id(&tile.name).is_some() {
            return Err(DataLoadError::DuplicateName {
                file: file.to_path_buf(),
                name: tile.name.clone(),
            });
        }
        check_duplicate(&names.tiles, &tile.name, file)?;
        let kind = match tile.kind {
            TileKindData::Terrain => TileKind::Terrain,
            TileKindData::Ore => TileKind::Ore,
            TileKindData::Placeholder => TileKind::Placeholder,
        };
        let id = builder.register_tile(&tile.name, kind, tile.hardness);
        names.tiles.insert(tile.name.clone(), id);
    }
    Ok(())
}

fn load_items(
    builder: &mut RegistryBuilder,
    names: &mut Names,
    items: &[ItemData],
    file: &Path,
) -> Result<(), DataLoadError> {
    for item in items {
        check_duplicate(&names.items, &item.name, file)?;
        let placement = match item.structure {
            None => Placement::None,
            Some(StructureData::Pipe) => Placement::Pipe,
            Some(StructureData::Inserter) => Placement::Inserter,
        };
        if item.structure.is_some() {
            names.structured.insert(item.name.clone());
        }
        let id = builder.register_item(&item.name, placement);
        names.items.insert(item.name.clone(), id);
    }
    Ok(())
}

/// Placeable tiles become items, then tile drops are resolved. A
/// `tree_base` entry may set the drop of the reserved tree tile.
fn resolve_tile_items(
    builder: &mut RegistryBuilder,
    names: &mut Names,
    tiles: &[TileData],
    file: &Path,
) -> Result<(), DataLoadError> {
    for tile in tiles.iter().filter(|t| t.placeable && t.name != "tree_base") {
        let id = *resolve_name(&names.tiles, &tile.name, file, "tile")?;
        names.placing_item(builder, &tile.name, Placement::Tile(id), file)?;
    }
    for tile in tiles {
        let Some(drop) = &tile.drop else { continue };
        let id = if tile.name == "tree_base" {
            TileId::TREE_BASE
        } else {
            *resolve_name(&names.tiles, &tile.name, file, "tile")?
        };
        let item = names.item(drop, file)?;
        builder.set_tile_drop(id, item)?;
    }
    Ok(())
}

fn load_recipes(
    builder: &mut RegistryBuilder,
    names: &mut Names,
    recipes: &[RecipeData],
    file: &Path,
) -> Result<(), DataLoadError> {
    for recipe in recipes {
        check_duplicate(&names.recipes, &recipe.name, file)?;
        let input = (names.item(&recipe.input.0, file)?, recipe.input.1);
        let output = (names.item(&recipe.output.0, file)?, recipe.output.1);
        let id = builder.register_recipe(&recipe.name, input, output, f64_to_fixed64(recipe.time));
        names.recipes.insert(recipe.name.clone(), id);
    }
    Ok(())
}

fn load_machines(
    builder: &mut RegistryBuilder,
    names: &mut Names,
    machines: &[MachineData],
    file: &Path,
) -> Result<(), DataLoadError> {
    for machine in machines {
        check_duplicate(&names.machines, &machine.name, file)?;
        if names.tiles.contains_key(&machine.name) {
            return Err(DataLoadError::DuplicateName {
                file: file.to_path_buf(),
                name: machine.name.clone(),
            });
        }
        let inputs = machine
            .inputs
            .iter()
            .map(|slot| {
                let accepts = slot
                    .accepts
                    .iter()
                    .map(|name| names.item(name, file))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SlotSpec {
                    name: slot.name.clone(),
                    capacity: slot.capacity,
                    accepts,
                })
            })
            .collect::<Result<Vec<_>, DataLoadError>>()?;
        let recipes = machine
            .recipes
            .iter()
            .map(|name| resolve_name(&names.recipes, name, file, "recipe").copied())
            .collect::<Result<Vec<_>, _>>()?;
        let fuel = match &machine.fuel_slot {
            Some(slot) => FuelSource::Burner { slot: slot.clone() },
            None => FuelSource::Electric,
        };
        let role = match machine.mine_time {
            Some(t) => MachineRole::Drill {
                mine_time: f64_to_fixed64(t),
            },
            None => MachineRole::Smelter,
        };
        let id = builder.register_machine(MachineKindDef {
            name: machine.name.clone(),
            tile: TileId::AIR,
            width: machine.width,
            height: machine.height,
            speed: f64_to_fixed64(machine.speed),
            fuel,
            role,
            inputs,
            output_capacity: machine.output_capacity,
            recipes,
        });
        names.machines.insert(machine.name.clone(), id);
        names.placing_item(builder, &machine.name, Placement::Machine(id), file)?;
        debug!("registered machine '{}' from {}", machine.name, file.display());
    }
    Ok(())
}

/// Load every data file in `dir` and resolve it into [`GameData`].
///
/// Required: `tiles`, `recipes`, `machines` and `biomes`. Optional: `items`
/// and `world`. Each may be `.ron`, `.toml` or `.json`; TOML lists live under
/// a key named after the file.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let tiles_path = require_data_file(dir, "tiles")?;
    let recipes_path = require_data_file(dir, "recipes")?;
    let machines_path = require_data_file(dir, "machines")?;
    let biomes_path = require_data_file(dir, "biomes")?;
    let items_path = find_data_file(dir, "items")?;
    let world_path = find_data_file(dir, "world")?;

    let tiles: Vec<TileData> = deserialize_list(&tiles_path, "tiles")?;
    let recipes: Vec<RecipeData> = deserialize_list(&recipes_path, "recipes")?;
    let machines: Vec<MachineData> = deserialize_list(&machines_path, "machines")?;
    let biomes: Vec<BiomeDef> = deserialize_list(&biomes_path, "biomes")?;
    let items: Vec<ItemData> = match &items_path {
        Some(path) => deserialize_list(path, "items")?,
        None => Vec::new(),
    };
    let world: WorldData = match &world_path {
        Some(path) => deserialize_file(path)?,
        None => WorldData::default(),
    };

    let mut builder = RegistryBuilder::new();
    let mut names = Names::default();
    load_tiles(&mut builder, &mut names, &tiles, &tiles_path)?;
    if let Some(path) = &items_path {
        load_items(&mut builder, &mut names, &items, path)?;
    }
    resolve_tile_items(&mut builder, &mut names, &tiles, &tiles_path)?;
    load_recipes(&mut builder, &mut names, &recipes, &recipes_path)?;
    load_machines(&mut builder, &mut names, &machines, &machines_path)?;

    let registry = builder.build()?;
    let biome_count = biomes.len();
    let terrain = TerrainGenerator::new(&registry, biomes, world.bands)?;

    info!(
        "loaded game data from {}: {} tiles, {} items, {} recipes, {} machines, {} biomes",
        dir.display(),
        registry.tile_count(),
        registry.item_count(),
        registry.recipe_count(),
        registry.machine_count(),
        biome_count,
    );

    Ok(GameData {
        registry: Arc::new(registry),
        terrain,
        world: world.world,
        seed: world.seed,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
