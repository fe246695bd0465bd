use crate::fixed::Fixed64;
use crate::id::*;
use std::collections::HashMap;

/// What a tile is, as far as generation, placement and rendering care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Air,
    /// Ordinary ground material (dirt, stone, sandstone, ...).
    Terrain,
    /// Minable ore deposit.
    Ore,
    /// Filler (`extended`, `tree_base`): occupied and solid, never drawn.
    Placeholder,
    /// Origin cell of a placed machine.
    Machine(MachineKindId),
}

impl TileKind {
    /// Whether a renderer should draw this tile.
    pub fn is_rendered(self) -> bool {
        !matches!(self, TileKind::Air | TileKind::Placeholder)
    }
}

/// A tile type definition in the registry.
#[derive(Debug, Clone)]
pub struct TileDef {
    pub name: String,
    pub kind: TileKind,
    /// Mining effort needed to break the tile. Zero breaks on first hit.
    pub hardness: u32,
    /// Item handed to the player when the tile is mined.
    pub drop: Option<ItemId>,
}

/// What happens when an item is placed into the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    None,
    Tile(TileId),
    Machine(MachineKindId),
    Pipe,
    Inserter,
}

/// Kinds of placed structures that map back to an item on removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureKind {
    Machine(MachineKindId),
    Pipe,
    Inserter,
}

/// An item type definition in the registry.
#[derive(Debug, Clone)]
pub struct ItemDef {
    pub name: String,
    pub placement: Placement,
}

/// A smelting recipe: `input_quantity` of `input` becomes
/// `output_quantity` of `output` every `smelt_time` seconds at speed 1.
#[derive(Debug, Clone)]
pub struct RecipeDef {
    pub name: String,
    pub input: ItemId,
    pub input_quantity: u32,
    pub output: ItemId,
    pub output_quantity: u32,
    pub smelt_time: Fixed64,
}

/// Layout of one named input slot on a machine kind.
#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub name: String,
    pub capacity: u32,
    pub accepts: Vec<ItemId>,
}

/// Where a machine gets its energy from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FuelSource {
    /// Burns one unit from the named input slot per production cycle.
    Burner { slot: String },
    /// Always powered.
    Electric,
}

/// What a machine produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineRole {
    /// Runs one of its recipes on the contents of its input slots.
    Smelter,
    /// Extracts the ore under its footprint every `mine_time` seconds.
    Drill { mine_time: Fixed64 },
}

/// Variant descriptor for a machine. Burner/steel/electric furnaces and
/// burner/electric drills are all the same `Machine` entity with a
/// different descriptor.
#[derive(Debug, Clone)]
pub struct MachineKindDef {
    pub name: String,
    /// Tile written at the machine's origin cell.
    pub tile: TileId,
    pub width: u32,
    pub height: u32,
    /// Production speed factor; cycle period is `time / speed`.
    pub speed: Fixed64,
    pub fuel: FuelSource,
    pub role: MachineRole,
    pub inputs: Vec<SlotSpec>,
    pub output_capacity: u32,
    pub recipes: Vec<RecipeId>,
}

impl MachineKindDef {
    /// Name of the burner fuel slot, if any.
    pub fn fuel_slot(&self) -> Option<&str> {
        match &self.fuel {
            FuelSource::Burner { slot } => Some(slot.as_str()),
            FuelSource::Electric => None,
        }
    }
}

/// Builder for constructing an immutable Registry.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug)]
pub struct RegistryBuilder {
    tiles: Vec<TileDef>,
    tile_name_to_id: HashMap<String, TileId>,
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    machines: Vec<MachineKindDef>,
    machine_name_to_id: HashMap<String, MachineKindId>,
    duplicates: Vec<String>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// A builder with the reserved tiles (`air`, `extended`, `tree_base`)
    /// already registered at their fixed IDs.
    pub fn new() -> Self {
        let mut builder = Self {
            tiles: Vec::new(),
            tile_name_to_id: HashMap::new(),
            items: Vec::new(),
            item_name_to_id: HashMap::new(),
            recipes: Vec::new(),
            recipe_name_to_id: HashMap::new(),
            machines: Vec::new(),
            machine_name_to_id: HashMap::new(),
            duplicates: Vec::new(),
        };
        builder.register_tile("air", TileKind::Air, 0);
        builder.register_tile("extended", TileKind::Placeholder, 0);
        builder.register_tile("tree_base", TileKind::Placeholder, 1);
        builder
    }

    /// Phase 1: Register a tile type. Returns its ID.
    pub fn register_tile(&mut self, name: &str, kind: TileKind, hardness: u32) -> TileId {
        let id = TileId(self.tiles.len() as u16);
        self.tiles.push(TileDef {
            name: name.to_string(),
            kind,
            hardness,
            drop: None,
        });
        if self.tile_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(format!("tile {name}"));
        }
        id
    }

    /// Phase 1: Register an item type. Returns its ID.
    pub fn register_item(&mut self, name: &str, placement: Placement) -> ItemId {
        let id = ItemId(self.items.len() as u32);
        self.items.push(ItemDef {
            name: name.to_string(),
            placement,
        });
        if self.item_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(format!("item {name}"));
        }
        id
    }

    /// Phase 1: Register a smelting recipe. Returns its ID.
    pub fn register_recipe(
        &mut self,
        name: &str,
        input: (ItemId, u32),
        output: (ItemId, u32),
        smelt_time: Fixed64,
    ) -> RecipeId {
        let id = RecipeId(self.recipes.len() as u32);
        self.recipes.push(RecipeDef {
            name: name.to_string(),
            input: input.0,
            input_quantity: input.1,
            output: output.0,
            output_quantity: output.1,
            smelt_time,
        });
        if self.recipe_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(format!("recipe {name}"));
        }
        id
    }

    /// Phase 1: Register a machine kind. A tile named after the machine is
    /// registered alongside it and stored in `def.tile`.
    pub fn register_machine(&mut self, mut def: MachineKindDef) -> MachineKindId {
        let id = MachineKindId(self.machines.len() as u32);
        def.tile = self.register_tile(&def.name, TileKind::Machine(id), 1);
        if self
            .machine_name_to_id
            .insert(def.name.clone(), id)
            .is_some()
        {
            self.duplicates.push(format!("machine {}", def.name));
        }
        self.machines.push(def);
        id
    }

    /// Phase 2: Set the item dropped when a tile is mined.
    pub fn set_tile_drop(&mut self, tile: TileId, item: ItemId) -> Result<(), RegistryError> {
        let def = self
            .tiles
            .get_mut(tile.0 as usize)
            .ok_or(RegistryError::InvalidTileRef(tile))?;
        def.drop = Some(item);
        Ok(())
    }

    /// Phase 2: Change what an item does when placed.
    pub fn set_item_placement(
        &mut self,
        item: ItemId,
        placement: Placement,
    ) -> Result<(), RegistryError> {
        let def = self
            .items
            .get_mut(item.0 as usize)
            .ok_or(RegistryError::InvalidItemRef(item))?;
        def.placement = placement;
        Ok(())
    }

    /// Phase 2: Mutate an existing machine kind by name.
    pub fn mutate_machine<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut MachineKindDef),
    {
        let id = self
            .machine_name_to_id
            .get(name)
            .ok_or(RegistryError::NotFound(name.to_string()))?;
        f(&mut self.machines[id.0 as usize]);
        Ok(())
    }

    pub fn tile_id(&self, name: &str) -> Option<TileId> {
        self.tile_name_to_id.get(name).copied()
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    pub fn machine_id(&self, name: &str) -> Option<MachineKindId> {
        self.machine_name_to_id.get(name).copied()
    }

    fn check_item(&self, item: ItemId) -> Result<(), RegistryError> {
        if (item.0 as usize) < self.items.len() {
            Ok(())
        } else {
            Err(RegistryError::InvalidItemRef(item))
        }
    }

    /// Phase 3: Validate and build the immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        if let Some(dup) = self.duplicates.first() {
            return Err(RegistryError::DuplicateName(dup.clone()));
        }
        if self.tiles.len() > u16::MAX as usize {
            return Err(RegistryError::TooManyTiles(self.tiles.len()));
        }

        for tile in &self.tiles {
            if let Some(drop) = tile.drop {
                self.check_item(drop)?;
            }
        }

        for item in &self.items {
            match item.placement {
                Placement::Tile(tile) if tile.0 as usize >= self.tiles.len() => {
                    return Err(RegistryError::InvalidTileRef(tile));
                }
                Placement::Tile(tile) if tile == TileId::AIR || tile == TileId::EXTENDED => {
                    return Err(RegistryError::InvalidPlacement(item.name.clone()));
                }
                Placement::Machine(kind) if kind.0 as usize >= self.machines.len() => {
                    return Err(RegistryError::InvalidMachineRef(kind));
                }
                _ => {}
            }
        }

        for recipe in &self.recipes {
            self.check_item(recipe.input)?;
            self.check_item(recipe.output)?;
            if recipe.smelt_time <= Fixed64::ZERO {
                return Err(RegistryError::NonPositiveTime(recipe.name.clone()));
            }
            if recipe.input_quantity == 0 || recipe.output_quantity == 0 {
                return Err(RegistryError::MalformedRecipe(recipe.name.clone()));
            }
        }

        for machine in &self.machines {
            validate_machine(machine, &self)?;
        }

        let mut structure_items = HashMap::new();
        for (index, item) in self.items.iter().enumerate() {
            let kind = match item.placement {
                Placement::Machine(kind) => StructureKind::Machine(kind),
                Placement::Pipe => StructureKind::Pipe,
                Placement::Inserter => StructureKind::Inserter,
                Placement::None | Placement::Tile(_) => continue,
            };
            structure_items.entry(kind).or_insert(ItemId(index as u32));
        }

        log::debug!(
            "registry built: {} tiles, {} items, {} recipes, {} machines",
            self.tiles.len(),
            self.items.len(),
            self.recipes.len(),
            self.machines.len()
        );

        Ok(Registry {
            tiles: self.tiles,
            tile_name_to_id: self.tile_name_to_id,
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            recipes: self.recipes,
            recipe_name_to_id: self.recipe_name_to_id,
            machines: self.machines,
            machine_name_to_id: self.machine_name_to_id,
            structure_items,
        })
    }
}

fn validate_machine(machine: &MachineKindDef, builder: &RegistryBuilder) -> Result<(), RegistryError> {
    if machine.speed <= Fixed64::ZERO {
        return Err(RegistryError::NonPositiveSpeed(machine.name.clone()));
    }
    if machine.width == 0 || machine.height == 0 {
        return Err(RegistryError::EmptyFootprint(machine.name.clone()));
    }
    for slot in &machine.inputs {
        for &item in &slot.accepts {
            builder.check_item(item)?;
        }
    }
    if let Some(fuel) = machine.fuel_slot() {
        if !machine.inputs.iter().any(|s| s.name == fuel) {
            return Err(RegistryError::MissingFuelSlot {
                machine: machine.name.clone(),
                slot: fuel.to_string(),
            });
        }
    }
    match &machine.role {
        MachineRole::Drill { mine_time } => {
            if *mine_time <= Fixed64::ZERO {
                return Err(RegistryError::NonPositiveTime(machine.name.clone()));
            }
        }
        MachineRole::Smelter => {
            let fuel = machine.fuel_slot();
            for &recipe_id in &machine.recipes {
                let recipe = builder
                    .recipes
                    .get(recipe_id.0 as usize)
                    .ok_or(RegistryError::InvalidRecipeRef(recipe_id))?;
                let accepted = machine
                    .inputs
                    .iter()
                    .filter(|s| Some(s.name.as_str()) != fuel)
                    .any(|s| s.accepts.contains(&recipe.input) && s.capacity >= recipe.input_quantity);
                if !accepted || machine.output_capacity < recipe.output_quantity {
                    return Err(RegistryError::RecipeNotSupported {
                        machine: machine.name.clone(),
                        recipe: recipe.name.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Immutable registry. Frozen after build(). Thread-safe to share.
#[derive(Debug)]
pub struct Registry {
    tiles: Vec<TileDef>,
    tile_name_to_id: HashMap<String, TileId>,
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    machines: Vec<MachineKindDef>,
    machine_name_to_id: HashMap<String, MachineKindId>,
    structure_items: HashMap<StructureKind, ItemId>,
}

impl Registry {
    pub fn tile(&self, id: TileId) -> Option<&TileDef> {
        self.tiles.get(id.0 as usize)
    }

    pub fn tile_id(&self, name: &str) -> Option<TileId> {
        self.tile_name_to_id.get(name).copied()
    }

    pub fn tile_name(&self, id: TileId) -> Option<&str> {
        self.tile(id).map(|t| t.name.as_str())
    }

    pub fn item(&self, id: ItemId) -> Option<&ItemDef> {
        self.items.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn item_name(&self, id: ItemId) -> Option<&str> {
        self.item(id).map(|i| i.name.as_str())
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    pub fn machine(&self, id: MachineKindId) -> Option<&MachineKindDef> {
        self.machines.get(id.0 as usize)
    }

    pub fn machine_id(&self, name: &str) -> Option<MachineKindId> {
        self.machine_name_to_id.get(name).copied()
    }

    /// The recipe of `machine` that consumes `item`, if it has one.
    pub fn recipe_for_input(&self, machine: MachineKindId, item: ItemId) -> Option<RecipeId> {
        self.machine(machine)?
            .recipes
            .iter()
            .copied()
            .find(|&r| self.recipe(r).is_some_and(|def| def.input == item))
    }

    /// The item that places a structure of the given kind.
    pub fn item_for_structure(&self, kind: StructureKind) -> Option<ItemId> {
        self.structure_items.get(&kind).copied()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("too many tile types: {0}")]
    TooManyTiles(usize),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemId),
    #[error("invalid tile reference: {0:?}")]
    InvalidTileRef(TileId),
    #[error("invalid recipe reference: {0:?}")]
    InvalidRecipeRef(RecipeId),
    #[error("invalid machine reference: {0:?}")]
    InvalidMachineRef(MachineKindId),
    #[error("item '{0}' places a reserved tile")]
    InvalidPlacement(String),
    #[error("'{0}' must have a positive duration")]
    NonPositiveTime(String),
    #[error("recipe '{0}' must consume and produce at least one unit")]
    MalformedRecipe(String),
    #[error("machine '{0}' must have a positive speed")]
    NonPositiveSpeed(String),
    #[error("machine '{0}' has an empty footprint")]
    EmptyFootprint(String),
    #[error("machine '{machine}' burns fuel from missing slot '{slot}'")]
    MissingFuelSlot { machine: String, slot: String },
    #[error("machine '{machine}' has no input slot for recipe '{recipe}'")]
    RecipeNotSupported { machine: String, recipe: String },
}
