//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, downstream crates' tests and benchmarks (via
//! the `test-utils` feature).

use crate::fixed::Fixed64;
use crate::id::*;
use crate::registry::*;

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Standard content
// ===========================================================================

fn burner_fuel(b: &RegistryBuilder) -> SlotSpec {
    SlotSpec {
        name: "fuel".into(),
        capacity: 50,
        accepts: ["coal", "wood"].iter().filter_map(|n| b.item_id(n)).collect(),
    }
}

fn smelt_slot(b: &RegistryBuilder) -> SlotSpec {
    SlotSpec {
        name: "smelt".into(),
        capacity: 50,
        accepts: ["iron_ore", "copper_ore"]
            .iter()
            .filter_map(|n| b.item_id(n))
            .collect(),
    }
}

fn furnace(
    b: &RegistryBuilder,
    name: &str,
    speed: f64,
    fuel: FuelSource,
    recipes: &[RecipeId],
) -> MachineKindDef {
    let mut inputs = Vec::new();
    if matches!(fuel, FuelSource::Burner { .. }) {
        inputs.push(burner_fuel(b));
    }
    inputs.push(smelt_slot(b));
    MachineKindDef {
        name: name.into(),
        tile: TileId::AIR,
        width: 2,
        height: 2,
        speed: fixed(speed),
        fuel,
        role: MachineRole::Smelter,
        inputs,
        output_capacity: 50,
        recipes: recipes.to_vec(),
    }
}

/// A registry with the content most tests need:
///
/// - terrain tiles `dirt` (hardness 2), `stone` (4), `sandstone`, `ice`
/// - ore tiles `coal`, `iron_ore`, `copper_ore`, each dropping its item
/// - `tree_base` drops `wood`
/// - recipes `smelt_iron` and `smelt_copper` (1 ore -> 1 ingot, 2 s)
/// - 2x2 machines `burner_furnace` (speed 1), `steel_furnace` (speed 2),
///   `electric_furnace` (speed 1, no fuel) and `burner_drill` (mine 2 s)
/// - `pipe` and `inserter` structure items
pub fn standard_registry() -> Registry {
    let mut b = RegistryBuilder::new();

    let terrain = [("dirt", 2), ("stone", 4), ("sandstone", 3), ("ice", 2)];
    let ores = [("coal", 3), ("iron_ore", 5), ("copper_ore", 5)];
    for (name, hardness) in terrain {
        let tile = b.register_tile(name, TileKind::Terrain, hardness);
        let item = b.register_item(name, Placement::Tile(tile));
        b.set_tile_drop(tile, item).unwrap();
    }
    for (name, hardness) in ores {
        let tile = b.register_tile(name, TileKind::Ore, hardness);
        let item = b.register_item(name, Placement::None);
        b.set_tile_drop(tile, item).unwrap();
    }
    let wood = b.register_item("wood", Placement::None);
    b.set_tile_drop(TileId::TREE_BASE, wood).unwrap();

    let iron_ingot = b.register_item("iron_ingot", Placement::None);
    let copper_ingot = b.register_item("copper_ingot", Placement::None);
    let iron_ore = b.item_id("iron_ore").unwrap();
    let copper_ore = b.item_id("copper_ore").unwrap();
    let smelt_iron = b.register_recipe("smelt_iron", (iron_ore, 1), (iron_ingot, 1), fixed(2.0));
    let smelt_copper =
        b.register_recipe("smelt_copper", (copper_ore, 1), (copper_ingot, 1), fixed(2.0));
    let recipes = [smelt_iron, smelt_copper];

    let burner = || FuelSource::Burner { slot: "fuel".into() };
    let defs = [
        furnace(&b, "burner_furnace", 1.0, burner(), &recipes),
        furnace(&b, "steel_furnace", 2.0, burner(), &recipes),
        furnace(&b, "electric_furnace", 1.0, FuelSource::Electric, &recipes),
        MachineKindDef {
            name: "burner_drill".into(),
            tile: TileId::AIR,
            width: 2,
            height: 2,
            speed: fixed(1.0),
            fuel: burner(),
            role: MachineRole::Drill { mine_time: fixed(2.0) },
            inputs: vec![burner_fuel(&b)],
            output_capacity: 50,
            recipes: Vec::new(),
        },
    ];
    for def in defs {
        let name = def.name.clone();
        let kind = b.register_machine(def);
        b.register_item(&name, Placement::Machine(kind));
    }

    b.register_item("pipe", Placement::Pipe);
    b.register_item("inserter", Placement::Inserter);

    b.build().unwrap()
}
