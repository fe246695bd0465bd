//! End-to-end world scenarios: placement, transport, production, mining
//! and persistence, all driven through the `World` facade.

use delve_core::id::{ItemId, ObjectId, TileId};
use delve_core::registry::Registry;
use delve_core::test_utils::standard_registry;
use delve_spatial::{Direction, GridPosition, Rect, TileGrid};
use delve_terrain::spawn::is_valid_spawn_point;
use delve_terrain::*;
use delve_world::*;
use std::sync::Arc;

const W: u32 = 16;
const H: u32 = 10;
/// First solid row.
const GROUND: i32 = 6;

fn p(x: i32, y: i32) -> GridPosition {
    GridPosition::new(x, y)
}

/// Flat dirt from row 6 down, air above.
fn flat_world() -> World {
    let registry = Arc::new(standard_registry());
    let dirt = registry.tile_id("dirt").unwrap();
    let mut grid = TileGrid::new(W, H, TileId::AIR);
    for pos in grid.positions() {
        if pos.y >= GROUND {
            grid.set(pos, dirt);
        }
    }
    World::from_grid(registry, WorldConfig::default(), grid).unwrap()
}

fn item(world: &World, name: &str) -> ItemId {
    world.registry().item_id(name).unwrap()
}

fn place(world: &mut World, pos: GridPosition, name: &str) -> ObjectId {
    let item = item(world, name);
    match world.place(pos, item) {
        Ok(Placed::Structure(id)) => id,
        other => panic!("placing {name} at {pos:?}: {other:?}"),
    }
}

// ===========================================================================
// Test 1: Fuel slot rejects non-fuel
// ===========================================================================

#[test]
fn fuel_slot_rejects_stone() {
    let mut world = flat_world();
    let furnace = place(&mut world, p(4, 4), "burner_furnace");
    let coal = item(&world, "coal");
    let stone = item(&world, "stone");

    assert_eq!(world.deposit(furnace, "fuel", coal, 5), 5);
    assert_eq!(world.deposit(furnace, "fuel", stone, 1), 0);

    let fuel = world.machine(furnace).unwrap().inventory().slot("fuel").unwrap();
    assert_eq!(fuel.amount(), 5);
    assert_eq!(fuel.item(), Some(coal));
}

// ===========================================================================
// Test 2: Two-pipe transfer
// ===========================================================================

#[test]
fn adjacent_pipes_pass_an_item() {
    let mut world = flat_world();
    let a = place(&mut world, p(3, 5), "pipe");
    let b = place(&mut world, p(4, 5), "pipe");
    assert_eq!(world.node(a).unwrap().link(Direction::East), Some(Link::Node(b)));
    assert_eq!(world.node(b).unwrap().link(Direction::West), Some(Link::Node(a)));

    assert!(world.set_direction(p(3, 5), Direction::East));
    let ore = item(&world, "iron_ore");
    assert!(world.give_to_node(a, ore));

    let report = world.tick(1.0 / 60.0);
    assert_eq!(report.transfers, 1);
    assert_eq!(world.node(a).unwrap().item(), None);
    assert_eq!(world.node(b).unwrap().item(), Some(ore));
}

// ===========================================================================
// Test 3: Mining to zero hardness
// ===========================================================================

#[test]
fn mined_tile_leaves_index() {
    let mut world = flat_world();
    let pos = p(5, GROUND);
    let rect = Rect::from_tile(pos, world.config().tile_size);
    assert!(world.collision_candidates(&rect).contains(&rect));

    assert!(matches!(world.mine(pos, 1), MineOutcome::Damaged { remaining: 1 }));
    let outcome = world.mine(pos, 1);
    assert_eq!(
        outcome,
        MineOutcome::Broken {
            tile: world.registry().tile_id("dirt").unwrap(),
            drop: Some(item(&world, "dirt")),
        }
    );
    assert_eq!(world.tile_at(pos), Some(TileId::AIR));
    assert!(!world.collision_index().contains_tile(pos));
    assert!(!world.collision_candidates(&rect).contains(&rect));
    assert!(world.is_consistent());
}

// ===========================================================================
// Test 4: Furnace production through the world tick
// ===========================================================================

#[test]
fn furnace_smelts_and_burns_fuel() {
    let mut world = flat_world();
    let furnace = place(&mut world, p(4, 4), "burner_furnace");
    let ore = item(&world, "iron_ore");
    let coal = item(&world, "coal");
    let ingot = item(&world, "iron_ingot");

    assert_eq!(world.deposit(furnace, "smelt", ore, 1), 1);
    assert_eq!(world.tick(1.0).activated, 0, "no fuel yet");

    assert_eq!(world.deposit(furnace, "fuel", coal, 1), 1);
    assert_eq!(world.tick(1.0).activated, 1);
    let report = world.tick(1.0);
    assert_eq!(report.produced, 1);
    assert_eq!(report.deactivated, 1);

    let inv = world.machine(furnace).unwrap().inventory();
    assert_eq!(inv.output().item(), Some(ingot));
    assert!(inv.slot("fuel").unwrap().is_empty());
    assert_eq!(world.extract(furnace, "output", 10), Some((ingot, 1)));
}

// ===========================================================================
// Test 5: Pipe -> furnace -> inserter -> pipe
// ===========================================================================

fn production_line(world: &mut World) -> (ObjectId, ObjectId, ObjectId, ObjectId) {
    let feed = place(world, p(3, 5), "pipe");
    let furnace = place(world, p(4, 4), "burner_furnace");
    let arm = place(world, p(6, 5), "inserter");
    let out = place(world, p(7, 5), "pipe");
    assert!(world.set_direction(p(3, 5), Direction::East));
    (feed, furnace, arm, out)
}

#[test]
fn production_line_delivers_ingot() {
    let mut world = flat_world();
    let (feed, furnace, arm, out) = production_line(&mut world);
    assert_eq!(world.node(feed).unwrap().link(Direction::East), Some(Link::Machine(furnace)));
    assert_eq!(world.node(arm).unwrap().link(Direction::West), Some(Link::Machine(furnace)));
    assert_eq!(world.node(arm).unwrap().link(Direction::East), Some(Link::Node(out)));

    let coal = item(&world, "coal");
    let ore = item(&world, "iron_ore");
    let ingot = item(&world, "iron_ingot");

    assert!(world.give_to_node(feed, coal));
    world.tick(0.25);
    assert!(world.give_to_node(feed, ore));
    world.tick(0.25);
    let inv = world.machine(furnace).unwrap().inventory();
    assert_eq!(inv.slot("fuel").unwrap().amount(), 1);
    assert_eq!(inv.slot("smelt").unwrap().amount(), 1);

    let mut ticks = 0;
    while world.node(out).unwrap().item().is_none() {
        world.tick(0.25);
        ticks += 1;
        assert!(ticks < 40, "ingot never arrived");
    }
    assert_eq!(world.node(out).unwrap().item(), Some(ingot));
    assert!(world.machine(furnace).unwrap().inventory().output().is_empty());
    assert_eq!(world.node(arm).unwrap().phase(), &InserterPhase::Idle);
}

#[test]
fn inserter_leaves_pipe_pointing_away() {
    let mut world = flat_world();
    let pipe = place(&mut world, p(3, 5), "pipe");
    let arm = place(&mut world, p(4, 5), "inserter");
    assert!(world.set_direction(p(3, 5), Direction::West));
    assert_eq!(world.node(arm).unwrap().link(Direction::West), Some(Link::Node(pipe)));
    let ore = item(&world, "iron_ore");
    assert!(world.give_to_node(pipe, ore));

    for _ in 0..40 {
        world.tick(0.1);
    }
    assert_eq!(world.node(pipe).unwrap().item(), Some(ore));
    assert_eq!(world.node(arm).unwrap().item(), None);

    // Pointed at the inserter, the pipe hands its item over.
    assert!(world.set_direction(p(3, 5), Direction::East));
    for _ in 0..40 {
        world.tick(0.1);
    }
    assert_eq!(world.node(pipe).unwrap().item(), None);
}

// ===========================================================================
// Test 6: Drill mines the ore under it
// ===========================================================================

#[test]
fn drill_produces_ore() {
    let mut world = flat_world();
    let copper_tile = world.registry().tile_id("copper_ore").unwrap();
    let copper = item(&world, "copper_ore");
    // Ore has no placeable item; rebuild the level with ore under the drill.
    let mut grid = world.grid().clone();
    grid.set(p(9, GROUND), copper_tile);
    world = World::from_grid(Arc::new(standard_registry()), WorldConfig::default(), grid).unwrap();

    let drill = place(&mut world, p(8, 4), "burner_drill");
    assert_eq!(world.machine(drill).unwrap().drill_target(), Some(copper));
    assert_eq!(world.deposit(drill, "fuel", item(&world, "wood"), 2), 2);

    world.tick(1.0);
    world.tick(1.0);
    let out = world.machine(drill).unwrap().inventory().output();
    assert_eq!(out.item(), Some(copper));
    assert_eq!(out.amount(), 1);
}

// ===========================================================================
// Test 7: Removal keeps links and grid consistent
// ===========================================================================

#[test]
fn removing_a_pipe_unlinks_neighbours() {
    let mut world = flat_world();
    let a = place(&mut world, p(2, 5), "pipe");
    let b = place(&mut world, p(3, 5), "pipe");
    let c = place(&mut world, p(4, 5), "pipe");
    assert!(world.give_to_node(b, item(&world, "coal")));

    let removed = world.remove(p(3, 5)).unwrap();
    assert_eq!(removed.item, Some(item(&world, "pipe")));
    assert_eq!(removed.spilled, vec![(item(&world, "coal"), 1)]);
    assert!(world.node(a).unwrap().links().is_empty());
    assert!(world.node(c).unwrap().links().is_empty());
    assert!(world.node(b).is_none());
    assert!(world.is_consistent());

    let b2 = place(&mut world, p(3, 5), "pipe");
    assert_eq!(world.node(a).unwrap().link(Direction::East), Some(Link::Node(b2)));
    assert_eq!(world.node(c).unwrap().link(Direction::West), Some(Link::Node(b2)));
    assert!(world.is_consistent());
}

#[test]
fn pipe_links_follow_machine_removal() {
    let mut world = flat_world();
    let (feed, _, arm, _) = production_line(&mut world);
    world.remove(p(5, 5)).unwrap();
    assert_eq!(world.node(feed).unwrap().link(Direction::East), None);
    assert_eq!(world.node(arm).unwrap().link(Direction::West), None);
    for pos in [p(4, 4), p(5, 4), p(4, 5), p(5, 5)] {
        assert_eq!(world.tile_at(pos), Some(TileId::AIR));
    }
    assert!(world.is_consistent());
}

#[test]
fn tree_base_drops_wood() {
    let registry = Arc::new(standard_registry());
    let dirt = registry.tile_id("dirt").unwrap();
    let mut grid = TileGrid::new(W, H, TileId::AIR);
    for pos in grid.positions() {
        if pos.y >= GROUND {
            grid.set(pos, dirt);
        }
    }
    grid.set(p(10, GROUND), TileId::TREE_BASE);
    let mut world = World::from_grid(registry, WorldConfig::default(), grid).unwrap();
    assert_eq!(world.trees(), &[p(10, GROUND)]);

    let removed = world.remove(p(10, GROUND)).unwrap();
    assert_eq!(removed.item, Some(item(&world, "wood")));
    assert!(world.trees().is_empty());
}

// ===========================================================================
// Test 8: Cycling direction
// ===========================================================================

#[test]
fn cycle_direction_through_world() {
    let mut world = flat_world();
    let pipe = item(&world, "pipe");
    // Four-way junction at (5,5) with a single neighbour to the east.
    world.place_variant(p(5, 5), pipe, 10).unwrap();
    world.place(p(6, 5), pipe).unwrap();
    assert_eq!(world.cycle_direction(p(5, 5)), Some(Direction::East));
    assert_eq!(world.cycle_direction(p(5, 5)), Some(Direction::East));
    assert_eq!(world.cycle_direction(p(0, 0)), None);
}

// ===========================================================================
// Test 9: Save round trip
// ===========================================================================

fn busy_world() -> World {
    let mut world = flat_world();
    let (feed, furnace, arm, _) = production_line(&mut world);
    let coal = item(&world, "coal");
    let ore = item(&world, "iron_ore");
    assert_eq!(world.deposit(furnace, "fuel", coal, 7), 7);
    assert_eq!(world.deposit(furnace, "smelt", ore, 3), 3);
    assert!(world.give_to_node(feed, ore));
    assert!(world.give_to_node(arm, coal));
    world.place(p(12, 5), item(&world, "stone")).unwrap();
    world.mine(p(1, GROUND), 1);
    world
}

fn assert_same_world(a: &World, b: &World) {
    assert_eq!(a.grid(), b.grid());
    assert_eq!(a.heights(), b.heights());
    assert_eq!(a.spawn(), b.spawn());
    assert_eq!(a.structure_count(), b.structure_count());
    assert_eq!(a.to_save(), b.to_save());
    assert!(b.is_consistent());
}

#[test]
fn save_round_trips_through_json() {
    let world = busy_world();
    let json = world.to_save().to_json().unwrap();
    let save = WorldSave::from_json(&json).unwrap();
    let restored = World::from_save(Arc::new(standard_registry()), WorldConfig::default(), &save).unwrap();
    assert_same_world(&world, &restored);

    // Links are rebuilt, machines start idle but keep their contents.
    let furnace = restored.structure_at(p(4, 4)).unwrap();
    let feed = restored.structure_at(p(3, 5)).unwrap();
    assert_eq!(restored.node(feed).unwrap().link(Direction::East), Some(Link::Machine(furnace)));
    let machine = restored.machine(furnace).unwrap();
    assert!(!machine.is_active());
    assert_eq!(machine.inventory().slot("fuel").unwrap().amount(), 7);
}

#[test]
fn save_round_trips_through_bitcode() {
    let world = busy_world();
    let bytes = world.to_save().encode().unwrap();
    let save = WorldSave::decode(&bytes).unwrap();
    let restored = World::from_save(Arc::new(standard_registry()), WorldConfig::default(), &save).unwrap();
    assert_same_world(&world, &restored);
}

#[test]
fn unknown_structures_are_skipped_on_load() {
    let world = busy_world();
    let mut save = world.to_save();
    let furnaces = save.machines.remove("burner_furnace").unwrap();
    save.machines.insert("mystery_furnace".into(), furnaces);
    save.transports[0].item = "teleporter".into();

    let mut restored = World::from_save(Arc::new(standard_registry()), WorldConfig::default(), &save).unwrap();
    assert_eq!(restored.structure_count(), world.structure_count() - 2);
    assert!(restored.is_consistent());

    // The skipped furnace leaves no filler behind, so its spot is usable.
    for pos in [p(4, 4), p(5, 4), p(4, 5), p(5, 5)] {
        assert_eq!(restored.tile_at(pos), Some(TileId::AIR));
    }
    let furnace = place(&mut restored, p(4, 4), "burner_furnace");
    let feed = restored.structure_at(p(3, 5)).unwrap();
    assert_eq!(restored.node(feed).unwrap().link(Direction::East), Some(Link::Machine(furnace)));
    assert!(restored.is_consistent());
}

#[test]
fn mismatched_save_is_rejected() {
    let mut save = busy_world().to_save();
    save.heights.pop();
    let result = World::from_save(Arc::new(standard_registry()), WorldConfig::default(), &save);
    assert!(matches!(result, Err(WorldError::SaveMismatch(_))));

    let mut save = busy_world().to_save();
    save.tiles[0][0] = 9999;
    let result = World::from_save(Arc::new(standard_registry()), WorldConfig::default(), &save);
    assert!(matches!(result, Err(WorldError::Grid(_))));
}

// ===========================================================================
// Test 10: Generated worlds
// ===========================================================================

fn generator(registry: &Registry) -> TerrainGenerator {
    let plains = BiomeDef {
        name: "plains".into(),
        layer: BiomeLayer::Surface { columns: 80 },
        noise: NoiseParams::default(),
        elevation: Elevation { top: 15.0, bottom: 25.0 },
        common: vec!["stone".into()],
        rare: vec!["sandstone".into()],
        ores: vec![OreWeight { tile: "coal".into(), weight: 5.0 }],
        stone_weight: 0.5,
        tree_prob: 0.2,
    };
    TerrainGenerator::new(registry, vec![plains], BandConfig::default()).unwrap()
}

#[test]
fn generated_world_is_consistent() {
    let registry = Arc::new(standard_registry());
    let terrain = generator(&registry);
    let config = WorldConfig::with_size(80, 60);
    let world = World::generate(Arc::clone(&registry), config, &terrain, 42).unwrap();

    assert_eq!(world.grid().width(), 80);
    assert_eq!(world.grid().height(), 60);
    assert!(world.is_consistent());
    assert_eq!(world.biome_order().get("plains"), Some(&0));
    let spawn = world.spawn();
    assert_eq!(
        world.heights().surface_row(spawn.x as u32, 60),
        Some(spawn.y as u32)
    );
    if is_valid_spawn_point(world.grid(), spawn) {
        assert_eq!(world.tile_at(GridPosition::new(spawn.x, spawn.y - 1)), Some(TileId::AIR));
    }
}

#[test]
fn bad_config_is_rejected() {
    let registry = Arc::new(standard_registry());
    let terrain = generator(&registry);
    let mut config = WorldConfig::with_size(80, 60);
    config.cell_size = 0;
    assert!(matches!(
        World::generate(registry, config, &terrain, 1),
        Err(WorldError::Config(_))
    ));
}
