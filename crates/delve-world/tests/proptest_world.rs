//! Property tests: arbitrary place/remove/mine/tick sequences never break
//! grid, collision index, object map or link reciprocity.

use delve_core::id::TileId;
use delve_core::test_utils::standard_registry;
use delve_spatial::{GridPosition, TileGrid};
use delve_world::*;
use proptest::prelude::*;
use std::sync::Arc;

const W: i32 = 12;
const H: i32 = 10;

#[derive(Debug, Clone)]
enum Op {
    Place { x: i32, y: i32, item: usize, variant: u8 },
    Remove { x: i32, y: i32 },
    Mine { x: i32, y: i32, power: u32 },
    Cycle { x: i32, y: i32 },
    Tick,
}

const ITEMS: [&str; 5] = ["dirt", "stone", "pipe", "inserter", "burner_furnace"];

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..W, 0..H, 0..ITEMS.len(), 0u8..12)
            .prop_map(|(x, y, item, variant)| Op::Place { x, y, item, variant }),
        2 => (0..W, 0..H).prop_map(|(x, y)| Op::Remove { x, y }),
        1 => (0..W, 0..H, 0u32..5).prop_map(|(x, y, power)| Op::Mine { x, y, power }),
        1 => (0..W, 0..H).prop_map(|(x, y)| Op::Cycle { x, y }),
        1 => Just(Op::Tick),
    ]
}

fn world() -> World {
    let registry = Arc::new(standard_registry());
    let dirt = registry.tile_id("dirt").unwrap();
    let mut grid = TileGrid::new(W as u32, H as u32, TileId::AIR);
    for pos in grid.positions() {
        if pos.y >= 6 {
            grid.set(pos, dirt);
        }
    }
    World::from_grid(registry, WorldConfig::default(), grid).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn world_stays_consistent(ops in proptest::collection::vec(arb_op(), 1..60)) {
        let mut world = world();
        for op in ops {
            match op {
                Op::Place { x, y, item, variant } => {
                    let id = world.registry().item_id(ITEMS[item]).unwrap();
                    let before = world.grid().clone();
                    let count = world.structure_count();
                    if world.place_variant(GridPosition::new(x, y), id, variant).is_err() {
                        prop_assert_eq!(world.grid(), &before);
                        prop_assert_eq!(world.structure_count(), count);
                    }
                }
                Op::Remove { x, y } => {
                    world.remove(GridPosition::new(x, y));
                }
                Op::Mine { x, y, power } => {
                    world.mine(GridPosition::new(x, y), power);
                }
                Op::Cycle { x, y } => {
                    world.cycle_direction(GridPosition::new(x, y));
                }
                Op::Tick => {
                    world.tick(0.25);
                }
            }
            prop_assert!(world.is_consistent());
        }
    }

    #[test]
    fn pipe_links_are_reciprocal(
        cells in proptest::collection::vec((0..W, 0..6, 0u8..11), 1..30),
    ) {
        let mut world = world();
        let pipe = world.registry().item_id("pipe").unwrap();
        for (x, y, variant) in cells {
            let _ = world.place_variant(GridPosition::new(x, y), pipe, variant);
        }
        for (id, node) in world.nodes() {
            for (&dir, &link) in node.links() {
                let Link::Node(other) = link else { continue };
                let other = world.node(other).unwrap();
                prop_assert!(node.offsets().contains(&dir));
                prop_assert!(other.offsets().contains(&dir.opposite()));
                prop_assert_eq!(other.link(dir.opposite()), Some(Link::Node(id)));
            }
        }

        // Conversely, every facing pair of neighbours is linked both ways.
        for (id, node) in world.nodes() {
            for &dir in node.offsets() {
                let Some(other_id) = world.structure_at(node.pos().step(dir)) else { continue };
                let Some(other) = world.node(other_id) else { continue };
                if other.offsets().contains(&dir.opposite()) {
                    prop_assert_eq!(node.link(dir), Some(Link::Node(other_id)));
                    prop_assert_eq!(other.link(dir.opposite()), Some(Link::Node(id)));
                }
            }
        }
    }

    #[test]
    fn links_survive_removal(
        cells in proptest::collection::vec((0..W, 0..6, 0u8..11), 1..30),
        removals in proptest::collection::vec((0..W, 0..6), 0..10),
    ) {
        let mut world = world();
        let pipe = world.registry().item_id("pipe").unwrap();
        for (x, y, variant) in cells {
            let _ = world.place_variant(GridPosition::new(x, y), pipe, variant);
        }
        for (x, y) in removals {
            world.remove(GridPosition::new(x, y));
        }
        for (id, node) in world.nodes() {
            for &dir in node.offsets() {
                let facing = world
                    .structure_at(node.pos().step(dir))
                    .and_then(|other| world.node(other).map(|n| (other, n)))
                    .filter(|(_, n)| n.offsets().contains(&dir.opposite()));
                match facing {
                    Some((other_id, other)) => {
                        prop_assert_eq!(node.link(dir), Some(Link::Node(other_id)));
                        prop_assert_eq!(other.link(dir.opposite()), Some(Link::Node(id)));
                    }
                    None => prop_assert_eq!(node.link(dir), None),
                }
            }
        }
    }
}
