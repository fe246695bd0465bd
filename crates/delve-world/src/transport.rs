//! Pipe and inserter network.
//!
//! Each transport node has a fixed set of connection offsets chosen by its
//! variant. Links are computed from the object map whenever the node or a
//! neighbour is placed or removed:
//!
//! - node to node links need both sides to list each other's offset
//! - node to machine links only need a machine on the offset
//!
//! Every tick is resolved in two steps. All hand-offs are planned from the
//! state at the start of the tick, then applied in ascending `ObjectId`
//! order of the acting node. A pipe that was not empty at the start of the
//! tick cannot receive, no pipe receives twice, and no node gives twice, so
//! an item moves at most one hop per tick whatever order nodes are stored
//! in.

use crate::structure::Structure;
use delve_core::fixed::Fixed64;
use delve_core::id::{ItemId, ObjectId};
use delve_core::inventory::OUTPUT_SLOT;
use delve_core::registry::StructureKind;
use delve_core::timer::Countdown;
use delve_spatial::Direction::{self, East, North, South, West};
use delve_spatial::{GridPosition, ObjectMap};
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};

const PIPE_VARIANTS: [&[Direction]; 11] = [
    &[West, East],
    &[North, South],
    &[North, East],
    &[East, South],
    &[South, West],
    &[West, North],
    &[West, East, South],
    &[North, South, East],
    &[West, East, North],
    &[North, South, West],
    &[North, East, South, West],
];

const INSERTER_VARIANTS: [&[Direction]; 2] = [&[West, East], &[North, South]];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Pipe,
    Inserter,
}

impl NodeKind {
    /// Connection offsets of `variant`, or `None` if it does not exist.
    pub fn offsets(self, variant: u8) -> Option<&'static [Direction]> {
        let table: &[&[Direction]] = match self {
            NodeKind::Pipe => &PIPE_VARIANTS,
            NodeKind::Inserter => &INSERTER_VARIANTS,
        };
        table.get(variant as usize).copied()
    }

    pub fn variant_count(self) -> u8 {
        match self {
            NodeKind::Pipe => PIPE_VARIANTS.len() as u8,
            NodeKind::Inserter => INSERTER_VARIANTS.len() as u8,
        }
    }

    pub fn structure_kind(self) -> StructureKind {
        match self {
            NodeKind::Pipe => StructureKind::Pipe,
            NodeKind::Inserter => StructureKind::Inserter,
        }
    }
}

/// What a connection offset is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Link {
    Node(ObjectId),
    Machine(ObjectId),
}

impl Link {
    pub fn target(self) -> ObjectId {
        match self {
            Link::Node(id) | Link::Machine(id) => id,
        }
    }
}

/// Inserter sub-phase. Timers started during a tick begin counting on the
/// next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InserterPhase {
    Idle,
    Receiving(Countdown),
    Sending(Countdown),
    /// Delivery failed; retried every tick.
    Blocked,
}

/// Delays and arm speed shared by every inserter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimings {
    pub receive_delay: Fixed64,
    pub send_delay: Fixed64,
    /// Degrees per second.
    pub arm_speed: Fixed64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportNode {
    kind: NodeKind,
    pos: GridPosition,
    variant: u8,
    links: BTreeMap<Direction, Link>,
    direction: Option<Direction>,
    item: Option<ItemId>,
    phase: InserterPhase,
    arm_angle: Fixed64,
}

impl TransportNode {
    /// A node with no links. Pipes face their first offset; inserters
    /// deliver toward their last offset and take from the opposite side.
    pub fn new(kind: NodeKind, pos: GridPosition, variant: u8) -> Option<Self> {
        let offsets = kind.offsets(variant)?;
        let direction = match kind {
            NodeKind::Pipe => offsets.first().copied(),
            NodeKind::Inserter => offsets.last().copied(),
        };
        Some(Self {
            kind,
            pos,
            variant,
            links: BTreeMap::new(),
            direction,
            item: None,
            phase: InserterPhase::Idle,
            arm_angle: Fixed64::from_num(direction.map_or(0, |d| d.opposite().angle())),
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn pos(&self) -> GridPosition {
        self.pos
    }

    pub fn variant(&self) -> u8 {
        self.variant
    }

    pub fn offsets(&self) -> &'static [Direction] {
        self.kind.offsets(self.variant).unwrap_or(&[])
    }

    pub fn links(&self) -> &BTreeMap<Direction, Link> {
        &self.links
    }

    pub fn link(&self, dir: Direction) -> Option<Link> {
        self.links.get(&dir).copied()
    }

    /// Pipes: the side items are pushed to. Inserters: the delivery side.
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Inserter source side.
    pub fn source_side(&self) -> Option<Direction> {
        self.direction.map(Direction::opposite)
    }

    pub fn item(&self) -> Option<ItemId> {
        self.item
    }

    pub fn phase(&self) -> &InserterPhase {
        &self.phase
    }

    /// Arm angle in degrees, clockwise from east.
    pub fn arm_angle(&self) -> Fixed64 {
        self.arm_angle
    }

    /// Point the node at `dir`. Rejected unless `dir` is one of its offsets.
    pub fn set_direction(&mut self, dir: Direction) -> bool {
        if !self.offsets().contains(&dir) {
            return false;
        }
        self.direction = Some(dir);
        true
    }

    /// Step to the next linked offset in variant order, or the next offset
    /// of the variant when nothing is linked. Links are untouched.
    pub fn cycle_direction(&mut self) -> Option<Direction> {
        let linked: Vec<Direction> = self
            .offsets()
            .iter()
            .copied()
            .filter(|d| self.links.contains_key(d))
            .collect();
        let candidates: &[Direction] = if linked.is_empty() {
            self.offsets()
        } else {
            &linked
        };
        let next = match self.direction.and_then(|d| candidates.iter().position(|&c| c == d)) {
            Some(i) => candidates.get((i + 1) % candidates.len()).copied(),
            None => candidates.first().copied(),
        };
        if next.is_some() {
            self.direction = next;
        }
        self.direction
    }

    /// Hand the node an item. Fails when it already holds one.
    pub fn give(&mut self, item: ItemId) -> bool {
        if self.item.is_some() {
            return false;
        }
        self.item = Some(item);
        true
    }

    /// Take the held item. Inserters drop back to idle.
    pub fn take(&mut self) -> Option<ItemId> {
        let item = self.item.take()?;
        if self.kind == NodeKind::Inserter {
            self.phase = InserterPhase::Idle;
        }
        Some(item)
    }

    pub(crate) fn set_links(&mut self, links: BTreeMap<Direction, Link>) {
        self.links = links;
    }

    pub(crate) fn restore(&mut self, direction: Option<Direction>, item: Option<ItemId>) {
        if let Some(dir) = direction {
            self.set_direction(dir);
        }
        self.item = item;
    }

    fn rotate_arm(&mut self, toward: Direction, speed: Fixed64, dt: Fixed64) {
        let full = Fixed64::from_num(360);
        let half = Fixed64::from_num(180);
        let target = Fixed64::from_num(toward.angle());
        let mut diff = (target - self.arm_angle).rem_euclid(full);
        if diff > half {
            diff -= full;
        }
        let step = speed.saturating_mul(dt);
        self.arm_angle = if diff.abs() <= step {
            target
        } else if diff > Fixed64::ZERO {
            (self.arm_angle + step).rem_euclid(full)
        } else {
            (self.arm_angle - step).rem_euclid(full)
        };
    }
}

// ---------------------------------------------------------------------------
// Linking
// ---------------------------------------------------------------------------

/// The links `node` should have given what the object map holds now.
pub(crate) fn compute_links(
    structures: &SlotMap<ObjectId, Structure>,
    objects: &ObjectMap,
    node: &TransportNode,
) -> BTreeMap<Direction, Link> {
    let mut links = BTreeMap::new();
    for &dir in node.offsets() {
        let Some(other) = objects.object_at(node.pos.step(dir)) else {
            continue;
        };
        match structures.get(other) {
            Some(Structure::Machine(_)) => {
                links.insert(dir, Link::Machine(other));
            }
            Some(Structure::Node(neighbor)) if neighbor.offsets().contains(&dir.opposite()) => {
                links.insert(dir, Link::Node(other));
            }
            _ => {}
        }
    }
    links
}

/// Recompute the links of `id` if it is a transport node.
pub fn relink(structures: &mut SlotMap<ObjectId, Structure>, objects: &ObjectMap, id: ObjectId) {
    let Some(Structure::Node(node)) = structures.get(id) else {
        return;
    };
    let links = compute_links(structures, objects, node);
    if let Some(Structure::Node(node)) = structures.get_mut(id) {
        node.set_links(links);
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Action {
    /// Pipe pushes its item one hop.
    Push { to: Link },
    /// Inserter finished receiving from its source side.
    Take { from: Option<Link>, side: Direction },
    /// Inserter finished (or is retrying) a delivery.
    Deliver { to: Option<Link> },
}

/// What happened during one transport tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportTick {
    /// Items that changed hands.
    pub transfers: u32,
    /// Inserter deliveries that failed this tick.
    pub blocked: u32,
}

/// The item of a pipe whose direction points back across `side`, the
/// offset from the puller to the pipe.
fn pipe_item_toward(
    structures: &SlotMap<ObjectId, Structure>,
    id: ObjectId,
    side: Direction,
) -> Option<ItemId> {
    match structures.get(id) {
        Some(Structure::Node(n))
            if n.kind == NodeKind::Pipe && n.direction == Some(side.opposite()) =>
        {
            n.item
        }
        _ => None,
    }
}

/// Whether the source an inserter would take from has something to give.
fn source_ready(
    structures: &SlotMap<ObjectId, Structure>,
    link: Option<Link>,
    side: Direction,
) -> bool {
    match link {
        Some(Link::Node(id)) => pipe_item_toward(structures, id, side).is_some(),
        Some(Link::Machine(id)) => structures
            .get(id)
            .and_then(Structure::as_machine)
            .is_some_and(|m| !m.inventory().output().is_empty()),
        None => false,
    }
}

struct Resolver {
    empty_at_start: BTreeSet<ObjectId>,
    held_at_start: BTreeSet<ObjectId>,
    received: BTreeSet<ObjectId>,
    gave: BTreeSet<ObjectId>,
}

impl Resolver {
    /// Put `item` into the target of `link` if the rules allow it.
    fn deliver(
        &mut self,
        structures: &mut SlotMap<ObjectId, Structure>,
        link: Link,
        item: ItemId,
    ) -> bool {
        match link {
            Link::Node(id) => {
                if !self.empty_at_start.contains(&id) || self.received.contains(&id) {
                    return false;
                }
                let Some(node) = structures.get_mut(id).and_then(Structure::as_node_mut) else {
                    return false;
                };
                if node.kind != NodeKind::Pipe || !node.give(item) {
                    return false;
                }
                self.received.insert(id);
                true
            }
            Link::Machine(id) => {
                let Some(machine) = structures.get_mut(id).and_then(Structure::as_machine_mut) else {
                    return false;
                };
                let inventory = machine.inventory_mut();
                let Some(slot) = inventory.first_accepting_input(item).map(str::to_owned) else {
                    return false;
                };
                inventory.deposit(&slot, item, 1) == 1
            }
        }
    }

    /// Take one unit from the source of `link`, found across `side`, if
    /// the rules allow it. Pipes only give to the node they point at.
    fn take(
        &mut self,
        structures: &mut SlotMap<ObjectId, Structure>,
        link: Link,
        side: Direction,
    ) -> Option<ItemId> {
        match link {
            Link::Node(id) => {
                if !self.held_at_start.contains(&id) || self.gave.contains(&id) {
                    return None;
                }
                pipe_item_toward(structures, id, side)?;
                let item = structures.get_mut(id).and_then(Structure::as_node_mut)?.take()?;
                self.gave.insert(id);
                Some(item)
            }
            Link::Machine(id) => {
                let machine = structures.get_mut(id).and_then(Structure::as_machine_mut)?;
                machine
                    .inventory_mut()
                    .extract(OUTPUT_SLOT, 1)
                    .map(|(item, _)| item)
            }
        }
    }
}

/// Advance every transport node by `dt`.
pub fn tick(
    structures: &mut SlotMap<ObjectId, Structure>,
    timings: &TransportTimings,
    dt: Fixed64,
) -> TransportTick {
    let mut result = TransportTick::default();

    let mut ids: Vec<ObjectId> = structures
        .iter()
        .filter(|(_, s)| matches!(s, Structure::Node(_)))
        .map(|(id, _)| id)
        .collect();
    ids.sort();

    let mut resolver = Resolver {
        empty_at_start: BTreeSet::new(),
        held_at_start: BTreeSet::new(),
        received: BTreeSet::new(),
        gave: BTreeSet::new(),
    };

    // Plan from the start-of-tick state.
    let mut ready = BTreeMap::new();
    let mut actions: Vec<(ObjectId, Action)> = Vec::new();
    for &id in &ids {
        let Some(node) = structures.get(id).and_then(Structure::as_node) else {
            continue;
        };
        match node.kind {
            NodeKind::Pipe => {
                if node.item.is_none() {
                    resolver.empty_at_start.insert(id);
                    continue;
                }
                resolver.held_at_start.insert(id);
                let target = node.direction.and_then(|d| node.link(d));
                let pushes = match target {
                    Some(Link::Node(t)) => structures
                        .get(t)
                        .and_then(Structure::as_node)
                        .is_some_and(|n| n.kind == NodeKind::Pipe),
                    Some(Link::Machine(_)) => true,
                    None => false,
                };
                if let (true, Some(to)) = (pushes, target) {
                    actions.push((id, Action::Push { to }));
                }
            }
            NodeKind::Inserter => {
                let ready_now = node.source_side().is_some_and(|side| {
                    source_ready(structures, node.link(side), side)
                });
                ready.insert(id, ready_now);
            }
        }
    }

    // Advance inserter phases and arms.
    for (&id, &source_has_item) in &ready {
        let Some(node) = structures.get_mut(id).and_then(Structure::as_node_mut) else {
            continue;
        };
        let (Some(target_side), Some(source_side)) = (node.direction, node.source_side()) else {
            continue;
        };
        let action = match &mut node.phase {
            InserterPhase::Idle => {
                if node.item.is_some() {
                    node.phase = InserterPhase::Sending(Countdown::once(timings.send_delay));
                } else if source_has_item {
                    node.phase = InserterPhase::Receiving(Countdown::once(timings.receive_delay));
                }
                None
            }
            InserterPhase::Receiving(timer) => (timer.advance(dt) > 0).then_some(Action::Take {
                from: node.links.get(&source_side).copied(),
                side: source_side,
            }),
            InserterPhase::Sending(timer) => (timer.advance(dt) > 0).then_some(Action::Deliver {
                to: node.links.get(&target_side).copied(),
            }),
            InserterPhase::Blocked => Some(Action::Deliver {
                to: node.links.get(&target_side).copied(),
            }),
        };
        let toward = match node.phase {
            InserterPhase::Receiving(_) => Some(source_side),
            InserterPhase::Sending(_) | InserterPhase::Blocked => Some(target_side),
            InserterPhase::Idle => None,
        };
        if let Some(side) = toward {
            node.rotate_arm(side, timings.arm_speed, dt);
        }
        if let Some(action) = action {
            actions.push((id, action));
        }
    }

    // Apply in ascending id order of the acting node.
    actions.sort_by_key(|(id, _)| *id);
    for (id, action) in actions {
        match action {
            Action::Push { to } => {
                if resolver.gave.contains(&id) {
                    continue;
                }
                let Some(item) = structures.get(id).and_then(Structure::as_node).and_then(|n| n.item) else {
                    continue;
                };
                if resolver.deliver(structures, to, item) {
                    if let Some(node) = structures.get_mut(id).and_then(Structure::as_node_mut) {
                        node.item = None;
                    }
                    resolver.gave.insert(id);
                    result.transfers += 1;
                }
            }
            Action::Take { from, side } => {
                let taken = from.and_then(|link| resolver.take(structures, link, side));
                let Some(node) = structures.get_mut(id).and_then(Structure::as_node_mut) else {
                    continue;
                };
                match taken {
                    Some(item) => {
                        node.item = Some(item);
                        node.phase = InserterPhase::Sending(Countdown::once(timings.send_delay));
                        result.transfers += 1;
                    }
                    None => node.phase = InserterPhase::Idle,
                }
            }
            Action::Deliver { to } => {
                let Some(item) = structures.get(id).and_then(Structure::as_node).and_then(|n| n.item) else {
                    if let Some(node) = structures.get_mut(id).and_then(Structure::as_node_mut) {
                        node.phase = InserterPhase::Idle;
                    }
                    continue;
                };
                let delivered = to.is_some_and(|link| resolver.deliver(structures, link, item));
                let Some(node) = structures.get_mut(id).and_then(Structure::as_node_mut) else {
                    continue;
                };
                if delivered {
                    node.item = None;
                    node.phase = InserterPhase::Idle;
                    result.transfers += 1;
                } else {
                    node.phase = InserterPhase::Blocked;
                    result.blocked += 1;
                }
            }
        }
    }

    result
}
