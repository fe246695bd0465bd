//! Delve World -- the playable sandbox built on the lower layers.
//!
//! [`World`] ties together the generated terrain, the collision index,
//! placed structures and the transport network, and exposes the
//! operations a game loop or UI drives: placement, removal, mining,
//! player transfers and the per-frame [`World::tick`].
//!
//! # Key Types
//!
//! - [`World`] -- The facade. Owns every grid and keeps them consistent.
//! - [`Structure`] -- A placed machine or transport node.
//! - [`TransportNode`] -- A pipe or inserter with its links and held item.
//! - [`WorldConfig`] -- World size, tile size, reach and inserter timing.
//! - [`WorldSave`] -- Persisted state, as JSON or a versioned binary blob.

pub mod config;
pub mod save;
pub mod structure;
pub mod transport;
pub mod world;

pub use config::{TransportConfig, WorldConfig};
pub use save::{MachineRecord, SaveError, SlotRecord, TransportRecord, WorldSave};
pub use structure::Structure;
pub use transport::{InserterPhase, Link, NodeKind, TransportNode, TransportTick, TransportTimings};
pub use world::{MineOutcome, Placed, PlacementError, Removed, TickReport, World, WorldError};
