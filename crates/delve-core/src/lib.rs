//! Delve Core -- shared building blocks of the sandbox simulation.
//!
//! This crate holds everything the higher layers agree on: stable IDs,
//! the immutable content registry (tiles, items, recipes and machine
//! variants), deterministic randomness, fixed-point simulation time,
//! typed machine inventories and the machine production model.
//!
//! # Key Types
//!
//! - [`registry::Registry`] -- Immutable name <-> ID tables for tiles,
//!   items, recipes and machine kinds (frozen at startup).
//! - [`inventory::Slot`] / [`inventory::MachineInventory`] -- Typed
//!   input/fuel/output slots with capacity and accepted-item sets.
//! - [`machine::Machine`] -- One production entity parameterized by a
//!   [`registry::MachineKindDef`] descriptor (smelters and drills).
//! - [`timer::Countdown`] -- Explicit countdown state advanced by `dt`.
//! - [`rng::SimRng`] -- SplitMix64 PRNG used by world generation.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for simulation time.

pub mod fixed;
pub mod id;
pub mod inventory;
pub mod machine;
pub mod registry;
pub mod rng;
pub mod timer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
