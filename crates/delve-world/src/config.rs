//! Runtime constants for a world instance.

use crate::transport::TransportTimings;
use delve_core::fixed::f64_to_fixed64;
use serde::{Deserialize, Serialize};

/// Inserter timing in seconds and degrees per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub receive_delay: f64,
    pub send_delay: f64,
    pub arm_speed: f64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            receive_delay: 0.5,
            send_delay: 0.5,
            arm_speed: 360.0,
        }
    }
}

impl TransportConfig {
    pub fn timings(&self) -> TransportTimings {
        TransportTimings {
            receive_delay: f64_to_fixed64(self.receive_delay),
            send_delay: f64_to_fixed64(self.send_delay),
            arm_speed: f64_to_fixed64(self.arm_speed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
    /// Side of one tile in world units.
    pub tile_size: f32,
    /// Side of one collision cell in tiles.
    pub cell_size: u32,
    /// How far from the player, in tiles, placement is allowed.
    pub reach_radius: u32,
    pub transport: TransportConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 200,
            tile_size: 16.0,
            cell_size: 4,
            reach_radius: 6,
            transport: TransportConfig::default(),
        }
    }
}

impl WorldConfig {
    /// A default config with a different size. Handy for tests and tools.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Reason the config cannot describe a world, if any.
    pub fn problem(&self) -> Option<&'static str> {
        let t = &self.transport;
        if self.width == 0 || self.height < 2 {
            Some("world must be at least 1x2 tiles")
        } else if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            Some("tile_size must be positive")
        } else if self.cell_size == 0 {
            Some("cell_size must be positive")
        } else if [t.receive_delay, t.send_delay].iter().any(|d| !(d.is_finite() && *d >= 0.0)) {
            Some("inserter delays must be finite and non-negative")
        } else if !(t.arm_speed.is_finite() && t.arm_speed > 0.0) {
            Some("arm_speed must be positive")
        } else {
            None
        }
    }
}
