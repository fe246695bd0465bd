//! Height-map synthesis from 1D fractal noise.

use crate::biome::{Elevation, NoiseParams};
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

/// Surface elevation per column, in rows. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightMap {
    values: Vec<f64>,
}

impl HeightMap {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, x: u32) -> Option<f64> {
        self.values.get(x as usize).copied()
    }

    /// The surface row of column `x`: the height rounded to the nearest row
    /// and clamped to `[1, world_height - 1]` so there is always a row of
    /// air above it.
    pub fn surface_row(&self, x: u32, world_height: u32) -> Option<u32> {
        let h = self.get(x)?;
        Some(surface_row(h, world_height))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

pub(crate) fn surface_row(height: f64, world_height: u32) -> u32 {
    let max = world_height.saturating_sub(1).max(1);
    if !height.is_finite() {
        return max;
    }
    (height.round().max(0.0) as u32).clamp(1, max)
}

/// Sample a biome's height profile over columns `[start, end)`.
///
/// Non-finite samples fall back to the band midpoint so a bad parameter set
/// degrades to flat ground instead of failing generation.
pub fn sample_heights(
    params: &NoiseParams,
    elevation: &Elevation,
    noise_seed: u32,
    start: u32,
    end: u32,
) -> Vec<f64> {
    let fbm = Fbm::<Perlin>::new(noise_seed)
        .set_octaves(params.octaves.max(1) as usize)
        .set_frequency(params.scale)
        .set_persistence(params.persistence)
        .set_lacunarity(params.lacunarity);

    (start..end)
        .map(|x| {
            let sample = fbm.get([x as f64 + 0.5, 0.5]);
            if sample.is_finite() {
                elevation.map(sample)
            } else {
                log::debug!("non-finite height sample at column {x}, using band midpoint");
                elevation.midpoint()
            }
        })
        .collect()
}
