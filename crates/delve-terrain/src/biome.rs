//! Biome and depth-band configuration.

use serde::{Deserialize, Serialize};

/// Fractal noise parameters for a biome's height profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// Base frequency, in cycles per column.
    pub scale: f64,
    pub octaves: u32,
    pub persistence: f64,
    pub lacunarity: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            scale: 0.02,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Vertical band, in rows, the surface of a biome may sit in. `top` is the
/// highest allowed surface row (smallest y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Elevation {
    pub top: f64,
    pub bottom: f64,
}

impl Elevation {
    pub fn contains(&self, height: f64) -> bool {
        height >= self.top && height <= self.bottom
    }

    pub fn midpoint(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    /// Map a signed noise sample in `[-1, 1]` into the band.
    pub fn map(&self, sample: f64) -> f64 {
        let t = (sample.clamp(-1.0, 1.0) + 1.0) / 2.0;
        (self.top + t * (self.bottom - self.top)).clamp(self.top, self.bottom)
    }
}

/// How a biome occupies the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiomeLayer {
    /// A horizontal segment of `columns` columns. Segments are laid out
    /// left to right; the last one absorbs whatever width is left.
    Surface { columns: u32 },
    /// Spans the whole width below relative depth `start_depth` and takes
    /// over tile selection there.
    Base { start_depth: f64 },
}

/// Relative weight of one ore in a biome's ore table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OreWeight {
    pub tile: String,
    pub weight: f64,
}

/// A biome as configured, referring to tiles by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeDef {
    pub name: String,
    pub layer: BiomeLayer,
    #[serde(default)]
    pub noise: NoiseParams,
    pub elevation: Elevation,
    /// Non-ore fallback tiles of the deep band.
    pub common: Vec<String>,
    /// Occasional tiles of the rare band (sandstone, ice, ...).
    #[serde(default)]
    pub rare: Vec<String>,
    /// Ores in declaration order. Equal weights keep this order.
    #[serde(default)]
    pub ores: Vec<OreWeight>,
    /// Probability of stone over dirt in the mixed bands.
    #[serde(default = "default_stone_weight")]
    pub stone_weight: f64,
    #[serde(default)]
    pub tree_prob: f64,
}

fn default_stone_weight() -> f64 {
    0.5
}

/// Thresholds of the depth bands, as fractions of the world height below
/// the surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    /// Shallower than this: dirt.
    pub dirt_depth: f64,
    /// Shallower than this: stone or dirt.
    pub mixed_depth: f64,
    /// Shallower than this: occasionally a rare tile, else stone or dirt.
    pub rare_depth: f64,
    pub rare_chance: f64,
    /// Gate for attempting ore selection in the deep band.
    pub ore_chance: f64,
    /// Upper end of the per-ore roll; an ore wins when `roll <= weight`.
    pub ore_roll_max: u32,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            dirt_depth: 0.10,
            mixed_depth: 0.20,
            rare_depth: 0.40,
            rare_chance: 0.05,
            ore_chance: 0.1,
            ore_roll_max: 10,
        }
    }
}

impl BandConfig {
    pub(crate) fn is_valid(&self) -> bool {
        let probs = [self.rare_chance, self.ore_chance];
        self.dirt_depth >= 0.0
            && self.dirt_depth <= self.mixed_depth
            && self.mixed_depth <= self.rare_depth
            && self.rare_depth.is_finite()
            && probs.iter().all(|p| (0.0..=1.0).contains(p))
    }
}

/// The span of columns `[start, end)` a surface biome covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiomeSegment {
    pub biome: String,
    pub start: u32,
    pub end: u32,
}

impl BiomeSegment {
    pub fn contains(&self, x: u32) -> bool {
        x >= self.start && x < self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Lay out surface biomes of the given widths across `width` columns.
/// Returns `(index, start, end)` per non-empty segment. The last biome
/// absorbs the remainder; biomes past the right edge are truncated.
pub fn layout_segments(columns: &[u32], width: u32) -> Vec<(usize, u32, u32)> {
    let mut out = Vec::with_capacity(columns.len());
    let mut start = 0u32;
    let last = columns.len().saturating_sub(1);
    for (i, &cols) in columns.iter().enumerate() {
        if start >= width {
            break;
        }
        let end = if i == last {
            width
        } else {
            start.saturating_add(cols).min(width)
        };
        if end > start {
            out.push((i, start, end));
        }
        start = end;
    }
    out
}
