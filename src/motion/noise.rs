//! Coherent noise for organic motion
//!
//! Each agent owns a `NoiseSource` seeded from the world seed and its id, so
//! two agents never wobble in lockstep while a given seed always replays the
//! same motion.

use ::noise::{NoiseFn, Perlin};

/// Deterministic smooth noise in [-1, 1]
#[derive(Clone)]
pub struct NoiseSource {
    perlin: Perlin,
    seed: u32,
}

impl std::fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseSource").field("seed", &self.seed).finish()
    }
}

impl NoiseSource {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            seed,
        }
    }

    /// Derive a per-entity channel from a world seed and an entity index
    pub fn for_entity(world_seed: u64, entity: u32) -> Self {
        // SplitMix-style mixing so neighboring ids land far apart
        let mut z = world_seed ^ (entity as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        Self::new((z & 0xFFFF_FFFF) as u32)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// 2D noise at (x, y)
    pub fn noise2d(&self, x: f64, y: f64) -> f32 {
        let v = self.perlin.get([x, y, 0.0]) as f32;
        if v.is_finite() {
            v.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Multi-octave noise for richer motion, normalized back into [-1, 1]
    pub fn octave_noise(&self, x: f64, y: f64, octaves: u32, persistence: f64) -> f32 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_value = 0.0;

        for _ in 0..octaves.max(1) {
            total += self.perlin.get([x * frequency, y * frequency, 0.0]) * amplitude;
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        let v = (total / max_value) as f32;
        if v.is_finite() {
            v.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Time-driven 1D signal used for heading wobble
    ///
    /// Perlin noise is zero at integer lattice points, so the second axis is
    /// offset to keep the signal from collapsing on whole seconds.
    pub fn signal(&self, time: f64, frequency: f32) -> f32 {
        self.octave_noise(time * frequency as f64, 0.37, 2, 0.5)
    }
}
