//! Creature species and decoration kinds
//!
//! The renderer picks a skin per variant; the engine only needs the motion
//! profile carried here.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Creature species (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Betta,
    NeonTetra,
    Discus,
    Jellyfish,
    IridescentJellyfish,
}

/// Motion data for a species
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesProfile {
    /// Top speed (px/s), further capped by `motion.max_speed`
    pub max_speed: f32,
    /// Comfortable swimming speed (px/s)
    pub cruise_speed: f32,
    /// Multiplier on the configured turn-rate cap, never above 1
    pub turn_scale: f32,
    /// Multiplier on the configured separation radius, never below 1
    pub spacing_scale: f32,
    /// Radius of the creature's body, for sector visibility and spawning (px)
    pub bounding_radius: f32,
    /// Whether a group of this species schools or spreads out
    pub schooling: bool,
}

impl Species {
    pub const ALL: [Species; 5] = [
        Species::Betta,
        Species::NeonTetra,
        Species::Discus,
        Species::Jellyfish,
        Species::IridescentJellyfish,
    ];

    pub fn profile(&self) -> SpeciesProfile {
        match self {
            Species::NeonTetra => SpeciesProfile {
                max_speed: 100.0,
                cruise_speed: 45.0,
                turn_scale: 1.0,
                spacing_scale: 1.0,
                bounding_radius: 14.0,
                schooling: true,
            },
            Species::Discus => SpeciesProfile {
                max_speed: 65.0,
                cruise_speed: 28.0,
                turn_scale: 0.67,
                spacing_scale: 2.0,
                bounding_radius: 36.0,
                schooling: true,
            },
            // Territorial: wide spacing, weak schooling
            Species::Betta => SpeciesProfile {
                max_speed: 80.0,
                cruise_speed: 35.0,
                turn_scale: 0.83,
                spacing_scale: 3.2,
                bounding_radius: 48.0,
                schooling: false,
            },
            Species::Jellyfish => SpeciesProfile {
                max_speed: 40.0,
                cruise_speed: 18.0,
                turn_scale: 0.5,
                spacing_scale: 2.4,
                bounding_radius: 60.0,
                schooling: false,
            },
            Species::IridescentJellyfish => SpeciesProfile {
                max_speed: 45.0,
                cruise_speed: 20.0,
                turn_scale: 0.5,
                spacing_scale: 2.4,
                bounding_radius: 64.0,
                schooling: false,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Species::Betta => "betta",
            Species::NeonTetra => "neon_tetra",
            Species::Discus => "discus",
            Species::Jellyfish => "jellyfish",
            Species::IridescentJellyfish => "iridescent_jellyfish",
        }
    }
}

impl FromStr for Species {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Species::ALL
            .iter()
            .copied()
            .find(|species| species.name() == normalized)
            .ok_or_else(|| format!("Unknown species '{}'", s))
    }
}

/// Decoration kinds (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationKind {
    Kelp,
    Fern,
    Moss,
}

impl DecorationKind {
    pub const ALL: [DecorationKind; 3] =
        [DecorationKind::Kelp, DecorationKind::Fern, DecorationKind::Moss];

    /// Height at full growth (px), so anchors can be spaced without overlap
    pub fn full_height(&self) -> f32 {
        match self {
            DecorationKind::Kelp => 320.0,
            DecorationKind::Fern => 180.0,
            DecorationKind::Moss => 60.0,
        }
    }
}
