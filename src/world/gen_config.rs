//! Terrain generation configuration - serializable parameters for the
//! procedural pipeline
//!
//! Captures every tuning knob of the three generation stages so presets can be
//! stored as RON and swapped without touching code. The seed is NOT part of the
//! config - same config + different seed = different map.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tile::TileType;

/// How far a row's probability sum may drift from 1.0 before it is reported
const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Complete terrain generation configuration
///
/// All parameters needed to generate a tile map. Serializable to RON for
/// presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Tile type planted at the grid center before Markov expansion
    pub initial_tile: TileType,

    /// Number of cellular-automata smoothing passes
    pub ca_iterations: usize,

    /// Minimum surviving size for a 4-connected region of a non-default type
    pub min_region_size: usize,

    /// Markov transition rows, one per tile type
    pub transitions: Vec<TransitionRow>,

    /// Cellular-automata survival bands, one per tile type
    pub survival: Vec<SurvivalBand>,
}

/// Transition probabilities out of one tile type
///
/// `weights[t]` is the probability that a cell expanded from a parent of type
/// `tile` becomes type `t` (indexed by `TileType::index()`). Rows should sum
/// to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRow {
    pub tile: TileType,
    pub weights: [f64; TileType::COUNT],
}

/// Same-type neighbor count band inside which a cell keeps its type during
/// smoothing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SurvivalBand {
    pub tile: TileType,
    pub min: usize,
    pub max: usize,
}

/// Configuration validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("transition row for {tile:?} sums to {sum} instead of 1.0")]
    RowNotStochastic { tile: TileType, sum: f64 },

    #[error("no transition row configured for {tile:?}")]
    MissingTransitionRow { tile: TileType },

    #[error("no survival band configured for {tile:?}")]
    MissingSurvivalBand { tile: TileType },

    #[error("survival band for {tile:?} has min {min} > max {max}")]
    InvertedSurvivalBand { tile: TileType, min: usize, max: usize },
}

impl GenerationConfig {
    /// Check that every tile type has a row-stochastic transition row and a
    /// well-formed survival band.
    ///
    /// A failed check is not fatal to generation: the sampler falls back to
    /// keeping the parent type when a roll runs past the end of a malformed
    /// row. Callers that build configs at runtime should still surface the
    /// error to catch typos early.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for tile in TileType::ALL {
            let row = self
                .transition_row(tile)
                .ok_or(ConfigError::MissingTransitionRow { tile })?;
            let sum: f64 = row.weights.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(ConfigError::RowNotStochastic { tile, sum });
            }

            let band = self
                .survival_band(tile)
                .ok_or(ConfigError::MissingSurvivalBand { tile })?;
            if band.min > band.max {
                return Err(ConfigError::InvertedSurvivalBand {
                    tile,
                    min: band.min,
                    max: band.max,
                });
            }
        }
        Ok(())
    }

    pub fn transition_row(&self, tile: TileType) -> Option<&TransitionRow> {
        self.transitions.iter().find(|row| row.tile == tile)
    }

    pub fn survival_band(&self, tile: TileType) -> Option<&SurvivalBand> {
        self.survival.iter().find(|band| band.tile == tile)
    }

    /// Serialize to a RON preset string
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Load from a RON preset string
    pub fn from_ron(source: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        use TileType::{Dirt, Grass, Sand, Stone, Water};
        Self {
            initial_tile: Grass,
            ca_iterations: 4,
            min_region_size: 4,
            // Weight order: [Grass, Dirt, Water, Stone, Sand]
            transitions: vec![
                TransitionRow {
                    tile: Grass,
                    weights: [0.7, 0.2, 0.05, 0.0, 0.05],
                },
                TransitionRow {
                    tile: Dirt,
                    weights: [0.3, 0.5, 0.05, 0.1, 0.05],
                },
                TransitionRow {
                    tile: Water,
                    weights: [0.1, 0.05, 0.7, 0.05, 0.1],
                },
                TransitionRow {
                    tile: Stone,
                    weights: [0.05, 0.2, 0.05, 0.65, 0.05],
                },
                TransitionRow {
                    tile: Sand,
                    weights: [0.1, 0.1, 0.2, 0.05, 0.55],
                },
            ],
            survival: vec![
                SurvivalBand {
                    tile: Grass,
                    min: 4,
                    max: 8,
                },
                SurvivalBand {
                    tile: Dirt,
                    min: 3,
                    max: 7,
                },
                SurvivalBand {
                    tile: Water,
                    min: 5,
                    max: 8,
                },
                SurvivalBand {
                    tile: Stone,
                    min: 4,
                    max: 8,
                },
                SurvivalBand {
                    tile: Sand,
                    min: 3,
                    max: 7,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        GenerationConfig::default().validate().expect("default config");
    }

    #[test]
    fn test_malformed_row_is_reported() {
        let mut config = GenerationConfig::default();
        config.transitions[1].weights = [0.3, 0.3, 0.05, 0.1, 0.05]; // sums to 0.8

        match config.validate() {
            Err(ConfigError::RowNotStochastic { tile, sum }) => {
                assert_eq!(tile, TileType::Dirt);
                assert!((sum - 0.8).abs() < 1e-9);
            }
            other => panic!("expected RowNotStochastic, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_row_is_reported() {
        let mut config = GenerationConfig::default();
        config.transitions.retain(|row| row.tile != TileType::Stone);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingTransitionRow {
                tile: TileType::Stone
            })
        ));
    }

    #[test]
    fn test_inverted_band_is_reported() {
        let mut config = GenerationConfig::default();
        config.survival[0].min = 9;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedSurvivalBand { .. })
        ));
    }

    #[test]
    fn test_ron_preset_round_trip() {
        let config = GenerationConfig::default();
        let ron = config.to_ron().expect("serialize");
        let restored = GenerationConfig::from_ron(&ron).expect("deserialize");

        assert_eq!(restored.initial_tile, config.initial_tile);
        assert_eq!(restored.ca_iterations, config.ca_iterations);
        assert_eq!(restored.min_region_size, config.min_region_size);
        for tile in TileType::ALL {
            assert_eq!(
                restored.transition_row(tile).map(|r| r.weights),
                config.transition_row(tile).map(|r| r.weights),
            );
        }
    }
}
