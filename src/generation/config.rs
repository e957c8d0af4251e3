//! Procedural field parameters

use serde::{Deserialize, Serialize};

use super::attenuation::Attenuation;

/// Parameters for [`generate_field`](super::generate_field).
///
/// Together with the seed these fully determine the base field, so only
/// brush edits need to be persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldParams {
    pub seed: u32,
    /// World units per noise period (larger = smoother)
    pub noise_scale: f32,
    /// FBM octaves (detail levels)
    pub octaves: u32,
    /// FBM persistence (0.5 typical)
    pub persistence: f32,
    /// FBM lacunarity (2.0 typical)
    pub lacunarity: f32,
    /// Weight of the noise term in solidity units
    pub amplitude: f32,
    /// Solidity added at the bottom of the grid and removed at the top
    pub vertical_gradient: f32,
    pub attenuation: Attenuation,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            noise_scale: 32.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            amplitude: 1.0,
            vertical_gradient: 1.0,
            attenuation: Attenuation::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = FieldParams::default();
        assert_eq!(params.seed, 12345);
        assert_eq!(params.octaves, 4);
        assert_eq!(params.attenuation, Attenuation::None);
    }

    #[test]
    fn test_json_fills_missing_fields() {
        let params: FieldParams = serde_json::from_str(r#"{"seed": 7, "octaves": 2}"#).unwrap();
        assert_eq!(params.seed, 7);
        assert_eq!(params.octaves, 2);
        assert_eq!(params.lacunarity, 2.0);
    }
}
