//! Construction tuning parameters.

use serde::{Deserialize, Serialize};

use crate::bvh::SPLIT_LIMIT;
use crate::error::{BvhError, Result};
use crate::sort::SORT_CROSSOVER;

/// Tuning knobs for BVH construction.
///
/// The defaults reproduce the reference behavior; both values are
/// empirical and worth re-measuring when the workload or hardware
/// changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BvhSettings {
    /// Ranges with fewer triangles than this become leaves.
    pub split_limit: usize,
    /// Range size at which construction sorting switches from
    /// comparison to stable radix.
    pub sort_crossover: usize,
}

impl Default for BvhSettings {
    fn default() -> Self {
        Self {
            split_limit: SPLIT_LIMIT,
            sort_crossover: SORT_CROSSOVER,
        }
    }
}

impl BvhSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.split_limit < 2 {
            return Err(BvhError::InvalidSettings(
                "split_limit must be at least 2".into(),
            ));
        }
        if self.sort_crossover == 0 {
            return Err(BvhError::InvalidSettings(
                "sort_crossover must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = BvhSettings::default();
        assert_eq!(settings.split_limit, 5);
        assert_eq!(settings.sort_crossover, 2048);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_degenerate_split_limit_is_rejected() {
        let settings = BvhSettings {
            split_limit: 1,
            ..BvhSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_settings_round_trip_through_serde() {
        let settings = BvhSettings {
            split_limit: 8,
            sort_crossover: 512,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: BvhSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.split_limit, 8);
        assert_eq!(back.sort_crossover, 512);
    }
}
