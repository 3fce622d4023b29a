//! Engine configuration
//!
//! Static engine parameters that are not part of the per-track processing
//! settings: sample rate, block size, scheduling lookahead and export format.
//! Loaded from JSON; every field has a default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VocalError};

/// Internal sample rate for all processing (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Frames processed per render chunk
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Delay between a play request and the shared start instant
pub const DEFAULT_LOOKAHEAD_SECS: f64 = 0.1;

/// Time constant of parameter ramps
pub const DEFAULT_SMOOTHING_SECS: f32 = 0.1;

/// Longest effect tail appended to an offline render
pub const DEFAULT_MAX_TAIL_SECS: f64 = 2.0;

/// Engine-wide configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Processing sample rate in Hz
    pub sample_rate: u32,
    /// Frames per processing block (offline chunk size)
    pub block_size: usize,
    /// Scheduling lookahead for synchronized starts, in seconds
    pub lookahead_secs: f64,
    /// Parameter smoothing time constant, in seconds
    pub smoothing_secs: f32,
    /// Maximum reverb/delay tail rendered after the last source ends
    pub max_tail_secs: f64,
    /// Export bit depth: 16, 24 or 32 (float)
    pub export_bit_depth: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            lookahead_secs: DEFAULT_LOOKAHEAD_SECS,
            smoothing_secs: DEFAULT_SMOOTHING_SECS,
            max_tail_secs: DEFAULT_MAX_TAIL_SECS,
            export_bit_depth: 24,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all fields
    pub fn validate(&self) -> Result<()> {
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(invalid("sample_rate", self.sample_rate, "8000-192000 Hz"));
        }
        if !(16..=8192).contains(&self.block_size) {
            return Err(invalid("block_size", self.block_size, "16-8192 frames"));
        }
        if !(0.0..=1.0).contains(&self.lookahead_secs) {
            return Err(invalid("lookahead_secs", self.lookahead_secs, "0-1 s"));
        }
        if !(0.001..=1.0).contains(&self.smoothing_secs) {
            return Err(invalid("smoothing_secs", self.smoothing_secs, "0.001-1 s"));
        }
        if !(0.0..=10.0).contains(&self.max_tail_secs) {
            return Err(invalid("max_tail_secs", self.max_tail_secs, "0-10 s"));
        }
        if ![16, 24, 32].contains(&self.export_bit_depth) {
            return Err(invalid(
                "export_bit_depth",
                self.export_bit_depth,
                "16, 24 or 32",
            ));
        }
        Ok(())
    }
}

fn invalid(param: &str, value: impl ToString, expected: &str) -> VocalError {
    VocalError::InvalidConfig {
        param: param.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "sample_rate": 44100 }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_rejects_bad_bit_depth() {
        let config = EngineConfig {
            export_bit_depth: 20,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
