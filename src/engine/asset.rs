//! Audio assets and the two asset slots
//!
//! An [`AudioAsset`] is immutable once decoded; the buffer is shared via
//! `Arc` so playback sessions and render jobs can hold it without copying.

use std::sync::Arc;

use log::info;

use super::buffer::AudioBuffer;
use super::io::decode_audio;
use crate::error::{Result, VocalError};

/// A decoded, named audio buffer
#[derive(Debug, Clone, PartialEq)]
pub struct AudioAsset {
    name: String,
    buffer: Arc<AudioBuffer>,
}

impl AudioAsset {
    /// Wrap a buffer under a display name
    pub fn new(name: impl Into<String>, buffer: AudioBuffer) -> Self {
        Self {
            name: name.into(),
            buffer: Arc::new(buffer),
        }
    }

    /// Decode encoded bytes into an asset at `sample_rate`
    pub fn decode(bytes: &[u8], name: impl Into<String>, sample_rate: u32) -> Result<Self> {
        let buffer = decode_audio(bytes, sample_rate)?;
        Ok(Self::new(name, buffer))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    pub fn duration_secs(&self) -> f64 {
        self.buffer.duration_secs()
    }

    pub fn num_frames(&self) -> usize {
        self.buffer.num_frames()
    }
}

/// Which input an asset occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetSlot {
    /// Lead vocal, processed by the effect chain
    Vocal,
    /// Instrumental, mixed unprocessed
    Beat,
}

impl std::fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetSlot::Vocal => write!(f, "vocal"),
            AssetSlot::Beat => write!(f, "beat"),
        }
    }
}

/// Holds at most one asset per slot; slots are replaced independently
#[derive(Debug, Clone)]
pub struct AssetStore {
    sample_rate: u32,
    vocal: Option<AudioAsset>,
    beat: Option<AudioAsset>,
}

impl AssetStore {
    /// Create an empty store converting imports to `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            vocal: None,
            beat: None,
        }
    }

    /// Decode bytes into `slot`, replacing what was there
    ///
    /// On failure the slot keeps its previous asset.
    pub fn import(&mut self, bytes: &[u8], name: &str, slot: AssetSlot) -> Result<String> {
        if name.trim().is_empty() {
            return Err(VocalError::decode("asset name is empty"));
        }
        let asset = AudioAsset::decode(bytes, name, self.sample_rate)?;
        info!(
            "Imported {} '{}' ({:.2}s, {} ch)",
            slot,
            name,
            asset.duration_secs(),
            asset.buffer().num_channels()
        );
        self.set(slot, asset);
        Ok(name.to_string())
    }

    /// Place an asset into a slot, returning the one it replaced
    pub fn set(&mut self, slot: AssetSlot, asset: AudioAsset) -> Option<AudioAsset> {
        match slot {
            AssetSlot::Vocal => self.vocal.replace(asset),
            AssetSlot::Beat => self.beat.replace(asset),
        }
    }

    /// Empty a slot
    pub fn clear(&mut self, slot: AssetSlot) -> Option<AudioAsset> {
        match slot {
            AssetSlot::Vocal => self.vocal.take(),
            AssetSlot::Beat => self.beat.take(),
        }
    }

    pub fn get(&self, slot: AssetSlot) -> Option<&AudioAsset> {
        match slot {
            AssetSlot::Vocal => self.vocal.as_ref(),
            AssetSlot::Beat => self.beat.as_ref(),
        }
    }

    pub fn vocal(&self) -> Option<&AudioAsset> {
        self.vocal.as_ref()
    }

    pub fn beat(&self) -> Option<&AudioAsset> {
        self.beat.as_ref()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Longest loaded asset, in seconds (0 when empty)
    pub fn max_duration_secs(&self) -> f64 {
        let vocal = self.vocal.as_ref().map_or(0.0, AudioAsset::duration_secs);
        let beat = self.beat.as_ref().map_or(0.0, AudioAsset::duration_secs);
        vocal.max(beat)
    }
}
