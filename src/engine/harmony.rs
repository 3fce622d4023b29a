//! Harmony voicing
//!
//! Harmony voices are the lead vocal played back faster by a fixed interval
//! (varispeed, like a tape machine or a buffer source `detune`): pitch rises
//! and the voice ends sooner. Voices skip the vocal chain and reach the
//! master bus through the harmony gain.

use super::buffer::AudioBuffer;
use crate::settings::HarmonyType;

/// One derived backing voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonyVoice {
    /// Interval above the lead, in cents
    pub pitch_offset_cents: f32,
    /// Playback rate, `2^(cents / 1200)`
    pub rate: f64,
}

impl HarmonyVoice {
    /// Voice transposed by `cents`
    pub fn new(pitch_offset_cents: f32) -> Self {
        Self {
            pitch_offset_cents,
            rate: 2f64.powf(pitch_offset_cents as f64 / 1200.0),
        }
    }

    /// Sample of this voice `elapsed` frames after starting at `start_frame`
    #[inline]
    pub fn sample_at(&self, vocal: &AudioBuffer, start_frame: usize, elapsed: usize) -> f32 {
        vocal.mono_interpolated(start_frame as f64 + elapsed as f64 * self.rate)
    }

    /// Frames this voice plays when started at the top of a vocal of
    /// `vocal_frames` frames
    pub fn num_frames(&self, vocal_frames: usize) -> usize {
        (vocal_frames as f64 / self.rate).ceil() as usize
    }

    /// Playback duration over a vocal of `vocal_secs` seconds
    pub fn duration_secs(&self, vocal_secs: f64) -> f64 {
        vocal_secs / self.rate
    }
}

/// Cent offsets for each harmony arrangement
pub fn voice_offsets(harmony: HarmonyType) -> &'static [f32] {
    match harmony {
        HarmonyType::Off => &[],
        HarmonyType::Third => &[400.0],
        HarmonyType::Fifth => &[700.0],
        HarmonyType::Double => &[12.0],
        HarmonyType::DoubleFifth => &[12.0, 700.0],
    }
}

/// Derive the harmony voices for a vocal
///
/// An absent or empty vocal yields no voices.
pub fn derive_voices(vocal: Option<&AudioBuffer>, harmony: HarmonyType) -> Vec<HarmonyVoice> {
    match vocal {
        Some(buffer) if !buffer.is_empty() => voice_offsets(harmony)
            .iter()
            .map(|&cents| HarmonyVoice::new(cents))
            .collect(),
        _ => Vec::new(),
    }
}

/// Sum of every voice at one output frame
#[inline]
pub fn mix_voices(
    voices: &[HarmonyVoice],
    vocal: &AudioBuffer,
    start_frame: usize,
    elapsed: usize,
) -> f32 {
    voices
        .iter()
        .map(|voice| voice.sample_at(vocal, start_frame, elapsed))
        .sum()
}
