//! Offline mixdown and export
//!
//! A [`RenderJob`] snapshots the assets and settings it needs, so rendering
//! never touches live transport or graph state. The [`MixdownRenderer`]
//! builds a private [`EffectGraph`], snaps every smoother to its target and
//! pulls the whole arrangement through it in fixed-size chunks. The result
//! depends only on the input buffers and settings.
//!
//! Cancellation is cooperative: the job's [`CancelToken`] is checked between
//! chunks and a cancelled job produces no output at all.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::asset::AudioAsset;
use super::buffer::{calculate_peak, AudioBuffer, ChannelLayout};
use super::harmony::{derive_voices, mix_voices};
use super::io::{encode_wav, resample, write_atomically};
use crate::config::EngineConfig;
use crate::dsp::{resolve, EffectGraph};
use crate::error::{Result, VocalError};
use crate::settings::ProcessingSettings;

/// Prefix of every exported file name
pub const EXPORT_PREFIX: &str = "VocalMaster_ProMix_";

/// Name of the asset a render produces
pub const MIXDOWN_ASSET_NAME: &str = "Mixdown";

/// Shared flag asking a render to stop at the next chunk boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Everything one render needs, captured up front
#[derive(Debug, Clone)]
pub struct RenderJob {
    id: Uuid,
    vocal: Option<Arc<AudioBuffer>>,
    beat: Option<Arc<AudioBuffer>>,
    settings: ProcessingSettings,
    cancel: CancelToken,
}

impl RenderJob {
    /// Snapshot the given assets and settings
    pub fn new(
        vocal: Option<&AudioAsset>,
        beat: Option<&AudioAsset>,
        settings: &ProcessingSettings,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vocal: vocal.map(|a| Arc::clone(a.buffer())),
            beat: beat.map(|a| Arc::clone(a.buffer())),
            settings: settings.clone(),
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally owned cancel token
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token that cancels this job
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }
}

/// A finished export, ready to persist
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub job_id: Uuid,
    /// `VocalMaster_ProMix_<unix-millis>.wav`
    pub file_name: String,
    /// Encoded WAV file
    pub bytes: Vec<u8>,
    /// Lowercase hex SHA-256 of `bytes`
    pub checksum: String,
    pub duration_secs: f64,
    /// Peak level of the mix before encoding, in dBFS
    pub peak_db: f32,
}

impl ExportResult {
    /// Persist into `dir` under `file_name`; no partial file is ever visible
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = write_atomically(dir, &self.file_name, &self.bytes)?;
        info!("Wrote {} ({} bytes)", path.display(), self.bytes.len());
        Ok(path)
    }
}

/// Export file name for a given instant
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("{}{}.wav", EXPORT_PREFIX, at.timestamp_millis())
}

/// Offline renderer
#[derive(Debug, Clone)]
pub struct MixdownRenderer {
    config: EngineConfig,
}

impl MixdownRenderer {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Frames a job will render: longest source plus the effect tail
    ///
    /// # Errors
    /// * `Precondition` - the job has no vocal, or the vocal is empty
    pub fn render_length(&self, job: &RenderJob) -> Result<usize> {
        let sr = self.config.sample_rate;
        let vocal = require_vocal(job)?;
        let vocal_frames = conformed_frames(vocal, sr);
        let voice_frames = derive_voices(Some(vocal), job.settings.harmony)
            .iter()
            .map(|v| v.num_frames(vocal_frames))
            .max()
            .unwrap_or(0);
        let beat_frames = job.beat.as_ref().map_or(0, |b| conformed_frames(b, sr));

        let tail_secs = (resolve(&job.settings).reverb_decay_secs as f64)
            .min(self.config.max_tail_secs)
            .max(0.0);
        let tail_frames = (tail_secs * sr as f64).round() as usize;

        Ok(vocal_frames.max(voice_frames).max(beat_frames) + tail_frames)
    }

    /// Render the job to a stereo asset
    ///
    /// `progress` receives integer percentages: first 0, never decreasing,
    /// last exactly 100.
    ///
    /// # Errors
    /// * `Precondition` - no vocal; raised before any progress is reported
    /// * `Render` - the graph produced a non-finite sample
    /// * `RenderCancelled` - the cancel token was set
    pub fn render(&self, job: &RenderJob, progress: &mut dyn FnMut(u8)) -> Result<AudioAsset> {
        let total = self.render_length(job)?;
        let sr = self.config.sample_rate;

        let vocal = conform(require_vocal(job)?, sr);
        let beat = job.beat.as_deref().map(|b| conform(b, sr));
        let voices = derive_voices(Some(&vocal), job.settings.harmony);

        info!(
            "Render job {} started: {} frames ({:.2}s), style {}, {} harmony voice(s)",
            job.id,
            total,
            total as f64 / sr as f64,
            job.settings.style,
            voices.len()
        );

        let mut graph = EffectGraph::new(sr, self.config.smoothing_secs);
        graph.apply_settings(&job.settings);
        graph.snap_to_targets();
        graph.reset();

        let mut output = AudioBuffer::new(total, ChannelLayout::Stereo, sr);
        let block = self.config.block_size.max(1);
        let mut reported = 0u8;
        progress(0);

        let mut frame = 0;
        while frame < total {
            if job.cancel.is_cancelled() {
                info!("Render job {} cancelled at frame {}", job.id, frame);
                return Err(VocalError::RenderCancelled {
                    frames_rendered: frame,
                });
            }

            let end = (frame + block).min(total);
            for n in frame..end {
                let beat_frame = beat.as_ref().map_or([0.0; 2], |b| b.stereo_at(n));
                let [left, right] = graph.process_frame(
                    vocal.mono_at(n),
                    mix_voices(&voices, &vocal, 0, n),
                    beat_frame,
                );
                if !(left.is_finite() && right.is_finite()) {
                    return Err(VocalError::render(format!(
                        "non-finite sample at frame {}",
                        n
                    )));
                }
                output.samples[0][n] = left;
                output.samples[1][n] = right;
            }
            frame = end;

            let percent = (frame * 100 / total) as u8;
            if percent > reported {
                reported = percent;
                progress(percent);
            }
        }

        debug!(
            "Render job {} finished, peak {:.1} dBFS",
            job.id,
            calculate_peak(&output)
        );
        Ok(AudioAsset::new(MIXDOWN_ASSET_NAME, output))
    }

    /// Render and encode the job as a WAV export
    ///
    /// Progress reaches 100 only once the file bytes exist.
    pub fn export(&self, job: &RenderJob, progress: &mut dyn FnMut(u8)) -> Result<ExportResult> {
        let started = Utc::now();
        let mixdown = self.render(job, &mut |p| progress(p.min(99)))?;

        let bytes = encode_wav(mixdown.buffer(), self.config.export_bit_depth)?;
        let checksum = format!("{:x}", Sha256::digest(&bytes));
        progress(100);

        let result = ExportResult {
            job_id: job.id,
            file_name: export_file_name(started),
            bytes,
            checksum,
            duration_secs: mixdown.duration_secs(),
            // Encoding clamps to full scale
            peak_db: calculate_peak(mixdown.buffer()).min(0.0),
        };
        info!(
            "Export {} ready: {} ({:.2}s)",
            job.id, result.file_name, result.duration_secs
        );
        Ok(result)
    }
}

fn require_vocal(job: &RenderJob) -> Result<&AudioBuffer> {
    match job.vocal.as_deref() {
        Some(vocal) if !vocal.is_empty() => Ok(vocal),
        Some(_) => Err(VocalError::precondition("the vocal track is empty")),
        None => Err(VocalError::precondition("no vocal track loaded")),
    }
}

/// Frames a buffer will have once converted to `sample_rate`
fn conformed_frames(buffer: &AudioBuffer, sample_rate: u32) -> usize {
    if buffer.sample_rate == sample_rate || buffer.sample_rate == 0 {
        buffer.num_frames()
    } else {
        (buffer.num_frames() as f64 * sample_rate as f64 / buffer.sample_rate as f64).ceil()
            as usize
    }
}

fn conform(buffer: &AudioBuffer, sample_rate: u32) -> AudioBuffer {
    resample(buffer, sample_rate)
}
