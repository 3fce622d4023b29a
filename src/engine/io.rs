//! Audio codec for the import and export boundaries
//!
//! Imports arrive as opaque encoded bytes; WAV (PCM 8/16/24/32-bit or 32-bit
//! float, mono or stereo) is decoded with `hound` and converted to the engine
//! sample rate. Exports are encoded back to WAV bytes and persisted
//! atomically so a failed write never leaves a partial file behind.
//!
//! Sample rate conversion uses linear interpolation.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::error::{Result, VocalError};

/// Decode an encoded WAV byte buffer and convert it to `target_rate`
///
/// # Errors
/// * `Decode` - the bytes are not a readable WAV stream, use an unsupported
///   sample format or channel count, or contain no frames
pub fn decode_audio(bytes: &[u8], target_rate: u32) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| VocalError::Decode {
        reason: format!("not a readable WAV stream: {}", e),
        source: Some(e),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    let layout = ChannelLayout::from_count(channels).ok_or_else(|| {
        VocalError::decode(format!(
            "{}-channel audio (only mono/stereo supported)",
            channels
        ))
    })?;

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if interleaved.len() < channels {
        return Err(VocalError::decode("audio contains no samples"));
    }

    let mut buffer = AudioBuffer::from_interleaved(&interleaved, layout, spec.sample_rate)?;
    if spec.sample_rate != target_rate {
        debug!(
            "Resampling {} frames from {} Hz to {} Hz",
            buffer.num_frames(),
            spec.sample_rate,
            target_rate
        );
        buffer = resample(&buffer, target_rate);
    }
    Ok(buffer)
}

/// Encode a buffer as WAV bytes at its own sample rate
///
/// Samples are clamped to [-1, 1]; 32-bit writes IEEE float.
pub fn encode_wav(buffer: &AudioBuffer, bit_depth: u16) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(encode_error)?;
        let interleaved = buffer.to_interleaved();

        match bit_depth {
            16 => {
                for sample in interleaved {
                    let scaled = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
                    writer.write_sample(scaled).map_err(encode_error)?;
                }
            }
            24 => {
                for sample in interleaved {
                    // 24-bit stored as i32 in hound
                    let scaled = (sample.clamp(-1.0, 1.0) * 8_388_607.0).round() as i32;
                    writer.write_sample(scaled).map_err(encode_error)?;
                }
            }
            32 => {
                for sample in interleaved {
                    writer
                        .write_sample(sample.clamp(-1.0, 1.0))
                        .map_err(encode_error)?;
                }
            }
            _ => {
                return Err(VocalError::render(format!(
                    "{}-bit audio (only 16, 24, 32 supported)",
                    bit_depth
                )));
            }
        }

        writer.finalize().map_err(encode_error)?;
    }
    Ok(cursor.into_inner())
}

/// Write bytes to `dir/file_name` without ever exposing a partial file
///
/// Data goes to a `.part` sibling first and is renamed into place once fully
/// flushed; on failure the temporary file is removed.
pub fn write_atomically(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let final_path = dir.join(file_name);
    let part_path = dir.join(format!("{}.part", file_name));

    let result = (|| -> std::io::Result<()> {
        use std::io::Write;
        let mut file = std::fs::File::create(&part_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&part_path, &final_path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&part_path);
        return Err(VocalError::Io(e));
    }
    Ok(final_path)
}

/// Resample every channel of a buffer to `target_rate`
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> AudioBuffer {
    if buffer.sample_rate == target_rate || buffer.sample_rate == 0 {
        return buffer.clone();
    }
    let ratio = target_rate as f64 / buffer.sample_rate as f64;
    AudioBuffer {
        samples: buffer
            .samples
            .iter()
            .map(|channel| resample_linear(channel, ratio))
            .collect(),
        sample_rate: target_rate,
    }
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn encode_error(e: hound::Error) -> VocalError {
    VocalError::render(format!("WAV encoding failed: {}", e))
}

fn decode_error(bits: &str) -> impl Fn(hound::Error) -> VocalError + '_ {
    move |e| VocalError::Decode {
        reason: format!("failed to read {} samples: {}", bits, e),
        source: Some(e),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_error("float")),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_error("8-bit")),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_error("16-bit")),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_error("24-bit")),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2_147_483_648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_error("32-bit int")),
        (format, bits) => Err(VocalError::decode(format!(
            "unsupported sample format: {}-bit {:?}",
            bits, format
        ))),
    }
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

/// Generate a mono sine tone, used by tests and the CLI demo source
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_frames = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let samples = (0..num_frames)
        .map(|i| amplitude * (angular_freq * i as f32).sin())
        .collect();
    AudioBuffer::from_mono(samples, sample_rate)
}

// ============================================================================
// Tests
// ============================================================================
