//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::io::Cursor;
use std::path::Path;

use log::{info, warn};

use crate::config::EngineConfig;
use crate::engine::buffer::{calculate_peak, calculate_rms};
use crate::engine::io::decode_audio;
use crate::engine::{AudioAsset, MixdownRenderer, RenderJob};
use crate::error::{Result, VocalError};
use crate::preset;
use crate::settings::{ProcessingSettings, Style};

/// List every style with its preset bundle.
pub fn list_presets(json: bool) -> Result<()> {
    if json {
        let bundles: Vec<_> = Style::ALL
            .iter()
            .map(|&style| serde_json::json!({ "style": style, "bundle": preset::lookup(style) }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&bundles)?);
        return Ok(());
    }

    println!(
        "{:<12} {:>6} {:>6} {:>6} {:>6} {:>6} {:>7} {:>6} {:>6}",
        "Style", "HP Hz", "Low", "Mid", "High", "Ratio", "Thresh", "Verb", "Delay"
    );
    println!("{:-<72}", "");
    for style in Style::ALL {
        let b = preset::lookup(style);
        println!(
            "{:<12} {:>6.0} {:>+6.1} {:>+6.1} {:>+6.1} {:>6.1} {:>7.1} {:>6.2} {:>6.2}",
            style.display_name(),
            b.highpass_hz,
            b.eq_low_db,
            b.eq_mid_db,
            b.eq_high_db,
            b.comp_ratio,
            b.comp_threshold_db(),
            b.reverb_wet,
            b.delay_wet
        );
    }
    Ok(())
}

/// Parse a style from its serialized name ("pop-ballad", "k-pop", "edm").
pub fn parse_style(name: &str) -> Result<Style> {
    serde_json::from_value(serde_json::Value::String(name.to_lowercase())).map_err(|_| {
        VocalError::InvalidConfig {
            param: "style".to_string(),
            value: name.to_string(),
            expected: "one of the styles listed by `presets`".to_string(),
        }
    })
}

/// Render and export a mix.
pub fn render(
    vocal: &Path,
    beat: Option<&Path>,
    settings_path: Option<&Path>,
    style: Option<&str>,
    config_path: Option<&Path>,
    output: &Path,
) -> Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let mut settings = match settings_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<ProcessingSettings>(&text)?
        }
        None => ProcessingSettings::default(),
    };
    if let Some(name) = style {
        settings.select_style(parse_style(name)?);
    }

    let vocal_asset = load_asset(vocal, config.sample_rate)?;
    let beat_asset = beat
        .map(|path| load_asset(path, config.sample_rate))
        .transpose()?;

    info!(
        "Rendering '{}' with style {}",
        vocal_asset.name(),
        settings.style
    );
    let job = RenderJob::new(Some(&vocal_asset), beat_asset.as_ref(), &settings);
    let renderer = MixdownRenderer::new(config);

    let mut last_reported = None;
    let result = renderer.export(&job, &mut |percent| {
        if percent % 10 == 0 && last_reported != Some(percent) {
            last_reported = Some(percent);
            println!("  {:>3}%", percent);
        }
    })?;

    std::fs::create_dir_all(output)?;
    let path = result.write_to(output)?;
    println!("Exported: {}", path.display());
    println!("Duration: {:.2}s", result.duration_secs);
    println!("Peak: {:.1} dBFS", result.peak_db);
    println!("SHA-256: {}", result.checksum);

    Ok(())
}

/// Print format and level information for a WAV file.
pub fn inspect(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let spec = hound::WavReader::new(Cursor::new(bytes.as_slice()))
        .map(|reader| reader.spec())
        .map_err(|e| VocalError::Decode {
            reason: e.to_string(),
            source: Some(e),
        })?;
    let buffer = decode_audio(&bytes, spec.sample_rate)?;

    println!("File: {}", path.display());
    println!("Sample rate: {} Hz", spec.sample_rate);
    println!("Channels: {}", spec.channels);
    println!("Format: {:?} {}-bit", spec.sample_format, spec.bits_per_sample);
    println!("Duration: {:.3}s ({} frames)", buffer.duration_secs(), buffer.num_frames());
    println!("Peak: {:.1} dBFS", calculate_peak(&buffer));
    println!("RMS: {:.1} dBFS", calculate_rms(&buffer));

    if !buffer.is_finite() {
        warn!("{} contains non-finite samples", path.display());
    }
    Ok(())
}

fn load_asset(path: &Path, sample_rate: u32) -> Result<AudioAsset> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    AudioAsset::decode(&bytes, name, sample_rate)
}
