//! Integration Tests
//!
//! End-to-end tests for import, playback, capture and mixdown.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use test_case::test_case;

use vocal_master::engine::capture::testing::ScriptedDevice;
use vocal_master::engine::{
    encode_wav, generate_test_tone, AssetSlot, AudioAsset, AudioBuffer, CancelToken, LiveEngine,
    ManualClock, MixdownRenderer, RenderJob, SessionSources, TransportEvent, TransportScheduler,
    TransportState,
};
use vocal_master::error::DeviceFailure;
use vocal_master::settings::{HarmonyType, ProcessingSettings, Style};
use vocal_master::{EngineConfig, VocalError};

const SR: u32 = 48_000;

fn vocal(secs: f32) -> AudioAsset {
    AudioAsset::new("vocal", generate_test_tone(220.0, 0.5, secs, SR))
}

fn beat(secs: f32) -> AudioAsset {
    let left = generate_test_tone(110.0, 0.4, secs, SR).samples.remove(0);
    let right = generate_test_tone(165.0, 0.4, secs, SR).samples.remove(0);
    AudioAsset::new(
        "beat",
        AudioBuffer {
            samples: vec![left, right],
            sample_rate: SR,
        },
    )
}

fn render(job: &RenderJob) -> vocal_master::Result<AudioAsset> {
    MixdownRenderer::new(EngineConfig::default()).render(job, &mut |_| {})
}

// === Mixdown ===

#[test]
fn test_render_is_bit_identical_across_runs() {
    let settings = ProcessingSettings {
        style: Style::RockBallad,
        harmony: HarmonyType::DoubleFifth,
        ..Default::default()
    };
    let vocal = vocal(1.0);
    let beat = beat(1.5);
    let job = RenderJob::new(Some(&vocal), Some(&beat), &settings);

    let first = render(&job).unwrap();
    let second = render(&job).unwrap();
    assert_eq!(first.buffer().samples, second.buffer().samples);
}

#[test]
fn test_export_bytes_and_checksum_are_deterministic() {
    let vocal = vocal(0.5);
    let job = RenderJob::new(Some(&vocal), None, &ProcessingSettings::default());
    let renderer = MixdownRenderer::new(EngineConfig::default());

    let a = renderer.export(&job, &mut |_| {}).unwrap();
    let b = renderer.export(&job, &mut |_| {}).unwrap();
    assert_eq!(a.checksum, b.checksum);
    assert_eq!(a.bytes, b.bytes);
    assert!(a.peak_db <= 0.0);
}

#[test]
fn test_export_progress_reaches_100_after_encoding() {
    let vocal = vocal(0.5);
    let job = RenderJob::new(Some(&vocal), None, &ProcessingSettings::default());
    let mut reports = Vec::new();
    MixdownRenderer::new(EngineConfig::default())
        .export(&job, &mut |p| reports.push(p))
        .unwrap();

    assert_eq!(reports.first(), Some(&0));
    assert_eq!(reports.last(), Some(&100));
    assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(reports.iter().filter(|&&p| p == 100).count(), 1);
}

#[test]
fn test_render_without_vocal_reports_nothing() {
    let beat = beat(1.0);
    let job = RenderJob::new(None, Some(&beat), &ProcessingSettings::default());
    let mut reports = Vec::new();
    let err = MixdownRenderer::new(EngineConfig::default())
        .render(&job, &mut |p| reports.push(p))
        .unwrap_err();

    assert!(matches!(err, VocalError::Precondition { .. }));
    assert!(reports.is_empty());
}

#[test]
fn test_cancelled_export_writes_nothing() {
    let dir = tempdir().unwrap();
    let vocal = vocal(2.0);
    let token = CancelToken::new();
    let job = RenderJob::new(Some(&vocal), None, &ProcessingSettings::default())
        .with_cancel_token(token.clone());

    let result = MixdownRenderer::new(EngineConfig::default())
        .export(&job, &mut |p| {
            if p >= 20 {
                token.cancel();
            }
        })
        .and_then(|export| export.write_to(dir.path()));

    assert!(matches!(result, Err(VocalError::RenderCancelled { .. })));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_export_write_to_leaves_only_final_file() {
    let dir = tempdir().unwrap();
    let vocal = vocal(0.25);
    let job = RenderJob::new(Some(&vocal), None, &ProcessingSettings::default());
    let result = MixdownRenderer::new(EngineConfig::default())
        .export(&job, &mut |_| {})
        .unwrap();

    let path = result.write_to(dir.path()).unwrap();
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![result.file_name.clone()]);
    assert_eq!(std::fs::read(path).unwrap(), result.bytes);
}

#[test]
fn test_disabled_sends_leave_no_tail() {
    let vocal = vocal(0.5);
    let wet = ProcessingSettings {
        style: Style::Bolero,
        ..Default::default()
    };
    let dry = ProcessingSettings {
        reverb_enabled: false,
        delay_enabled: false,
        ..wet.clone()
    };

    let tail_energy = |settings: &ProcessingSettings| {
        let out = render(&RenderJob::new(Some(&vocal), None, settings)).unwrap();
        let start = (0.7 * SR as f64) as usize;
        out.buffer().samples[0][start..]
            .iter()
            .map(|s| s * s)
            .sum::<f32>()
    };
    assert!(tail_energy(&wet) > 1e-3);
    assert!(tail_energy(&dry) < 1e-6);
}

#[test_case(Style::Bolero ; "bolero")]
#[test_case(Style::KPop ; "k-pop")]
#[test_case(Style::Edm ; "edm")]
#[test_case(Style::Acoustic ; "acoustic")]
fn test_every_style_renders_finite_output(style: Style) {
    let settings = ProcessingSettings {
        style,
        harmony: HarmonyType::Third,
        ..Default::default()
    };
    let vocal = vocal(0.5);
    let out = render(&RenderJob::new(Some(&vocal), None, &settings)).unwrap();
    assert!(out.buffer().is_finite());
    assert_eq!(out.buffer().num_channels(), 2);
}

// === Import ===

#[test]
fn test_import_resamples_to_engine_rate() {
    let source = generate_test_tone(440.0, 0.5, 1.0, 44_100);
    let bytes = encode_wav(&source, 16).unwrap();

    let config = EngineConfig::default();
    let (mut engine, _context) = LiveEngine::new(config).unwrap();
    let name = engine.import(&bytes, "take.wav", AssetSlot::Vocal).unwrap();

    assert_eq!(name, "take.wav");
    let asset = engine.assets().vocal().unwrap();
    assert_eq!(asset.buffer().sample_rate, SR);
    assert!((asset.duration_secs() - 1.0).abs() < 1e-3);
}

#[test]
fn test_import_rejects_garbage() {
    let (mut engine, _context) = LiveEngine::new(EngineConfig::default()).unwrap();
    let err = engine
        .import(b"not a wav file", "junk.wav", AssetSlot::Beat)
        .unwrap_err();
    assert!(matches!(err, VocalError::Decode { .. }));
    assert!(engine.assets().beat().is_none());
}

// === Transport ===

#[test]
fn test_transport_seek_then_natural_end() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut transport = TransportScheduler::new(clock.clone(), 0.1);
    let mut store = vocal_master::engine::AssetStore::new(SR);
    store.set(AssetSlot::Beat, beat(4.0));

    let sources = SessionSources::from_assets(&store, HarmonyType::Off);
    let first = transport.play(0.0, sources).id;
    clock.advance(1.0);
    let second = transport.seek(3.0).map(|s| s.id).unwrap();
    assert!(second > first);

    clock.advance(0.1);
    assert!((transport.elapsed() - 3.0).abs() < 1e-9);
    assert_eq!(transport.poll(), None);

    clock.advance(1.05);
    assert_eq!(
        transport.poll(),
        Some(TransportEvent::Completed { session_id: second })
    );
    assert_eq!(transport.state(), TransportState::Stopped);
    assert_eq!(transport.elapsed(), 0.0);
}

#[test]
fn test_stop_is_idempotent() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut transport = TransportScheduler::new(clock, 0.1);
    assert!(transport.stop().is_none());
    transport.play(0.0, SessionSources::default());
    assert!(transport.stop().is_some());
    assert!(transport.stop().is_none());
    assert_eq!(transport.state(), TransportState::Stopped);
}

// === Live engine ===

#[test]
fn test_live_engine_record_then_export() {
    let (mut engine, mut context) = LiveEngine::new(EngineConfig::default()).unwrap();
    let take = generate_test_tone(330.0, 0.5, 0.5, SR).samples.remove(0);
    let chunks: Vec<Vec<f32>> = take.chunks(4800).map(<[f32]>::to_vec).collect();

    engine
        .start_capture(Box::new(ScriptedDevice::new(SR, chunks)))
        .unwrap();
    let mut out = vec![0.0; 2 * 4800];
    while engine.pump_capture().unwrap() > 0 {
        context.render(&mut out);
    }
    assert_eq!(engine.stop_capture().unwrap(), "Recorded vocal");

    let mut settings = engine.settings().clone();
    settings.select_style(Style::Pop);
    settings.set_reverb_level(0.3);
    engine.update_settings(settings);

    let result = engine.export(None, &mut |_| {}).unwrap();
    assert!(result.file_name.starts_with("VocalMaster_ProMix_"));
    assert!(result.duration_secs > 0.5);
}

#[test]
fn test_capture_permission_denied_surfaces() {
    let (mut engine, _context) = LiveEngine::new(EngineConfig::default()).unwrap();
    let err = engine
        .start_capture(Box::new(ScriptedDevice::failing(
            DeviceFailure::PermissionDenied,
        )))
        .unwrap_err();
    assert!(matches!(
        err,
        VocalError::Device {
            kind: DeviceFailure::PermissionDenied,
            ..
        }
    ));
    assert!(!engine.is_capturing());
}
