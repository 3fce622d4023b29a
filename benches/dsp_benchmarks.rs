//! DSP Benchmarks
//!
//! Performance benchmarks for the effect graph and offline mixdown.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vocal_master::dsp::{EffectGraph, SpectrumAnalyser};
use vocal_master::engine::{generate_test_tone, AudioAsset, MixdownRenderer, RenderJob};
use vocal_master::settings::{HarmonyType, ProcessingSettings, Style};
use vocal_master::EngineConfig;

fn benchmark_graph_block(c: &mut Criterion) {
    let mut graph = EffectGraph::new(48_000, 0.1);
    graph.apply_settings(&ProcessingSettings::default());
    graph.snap_to_targets();
    let input = generate_test_tone(220.0, 0.5, 512.0 / 48_000.0, 48_000);

    c.bench_function("graph_512_frames", |b| {
        b.iter(|| {
            for i in 0..input.num_frames() {
                let v = input.mono_at(i);
                black_box(graph.process_frame(black_box(v), 0.0, [0.0; 2]));
            }
        })
    });
}

fn benchmark_mixdown(c: &mut Criterion) {
    let vocal = AudioAsset::new("vocal", generate_test_tone(220.0, 0.5, 2.0, 48_000));
    let beat = AudioAsset::new("beat", generate_test_tone(110.0, 0.5, 2.0, 48_000));
    let settings = ProcessingSettings {
        style: Style::PopBallad,
        harmony: HarmonyType::DoubleFifth,
        ..Default::default()
    };
    let job = RenderJob::new(Some(&vocal), Some(&beat), &settings);
    let renderer = MixdownRenderer::new(EngineConfig::default());

    c.bench_function("mixdown_2s_double_fifth", |b| {
        b.iter(|| {
            renderer.render(black_box(&job), &mut |_| {}).unwrap();
        })
    });
}

fn benchmark_spectrum(c: &mut Criterion) {
    let graph = EffectGraph::new(48_000, 0.1);
    let tap = graph.meter_tap();
    for i in 0..4096 {
        tap.push((i as f32 * 0.05).sin());
    }
    let mut analyser = SpectrumAnalyser::new(tap);

    c.bench_function("spectrum_snapshot", |b| {
        b.iter(|| {
            black_box(analyser.snapshot());
        })
    });
}

criterion_group!(
    benches,
    benchmark_graph_block,
    benchmark_mixdown,
    benchmark_spectrum
);
criterion_main!(benches);
