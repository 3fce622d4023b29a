//! Fixed-topology vocal effect graph
//!
//! Signal flow, per frame:
//!
//! ```text
//! vocal ─ HighPass ─ EqLow ─ EqMid ─ EqHigh ─ Compressor ─ Presence ─┬───────────── dry ─┐
//!                                                                    ├─ Reverb × wet ────┤ vocal bus
//!                                                                    └─ Delay  × wet ────┘
//! harmony voices ─ HarmonyGain ─────────────────────────────────────────────────────────┐
//! beat ─ BeatGain (unity) ──────────────────────────────────────────────────────────────┴ master ─ meter
//! ```
//!
//! The graph is a plain aggregate of owned stages; there is no way to
//! rewire it. [`ProcessingSettings`] are turned into concrete targets by the
//! pure [`resolve`] function and every target is approached with the same
//! exponential smoothing, so applying settings is idempotent.

use std::sync::Arc;

use log::debug;
use serde::Serialize;

use super::biquad::{Biquad, FilterType};
use super::compressor::Compressor;
use super::delay::FeedbackDelay;
use super::meter::MeterTap;
use super::reverb::Reverb;
use super::smoothing::SmoothedParam;
use crate::preset;
use crate::settings::{EffectMode, ProcessingSettings};

/// Low EQ band center (peaking)
pub const EQ_LOW_HZ: f32 = 250.0;
/// Mid EQ band center (peaking)
pub const EQ_MID_HZ: f32 = 2500.0;
/// High EQ band corner (shelf)
pub const EQ_HIGH_HZ: f32 = 8000.0;
/// Presence ("auto-tune") boost center
pub const PRESENCE_HZ: f32 = 3200.0;

const HIGHPASS_Q: f32 = 0.707;
const EQ_Q: f32 = 1.0;
const PRESENCE_Q: f32 = 1.0;

/// Stages of the graph in processing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    HighPass,
    EqLow,
    EqMid,
    EqHigh,
    Compressor,
    Presence,
    ReverbSend,
    DelaySend,
    HarmonyGain,
    BeatGain,
    MasterBus,
    MeterTap,
}

impl StageId {
    /// Every stage, in signal order
    pub const ORDER: [StageId; 12] = [
        StageId::HighPass,
        StageId::EqLow,
        StageId::EqMid,
        StageId::EqHigh,
        StageId::Compressor,
        StageId::Presence,
        StageId::ReverbSend,
        StageId::DelaySend,
        StageId::HarmonyGain,
        StageId::BeatGain,
        StageId::MasterBus,
        StageId::MeterTap,
    ];

    /// Short display name
    pub fn name(&self) -> &'static str {
        match self {
            StageId::HighPass => "high-pass",
            StageId::EqLow => "eq-low",
            StageId::EqMid => "eq-mid",
            StageId::EqHigh => "eq-high",
            StageId::Compressor => "compressor",
            StageId::Presence => "presence",
            StageId::ReverbSend => "reverb-send",
            StageId::DelaySend => "delay-send",
            StageId::HarmonyGain => "harmony-gain",
            StageId::BeatGain => "beat-gain",
            StageId::MasterBus => "master-bus",
            StageId::MeterTap => "meter-tap",
        }
    }

    /// Whether the stage sits on the serial vocal chain
    pub fn is_vocal_chain(&self) -> bool {
        matches!(
            self,
            StageId::HighPass
                | StageId::EqLow
                | StageId::EqMid
                | StageId::EqHigh
                | StageId::Compressor
                | StageId::Presence
        )
    }
}

/// Number of scalar targets in [`ResolvedParams`]
pub const PARAM_COUNT: usize = 15;

/// Concrete per-stage targets after preset lookup and mode resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedParams {
    pub highpass_hz: f32,
    pub eq_low_db: f32,
    pub eq_mid_db: f32,
    pub eq_high_db: f32,
    pub comp_ratio: f32,
    pub comp_attack_secs: f32,
    pub comp_release_secs: f32,
    pub comp_threshold_db: f32,
    /// Presence boost; 0 when auto-tune is off
    pub presence_db: f32,
    pub reverb_wet: f32,
    pub reverb_decay_secs: f32,
    pub delay_wet: f32,
    pub delay_time_secs: f32,
    pub delay_feedback: f32,
    pub harmony_gain: f32,
}

impl ResolvedParams {
    /// Flatten into a fixed array (for the atomic parameter snapshot)
    pub fn to_array(&self) -> [f32; PARAM_COUNT] {
        [
            self.highpass_hz,
            self.eq_low_db,
            self.eq_mid_db,
            self.eq_high_db,
            self.comp_ratio,
            self.comp_attack_secs,
            self.comp_release_secs,
            self.comp_threshold_db,
            self.presence_db,
            self.reverb_wet,
            self.reverb_decay_secs,
            self.delay_wet,
            self.delay_time_secs,
            self.delay_feedback,
            self.harmony_gain,
        ]
    }

    /// Inverse of [`ResolvedParams::to_array`]
    pub fn from_array(values: [f32; PARAM_COUNT]) -> Self {
        Self {
            highpass_hz: values[0],
            eq_low_db: values[1],
            eq_mid_db: values[2],
            eq_high_db: values[3],
            comp_ratio: values[4],
            comp_attack_secs: values[5],
            comp_release_secs: values[6],
            comp_threshold_db: values[7],
            presence_db: values[8],
            reverb_wet: values[9],
            reverb_decay_secs: values[10],
            delay_wet: values[11],
            delay_time_secs: values[12],
            delay_feedback: values[13],
            harmony_gain: values[14],
        }
    }
}

/// Wet level actually applied to a send
///
/// Disabled sends are silent; Auto follows the preset; Manual follows the
/// user's level.
pub fn effective_wet(enabled: bool, mode: EffectMode, level: f32, preset_wet: f32) -> f32 {
    if !enabled {
        return 0.0;
    }
    match mode {
        EffectMode::Auto => preset_wet,
        EffectMode::Manual => level,
    }
}

/// Resolve settings into per-stage targets
///
/// Auto-tune only drives the presence stage; reverb and delay levels never
/// depend on it.
pub fn resolve(settings: &ProcessingSettings) -> ResolvedParams {
    let settings = settings.clamped();
    let bundle = preset::lookup(settings.style);

    ResolvedParams {
        highpass_hz: bundle.highpass_hz,
        eq_low_db: bundle.eq_low_db,
        eq_mid_db: bundle.eq_mid_db,
        eq_high_db: bundle.eq_high_db,
        comp_ratio: bundle.comp_ratio,
        comp_attack_secs: bundle.comp_attack_secs,
        comp_release_secs: bundle.comp_release_secs,
        comp_threshold_db: bundle.comp_threshold_db(),
        presence_db: if settings.auto_tune_enabled {
            bundle.tune_intensity_db
        } else {
            0.0
        },
        reverb_wet: effective_wet(
            settings.reverb_enabled,
            settings.reverb_mode,
            settings.reverb_level,
            bundle.reverb_wet,
        ),
        reverb_decay_secs: bundle.reverb_decay_secs,
        delay_wet: effective_wet(
            settings.delay_enabled,
            settings.delay_mode,
            settings.delay_level,
            bundle.delay_wet,
        ),
        delay_time_secs: bundle.delay_time_secs,
        delay_feedback: bundle.delay_feedback,
        harmony_gain: settings.harmony_level,
    }
}

/// The long-lived processing graph
#[derive(Debug, Clone)]
pub struct EffectGraph {
    sample_rate: u32,
    params: ResolvedParams,
    highpass: Biquad,
    eq_low: Biquad,
    eq_mid: Biquad,
    eq_high: Biquad,
    compressor: Compressor,
    presence: Biquad,
    reverb: Reverb,
    reverb_wet: SmoothedParam,
    delay: FeedbackDelay,
    delay_wet: SmoothedParam,
    harmony_gain: SmoothedParam,
    meter: Arc<MeterTap>,
}

impl EffectGraph {
    /// Build a graph resting at the default settings
    pub fn new(sample_rate: u32, smoothing_secs: f32) -> Self {
        let p = resolve(&ProcessingSettings::default());
        let tau = smoothing_secs;
        let sr = sample_rate;

        Self {
            sample_rate,
            params: p,
            highpass: Biquad::new(FilterType::HighPass, p.highpass_hz, 0.0, HIGHPASS_Q, sr, tau),
            eq_low: Biquad::new(FilterType::Peak, EQ_LOW_HZ, p.eq_low_db, EQ_Q, sr, tau),
            eq_mid: Biquad::new(FilterType::Peak, EQ_MID_HZ, p.eq_mid_db, EQ_Q, sr, tau),
            eq_high: Biquad::new(FilterType::HighShelf, EQ_HIGH_HZ, p.eq_high_db, EQ_Q, sr, tau),
            compressor: Compressor::new(
                p.comp_threshold_db,
                p.comp_ratio,
                p.comp_attack_secs,
                p.comp_release_secs,
                sr,
                tau,
            ),
            presence: Biquad::new(FilterType::Peak, PRESENCE_HZ, p.presence_db, PRESENCE_Q, sr, tau),
            reverb: Reverb::new(p.reverb_decay_secs, sr, tau),
            reverb_wet: SmoothedParam::new(p.reverb_wet, tau, sr),
            delay: FeedbackDelay::new(p.delay_time_secs, p.delay_feedback, sr, tau),
            delay_wet: SmoothedParam::new(p.delay_wet, tau, sr),
            harmony_gain: SmoothedParam::new(p.harmony_gain, tau, sr),
            meter: Arc::new(MeterTap::new()),
        }
    }

    /// The fixed stage order
    pub fn stages(&self) -> &'static [StageId] {
        &StageId::ORDER
    }

    /// Sample rate the graph was built for
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Targets most recently applied
    pub fn params(&self) -> &ResolvedParams {
        &self.params
    }

    /// Shared handle to the master-bus meter tap
    pub fn meter_tap(&self) -> Arc<MeterTap> {
        Arc::clone(&self.meter)
    }

    /// Resolve settings and retarget every stage
    pub fn apply_settings(&mut self, settings: &ProcessingSettings) {
        let params = resolve(settings);
        if params != self.params {
            debug!(
                "Retargeting graph: style={} presence={}dB reverb={} delay={}",
                settings.style, params.presence_db, params.reverb_wet, params.delay_wet
            );
        }
        self.apply_params(&params);
    }

    /// Retarget every stage from already-resolved values
    ///
    /// Does not log or allocate; safe on the render context.
    pub fn apply_params(&mut self, p: &ResolvedParams) {
        self.highpass.set_frequency(p.highpass_hz);
        self.eq_low.set_gain_db(p.eq_low_db);
        self.eq_mid.set_gain_db(p.eq_mid_db);
        self.eq_high.set_gain_db(p.eq_high_db);
        self.compressor.set_threshold_db(p.comp_threshold_db);
        self.compressor.set_ratio(p.comp_ratio);
        self.compressor.set_times(p.comp_attack_secs, p.comp_release_secs);
        self.presence.set_gain_db(p.presence_db);
        self.reverb.set_decay_secs(p.reverb_decay_secs);
        self.reverb_wet.set_target(p.reverb_wet.clamp(0.0, 1.0));
        self.delay.set_time_secs(p.delay_time_secs);
        self.delay.set_feedback(p.delay_feedback);
        self.delay_wet.set_target(p.delay_wet.clamp(0.0, 1.0));
        self.harmony_gain.set_target(p.harmony_gain.clamp(0.0, 1.0));
        self.params = *p;
    }

    /// Jump every smoothed parameter to its target
    pub fn snap_to_targets(&mut self) {
        self.highpass.snap_to_targets();
        self.eq_low.snap_to_targets();
        self.eq_mid.snap_to_targets();
        self.eq_high.snap_to_targets();
        self.compressor.snap_to_targets();
        self.presence.snap_to_targets();
        self.reverb.snap_to_targets();
        self.reverb_wet.snap();
        self.delay.snap_to_targets();
        self.delay_wet.snap();
        self.harmony_gain.snap();
    }

    /// Clear filter, dynamics, delay and reverb state; parameters are kept
    pub fn reset(&mut self) {
        self.highpass.reset();
        self.eq_low.reset();
        self.eq_mid.reset();
        self.eq_high.reset();
        self.compressor.reset();
        self.presence.reset();
        self.reverb.reset();
        self.delay.reset();
    }

    /// Process one frame
    ///
    /// `vocal` enters the vocal chain, `harmony` is the summed harmony
    /// voices, `beat` is the stereo instrumental. Returns the stereo master.
    #[inline]
    pub fn process_frame(&mut self, vocal: f32, harmony: f32, beat: [f32; 2]) -> [f32; 2] {
        let mut x = self.highpass.process(vocal);
        x = self.eq_low.process(x);
        x = self.eq_mid.process(x);
        x = self.eq_high.process(x);
        x = self.compressor.process(x);
        let dry = self.presence.process(x);

        let reverb = self.reverb.process(dry) * self.reverb_wet.next();
        let delay = self.delay.process(dry) * self.delay_wet.next();
        let vocal_bus = dry + reverb + delay;

        let harmony_bus = harmony * self.harmony_gain.next();

        let left = vocal_bus + harmony_bus + beat[0];
        let right = vocal_bus + harmony_bus + beat[1];
        self.meter.push(0.5 * (left + right));
        [left, right]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{HarmonyType, Style};
    use pretty_assertions::assert_eq;

    const SR: u32 = 48_000;

    fn run(graph: &mut EffectGraph, frames: usize) -> Vec<[f32; 2]> {
        (0..frames)
            .map(|i| {
                let x = 0.3 * (i as f32 * 0.05).sin();
                graph.process_frame(x, 0.5 * x, [0.1, -0.1])
            })
            .collect()
    }

    #[test]
    fn test_stage_order_is_fixed() {
        let graph = EffectGraph::new(SR, 0.1);
        let stages = graph.stages();
        assert_eq!(stages.first(), Some(&StageId::HighPass));
        assert_eq!(stages.last(), Some(&StageId::MeterTap));
        let chain: Vec<_> = stages.iter().filter(|s| s.is_vocal_chain()).collect();
        assert_eq!(chain.len(), 6);
        assert_eq!(*chain[5], StageId::Presence);
    }

    #[test]
    fn test_resolution_rule() {
        let mut settings = ProcessingSettings {
            style: Style::Edm,
            ..Default::default()
        };
        assert_eq!(resolve(&settings).reverb_wet, 0.15);
        assert_eq!(resolve(&settings).delay_wet, 0.15);

        settings.set_reverb_level(0.6);
        assert_eq!(resolve(&settings).reverb_wet, 0.6);
        assert_eq!(resolve(&settings).delay_wet, 0.15);

        settings.reverb_enabled = false;
        assert_eq!(resolve(&settings).reverb_wet, 0.0);
    }

    #[test]
    fn test_auto_tune_only_changes_presence() {
        for style in Style::ALL {
            let on = ProcessingSettings {
                style,
                auto_tune_enabled: true,
                ..Default::default()
            };
            let off = ProcessingSettings {
                auto_tune_enabled: false,
                ..on.clone()
            };
            let (a, b) = (resolve(&on), resolve(&off));
            assert_eq!(a.presence_db, preset::lookup(style).tune_intensity_db);
            assert_eq!(b.presence_db, 0.0);
            assert_eq!(ResolvedParams { presence_db: 0.0, ..a }, b);
        }
    }

    #[test]
    fn test_out_of_range_levels_are_clamped() {
        let settings = ProcessingSettings {
            reverb_mode: EffectMode::Manual,
            reverb_level: 5.0,
            harmony_level: -2.0,
            ..Default::default()
        };
        let p = resolve(&settings);
        assert_eq!(p.reverb_wet, crate::settings::MAX_SEND_LEVEL);
        assert_eq!(p.harmony_gain, 0.0);
    }

    #[test]
    fn test_apply_settings_is_idempotent() {
        let settings = ProcessingSettings {
            style: Style::KPop,
            harmony: HarmonyType::Third,
            ..Default::default()
        };
        let mut once = EffectGraph::new(SR, 0.1);
        once.apply_settings(&settings);
        let mut twice = EffectGraph::new(SR, 0.1);
        twice.apply_settings(&settings);
        twice.apply_settings(&settings);

        assert_eq!(once.params(), twice.params());
        assert_eq!(run(&mut once, 4096), run(&mut twice, 4096));
    }

    #[test]
    fn test_params_array_round_trip() {
        let p = resolve(&ProcessingSettings::default());
        assert_eq!(ResolvedParams::from_array(p.to_array()), p);
    }

    #[test]
    fn test_beat_passes_at_unity() {
        let mut graph = EffectGraph::new(SR, 0.1);
        graph.snap_to_targets();
        for _ in 0..64 {
            assert_eq!(graph.process_frame(0.0, 0.0, [0.25, -0.5]), [0.25, -0.5]);
        }
    }

    #[test]
    fn test_disabled_sends_leave_only_dry() {
        let settings = ProcessingSettings {
            reverb_enabled: false,
            delay_enabled: false,
            ..Default::default()
        };
        let mut graph = EffectGraph::new(SR, 0.1);
        graph.apply_settings(&settings);
        graph.snap_to_targets();

        graph.process_frame(1.0, 0.0, [0.0; 2]);
        // After the impulse has cleared the filters, nothing should come back
        let mut tail = 0.0f32;
        for i in 0..48_000 {
            let [l, _] = graph.process_frame(0.0, 0.0, [0.0; 2]);
            if i > 4_800 {
                tail = tail.max(l.abs());
            }
        }
        assert!(tail < 1e-4, "tail {}", tail);
    }

    #[test]
    fn test_reset_then_silence_is_silent() {
        let mut graph = EffectGraph::new(SR, 0.1);
        run(&mut graph, 2048);
        graph.reset();
        let out = graph.process_frame(0.0, 0.0, [0.0; 2]);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn test_meter_tap_sees_master() {
        let mut graph = EffectGraph::new(SR, 0.1);
        let tap = graph.meter_tap();
        run(&mut graph, 100);
        assert_eq!(tap.samples_written(), 100);
    }

    #[test]
    fn test_apply_params_retargets_every_stage() {
        let mut graph = EffectGraph::new(SR, 0.1);
        let edm = resolve(&ProcessingSettings {
            style: Style::Edm,
            ..Default::default()
        });
        graph.apply_params(&edm);

        assert_eq!(graph.highpass.target_frequency(), edm.highpass_hz);
        assert_eq!(graph.eq_low.target_gain_db(), edm.eq_low_db);
        assert_eq!(graph.eq_mid.target_gain_db(), edm.eq_mid_db);
        assert_eq!(graph.eq_high.target_gain_db(), edm.eq_high_db);
        assert_eq!(graph.presence.target_gain_db(), edm.presence_db);
        assert_eq!(graph.compressor.target_threshold_db(), edm.comp_threshold_db);
        assert_eq!(graph.compressor.target_ratio(), edm.comp_ratio);
        assert_eq!(
            graph.compressor.target_times(),
            (edm.comp_attack_secs, edm.comp_release_secs)
        );
        assert_eq!(graph.reverb.target_decay_secs(), edm.reverb_decay_secs);
        assert_eq!(graph.delay.target_time_secs(), edm.delay_time_secs);
    }
}
