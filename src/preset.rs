//! Style presets
//!
//! A closed table mapping every [`Style`] to the effect parameters of the
//! vocal chain. Lookup is a total function: styles without a dedicated row
//! share [`DEFAULT_BUNDLE`].

use serde::Serialize;

use crate::settings::Style;

/// Parameters for every stage of the vocal chain
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterBundle {
    /// High-pass cutoff in Hz
    pub highpass_hz: f32,
    /// Low band gain in dB
    pub eq_low_db: f32,
    /// Mid band gain in dB
    pub eq_mid_db: f32,
    /// High shelf gain in dB
    pub eq_high_db: f32,
    /// Compression ratio (n:1)
    pub comp_ratio: f32,
    /// Compressor attack in seconds
    pub comp_attack_secs: f32,
    /// Compressor release in seconds
    pub comp_release_secs: f32,
    /// Added to the -24 dB base threshold
    pub comp_threshold_offset_db: f32,
    /// Reverb wet level used in Auto mode
    pub reverb_wet: f32,
    /// Reverb decay time in seconds
    pub reverb_decay_secs: f32,
    /// Delay wet level used in Auto mode
    pub delay_wet: f32,
    /// Delay time in seconds
    pub delay_time_secs: f32,
    /// Delay feedback amount
    pub delay_feedback: f32,
    /// Presence boost in dB applied when auto-tune is on
    pub tune_intensity_db: f32,
}

/// Compressor threshold before the per-style offset
pub const BASE_THRESHOLD_DB: f32 = -24.0;

/// Bundle for styles without a dedicated preset
pub const DEFAULT_BUNDLE: ParameterBundle = ParameterBundle {
    highpass_hz: 80.0,
    eq_low_db: 0.0,
    eq_mid_db: 0.0,
    eq_high_db: 0.0,
    comp_ratio: 3.0,
    comp_attack_secs: 0.01,
    comp_release_secs: 0.1,
    comp_threshold_offset_db: 0.0,
    reverb_wet: 0.15,
    reverb_decay_secs: 1.5,
    delay_wet: 0.1,
    delay_time_secs: 0.3,
    delay_feedback: 0.1,
    tune_intensity_db: 4.0,
};

const BOLERO: ParameterBundle = ParameterBundle {
    highpass_hz: 70.0,
    eq_low_db: 3.0,
    eq_mid_db: 2.0,
    eq_high_db: 1.5,
    comp_ratio: 2.0,
    comp_attack_secs: 0.018,
    comp_release_secs: 0.15,
    comp_threshold_offset_db: 2.0,
    reverb_wet: 0.22,
    reverb_decay_secs: 2.5,
    delay_wet: 0.0,
    delay_time_secs: 0.4,
    delay_feedback: 0.1,
    tune_intensity_db: 2.0,
};

const KPOP: ParameterBundle = ParameterBundle {
    highpass_hz: 90.0,
    eq_low_db: -2.0,
    eq_mid_db: 5.0,
    eq_high_db: 4.0,
    comp_ratio: 3.8,
    comp_attack_secs: 0.006,
    comp_release_secs: 0.09,
    comp_threshold_offset_db: 4.0,
    reverb_wet: 0.14,
    reverb_decay_secs: 1.3,
    delay_wet: 0.1,
    delay_time_secs: 0.375,
    delay_feedback: 0.12,
    tune_intensity_db: 8.0,
};

const POP: ParameterBundle = ParameterBundle {
    highpass_hz: 90.0,
    eq_low_db: -3.0,
    eq_mid_db: 4.0,
    eq_high_db: 3.0,
    comp_ratio: 3.5,
    comp_attack_secs: 0.008,
    comp_release_secs: 0.1,
    comp_threshold_offset_db: 3.0,
    reverb_wet: 0.15,
    reverb_decay_secs: 1.4,
    delay_wet: 0.1,
    delay_time_secs: 0.09,
    delay_feedback: 0.1,
    tune_intensity_db: 5.0,
};

const POP_BALLAD: ParameterBundle = ParameterBundle {
    highpass_hz: 80.0,
    eq_low_db: 2.0,
    eq_mid_db: 2.5,
    eq_high_db: 2.0,
    comp_ratio: 2.5,
    comp_attack_secs: 0.015,
    comp_release_secs: 0.13,
    comp_threshold_offset_db: 2.0,
    reverb_wet: 0.2,
    reverb_decay_secs: 2.3,
    delay_wet: 0.1,
    delay_time_secs: 0.4,
    delay_feedback: 0.1,
    tune_intensity_db: 3.0,
};

const EDM: ParameterBundle = ParameterBundle {
    highpass_hz: 100.0,
    eq_low_db: -4.0,
    eq_mid_db: 6.0,
    eq_high_db: 5.0,
    comp_ratio: 4.5,
    comp_attack_secs: 0.005,
    comp_release_secs: 0.08,
    comp_threshold_offset_db: 5.0,
    reverb_wet: 0.15,
    reverb_decay_secs: 1.5,
    delay_wet: 0.15,
    delay_time_secs: 0.25,
    delay_feedback: 0.2,
    tune_intensity_db: 10.0,
};

const ACOUSTIC: ParameterBundle = ParameterBundle {
    highpass_hz: 120.0,
    eq_low_db: 0.0,
    eq_mid_db: 1.0,
    eq_high_db: 2.0,
    comp_ratio: 2.0,
    comp_attack_secs: 0.02,
    comp_release_secs: 0.15,
    comp_threshold_offset_db: 1.0,
    reverb_wet: 0.08,
    reverb_decay_secs: 1.0,
    delay_wet: 0.0,
    delay_time_secs: 0.3,
    delay_feedback: 0.0,
    tune_intensity_db: 0.0,
};

/// Indexed by `Style as usize`; order matches [`Style::ALL`]
static PRESET_TABLE: [ParameterBundle; 11] = [
    BOLERO,
    KPOP,
    POP,
    POP_BALLAD,
    DEFAULT_BUNDLE, // Rock
    DEFAULT_BUNDLE, // Rock Ballad
    DEFAULT_BUNDLE, // Disco
    DEFAULT_BUNDLE, // Modern
    DEFAULT_BUNDLE, // Rumba
    EDM,
    ACOUSTIC,
];

/// Look up the preset bundle for a style
pub fn lookup(style: Style) -> ParameterBundle {
    PRESET_TABLE[style as usize]
}

/// Inclusive bounds every preset value must respect
pub mod bounds {
    pub const HIGHPASS_HZ: (f32, f32) = (20.0, 500.0);
    pub const EQ_GAIN_DB: (f32, f32) = (-12.0, 12.0);
    pub const COMP_RATIO: (f32, f32) = (1.0, 20.0);
    pub const COMP_TIME_SECS: (f32, f32) = (0.0, 1.0);
    pub const COMP_THRESHOLD_OFFSET_DB: (f32, f32) = (0.0, 12.0);
    pub const WET: (f32, f32) = (0.0, 0.8);
    pub const REVERB_DECAY_SECS: (f32, f32) = (0.1, 10.0);
    pub const DELAY_TIME_SECS: (f32, f32) = (0.0, 2.0);
    pub const DELAY_FEEDBACK: (f32, f32) = (0.0, 0.95);
    pub const TUNE_DB: (f32, f32) = (0.0, 12.0);
}

impl ParameterBundle {
    /// Check that every field lies inside its documented bounds
    pub fn is_in_range(&self) -> bool {
        use bounds::*;
        let within = |v: f32, (lo, hi): (f32, f32)| v.is_finite() && v >= lo && v <= hi;

        within(self.highpass_hz, HIGHPASS_HZ)
            && within(self.eq_low_db, EQ_GAIN_DB)
            && within(self.eq_mid_db, EQ_GAIN_DB)
            && within(self.eq_high_db, EQ_GAIN_DB)
            && within(self.comp_ratio, COMP_RATIO)
            && within(self.comp_attack_secs, COMP_TIME_SECS)
            && within(self.comp_release_secs, COMP_TIME_SECS)
            && within(self.comp_threshold_offset_db, COMP_THRESHOLD_OFFSET_DB)
            && within(self.reverb_wet, WET)
            && within(self.reverb_decay_secs, REVERB_DECAY_SECS)
            && within(self.delay_wet, WET)
            && within(self.delay_time_secs, DELAY_TIME_SECS)
            && within(self.delay_feedback, DELAY_FEEDBACK)
            && within(self.tune_intensity_db, TUNE_DB)
    }

    /// Absolute compressor threshold in dBFS
    pub fn comp_threshold_db(&self) -> f32 {
        BASE_THRESHOLD_DB + self.comp_threshold_offset_db
    }
}
