//! Processing settings
//!
//! The single structured value that configures the effect graph. Level
//! setters implement the control-layer contract: adjusting a level directly
//! switches that effect to Manual mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest reverb/delay wet level a user may set
pub const MAX_SEND_LEVEL: f32 = 0.8;

/// Musical style selecting a preset bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    Bolero,
    #[serde(rename = "k-pop")]
    KPop,
    #[default]
    Pop,
    PopBallad,
    Rock,
    RockBallad,
    Disco,
    Modern,
    Rumba,
    #[serde(rename = "edm")]
    Edm,
    Acoustic,
}

impl Style {
    /// Every style, in display order
    pub const ALL: [Style; 11] = [
        Style::Bolero,
        Style::KPop,
        Style::Pop,
        Style::PopBallad,
        Style::Rock,
        Style::RockBallad,
        Style::Disco,
        Style::Modern,
        Style::Rumba,
        Style::Edm,
        Style::Acoustic,
    ];

    /// Human-readable style name
    pub fn display_name(&self) -> &'static str {
        match self {
            Style::Bolero => "Bolero",
            Style::KPop => "K-Pop",
            Style::Pop => "Pop",
            Style::PopBallad => "Pop Ballad",
            Style::Rock => "Rock",
            Style::RockBallad => "Rock Ballad",
            Style::Disco => "Disco",
            Style::Modern => "Modern",
            Style::Rumba => "Rumba",
            Style::Edm => "EDM",
            Style::Acoustic => "Acoustic",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Musical scale; carried for the auto-tune contract but not read by the signal path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scale {
    #[default]
    Auto,
    Major,
    Minor,
    Chromatic,
}

/// Whether a send level follows the preset or the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectMode {
    #[default]
    Auto,
    Manual,
}

/// Backing-voice arrangement derived from the lead vocal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HarmonyType {
    #[default]
    Off,
    Third,
    Fifth,
    Double,
    DoubleFifth,
}

/// Complete user-facing processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub style: Style,
    pub auto_tune_enabled: bool,
    pub scale: Scale,
    pub reverb_enabled: bool,
    pub reverb_mode: EffectMode,
    /// Manual reverb wet level (0.0 to 0.8)
    pub reverb_level: f32,
    pub delay_enabled: bool,
    pub delay_mode: EffectMode,
    /// Manual delay wet level (0.0 to 0.8)
    pub delay_level: f32,
    pub harmony: HarmonyType,
    /// Harmony bus gain (0.0 to 1.0)
    pub harmony_level: f32,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            style: Style::Pop,
            auto_tune_enabled: true,
            scale: Scale::Auto,
            reverb_enabled: true,
            reverb_mode: EffectMode::Auto,
            reverb_level: 0.2,
            delay_enabled: true,
            delay_mode: EffectMode::Auto,
            delay_level: 0.1,
            harmony: HarmonyType::Off,
            harmony_level: 0.3,
        }
    }
}

impl ProcessingSettings {
    /// Pick a style; both send modes return to Auto
    pub fn select_style(&mut self, style: Style) {
        self.style = style;
        self.reverb_mode = EffectMode::Auto;
        self.delay_mode = EffectMode::Auto;
    }

    /// Set the reverb level directly (switches reverb to Manual)
    pub fn set_reverb_level(&mut self, level: f32) {
        self.reverb_level = clamp_unit(level, MAX_SEND_LEVEL);
        self.reverb_mode = EffectMode::Manual;
    }

    /// Set the delay level directly (switches delay to Manual)
    pub fn set_delay_level(&mut self, level: f32) {
        self.delay_level = clamp_unit(level, MAX_SEND_LEVEL);
        self.delay_mode = EffectMode::Manual;
    }

    /// Set the harmony bus level
    pub fn set_harmony_level(&mut self, level: f32) {
        self.harmony_level = clamp_unit(level, 1.0);
    }

    /// Copy of these settings with every level inside its documented range
    pub fn clamped(&self) -> Self {
        Self {
            reverb_level: clamp_unit(self.reverb_level, MAX_SEND_LEVEL),
            delay_level: clamp_unit(self.delay_level, MAX_SEND_LEVEL),
            harmony_level: clamp_unit(self.harmony_level, 1.0),
            ..self.clone()
        }
    }
}

/// Clamp to [0, max]; NaN becomes 0
fn clamp_unit(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}
