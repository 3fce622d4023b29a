//! Vocal Master - real-time vocal processing chain
//!
//! A lead vocal runs through a preset-driven chain (high-pass, three-band
//! EQ, compressor, presence, reverb and delay sends) and is mixed with
//! derived harmony voices and an optional beat.
//!
//! # Architecture
//!
//! - [`settings`] and [`preset`]: what the user picks and the parameter
//!   bundle each style stands for
//! - [`dsp`]: the effect graph and its processors
//! - [`engine`]: assets, transport, capture, live playback and the
//!   deterministic offline mixdown

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod preset;
pub mod settings;

pub use config::EngineConfig;
pub use error::{Result, VocalError};
pub use settings::ProcessingSettings;
