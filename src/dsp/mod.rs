//! DSP building blocks and the vocal effect graph
//!
//! Every processor works one sample at a time on preallocated state and
//! ramps its parameters through [`SmoothedParam`], so a graph can be
//! retargeted from the control side while audio is running.
//!
//! Graph: HighPass → EQ (low/mid/high) → Compressor → Presence → dry,
//! with reverb and delay sends off the presence output, all summed with
//! harmony and beat on the stereo master.

mod biquad;
mod compressor;
mod delay;
mod graph;
mod meter;
mod reverb;
mod smoothing;

pub use biquad::{Biquad, FilterType};
pub use compressor::{Compressor, KNEE_DB};
pub use delay::{FeedbackDelay, MAX_DELAY_SECS, MAX_FEEDBACK};
pub use graph::{
    effective_wet, resolve, EffectGraph, ResolvedParams, StageId, EQ_HIGH_HZ, EQ_LOW_HZ,
    EQ_MID_HZ, PARAM_COUNT, PRESENCE_HZ,
};
pub use meter::{MeterTap, SpectrumAnalyser, FFT_SIZE, METER_BINS};
pub use reverb::Reverb;
pub use smoothing::SmoothedParam;
