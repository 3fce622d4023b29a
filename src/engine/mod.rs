//! Audio Engine Module
//!
//! Everything between the effect graph and the outside world:
//! - Audio buffers, WAV decode/encode and resampling
//! - The asset store (vocal and beat slots) and harmony voices
//! - Transport scheduling on a shared clock
//! - Microphone capture
//! - Offline mixdown and export
//! - The live engine that drives the graph from an audio callback

pub mod asset;
pub mod buffer;
pub mod capture;
pub mod harmony;
pub mod io;
pub mod live;
pub mod render;
pub mod transport;

pub use asset::{AssetSlot, AssetStore, AudioAsset};
pub use buffer::{AudioBuffer, ChannelLayout};
pub use capture::{CaptureDevice, CaptureSession, RECORDED_ASSET_NAME};
pub use harmony::{derive_voices, HarmonyVoice};
pub use io::{decode_audio, encode_wav, generate_test_tone, resample, write_atomically};
pub use live::{LiveEngine, RenderContext};
pub use render::{CancelToken, ExportResult, MixdownRenderer, RenderJob};
pub use transport::{
    Clock, FrameClock, ManualClock, PlaybackSession, SessionSources, TransportEvent,
    TransportScheduler, TransportState,
};
