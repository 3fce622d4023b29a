//! Microphone capture
//!
//! The input device itself lives outside this crate behind the
//! [`CaptureDevice`] trait. A [`CaptureSession`] owns an opened device,
//! drains it on every [`CaptureSession::pump`] and accumulates the raw
//! samples; [`CaptureSession::finish`] turns them into the "Recorded vocal"
//! asset at the engine sample rate and releases the device.

use log::{info, warn};

use super::asset::AudioAsset;
use super::buffer::AudioBuffer;
use super::io::resample;
use crate::error::{DeviceFailure, Result, VocalError};

/// Name given to every finished recording
pub const RECORDED_ASSET_NAME: &str = "Recorded vocal";

/// An exclusive mono input device
pub trait CaptureDevice: Send {
    /// Acquire the device and return its sample rate
    ///
    /// Fails with `VocalError::Device` (permission denied, no device, busy).
    fn open(&mut self) -> Result<u32>;

    /// Append every sample available right now to `out`; returns how many
    ///
    /// Samples appended before an error are kept: a recording whose final
    /// read fails still yields the partial take.
    fn read(&mut self, out: &mut Vec<f32>) -> Result<usize>;

    /// Release the device; must be safe to call more than once
    fn close(&mut self);
}

/// An in-progress recording
pub struct CaptureSession {
    device: Box<dyn CaptureDevice>,
    device_rate: u32,
    engine_rate: u32,
    recorded: Vec<f32>,
    released: bool,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("device_rate", &self.device_rate)
            .field("engine_rate", &self.engine_rate)
            .field("recorded", &self.recorded.len())
            .finish()
    }
}

impl CaptureSession {
    /// Open `device` and start recording
    pub fn start(mut device: Box<dyn CaptureDevice>, engine_rate: u32) -> Result<Self> {
        let device_rate = device.open()?;
        if device_rate == 0 {
            device.close();
            return Err(VocalError::device(
                DeviceFailure::Unavailable,
                "device reported a sample rate of 0 Hz",
            ));
        }
        info!("Capture started at {} Hz", device_rate);
        Ok(Self {
            device,
            device_rate,
            engine_rate,
            recorded: Vec::new(),
            released: false,
        })
    }

    /// Drain the device; returns the new samples (at device rate)
    ///
    /// A device error ends nothing by itself: the caller decides whether to
    /// `finish` or `abort`.
    pub fn pump(&mut self) -> Result<&[f32]> {
        let before = self.recorded.len();
        self.device.read(&mut self.recorded)?;
        Ok(&self.recorded[before..])
    }

    /// Device sample rate
    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    /// Seconds captured so far
    pub fn recorded_secs(&self) -> f64 {
        self.recorded.len() as f64 / self.device_rate as f64
    }

    /// Stop recording and build the vocal asset
    ///
    /// Samples still buffered in the device are drained first. If that
    /// final read fails the device is still released and the take holds
    /// everything captured up to the failure.
    pub fn finish(mut self) -> Result<AudioAsset> {
        let drained = self.device.read(&mut self.recorded);
        self.release();
        if let Err(e) = drained {
            warn!(
                "Final capture read failed, keeping {:.2}s partial take: {}",
                self.recorded_secs(),
                e
            );
        }

        let raw = AudioBuffer::from_mono(std::mem::take(&mut self.recorded), self.device_rate);
        let buffer = resample(&raw, self.engine_rate);
        info!(
            "Capture finished: {:.2}s at {} Hz",
            buffer.duration_secs(),
            self.engine_rate
        );
        Ok(AudioAsset::new(RECORDED_ASSET_NAME, buffer))
    }

    /// Stop recording and discard everything
    pub fn abort(mut self) {
        self.release();
        info!("Capture aborted after {:.2}s", self.recorded_secs());
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.device.close();
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Scripted device for tests and the CLI
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Device that yields pre-recorded chunks, one per read
    #[derive(Debug, Default)]
    pub struct ScriptedDevice {
        pub sample_rate: u32,
        pub chunks: VecDeque<Vec<f32>>,
        /// Error returned by `open`, if any
        pub open_failure: Option<DeviceFailure>,
        /// Error returned by reads once the chunks run out
        pub read_failure: Option<DeviceFailure>,
        pub is_open: bool,
        /// Shared so a test can watch a device it has boxed away
        pub close_calls: Arc<AtomicUsize>,
    }

    impl ScriptedDevice {
        pub fn new(sample_rate: u32, chunks: Vec<Vec<f32>>) -> Self {
            Self {
                sample_rate,
                chunks: chunks.into(),
                ..Default::default()
            }
        }

        pub fn failing(kind: DeviceFailure) -> Self {
            Self {
                sample_rate: 48_000,
                open_failure: Some(kind),
                ..Default::default()
            }
        }
    }

    impl CaptureDevice for ScriptedDevice {
        fn open(&mut self) -> Result<u32> {
            if let Some(kind) = self.open_failure {
                return Err(VocalError::device(kind, "scripted failure"));
            }
            self.is_open = true;
            Ok(self.sample_rate)
        }

        fn read(&mut self, out: &mut Vec<f32>) -> Result<usize> {
            if !self.is_open {
                return Err(VocalError::device(
                    DeviceFailure::Unavailable,
                    "device is not open",
                ));
            }
            match (self.chunks.pop_front(), self.read_failure) {
                (Some(chunk), _) => {
                    out.extend_from_slice(&chunk);
                    Ok(chunk.len())
                }
                (None, Some(kind)) => Err(VocalError::device(kind, "scripted read failure")),
                (None, None) => Ok(0),
            }
        }

        fn close(&mut self) {
            self.is_open = false;
            self.close_calls.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedDevice;
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[test]
    fn test_capture_accumulates_and_finishes() {
        let device = ScriptedDevice::new(48_000, vec![vec![0.1; 4800], vec![0.2; 4800]]);
        let mut session = CaptureSession::start(Box::new(device), 48_000).unwrap();

        assert_eq!(session.pump().unwrap().len(), 4800);
        assert!((session.recorded_secs() - 0.1).abs() < 1e-9);

        let asset = session.finish().unwrap();
        assert_eq!(asset.name(), RECORDED_ASSET_NAME);
        assert_eq!(asset.num_frames(), 9600);
    }

    #[test]
    fn test_capture_resamples_to_engine_rate() {
        let device = ScriptedDevice::new(24_000, vec![vec![0.0; 24_000]]);
        let mut session = CaptureSession::start(Box::new(device), 48_000).unwrap();
        session.pump().unwrap();
        let asset = session.finish().unwrap();
        assert_eq!(asset.buffer().sample_rate, 48_000);
        assert_eq!(asset.num_frames(), 48_000);
    }

    #[test]
    fn test_open_failures_surface_kind() {
        for kind in [
            DeviceFailure::PermissionDenied,
            DeviceFailure::Unavailable,
            DeviceFailure::Busy,
        ] {
            let err = CaptureSession::start(Box::new(ScriptedDevice::failing(kind)), 48_000)
                .unwrap_err();
            assert!(matches!(err, VocalError::Device { kind: k, .. } if k == kind));
        }
    }

    #[test]
    fn test_dropped_session_releases_device_once() {
        let device = ScriptedDevice::new(48_000, vec![vec![0.1; 480]]);
        let closes = Arc::clone(&device.close_calls);
        let mut session = CaptureSession::start(Box::new(device), 48_000).unwrap();
        session.pump().unwrap();
        drop(session);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let device = ScriptedDevice::new(48_000, Vec::new());
        let closes = Arc::clone(&device.close_calls);
        CaptureSession::start(Box::new(device), 48_000)
            .unwrap()
            .abort();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_final_read_keeps_partial_take() {
        let mut device = ScriptedDevice::new(48_000, vec![vec![0.3; 2400]]);
        device.read_failure = Some(DeviceFailure::Unavailable);
        let closes = Arc::clone(&device.close_calls);
        let mut session = CaptureSession::start(Box::new(device), 48_000).unwrap();
        session.pump().unwrap();

        let asset = session.finish().unwrap();
        assert_eq!(asset.num_frames(), 2400);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_pump_is_fine() {
        let device = ScriptedDevice::new(48_000, Vec::new());
        let mut session = CaptureSession::start(Box::new(device), 48_000).unwrap();
        assert!(session.pump().unwrap().is_empty());
        assert_eq!(session.finish().unwrap().num_frames(), 0);
    }
}
