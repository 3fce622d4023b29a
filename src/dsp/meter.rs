//! Master bus metering
//!
//! [`MeterTap`] is written by the render context, one mono sample per frame,
//! into a lock-free ring of atomics. [`SpectrumAnalyser`] runs on the control
//! side: it copies the latest window out of the tap, applies a Hann window,
//! runs a forward FFT and folds the result into [`METER_BINS`] bars in
//! `0.0..=1.0`. All scratch space is allocated up front.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// FFT length and tap window
pub const FFT_SIZE: usize = 2048;

/// Number of magnitude bars in a snapshot
pub const METER_BINS: usize = 64;

/// Bottom of the displayed range
const MIN_DB: f32 = -100.0;

/// Top of the displayed range
const MAX_DB: f32 = -30.0;

/// Weight of the previous frame when averaging snapshots
const TIME_SMOOTHING: f32 = 0.8;

/// Ring of the most recent master-bus samples
#[derive(Debug)]
pub struct MeterTap {
    ring: Box<[AtomicU32]>,
    /// Total samples ever written
    written: AtomicUsize,
}

impl MeterTap {
    /// Create an empty tap holding `FFT_SIZE` samples
    pub fn new() -> Self {
        Self {
            ring: (0..FFT_SIZE).map(|_| AtomicU32::new(0)).collect(),
            written: AtomicUsize::new(0),
        }
    }

    /// Record one sample (real-time safe)
    #[inline]
    pub fn push(&self, sample: f32) {
        let index = self.written.load(Ordering::Relaxed) % FFT_SIZE;
        self.ring[index].store(sample.to_bits(), Ordering::Relaxed);
        self.written.fetch_add(1, Ordering::Release);
    }

    /// Number of samples recorded so far
    pub fn samples_written(&self) -> usize {
        self.written.load(Ordering::Acquire)
    }

    /// Copy the latest samples into `out`, oldest first
    ///
    /// A concurrent writer may tear the window by a few samples; the
    /// visualizer tolerates that.
    pub fn copy_latest(&self, out: &mut [f32]) {
        let written = self.written.load(Ordering::Acquire);
        let len = out.len().min(FFT_SIZE);
        let start = written.wrapping_sub(len);
        for (i, slot) in out.iter_mut().take(len).enumerate() {
            *slot = if written < len && i < len - written {
                0.0
            } else {
                let index = start.wrapping_add(i) % FFT_SIZE;
                f32::from_bits(self.ring[index].load(Ordering::Relaxed))
            };
        }
    }

    /// Forget everything recorded
    pub fn clear(&self) {
        for slot in self.ring.iter() {
            slot.store(0, Ordering::Relaxed);
        }
        self.written.store(0, Ordering::Release);
    }
}

impl Default for MeterTap {
    fn default() -> Self {
        Self::new()
    }
}

/// FFT magnitude analyser for the visualizer
pub struct SpectrumAnalyser {
    tap: Arc<MeterTap>,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    time: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Smoothed per-FFT-bin magnitudes
    smoothed: Vec<f32>,
    bars: Vec<f32>,
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("bars", &self.bars)
            .finish_non_exhaustive()
    }
}

impl SpectrumAnalyser {
    /// Create an analyser reading from `tap`
    pub fn new(tap: Arc<MeterTap>) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let scratch_len = fft.get_inplace_scratch_len();

        let window = (0..FFT_SIZE)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32).cos())
            })
            .collect();

        Self {
            tap,
            fft,
            window,
            time: vec![0.0; FFT_SIZE],
            spectrum: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            smoothed: vec![0.0; FFT_SIZE / 2],
            bars: vec![0.0; METER_BINS],
        }
    }

    /// Analyse the latest tap window and return the bar magnitudes
    pub fn snapshot(&mut self) -> &[f32] {
        self.tap.copy_latest(&mut self.time);

        for ((slot, &sample), &w) in self.spectrum.iter_mut().zip(&self.time).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let norm = 1.0 / FFT_SIZE as f32;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.spectrum) {
            let magnitude = bin.norm() * norm;
            *smoothed = TIME_SMOOTHING * *smoothed + (1.0 - TIME_SMOOTHING) * magnitude;
        }

        let per_bar = self.smoothed.len() / METER_BINS;
        for (bar, chunk) in self.bars.iter_mut().zip(self.smoothed.chunks(per_bar)) {
            let mean = chunk.iter().sum::<f32>() / chunk.len() as f32;
            let db = if mean > 0.0 {
                20.0 * mean.log10()
            } else {
                MIN_DB
            };
            *bar = ((db - MIN_DB) / (MAX_DB - MIN_DB)).clamp(0.0, 1.0);
        }

        &self.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_latest_orders_oldest_first() {
        let tap = MeterTap::new();
        for i in 0..(FFT_SIZE + 10) {
            tap.push(i as f32);
        }
        let mut out = vec![0.0; 4];
        tap.copy_latest(&mut out);
        let last = (FFT_SIZE + 9) as f32;
        assert_eq!(out, vec![last - 3.0, last - 2.0, last - 1.0, last]);
    }

    #[test]
    fn test_partial_fill_pads_with_silence() {
        let tap = MeterTap::new();
        tap.push(1.0);
        tap.push(2.0);
        let mut out = vec![9.0; 4];
        tap.copy_latest(&mut out);
        assert_eq!(out, vec![0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_silence_gives_zero_bars() {
        let mut analyser = SpectrumAnalyser::new(Arc::new(MeterTap::new()));
        let bars = analyser.snapshot();
        assert_eq!(bars.len(), METER_BINS);
        assert!(bars.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_tone_lights_its_bar() {
        let tap = Arc::new(MeterTap::new());
        let sr = 48_000.0;
        // Centre of bar 4: FFT bins 64..80, about 1.5-1.9 kHz
        let freq = 72.0 * sr / FFT_SIZE as f32;
        for i in 0..FFT_SIZE {
            tap.push(0.8 * (2.0 * std::f32::consts::PI * freq * i as f32 / sr).sin());
        }
        let mut analyser = SpectrumAnalyser::new(tap);
        let mut bars = Vec::new();
        for _ in 0..20 {
            bars = analyser.snapshot().to_vec();
        }
        let loudest = bars
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, 4);
        assert!(bars.iter().all(|b| (0.0..=1.0).contains(b)));
    }
}
