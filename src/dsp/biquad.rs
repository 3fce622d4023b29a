//! Biquad filter stage
//!
//! Second-order IIR filter used for the high-pass, the three EQ bands and
//! the presence boost. Coefficients follow the Audio EQ Cookbook and are
//! recomputed at a reduced control rate while cutoff or gain is ramping.

use std::f64::consts::PI;

use super::smoothing::SmoothedParam;

/// Samples between coefficient updates while a parameter is moving
const COEFF_UPDATE_INTERVAL: u32 = 16;

/// Filter response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Bell curve boost/cut
    Peak,
    /// Boost/cut above frequency
    HighShelf,
    /// Remove below frequency
    HighPass,
}

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (a0 + a1*z^-1 + a2*z^-2)
/// Normalized: all coefficients divided by a0
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl BiquadCoeffs {
    /// Calculate biquad coefficients using Audio EQ Cookbook formulas
    /// Reference: https://www.w3.org/2011/audio/audio-eq-cookbook.html
    fn calculate(
        filter_type: FilterType,
        sample_rate: f64,
        frequency: f64,
        gain_db: f64,
        q: f64,
    ) -> Self {
        // Clamp frequency to valid range (below Nyquist)
        let freq = frequency.clamp(10.0, sample_rate / 2.0 - 1.0);
        let q = q.clamp(0.1, 10.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        let a = (10.0_f64).powf(gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Peak => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::HighShelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Direct Form I delay state
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Mono biquad filter with smoothed cutoff and gain
#[derive(Debug, Clone)]
pub struct Biquad {
    filter_type: FilterType,
    sample_rate: f64,
    q: f64,
    frequency: SmoothedParam,
    gain_db: SmoothedParam,
    coeffs: BiquadCoeffs,
    state: BiquadState,
    /// Samples until the next coefficient refresh
    countdown: u32,
}

impl Biquad {
    /// Create a filter resting at the given cutoff and gain
    pub fn new(
        filter_type: FilterType,
        frequency: f32,
        gain_db: f32,
        q: f32,
        sample_rate: u32,
        smoothing_secs: f32,
    ) -> Self {
        let mut filter = Self {
            filter_type,
            sample_rate: sample_rate as f64,
            q: q as f64,
            frequency: SmoothedParam::new(frequency, smoothing_secs, sample_rate),
            gain_db: SmoothedParam::new(gain_db, smoothing_secs, sample_rate),
            coeffs: BiquadCoeffs::default(),
            state: BiquadState::default(),
            countdown: 0,
        };
        filter.update_coefficients();
        filter
    }

    /// Retarget the cutoff/center frequency in Hz
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency.set_target(frequency);
    }

    /// Retarget the gain in dB (ignored by the high-pass)
    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain_db.set_target(gain_db);
    }

    /// Cutoff frequency the filter is heading towards
    pub fn target_frequency(&self) -> f32 {
        self.frequency.target()
    }

    /// Gain the filter is heading towards
    pub fn target_gain_db(&self) -> f32 {
        self.gain_db.target()
    }

    /// Jump both parameters to their targets
    pub fn snap_to_targets(&mut self) {
        self.frequency.snap();
        self.gain_db.snap();
        self.update_coefficients();
    }

    /// Clear the filter history without touching parameters
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Filter a single sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if !(self.frequency.is_settled() && self.gain_db.is_settled()) {
            self.frequency.next();
            self.gain_db.next();
            if self.countdown == 0 {
                self.update_coefficients();
                self.countdown = COEFF_UPDATE_INTERVAL;
            }
            self.countdown -= 1;
            // Land exactly on the final coefficients once settled
            if self.frequency.is_settled() && self.gain_db.is_settled() {
                self.update_coefficients();
                self.countdown = 0;
            }
        }
        self.state.process(input as f64, &self.coeffs) as f32
    }

    fn update_coefficients(&mut self) {
        self.coeffs = BiquadCoeffs::calculate(
            self.filter_type,
            self.sample_rate,
            self.frequency.current() as f64,
            self.gain_db.current() as f64,
            self.q,
        );
    }
}
