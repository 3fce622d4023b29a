//! Compressor stage
//!
//! Feed-forward peak compressor with a soft knee. Threshold, ratio, attack
//! and release all ramp with the graph's smoothing.

use super::smoothing::SmoothedParam;
use crate::engine::buffer::{db_to_linear, linear_to_db};

/// Knee width in dB (the usual browser compressor default)
pub const KNEE_DB: f32 = 30.0;

/// Samples between envelope coefficient refreshes while times ramp
const TIME_UPDATE_INTERVAL: u32 = 16;

/// Mono dynamics compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    sample_rate: f32,
    threshold_db: SmoothedParam,
    ratio: SmoothedParam,
    attack_secs: SmoothedParam,
    release_secs: SmoothedParam,
    /// Attack coefficient for gain smoothing
    attack_coeff: f32,
    /// Release coefficient for gain smoothing
    release_coeff: f32,
    countdown: u32,
    /// Current gain (linear, 1.0 = no reduction)
    gain: f32,
}

impl Compressor {
    /// Create a compressor with the given initial settings
    pub fn new(
        threshold_db: f32,
        ratio: f32,
        attack_secs: f32,
        release_secs: f32,
        sample_rate: u32,
        smoothing_secs: f32,
    ) -> Self {
        let mut comp = Self {
            sample_rate: sample_rate as f32,
            threshold_db: SmoothedParam::new(
                threshold_db.clamp(-100.0, 0.0),
                smoothing_secs,
                sample_rate,
            ),
            ratio: SmoothedParam::new(ratio.clamp(1.0, 20.0), smoothing_secs, sample_rate),
            attack_secs: SmoothedParam::new(sanitize_time(attack_secs), smoothing_secs, sample_rate),
            release_secs: SmoothedParam::new(
                sanitize_time(release_secs),
                smoothing_secs,
                sample_rate,
            ),
            attack_coeff: 0.0,
            release_coeff: 0.0,
            countdown: 0,
            gain: 1.0,
        };
        comp.update_time_coeffs();
        comp
    }

    /// Retarget threshold in dBFS
    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.threshold_db.set_target(threshold_db.clamp(-100.0, 0.0));
    }

    /// Retarget compression ratio (1:1 to 20:1)
    pub fn set_ratio(&mut self, ratio: f32) {
        self.ratio.set_target(ratio.clamp(1.0, 20.0));
    }

    /// Retarget attack and release in seconds (0 to 1)
    pub fn set_times(&mut self, attack_secs: f32, release_secs: f32) {
        self.attack_secs.set_target(sanitize_time(attack_secs));
        self.release_secs.set_target(sanitize_time(release_secs));
    }

    /// Current target threshold
    pub fn target_threshold_db(&self) -> f32 {
        self.threshold_db.target()
    }

    /// Current target ratio
    pub fn target_ratio(&self) -> f32 {
        self.ratio.target()
    }

    /// Attack and release targets
    pub fn target_times(&self) -> (f32, f32) {
        (self.attack_secs.target(), self.release_secs.target())
    }

    /// Attack and release currently in effect
    pub fn times(&self) -> (f32, f32) {
        (self.attack_secs.current(), self.release_secs.current())
    }

    /// Current gain reduction in dB (negative when compressing)
    pub fn gain_reduction_db(&self) -> f32 {
        linear_to_db(self.gain)
    }

    /// Jump every parameter to its target
    pub fn snap_to_targets(&mut self) {
        self.threshold_db.snap();
        self.ratio.snap();
        self.attack_secs.snap();
        self.release_secs.snap();
        self.update_time_coeffs();
    }

    /// Release any gain reduction
    pub fn reset(&mut self) {
        self.gain = 1.0;
    }

    /// Compress a single sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let threshold = self.threshold_db.next();
        let ratio = self.ratio.next();
        self.advance_times();

        let input_db = linear_to_db(input.abs());
        let target_gain = db_to_linear(compute_gain_reduction_db(input_db, threshold, ratio));

        self.gain = if target_gain < self.gain {
            // Attacking (gain going down)
            self.attack_coeff * self.gain + (1.0 - self.attack_coeff) * target_gain
        } else {
            // Releasing (gain going up)
            self.release_coeff * self.gain + (1.0 - self.release_coeff) * target_gain
        };

        input * self.gain
    }

    #[inline]
    fn advance_times(&mut self) {
        if self.attack_secs.is_settled() && self.release_secs.is_settled() {
            return;
        }
        self.attack_secs.next();
        self.release_secs.next();
        if self.countdown == 0 {
            self.update_time_coeffs();
            self.countdown = TIME_UPDATE_INTERVAL;
        }
        self.countdown -= 1;
        if self.attack_secs.is_settled() && self.release_secs.is_settled() {
            self.update_time_coeffs();
            self.countdown = 0;
        }
    }

    fn update_time_coeffs(&mut self) {
        self.attack_coeff = time_coeff(self.attack_secs.current(), self.sample_rate);
        self.release_coeff = time_coeff(self.release_secs.current(), self.sample_rate);
    }
}

fn sanitize_time(secs: f32) -> f32 {
    if secs.is_finite() {
        secs.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// One-pole coefficient: exp(-1 / time_in_samples)
fn time_coeff(secs: f32, sample_rate: f32) -> f32 {
    let samples = secs * sample_rate;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}

/// Static gain computer; returns gain reduction in dB (<= 0)
///
/// Quadratic soft knee of width `KNEE_DB` centred on the threshold; the
/// curve and its slope are continuous at both knee edges.
fn compute_gain_reduction_db(input_db: f32, threshold: f32, ratio: f32) -> f32 {
    let half_knee = KNEE_DB / 2.0;
    let over = input_db - threshold;
    let slope = 1.0 / ratio - 1.0;

    if over <= -half_knee {
        0.0
    } else if over >= half_knee {
        slope * over
    } else {
        let into_knee = over + half_knee;
        slope * into_knee * into_knee / (2.0 * KNEE_DB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gain_computer_regions() {
        // Well below knee
        assert_eq!(compute_gain_reduction_db(-60.0, -24.0, 4.0), 0.0);
        // Well above knee: 4:1 above -24 dB
        assert_relative_eq!(
            compute_gain_reduction_db(0.0, -24.0, 4.0),
            -18.0,
            epsilon = 1e-4
        );
        // Inside knee: some but not full reduction
        let gr = compute_gain_reduction_db(-24.0, -24.0, 4.0);
        assert!(gr < 0.0 && gr > -10.0);
    }

    #[test]
    fn test_unity_ratio_is_transparent() {
        assert_eq!(compute_gain_reduction_db(0.0, -24.0, 1.0), 0.0);
    }

    #[test]
    fn test_loud_signal_is_reduced() {
        let mut comp = Compressor::new(-24.0, 4.0, 0.005, 0.1, 48_000, 0.1);
        let mut last = 0.0;
        for i in 0..4800 {
            last = comp.process(if i % 2 == 0 { 0.9 } else { -0.9 });
        }
        assert!(last.abs() < 0.5, "output {}", last);
        assert!(comp.gain_reduction_db() < -6.0);
    }

    #[test]
    fn test_quiet_signal_passes() {
        let mut comp = Compressor::new(-24.0, 4.0, 0.005, 0.1, 48_000, 0.1);
        let mut out = 0.0;
        for _ in 0..4800 {
            out = comp.process(0.001);
        }
        assert_relative_eq!(out, 0.001, epsilon = 1e-6);
    }

    #[test]
    fn test_times_are_clamped() {
        let mut comp = Compressor::new(-24.0, 4.0, 0.01, 0.1, 48_000, 0.1);
        comp.set_times(5.0, f32::NAN);
        assert_eq!(comp.target_times(), (1.0, 0.0));
    }

    #[test]
    fn test_static_curve_is_continuous_and_monotonic_across_knee() {
        let (threshold, ratio) = (-21.0, 3.5);
        let knee_start = threshold - KNEE_DB / 2.0;
        let output = |x: f32| x + compute_gain_reduction_db(x, threshold, ratio);

        let mut previous = output(knee_start - 1.0);
        let mut x = knee_start - 1.0;
        while x <= knee_start + KNEE_DB + 1.0 {
            let y = output(x);
            assert!(y >= previous - 1e-4, "output fell at {} dB", x);
            assert!((y - previous).abs() < 0.1, "curve jumps at {} dB", x);
            previous = y;
            x += 0.01;
        }

        // Edges meet the straight segments
        assert_relative_eq!(compute_gain_reduction_db(knee_start, threshold, ratio), 0.0);
        let knee_end = threshold + KNEE_DB / 2.0;
        assert_relative_eq!(
            compute_gain_reduction_db(knee_end, threshold, ratio),
            (1.0 / ratio - 1.0) * KNEE_DB / 2.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_moderate_peak_follows_knee_not_full_ratio() {
        // -6 dBFS at Pop settings sits inside the knee
        let gr = compute_gain_reduction_db(-6.0, -21.0, 3.5);
        let expected = (1.0 / 3.5 - 1.0) * 30.0 * 30.0 / 60.0;
        assert_relative_eq!(gr, expected, epsilon = 1e-4);
        assert!(gr > -11.0);
    }

    #[test]
    fn test_times_ramp_instead_of_jumping() {
        let mut comp = Compressor::new(-24.0, 4.0, 0.01, 0.1, 48_000, 0.1);
        comp.set_times(0.05, 0.3);
        comp.process(0.0);
        let (attack, release) = comp.times();
        assert!(attack > 0.01 && attack < 0.011);
        assert!(release > 0.1 && release < 0.101);

        for _ in 0..96_000 {
            comp.process(0.0);
        }
        assert_eq!(comp.times(), (0.05, 0.3));
    }

    #[test]
    fn test_retarget_reports_targets() {
        let mut comp = Compressor::new(-24.0, 4.0, 0.01, 0.1, 48_000, 0.1);
        comp.set_threshold_db(-18.0);
        comp.set_ratio(30.0);
        assert_eq!(comp.target_threshold_db(), -18.0);
        assert_eq!(comp.target_ratio(), 20.0);
        comp.snap_to_targets();
        assert_eq!(comp.target_times(), comp.times());
    }
}
