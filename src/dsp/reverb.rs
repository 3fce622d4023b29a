//! Reverb send
//!
//! Mono Freeverb-style network:
//! - 8 parallel lowpass-feedback comb filters
//! - 4 series allpass filters for diffusion
//!
//! Comb feedback is derived from the preset decay time (RT60) so that each
//! comb falls by 60 dB over `decay_secs`. The network only produces the wet
//! signal; the graph scales it by the effective reverb wet level.

use super::smoothing::SmoothedParam;

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Reference sample rate for Freeverb delays
const REFERENCE_SAMPLE_RATE: f64 = 44100.0;

/// Comb filter delays at 44100 Hz (8 filters)
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delays at 44100 Hz (4 filters)
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Fixed gain for allpass filters (standard Freeverb value)
const ALLPASS_GAIN: f32 = 0.5;

/// Input attenuation ahead of the comb bank
const INPUT_GAIN: f32 = 0.015;

/// Output makeup after the allpass chain
const OUTPUT_GAIN: f32 = 3.0;

/// High-frequency damping in the comb feedback path
const DAMPING: f32 = 0.2;

/// Highest per-comb feedback; keeps the network stable for any decay
const MAX_FEEDBACK: f32 = 0.98;

/// Samples between feedback updates while the decay is ramping
const FEEDBACK_UPDATE_INTERVAL: u32 = 64;

// ============================================================================
// Filter Components
// ============================================================================

/// Low-pass comb filter
///
/// Implements: y[n] = x[n - delay] + feedback * lowpass(y[n - delay])
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    mask: usize,
    delay: usize,
    filter_state: f32,
    feedback: f32,
}

impl CombFilter {
    fn new(delay: usize) -> Self {
        // Power of two for mask wrapping
        let size = (delay + 1).next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
            delay,
            filter_state: 0.0,
            feedback: 0.0,
        }
    }

    /// Feedback that decays this comb by 60 dB over `decay_secs`
    fn set_decay(&mut self, decay_secs: f32, sample_rate: f32) {
        let loops = decay_secs * sample_rate / self.delay as f32;
        self.feedback = if loops > 0.0 {
            10.0_f32.powf(-3.0 / loops).min(MAX_FEEDBACK)
        } else {
            0.0
        };
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let read_pos = (self.write_pos + self.mask + 1 - self.delay) & self.mask;
        let output = self.buffer[read_pos];

        self.filter_state = output * (1.0 - DAMPING) + self.filter_state * DAMPING;
        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;
        self.write_pos = (self.write_pos + 1) & self.mask;

        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

/// Allpass filter for diffusion
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    mask: usize,
    delay: usize,
}

impl AllpassFilter {
    fn new(delay: usize) -> Self {
        let size = (delay + 1).next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
            delay,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let read_pos = (self.write_pos + self.mask + 1 - self.delay) & self.mask;
        let delayed = self.buffer[read_pos];

        let output = delayed - ALLPASS_GAIN * input;
        self.buffer[self.write_pos] = input + ALLPASS_GAIN * output;
        self.write_pos = (self.write_pos + 1) & self.mask;

        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

// ============================================================================
// Reverb
// ============================================================================

/// Persistent comb/allpass reverb producing a decaying wash
#[derive(Debug, Clone)]
pub struct Reverb {
    sample_rate: f32,
    decay_secs: SmoothedParam,
    combs: [CombFilter; 8],
    allpasses: [AllpassFilter; 4],
    countdown: u32,
}

impl Reverb {
    /// Create a reverb with delays scaled to `sample_rate`
    pub fn new(decay_secs: f32, sample_rate: u32, smoothing_secs: f32) -> Self {
        let scale = sample_rate as f64 / REFERENCE_SAMPLE_RATE;
        let scaled = |d: usize| ((d as f64 * scale).round() as usize).max(1);

        let mut reverb = Self {
            sample_rate: sample_rate as f32,
            decay_secs: SmoothedParam::new(
                decay_secs.clamp(0.1, 10.0),
                smoothing_secs,
                sample_rate,
            ),
            combs: COMB_DELAYS.map(|d| CombFilter::new(scaled(d))),
            allpasses: ALLPASS_DELAYS.map(|d| AllpassFilter::new(scaled(d))),
            countdown: 0,
        };
        reverb.update_feedback();
        reverb
    }

    /// Retarget the decay time in seconds (0.1 to 10)
    pub fn set_decay_secs(&mut self, decay_secs: f32) {
        self.decay_secs.set_target(decay_secs.clamp(0.1, 10.0));
    }

    /// Decay the network is heading towards
    pub fn target_decay_secs(&self) -> f32 {
        self.decay_secs.target()
    }

    /// Jump the decay to its target
    pub fn snap_to_targets(&mut self) {
        self.decay_secs.snap();
        self.update_feedback();
    }

    /// Silence the tail
    pub fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.clear();
        }
        for allpass in &mut self.allpasses {
            allpass.clear();
        }
    }

    /// Feed one dry sample and return one wet sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if !self.decay_secs.is_settled() {
            self.decay_secs.next();
            if self.countdown == 0 || self.decay_secs.is_settled() {
                self.update_feedback();
                self.countdown = FEEDBACK_UPDATE_INTERVAL;
            }
            self.countdown -= 1;
        }

        let scaled = input * INPUT_GAIN;
        let mut wet = 0.0;
        for comb in &mut self.combs {
            wet += comb.process(scaled);
        }
        for allpass in &mut self.allpasses {
            wet = allpass.process(wet);
        }
        wet * OUTPUT_GAIN
    }

    fn update_feedback(&mut self) {
        let decay = self.decay_secs.current();
        for comb in &mut self.combs {
            comb.set_decay(decay, self.sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energy_after_impulse(reverb: &mut Reverb, skip: usize, window: usize) -> f32 {
        reverb.process(1.0);
        for _ in 0..skip {
            reverb.process(0.0);
        }
        (0..window).map(|_| reverb.process(0.0).powi(2)).sum()
    }

    #[test]
    fn test_impulse_produces_tail() {
        let mut reverb = Reverb::new(1.5, 48_000, 0.1);
        let energy = energy_after_impulse(&mut reverb, 4_800, 4_800);
        assert!(energy > 0.0);
    }

    #[test]
    fn test_longer_decay_rings_longer() {
        let mut short = Reverb::new(0.5, 48_000, 0.1);
        let mut long = Reverb::new(3.0, 48_000, 0.1);
        let short_tail = energy_after_impulse(&mut short, 48_000, 4_800);
        let long_tail = energy_after_impulse(&mut long, 48_000, 4_800);
        assert!(long_tail > short_tail * 10.0);
    }

    #[test]
    fn test_reset_silences() {
        let mut reverb = Reverb::new(2.0, 48_000, 0.1);
        for _ in 0..1000 {
            reverb.process(0.5);
        }
        reverb.reset();
        assert_eq!(reverb.process(0.0), 0.0);
    }

    #[test]
    fn test_feedback_is_stable() {
        let mut reverb = Reverb::new(10.0, 48_000, 0.1);
        let mut peak: f32 = 0.0;
        for i in 0..96_000 {
            let x = if i < 48_000 { (i as f32 * 0.05).sin() } else { 0.0 };
            peak = peak.max(reverb.process(x).abs());
        }
        assert!(peak.is_finite() && peak < 10.0);
    }
}
