//! Delay send
//!
//! Mono delay line with a feedback loop. Delay time and feedback are both
//! smoothed; the read head uses linear interpolation so ramping the time
//! does not click. Output is the wet (delayed) signal only.

use super::smoothing::SmoothedParam;

/// Longest supported delay in seconds
pub const MAX_DELAY_SECS: f32 = 2.0;

/// Feedback ceiling; 1.0 would ring forever
pub const MAX_FEEDBACK: f32 = 0.95;

/// Feedback delay line
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    sample_rate: f32,
    /// Circular buffer sized for `MAX_DELAY_SECS`
    buffer: Vec<f32>,
    write_pos: usize,
    time_secs: SmoothedParam,
    feedback: SmoothedParam,
}

impl FeedbackDelay {
    /// Create a delay with the given time (seconds) and feedback
    pub fn new(time_secs: f32, feedback: f32, sample_rate: u32, smoothing_secs: f32) -> Self {
        let size = (MAX_DELAY_SECS * sample_rate as f32) as usize + 2;
        Self {
            sample_rate: sample_rate as f32,
            buffer: vec![0.0; size],
            write_pos: 0,
            time_secs: SmoothedParam::new(clamp_time(time_secs), smoothing_secs, sample_rate),
            feedback: SmoothedParam::new(clamp_feedback(feedback), smoothing_secs, sample_rate),
        }
    }

    /// Retarget the delay time in seconds (0 to 2)
    pub fn set_time_secs(&mut self, time_secs: f32) {
        self.time_secs.set_target(clamp_time(time_secs));
    }

    /// Retarget the feedback amount (0 to 0.95)
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback.set_target(clamp_feedback(feedback));
    }

    /// Delay time the line is heading towards
    pub fn target_time_secs(&self) -> f32 {
        self.time_secs.target()
    }

    /// Feedback the line is heading towards
    pub fn target_feedback(&self) -> f32 {
        self.feedback.target()
    }

    /// Jump time and feedback to their targets
    pub fn snap_to_targets(&mut self) {
        self.time_secs.snap();
        self.feedback.snap();
    }

    /// Clear the delay line
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Feed one dry sample and return one delayed sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let delay_samples = (self.time_secs.next() * self.sample_rate)
            .clamp(1.0, (self.buffer.len() - 2) as f32);
        let feedback = self.feedback.next();

        let delayed = self.read_interpolated(delay_samples);
        self.buffer[self.write_pos] = input + delayed * feedback;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();

        delayed
    }

    #[inline]
    fn read_interpolated(&self, delay_samples: f32) -> f32 {
        let size = self.buffer.len();
        let whole = delay_samples.floor() as usize;
        let frac = delay_samples - whole as f32;

        let newer = (self.write_pos + size - whole) % size;
        let older = (self.write_pos + size - whole - 1) % size;
        self.buffer[newer] * (1.0 - frac) + self.buffer[older] * frac
    }
}

fn clamp_time(secs: f32) -> f32 {
    if secs.is_finite() {
        secs.clamp(0.0, MAX_DELAY_SECS)
    } else {
        0.0
    }
}

fn clamp_feedback(feedback: f32) -> f32 {
    if feedback.is_finite() {
        feedback.clamp(0.0, MAX_FEEDBACK)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_arrives_after_delay_time() {
        let mut delay = FeedbackDelay::new(0.01, 0.0, 48_000, 0.1);
        let mut outputs = vec![delay.process(1.0)];
        for _ in 0..1000 {
            outputs.push(delay.process(0.0));
        }
        let arrival = outputs.iter().position(|&s| s > 0.5).unwrap();
        assert_eq!(arrival, 480);
    }

    #[test]
    fn test_feedback_repeats_decay() {
        let mut delay = FeedbackDelay::new(0.01, 0.5, 48_000, 0.1);
        let mut outputs = vec![delay.process(1.0)];
        for _ in 0..1000 {
            outputs.push(delay.process(0.0));
        }
        assert!((outputs[480] - 1.0).abs() < 1e-6);
        assert!((outputs[960] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_parameters_are_clamped() {
        let mut delay = FeedbackDelay::new(5.0, 2.0, 48_000, 0.1);
        assert_eq!(delay.target_time_secs(), MAX_DELAY_SECS);
        assert_eq!(delay.target_feedback(), MAX_FEEDBACK);
        delay.set_time_secs(f32::NAN);
        assert_eq!(delay.target_time_secs(), 0.0);
    }

    #[test]
    fn test_reset_clears_line() {
        let mut delay = FeedbackDelay::new(0.001, 0.9, 48_000, 0.1);
        for _ in 0..500 {
            delay.process(1.0);
        }
        delay.reset();
        for _ in 0..500 {
            assert_eq!(delay.process(0.0), 0.0);
        }
    }
}
