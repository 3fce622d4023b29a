//! Parameter smoothing
//!
//! Every audible parameter of the graph approaches its target with a one-pole
//! exponential curve: `v += (target - v) * (1 - exp(-1 / (tau * sr)))`.
//! After one time constant the value has covered ~63% of the distance.

/// Distance, relative to the target's magnitude (min 1), below which a
/// smoother snaps onto its target
const SETTLE_EPSILON: f32 = 1e-5;

/// A single exponentially smoothed parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    /// Per-sample approach coefficient
    coeff: f32,
}

impl SmoothedParam {
    /// Create a smoother resting at `initial`
    pub fn new(initial: f32, time_constant_secs: f32, sample_rate: u32) -> Self {
        let samples = time_constant_secs * sample_rate as f32;
        let coeff = if samples > 0.0 {
            1.0 - (-1.0 / samples).exp()
        } else {
            1.0
        };
        Self {
            current: initial,
            target: initial,
            coeff,
        }
    }

    /// Set a new target; the value starts moving on the next `next()` call
    pub fn set_target(&mut self, target: f32) {
        if target.is_finite() {
            self.target = target;
        }
    }

    /// Current target value
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Current (smoothed) value
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Whether the value has reached its target
    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    /// Jump directly to the target
    pub fn snap(&mut self) {
        self.current = self.target;
    }

    /// Advance one sample and return the new value
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.current != self.target {
            let previous = self.current;
            self.current += (self.target - self.current) * self.coeff;
            // A step below half an ulp leaves the value stuck short of target
            let tolerance = SETTLE_EPSILON * self.target.abs().max(1.0);
            if self.current == previous || (self.target - self.current).abs() < tolerance {
                self.current = self.target;
            }
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_one_time_constant_covers_63_percent() {
        let sr = 48_000;
        let mut param = SmoothedParam::new(0.0, 0.1, sr);
        param.set_target(1.0);
        for _ in 0..(sr / 10) {
            param.next();
        }
        assert_relative_eq!(param.current(), 1.0 - (-1.0f32).exp(), epsilon = 1e-3);
    }

    #[test]
    fn test_no_step_on_retarget() {
        let mut param = SmoothedParam::new(0.0, 0.1, 48_000);
        param.set_target(10.0);
        let first = param.next();
        assert!(first > 0.0 && first < 0.01);
    }

    #[test]
    fn test_monotonic_and_settles() {
        let mut param = SmoothedParam::new(5.0, 0.01, 48_000);
        param.set_target(-5.0);
        let mut previous = param.current();
        for _ in 0..48_000 {
            let value = param.next();
            assert!(value <= previous);
            previous = value;
        }
        assert!(param.is_settled());
        assert_eq!(param.current(), -5.0);
    }

    #[test]
    fn test_large_values_reach_target() {
        let mut param = SmoothedParam::new(80.0, 0.1, 48_000);
        param.set_target(90.0);
        for _ in 0..48_000 * 3 {
            param.next();
        }
        assert!(param.is_settled());
        assert_eq!(param.current(), 90.0);

        let mut cutoff = SmoothedParam::new(20.0, 0.1, 48_000);
        cutoff.set_target(8000.0);
        for _ in 0..48_000 * 3 {
            cutoff.next();
        }
        assert_eq!(cutoff.current(), 8000.0);
    }

    #[test]
    fn test_non_finite_target_ignored() {
        let mut param = SmoothedParam::new(1.0, 0.1, 48_000);
        param.set_target(f32::NAN);
        assert_eq!(param.target(), 1.0);
        param.snap();
        assert_eq!(param.current(), 1.0);
    }
}
