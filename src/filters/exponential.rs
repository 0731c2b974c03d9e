use super::{smoothing_factor, Smoother};
use nalgebra::Vector2;
use std::time::Duration;

/// Values that can be linearly blended toward a target
pub trait Blend: Copy {
    /// `self + (target - self) * t`
    #[must_use]
    fn blend(self, target: Self, t: f32) -> Self;
}

impl Blend for f32 {
    fn blend(self, target: Self, t: f32) -> Self {
        t.mul_add(target - self, self)
    }
}

impl Blend for Vector2<f32> {
    fn blend(self, target: Self, t: f32) -> Self {
        self + (target - self) * t
    }
}

/// Exponential smoothing toward a moving target with rate `k` per second.
///
/// The first target is returned unchanged so an overlay that appears does
/// not glide in from the origin.
#[derive(Debug, Clone)]
pub struct ExponentialSmoother<T> {
    rate: f32,
    value: Option<T>,
}

impl<T: Blend> ExponentialSmoother<T> {
    /// Create a new exponential smoother
    ///
    /// # Panics
    ///
    /// Panics if rate is not a positive finite number
    #[must_use]
    pub fn new(rate: f32) -> Self {
        assert!(rate.is_finite() && rate > 0.0, "Rate must be positive");
        Self { rate, value: None }
    }

    #[must_use]
    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl<T: Blend> Smoother for ExponentialSmoother<T> {
    type Value = T;

    fn apply(&mut self, target: T, dt: Duration) -> T {
        let next = match self.value {
            Some(last) => last.blend(target, smoothing_factor(self.rate, dt)),
            None => target,
        };
        self.value = Some(next);
        next
    }

    fn current(&self) -> Option<T> {
        self.value
    }

    fn reset(&mut self) {
        self.value = None;
    }

    fn name(&self) -> &str {
        "ExponentialSmoother"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn test_first_value_snaps() {
        let mut smoother = ExponentialSmoother::new(12.0);
        assert_eq!(smoother.apply(42.0_f32, FRAME), 42.0);
    }

    #[test]
    fn test_second_value_is_smoothed() {
        let mut smoother = ExponentialSmoother::new(12.0);
        smoother.apply(0.0_f32, FRAME);
        let v = smoother.apply(10.0, FRAME);
        let expected = 10.0 * smoothing_factor(12.0, FRAME);
        assert!((v - expected).abs() < 1e-5);
    }

    #[test]
    fn test_vector_position() {
        let mut smoother = ExponentialSmoother::new(12.0);
        smoother.apply(Vector2::new(0.0_f32, 0.0), FRAME);
        let v = smoother.apply(Vector2::new(100.0, -50.0), FRAME);
        assert!(v.x > 0.0 && v.x < 100.0);
        assert!(v.y < 0.0 && v.y > -50.0);
        // Both axes move by the same fraction
        assert!((v.x / 100.0 - v.y / -50.0).abs() < 1e-5);
    }

    #[test]
    fn test_reset() {
        let mut smoother = ExponentialSmoother::new(10.0);
        smoother.apply(1.0_f32, FRAME);
        smoother.reset();
        assert!(smoother.current().is_none());
        assert_eq!(smoother.apply(5.0, FRAME), 5.0);
    }

    #[test]
    #[should_panic(expected = "Rate must be positive")]
    fn test_zero_rate() {
        let _ = ExponentialSmoother::<f32>::new(0.0);
    }
}
