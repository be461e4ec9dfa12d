//! Elapsed-time timers with randomized intervals.
//!
//! Timers advance only by the caller-supplied delta; nothing here reads a clock.

use fastrand::Rng;
use serde::{Deserialize, Serialize};

/// Randomizes `base` by up to `ratio` of itself in either direction.
///
/// The result lies in `[base - base * ratio, base + base * ratio]`, clamped at 0.
pub fn jitter(rng: &mut Rng, base: f32, ratio: f32) -> f32 {
    let spread = (base * ratio).abs();
    let low = (base - spread).max(0.0);
    let high = (base + spread).max(0.0);
    random_range(rng, low, high)
}

/// Uniform value in `[low, high)`; returns `low` for an empty range.
pub fn random_range(rng: &mut Rng, low: f32, high: f32) -> f32 {
    if high <= low {
        return low;
    }
    low + (high - low) * rng.f32()
}

/// A base duration plus the shaking ratio used to re-roll it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Jitter {
    /// Base value
    pub base: f32,
    /// Fractional randomization
    pub ratio: f32,
    /// Lower bound applied after randomization
    pub floor: f32,
}

impl Jitter {
    /// Creates a jitter with no floor beyond zero.
    #[must_use]
    pub const fn new(base: f32, ratio: f32) -> Self {
        Self {
            base,
            ratio,
            floor: 0.0,
        }
    }

    /// Sets the lower bound.
    #[must_use]
    pub const fn with_floor(mut self, floor: f32) -> Self {
        self.floor = floor;
        self
    }

    /// Draws a value.
    pub fn sample(&self, rng: &mut Rng) -> f32 {
        jitter(rng, self.base, self.ratio).max(self.floor)
    }
}

/// Countdown that fires once per interval.
///
/// With a [`Jitter`] attached, the interval is re-rolled every time it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTimer {
    elapsed: f32,
    interval: f32,
    jitter: Option<Jitter>,
}

impl UpdateTimer {
    /// Creates a timer with a fixed interval.
    #[must_use]
    pub const fn new(interval: f32) -> Self {
        Self {
            elapsed: 0.0,
            interval,
            jitter: None,
        }
    }

    /// Creates a timer whose interval is drawn from `jitter` now and on every fire.
    #[must_use]
    pub fn jittered(jitter: Jitter, rng: &mut Rng) -> Self {
        Self {
            elapsed: 0.0,
            interval: jitter.sample(rng),
            jitter: Some(jitter),
        }
    }

    /// Advances the timer. Returns true when the interval has elapsed.
    pub fn update(&mut self, dt: f32, rng: &mut Rng) -> bool {
        self.elapsed += dt;
        if self.elapsed < self.interval {
            return false;
        }
        self.elapsed = 0.0;
        if let Some(jitter) = self.jitter {
            self.interval = jitter.sample(rng);
        }
        true
    }

    /// Makes the next [`UpdateTimer::update`] fire.
    pub fn force(&mut self) {
        self.elapsed = self.interval;
    }

    /// Restarts the countdown with a new interval.
    pub fn init(&mut self, interval: f32) {
        self.elapsed = 0.0;
        self.interval = interval;
    }

    /// Current interval.
    #[must_use]
    pub const fn interval(&self) -> f32 {
        self.interval
    }

    /// Time accumulated since the last fire.
    #[must_use]
    pub const fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_timer_fires_once_per_interval() {
        let mut rng = Rng::with_seed(1);
        let mut timer = UpdateTimer::new(1.0);
        let fired = (0..25).filter(|_| timer.update(0.1, &mut rng)).count();
        assert_eq!(fired, 2);
    }

    #[test]
    fn test_timer_force_fires_next_update() {
        let mut rng = Rng::with_seed(1);
        let mut timer = UpdateTimer::new(10.0);
        assert!(!timer.update(0.01, &mut rng));
        timer.force();
        assert!(timer.update(0.0, &mut rng));
        assert!(!timer.update(0.01, &mut rng));
    }

    #[test]
    fn test_jittered_timer_rerolls_on_fire() {
        let mut rng = Rng::with_seed(7);
        let jitter = Jitter::new(1.0, 0.5);
        let mut timer = UpdateTimer::jittered(jitter, &mut rng);
        let mut intervals = vec![timer.interval()];
        for _ in 0..200 {
            if timer.update(0.05, &mut rng) {
                intervals.push(timer.interval());
            }
        }
        assert!(intervals.len() > 3);
        assert!(intervals.iter().all(|i| (0.5..=1.5).contains(i)));
        assert!(intervals.windows(2).any(|w| (w[0] - w[1]).abs() > f32::EPSILON));
    }

    #[test]
    fn test_jitter_floor() {
        let mut rng = Rng::with_seed(3);
        let jitter = Jitter::new(0.0, 0.3).with_floor(0.01);
        assert!((jitter.sample(&mut rng) - 0.01).abs() < f32::EPSILON);
    }

    proptest! {
        #[test]
        fn prop_jitter_within_bounds(seed in any::<u64>(), base in 0.0f32..100.0, ratio in 0.0f32..2.0) {
            let mut rng = Rng::with_seed(seed);
            let value = jitter(&mut rng, base, ratio);
            let low = (base - base * ratio).max(0.0);
            let high = base + base * ratio;
            prop_assert!(value >= low - 1e-4 && value <= high + 1e-4, "{value} not in [{low}, {high}]");
        }
    }
}
