//! Exponential approach math
//!
//! A channel that chases a piecewise-constant target follows first-order
//! decay: `x(t) = target + (x(t0) - target) * exp(-t / τ)`. The closed form is
//! evaluated directly for whatever elapsed time a tick covers, so the result
//! after a fixed wall-clock duration does not depend on how that duration was
//! sliced into ticks.
//!
//! Animation constants are usually tuned as "move a fraction `f` of the
//! remaining distance per frame" at some reference frame duration. That
//! tuning is converted once into a time constant:
//!
//! ```text
//! τ = -ref_dt / ln(1 - f_ref)        f(dt) = 1 - exp(-dt / τ)
//! ```

use crate::{ThaError, ThaResult};

/// Characteristic decay time τ of an exponential approach, in seconds.
/// τ = 0 means "snap to target on any positive elapsed time".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeConstant {
    tau: f64,
}

impl TimeConstant {
    /// Snap immediately
    pub const INSTANT: TimeConstant = TimeConstant { tau: 0.0 };

    pub fn from_secs(tau: f64) -> ThaResult<Self> {
        if !tau.is_finite() || tau < 0.0 {
            return Err(ThaError::config(format!(
                "time constant must be finite and non-negative, got {tau}"
            )));
        }
        Ok(Self { tau })
    }

    /// Equivalent time constant of a per-frame fractional step `step` tuned
    /// at frame duration `reference_dt`.
    pub fn from_reference_step(step: f64, reference_dt: f64) -> ThaResult<Self> {
        if !(step > 0.0 && step <= 1.0) {
            return Err(ThaError::OutOfRange {
                what: "interpolation step".into(),
                value: step,
                min: f64::MIN_POSITIVE,
                max: 1.0,
            });
        }
        if !(reference_dt.is_finite() && reference_dt > 0.0) {
            return Err(ThaError::config(format!(
                "reference frame duration must be positive, got {reference_dt}"
            )));
        }
        if step == 1.0 {
            return Ok(Self::INSTANT);
        }
        Ok(Self {
            tau: -reference_dt / (-step).ln_1p(),
        })
    }

    #[inline]
    pub fn as_secs(&self) -> f64 {
        self.tau
    }

    /// Fraction of the remaining distance still left after `dt` seconds
    #[inline]
    pub fn decay(&self, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 1.0;
        }
        if self.tau == 0.0 {
            return 0.0;
        }
        (-dt / self.tau).exp()
    }

    /// Fraction of the remaining distance covered in `dt` seconds
    #[inline]
    pub fn step_fraction(&self, dt: f64) -> f64 {
        1.0 - self.decay(dt)
    }

    /// Move `current` toward `target` over `dt` seconds
    #[inline]
    pub fn approach(&self, current: f32, target: f32, dt: f64) -> f32 {
        let remaining = (current - target) as f64 * self.decay(dt);
        (target as f64 + remaining) as f32
    }
}

/// Poisson event rate, for "probability per frame" tunings that must not
/// depend on the frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRate {
    per_sec: f64,
}

impl EventRate {
    pub const NEVER: EventRate = EventRate { per_sec: 0.0 };

    /// `per_sec` expected events per second; zero, negative or NaN never fires
    pub fn per_second(per_sec: f64) -> Self {
        if per_sec.is_nan() || per_sec <= 0.0 {
            Self::NEVER
        } else {
            Self { per_sec }
        }
    }

    /// Rate whose per-tick probability at `reference_dt` equals `probability`
    pub fn from_reference_probability(probability: f64, reference_dt: f64) -> ThaResult<Self> {
        ThaError::check_range("event probability", probability, 0.0, 1.0)?;
        if !(reference_dt.is_finite() && reference_dt > 0.0) {
            return Err(ThaError::config(format!(
                "reference frame duration must be positive, got {reference_dt}"
            )));
        }
        let per_sec = if probability == 1.0 {
            f64::INFINITY
        } else {
            -(-probability).ln_1p() / reference_dt
        };
        Ok(Self { per_sec })
    }

    pub fn per_sec(&self) -> f64 {
        self.per_sec
    }

    /// Probability of at least one event within `dt` seconds
    pub fn probability(&self, dt: f64) -> f64 {
        if dt <= 0.0 || self.per_sec == 0.0 {
            return 0.0;
        }
        if self.per_sec.is_infinite() {
            return 1.0;
        }
        -(-self.per_sec * dt).exp_m1()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reference_step_roundtrip() {
        let tc = TimeConstant::from_reference_step(0.1, 0.04).unwrap();
        // One reference frame covers exactly the tuned fraction
        assert!((tc.step_fraction(0.04) - 0.1).abs() < 1e-12);
        // Two reference frames cover 1 - 0.9^2
        assert!((tc.step_fraction(0.08) - 0.19).abs() < 1e-12);
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let tc = TimeConstant::from_secs(0.5).unwrap();
        assert_eq!(tc.approach(0.8, 0.0, 0.0), 0.8);
        assert_eq!(TimeConstant::INSTANT.approach(0.8, 0.0, 0.0), 0.8);
    }

    #[test]
    fn test_infinite_dt_snaps() {
        let tc = TimeConstant::from_secs(0.5).unwrap();
        assert_eq!(tc.approach(0.8, 0.25, f64::INFINITY), 0.25);
        assert_eq!(TimeConstant::INSTANT.approach(0.8, 0.25, 1e-6), 0.25);
    }

    #[test]
    fn test_full_step_is_instant() {
        let tc = TimeConstant::from_reference_step(1.0, 0.04).unwrap();
        assert_eq!(tc, TimeConstant::INSTANT);
    }

    #[test]
    fn test_invalid_constants() {
        assert!(TimeConstant::from_reference_step(0.0, 0.04).is_err());
        assert!(TimeConstant::from_reference_step(1.2, 0.04).is_err());
        assert!(TimeConstant::from_reference_step(0.1, 0.0).is_err());
        assert!(TimeConstant::from_secs(-1.0).is_err());
        assert!(TimeConstant::from_secs(f64::NAN).is_err());
    }

    #[test]
    fn test_event_rate() {
        let rate = EventRate::from_reference_probability(0.03, 0.04).unwrap();
        assert!((rate.probability(0.04) - 0.03).abs() < 1e-12);
        assert_eq!(rate.probability(0.0), 0.0);
        // Two reference ticks: 1 - 0.97^2
        assert!((rate.probability(0.08) - (1.0 - 0.97f64.powi(2))).abs() < 1e-12);

        assert_eq!(EventRate::NEVER.probability(10.0), 0.0);
        let always = EventRate::from_reference_probability(1.0, 0.04).unwrap();
        assert_eq!(always.probability(0.001), 1.0);
        assert!(EventRate::from_reference_probability(1.5, 0.04).is_err());
    }

    proptest! {
        #[test]
        fn prop_decay_is_timestep_additive(
            tau in 0.01f64..5.0,
            dt in 0.0001f64..0.5,
            n in 1usize..200,
            start in -1.0f32..1.0,
            target in -1.0f32..1.0,
        ) {
            let tc = TimeConstant::from_secs(tau).unwrap();
            let mut sliced = start;
            for _ in 0..n {
                sliced = tc.approach(sliced, target, dt);
            }
            let single = tc.approach(start, target, dt * n as f64);
            prop_assert!((sliced - single).abs() < 1e-4);
        }

        #[test]
        fn prop_approach_never_overshoots(
            tau in 0.0f64..5.0,
            dt in 0.0f64..100.0,
            start in -1.0f32..1.0,
            target in -1.0f32..1.0,
        ) {
            let tc = TimeConstant::from_secs(tau).unwrap();
            let next = tc.approach(start, target, dt);
            let (lo, hi) = if start < target { (start, target) } else { (target, start) };
            prop_assert!(next >= lo - 1e-6 && next <= hi + 1e-6);
        }
    }
}
