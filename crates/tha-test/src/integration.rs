//! End-to-end scenarios - full driver pipeline on simulated and real time

use std::time::Duration;

use tha_core::{PoseVector, ThaError, ThaResult};
use tha_effects::{EffectSpec, Frame};
use tha_pose::EmotionLibrary;
use tha_runtime::{AnimatorConfig, FrameDriver, InferenceAdapter};

use crate::{extreme_library, still_config, PoseProbeAdapter, Simulation, TickPattern};

/// Hold `surprised` until converged, switch to neutral, and return the
/// interpolated pose after `seconds` more at `fps`
pub fn relax_from_surprised(fps: f64, seconds: f64) -> ThaResult<PoseVector> {
    let driver = FrameDriver::new(
        still_config(),
        extreme_library()?,
        PoseProbeAdapter::default(),
        11,
    )?;
    let control = driver.control();
    let mut sim = Simulation::new(driver, TickPattern::fixed(1.0), 0);

    control.set_emotion("surprised", std::iter::empty::<(&str, f32)>())?;
    // Single long ticks saturate the approach
    sim.run_for(Duration::from_secs(120))?;

    control.set_emotion("neutral", std::iter::empty::<(&str, f32)>())?;
    sim.set_pattern(TickPattern::fixed(fps));
    sim.run_for(Duration::from_secs_f64(seconds))?;
    Ok(*sim.driver().interpolator().current())
}

/// The frame a probe adapter renders for `pose` with nothing applied after it
pub fn probe_frame(pose: &PoseVector, height: usize) -> Frame {
    match PoseProbeAdapter::new(height).render(pose) {
        Ok(frame) => frame,
        Err(_) => Frame::new(0, 0),
    }
}

/// Total simulated seconds per blink over a run of `seconds`
pub fn mean_blink_interval(config: AnimatorConfig, seed: u64, seconds: f64) -> ThaResult<f64> {
    let driver = FrameDriver::new(
        config,
        EmotionLibrary::builtin(),
        PoseProbeAdapter::default(),
        seed,
    )?;
    let mut sim = Simulation::new(driver, TickPattern::fixed(25.0), seed);
    sim.run_for(Duration::from_secs_f64(seconds))?;
    let blinks = sim.driver().motion().blink().blink_count();
    if blinks == 0 {
        return Err(ThaError::config("no blinks in simulated run"));
    }
    Ok(seconds / blinks as f64)
}
