//! Filter implementations
//!
//! One [`Filter`] instance per entry of an effect spec. Filters that animate
//! keep their own clocks and random streams, seeded by the chain.

mod alpha;
mod bloom;
mod crt;
mod glitch;
mod lens;
mod noise;

pub use alpha::{AlphaNoise, Translucency};
pub use bloom::Bloom;
pub use crt::{Banding, Desaturate, Scanlines};
pub use glitch::DigitalGlitches;
pub use lens::{ChromaticAberration, Vignetting};
pub use noise::Noise;

use crate::{FilterSpec, Frame};

/// An image-space postprocessing step
pub trait Filter: Send {
    /// Filter identifier
    fn name(&self) -> &'static str;

    /// Process `frame` in place. `dt` is the time since the previous frame.
    fn apply(&mut self, frame: &mut Frame, dt: f64);

    /// Forget animation state
    fn reset(&mut self) {}
}

/// Instantiate the filter described by `spec`
pub fn build(spec: &FilterSpec, seed: u64) -> Box<dyn Filter> {
    match spec {
        FilterSpec::Bloom(p) => Box::new(Bloom::new(p.clone())),
        FilterSpec::ChromaticAberration(p) => Box::new(ChromaticAberration::new(p.clone())),
        FilterSpec::Vignetting(p) => Box::new(Vignetting::new(p.clone())),
        FilterSpec::Translucency(p) => Box::new(Translucency::new(p.clone())),
        FilterSpec::Alphanoise(p) => Box::new(AlphaNoise::new(p.clone(), seed)),
        FilterSpec::Noise(p) => Box::new(Noise::new(p.clone(), seed)),
        FilterSpec::Scanlines(p) => Box::new(Scanlines::new(p.clone())),
        FilterSpec::Desaturate(p) => Box::new(Desaturate::new(p.clone())),
        FilterSpec::Banding(p) => Box::new(Banding::new(p.clone())),
        FilterSpec::DigitalGlitches(p) => Box::new(DigitalGlitches::new(p.clone(), seed)),
    }
}

/// Normalized 1D Gaussian kernel, radius ⌈3σ⌉
pub(crate) fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (3.0 * sigma).ceil() as i32;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Separable Gaussian blur of a single-channel plane, edges clamped
pub(crate) fn blur_plane(plane: &mut [f32], width: usize, height: usize, kernel: &[f32]) {
    if kernel.len() <= 1 || plane.is_empty() {
        return;
    }
    let radius = (kernel.len() / 2) as isize;
    let mut scratch = vec![0.0f32; plane.len()];

    for y in 0..height {
        let row = &plane[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - radius).clamp(0, width as isize - 1) as usize;
                acc += row[sx] * weight;
            }
            scratch[y * width + x] = acc;
        }
    }
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - radius).clamp(0, height as isize - 1) as usize;
                acc += scratch[sy * width + x] * weight;
            }
            plane[y * width + x] = acc;
        }
    }
}

/// Extract one component of every pixel
pub(crate) fn plane(frame: &Frame, component: usize) -> Vec<f32> {
    frame.pixels().iter().map(|px| px[component]).collect()
}
