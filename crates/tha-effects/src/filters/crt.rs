use std::f32::consts::TAU;

use crate::filters::Filter;
use crate::{luminance, BandingParams, DesaturateParams, Frame, ScanlinesParams};

/// Darken every other row; optionally alternate rows each frame
pub struct Scanlines {
    params: ScanlinesParams,
    field: usize,
}

impl Scanlines {
    pub fn new(params: ScanlinesParams) -> Self {
        let field = params.field as usize;
        Self { params, field }
    }
}

impl Filter for Scanlines {
    fn name(&self) -> &'static str {
        "scanlines"
    }

    fn apply(&mut self, frame: &mut Frame, _dt: f64) {
        let keep = 1.0 - self.params.darken;
        for y in (self.field..frame.height()).step_by(2) {
            for px in frame.row_mut(y) {
                for c in &mut px[..3] {
                    *c *= keep;
                }
            }
        }
        if self.params.dynamic {
            self.field = 1 - self.field;
        }
    }

    fn reset(&mut self) {
        self.field = self.params.field as usize;
    }
}

/// Blend toward a tinted greyscale
pub struct Desaturate {
    params: DesaturateParams,
}

impl Desaturate {
    pub fn new(params: DesaturateParams) -> Self {
        Self { params }
    }
}

impl Filter for Desaturate {
    fn name(&self) -> &'static str {
        "desaturate"
    }

    fn apply(&mut self, frame: &mut Frame, _dt: f64) {
        let s = self.params.strength;
        let tint = self.params.tint_rgb;
        for px in frame.pixels_mut() {
            let y = luminance(px);
            for c in 0..3 {
                px[c] += s * (y * tint[c] - px[c]);
            }
        }
    }
}

/// Horizontal brightness bands scrolling down the frame
pub struct Banding {
    params: BandingParams,
    /// Scroll position, in frame heights, kept in [0, 1)
    phase: f32,
}

impl Banding {
    pub fn new(params: BandingParams) -> Self {
        Self { params, phase: 0.0 }
    }
}

impl Filter for Banding {
    fn name(&self) -> &'static str {
        "banding"
    }

    fn apply(&mut self, frame: &mut Frame, dt: f64) {
        let shift = (self.params.speed as f64 * dt.max(0.0)).rem_euclid(1.0);
        if shift.is_finite() {
            self.phase = (self.phase + shift as f32).rem_euclid(1.0);
        }

        let h = frame.height().max(1) as f32;
        let BandingParams {
            strength, density, ..
        } = self.params;
        for y in 0..frame.height() {
            let v = y as f32 / h - self.phase;
            let band = 0.5 * (1.0 + (TAU * density * v).cos());
            let factor = 1.0 - strength * band;
            for px in frame.row_mut(y) {
                for c in &mut px[..3] {
                    *c *= factor;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}
