use crate::filters::{blur_plane, gaussian_kernel, plane, Filter};
use crate::{ChromaticAberrationParams, Frame, VignettingParams};

/// Red scaled outward, blue inward, both slightly blurred
pub struct ChromaticAberration {
    params: ChromaticAberrationParams,
    kernel: Vec<f32>,
}

impl ChromaticAberration {
    pub fn new(params: ChromaticAberrationParams) -> Self {
        let kernel = gaussian_kernel(params.transverse_sigma);
        Self { params, kernel }
    }
}

impl Filter for ChromaticAberration {
    fn name(&self) -> &'static str {
        "chromatic_aberration"
    }

    fn apply(&mut self, frame: &mut Frame, _dt: f64) {
        let (w, h) = (frame.width(), frame.height());
        if w == 0 || h == 0 {
            return;
        }
        let cx = (w as f32 - 1.0) / 2.0;
        let cy = (h as f32 - 1.0) / 2.0;

        // Channel 0 samples closer to the center (appears enlarged), channel 2 farther
        let scales = [1.0 - self.params.axial_scale, 1.0 + self.params.axial_scale];
        let mut shifted = [plane(frame, 0), plane(frame, 2)];
        for ((out, scale), component) in shifted.iter_mut().zip(scales).zip([0, 2]) {
            for y in 0..h {
                for x in 0..w {
                    let sx = (cx + (x as f32 - cx) * scale).round() as isize;
                    let sy = (cy + (y as f32 - cy) * scale).round() as isize;
                    out[y * w + x] = frame.sample_clamped(sx, sy)[component];
                }
            }
            blur_plane(out, w, h, &self.kernel);
        }

        let [red, blue] = shifted;
        for (i, px) in frame.pixels_mut().iter_mut().enumerate() {
            px[0] = red[i];
            px[2] = blue[i];
        }
    }
}

/// Darken toward the corners
pub struct Vignetting {
    params: VignettingParams,
}

impl Vignetting {
    pub fn new(params: VignettingParams) -> Self {
        Self { params }
    }
}

impl Filter for Vignetting {
    fn name(&self) -> &'static str {
        "vignetting"
    }

    fn apply(&mut self, frame: &mut Frame, _dt: f64) {
        let (w, h) = (frame.width(), frame.height());
        let cx = (w as f32 - 1.0) / 2.0;
        let cy = (h as f32 - 1.0) / 2.0;
        let max_r2 = (cx * cx + cy * cy).max(f32::EPSILON);
        let strength = self.params.strength;

        for y in 0..h {
            let dy = y as f32 - cy;
            for (x, px) in frame.row_mut(y).iter_mut().enumerate() {
                let dx = x as f32 - cx;
                let factor = 1.0 - strength * (dx * dx + dy * dy) / max_r2;
                for c in &mut px[..3] {
                    *c *= factor;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vignetting_center_untouched_corners_dark() {
        let mut frame = Frame::filled(9, 9, [1.0, 1.0, 1.0, 1.0]);
        Vignetting::new(VignettingParams { strength: 0.5 }).apply(&mut frame, 0.04);
        assert_eq!(frame.get(4, 4).unwrap()[0], 1.0);
        assert!((frame.get(0, 0).unwrap()[0] - 0.5).abs() < 1e-5);
        assert_eq!(frame.get(0, 0).unwrap()[3], 1.0);
    }

    #[test]
    fn test_aberration_keeps_uniform_frame() {
        let mut frame = Frame::filled(10, 10, [0.3, 0.6, 0.9, 1.0]);
        let before = frame.clone();
        ChromaticAberration::new(ChromaticAberrationParams::default()).apply(&mut frame, 0.04);
        for (a, b) in frame.pixels().iter().zip(before.pixels()) {
            for c in 0..4 {
                assert!((a[c] - b[c]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_aberration_splits_channels_off_center() {
        let mut frame = Frame::filled(101, 1, [0.0, 0.0, 0.0, 1.0]);
        // Vertical white line near the right edge
        if let Some(px) = frame.get_mut(95, 0) {
            *px = [1.0, 1.0, 1.0, 1.0];
        }
        let params = ChromaticAberrationParams {
            transverse_sigma: 0.0,
            axial_scale: 0.05,
        };
        ChromaticAberration::new(params).apply(&mut frame, 0.04);
        assert_eq!(frame.get(95, 0).unwrap()[1], 1.0);
        // Red lands farther out than green, blue closer in
        let red_at = (0..101).find(|x| frame.get(*x, 0).unwrap()[0] > 0.5).unwrap();
        let blue_at = (0..101).find(|x| frame.get(*x, 0).unwrap()[2] > 0.5).unwrap();
        assert!(red_at > 95);
        assert!(blue_at < 95);
    }
}
