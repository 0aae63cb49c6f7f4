use crate::filters::{blur_plane, gaussian_kernel, Filter};
use crate::{luminance, BloomParams, Frame};

/// Bright-pass, blur, add back
pub struct Bloom {
    params: BloomParams,
    kernel: Vec<f32>,
}

impl Bloom {
    pub fn new(params: BloomParams) -> Self {
        let kernel = gaussian_kernel(params.sigma);
        Self { params, kernel }
    }
}

impl Filter for Bloom {
    fn name(&self) -> &'static str {
        "bloom"
    }

    fn apply(&mut self, frame: &mut Frame, _dt: f64) {
        let (w, h) = (frame.width(), frame.height());
        let threshold = self.params.threshold;

        let mut glow: [Vec<f32>; 3] = Default::default();
        for (c, plane) in glow.iter_mut().enumerate() {
            *plane = frame
                .pixels()
                .iter()
                .map(|px| {
                    if luminance(px) > threshold {
                        px[c] * px[3]
                    } else {
                        0.0
                    }
                })
                .collect();
            blur_plane(plane, w, h, &self.kernel);
        }

        let exposure = self.params.exposure;
        for (i, px) in frame.pixels_mut().iter_mut().enumerate() {
            for c in 0..3 {
                px[c] = (px[c] * exposure + glow[c][i]).clamp(0.0, 1.0);
            }
        }
    }
}
