use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::filters::Filter;
use crate::{Frame, NoiseParams};

/// Multiplicative luminance noise; all color channels of a pixel move together
pub struct Noise {
    params: NoiseParams,
    seed: u64,
    rng: StdRng,
}

impl Noise {
    pub fn new(params: NoiseParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Filter for Noise {
    fn name(&self) -> &'static str {
        "noise"
    }

    fn apply(&mut self, frame: &mut Frame, _dt: f64) {
        let strength = self.params.strength;
        if strength == 0.0 {
            return;
        }
        for px in frame.pixels_mut() {
            let factor: f32 = 1.0 - strength * self.rng.gen::<f32>();
            for c in &mut px[..3] {
                *c *= factor;
            }
        }
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_darkens_within_strength() {
        let mut frame = Frame::filled(16, 16, [1.0, 1.0, 1.0, 1.0]);
        Noise::new(NoiseParams { strength: 0.3 }, 9).apply(&mut frame, 0.04);
        for px in frame.pixels() {
            assert!(px[0] >= 0.7 - 1e-6 && px[0] <= 1.0);
            assert_eq!(px[0], px[1]);
            assert_eq!(px[3], 1.0);
        }
    }

    #[test]
    fn test_noise_reset_replays() {
        let mut filter = Noise::new(NoiseParams::default(), 5);
        let mut a = Frame::filled(4, 4, [1.0; 4]);
        filter.apply(&mut a, 0.04);
        filter.reset();
        let mut b = Frame::filled(4, 4, [1.0; 4]);
        filter.apply(&mut b, 0.04);
        assert_eq!(a, b);
    }
}
