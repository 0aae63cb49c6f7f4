use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::filters::Filter;
use crate::{AlphaNoiseParams, Frame, TranslucencyParams};

/// Uniform alpha multiplier
pub struct Translucency {
    params: TranslucencyParams,
}

impl Translucency {
    pub fn new(params: TranslucencyParams) -> Self {
        Self { params }
    }
}

impl Filter for Translucency {
    fn name(&self) -> &'static str {
        "translucency"
    }

    fn apply(&mut self, frame: &mut Frame, _dt: f64) {
        for px in frame.pixels_mut() {
            px[3] *= self.params.alpha;
        }
    }
}

/// Per-pixel alpha flicker, re-drawn every frame
pub struct AlphaNoise {
    params: AlphaNoiseParams,
    seed: u64,
    rng: StdRng,
}

impl AlphaNoise {
    pub fn new(params: AlphaNoiseParams, seed: u64) -> Self {
        Self {
            params,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Filter for AlphaNoise {
    fn name(&self) -> &'static str {
        "alphanoise"
    }

    fn apply(&mut self, frame: &mut Frame, _dt: f64) {
        let magnitude = self.params.magnitude;
        if magnitude == 0.0 {
            return;
        }
        for px in frame.pixels_mut() {
            let keep: f32 = 1.0 - magnitude * self.rng.gen::<f32>();
            px[3] *= keep;
        }
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }
}
