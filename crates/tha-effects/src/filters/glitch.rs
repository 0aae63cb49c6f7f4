use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use tha_core::EventRate;

use crate::filters::Filter;
use crate::{DigitalGlitchesParams, Frame};

/// One displaced horizontal block, in frame-relative units
#[derive(Debug, Clone, Copy, PartialEq)]
struct GlitchBlock {
    top: f32,
    shift: f32,
}

/// Random horizontal block displacement that holds for `duration` seconds
pub struct DigitalGlitches {
    params: DigitalGlitchesParams,
    rate: EventRate,
    seed: u64,
    rng: StdRng,
    blocks: Vec<GlitchBlock>,
    remaining: f64,
}

impl DigitalGlitches {
    pub fn new(params: DigitalGlitchesParams, seed: u64) -> Self {
        let rate = EventRate::per_second(params.rate as f64);
        Self {
            params,
            rate,
            seed,
            rng: StdRng::seed_from_u64(seed),
            blocks: Vec::new(),
            remaining: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }

    fn start_glitch(&mut self) {
        let count = self.rng.gen_range(1..=self.params.max_blocks);
        let max_shift = self.params.max_shift;
        self.blocks = (0..count)
            .map(|_| GlitchBlock {
                top: self.rng.gen::<f32>(),
                shift: if max_shift > 0.0 {
                    self.rng.gen_range(-max_shift..=max_shift)
                } else {
                    0.0
                },
            })
            .collect();
        self.remaining = self.params.duration as f64;
        trace!(blocks = self.blocks.len(), "glitch started");
    }
}

impl Filter for DigitalGlitches {
    fn name(&self) -> &'static str {
        "digital_glitches"
    }

    fn apply(&mut self, frame: &mut Frame, dt: f64) {
        let dt = dt.max(0.0);
        if self.is_active() {
            self.remaining -= dt;
        }
        if !self.is_active() {
            self.blocks.clear();
            let p = self.rate.probability(dt);
            if p > 0.0 && self.rng.gen_bool(p.min(1.0)) {
                self.start_glitch();
            }
        }

        let (w, h) = (frame.width(), frame.height());
        if w == 0 || h == 0 {
            return;
        }
        let block_rows = ((self.params.block_height * h as f32).round() as usize).max(1);
        for block in &self.blocks {
            let top = ((block.top * h as f32) as usize).min(h - 1);
            let shift = (block.shift * w as f32).round() as isize;
            let amount = shift.unsigned_abs() % w;
            for y in top..(top + block_rows).min(h) {
                let row = frame.row_mut(y);
                if shift >= 0 {
                    row.rotate_right(amount);
                } else {
                    row.rotate_left(amount);
                }
            }
        }
    }

    fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.blocks.clear();
        self.remaining = 0.0;
    }
}
