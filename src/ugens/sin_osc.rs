//! Sine wave oscillator

use core::f32::consts::TAU;

use crate::node::{GenContext, Generator};

/// A sine oscillator driven by its `freq`, `phase`, `mul` and `add` inputs.
///
/// Inputs are read per sample, so an audio-rate `freq` modulates within the
/// block.
#[derive(Default)]
pub struct SinOsc {
    phase: f32,
}

impl SinOsc {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Generator for SinOsc {
    fn generate(&mut self, ctx: &mut GenContext<'_>) {
        let sample_rate = ctx.config.sample_rate as f32;
        if sample_rate <= 0.0 {
            ctx.output.fill(0.0);
            return;
        }

        for (i, out) in ctx.output.iter_mut().enumerate() {
            let freq = ctx.inputs.sample("freq", i).unwrap_or(440.0);
            let offset = ctx.inputs.sample("phase", i).unwrap_or(0.0);
            let mul = ctx.inputs.sample("mul", i).unwrap_or(1.0);
            let add = ctx.inputs.sample("add", i).unwrap_or(0.0);

            *out = ((self.phase + offset) * TAU).sin() * mul + add;

            self.phase += freq / sample_rate;
            // Phase stays in [0, 1)
            self.phase -= self.phase.floor();
        }
    }
}
