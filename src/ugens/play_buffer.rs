//! Buffer player.

use crate::node::{GenContext, Generator};

/// Plays one channel of the node's buffer.
///
/// `speed` scales the playback rate (1 is the buffer's own rate) and a
/// positive `loop` input wraps back to the start at the end. The channel
/// comes from the `channel` option. Until a buffer has been delivered, or
/// after the last fetch failed, the player outputs silence.
#[derive(Default)]
pub struct PlayBuffer {
    position: f64,
}

impl PlayBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current read position in frames.
    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }
}

impl Generator for PlayBuffer {
    fn generate(&mut self, ctx: &mut GenContext<'_>) {
        let buffer = match &ctx.buffer {
            Some(buffer) => buffer,
            None => {
                ctx.output.fill(0.0);
                return;
            }
        };

        let channel = ctx.config.number("channel").unwrap_or(0.0).max(0.0) as usize;
        let samples = match buffer.channels().get(channel) {
            Some(samples) if !samples.is_empty() => samples,
            _ => {
                ctx.output.fill(0.0);
                return;
            }
        };

        // Source frames per output sample.
        let ratio = buffer
            .sample_rate
            .filter(|rate| *rate > 0.0 && ctx.config.sample_rate > 0.0)
            .map_or(1.0, |rate| rate / ctx.config.sample_rate);

        let len = samples.len() as f64;
        for (i, out) in ctx.output.iter_mut().enumerate() {
            let speed = f64::from(ctx.inputs.sample("speed", i).unwrap_or(1.0));
            let looping = ctx.inputs.sample("loop", i).unwrap_or(0.0) > 0.0;

            if self.position >= len {
                if looping {
                    self.position %= len;
                } else {
                    *out = 0.0;
                    continue;
                }
            }

            *out = samples[self.position as usize];
            self.position = (self.position + speed * ratio).max(0.0);
        }
    }
}
