//! Constant value generator

use crate::node::{GenContext, Generator, UGenInputs};

/// Outputs its `value` input on every sample.
pub struct Value {
    value: f32,
}

impl Value {
    /// Read `value` from `inputs` and fill `output` with it right away, so
    /// the node holds its value before it is ever evaluated.
    pub fn new(inputs: &UGenInputs, output: &mut [f32]) -> Self {
        let value = inputs.scalar("value").unwrap_or(0.0);
        output.fill(value);
        Self { value }
    }

    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }
}

impl Generator for Value {
    fn generate(&mut self, ctx: &mut GenContext<'_>) {
        ctx.output.fill(self.value);
    }
}
