//! Output sink - sums its sources onto the shared buses

use crate::node::{GenContext, Generator, Input};

/// Writes `sources` to the buses starting at `bus`.
///
/// The sink spans `max(expand, number of sources)` buses. Source `i` feeds
/// bus `bus + i`; with fewer sources than buses, sources repeat, so a single
/// mono source is copied to every channel. Samples are summed into the bus,
/// so several sinks can share one. Buses past the end are ignored.
///
/// The sink's own output holds the first channel.
#[derive(Default)]
pub struct Out;

impl Out {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for Out {
    fn generate(&mut self, ctx: &mut GenContext<'_>) {
        let sources = match ctx.inputs.get("sources").and_then(Input::as_graph) {
            Some(graph) => graph.nodes(),
            None => Vec::new(),
        };

        ctx.output.fill(0.0);
        if sources.is_empty() {
            return;
        }

        let start = ctx.inputs.scalar("bus").unwrap_or(0.0).max(0.0) as usize;
        let expand = ctx.inputs.scalar("expand").unwrap_or(1.0).max(1.0) as usize;
        let channels = expand.max(sources.len());

        for (out, sample) in ctx.output.iter_mut().zip(sources[0].output()) {
            *out = *sample;
        }

        let mut buses = ctx.config.buses.borrow_mut();
        let targets = buses.iter_mut().skip(start).take(channels);
        for (ch, bus) in targets.enumerate() {
            let source = sources[ch % sources.len()].output();
            for (out, sample) in bus.iter_mut().zip(source) {
                *out += *sample;
            }
        }
    }
}
