//! Node instantiation.

use std::rc::Rc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::def::NodeDef;
use crate::error::{GraphError, Result};
use crate::graph::ParseOptions;
use crate::merge::merge_layers;
use crate::node::{UGen, UGenConfig, UGenInputs};
use crate::rate::Rate;
use crate::settings::Rates;

/// Sample rate of a node: an explicit numeric `options.sampleRate` wins,
/// otherwise the rate class decides.
pub fn node_sample_rate(def: &NodeDef, rate: Rate, rates: &Rates) -> f64 {
    def.options
        .get("sampleRate")
        .and_then(Value::as_f64)
        .unwrap_or_else(|| rate.sample_rate(rates))
}

/// Instantiate `def` with its already built `inputs`.
///
/// A missing rate means audio rate. The node's options are the deep merge of
/// its type's default options, `def.options`, and the runtime settings
/// (`sampleRate`, `rate`, `audioSettings.rates`), later layers winning. The
/// buses and buffers are handed over by reference.
pub fn make_node(mut def: NodeDef, inputs: UGenInputs, options: &ParseOptions) -> Result<UGen> {
    let type_name = def.ugen.clone().ok_or(GraphError::MissingType)?;
    let info = options.registry.lookup(&type_name)?;

    let rate = def.resolved_rate()?;
    let rates = &options.audio_settings.rates;
    let sample_rate = node_sample_rate(&def, rate, rates);
    let mut output = vec![0.0; rate.buffer_len(rates)];

    let mut runtime = Map::new();
    runtime.insert("sampleRate".to_owned(), json!(sample_rate));
    runtime.insert("rate".to_owned(), json!(rate.name()));
    runtime.insert("audioSettings".to_owned(), json!({ "rates": serde_json::to_value(rates)? }));

    let config = UGenConfig {
        options: merge_layers([&info.defaults().options, &def.options, &runtime]),
        rate,
        sample_rate,
        audio_settings: options.audio_settings.clone(),
        buses: Rc::clone(&options.buses),
        buffers: Rc::clone(&options.buffers),
    };

    let generator = (info.constructor())(&inputs, output.as_mut_slice(), &config);

    debug!(
        ugen = %type_name,
        %rate,
        sample_rate,
        id = ?def.id,
        inputs = inputs.len(),
        "constructed unit generator"
    );

    def.rate = Some(rate.name().to_owned());
    def.options = config.options.clone();
    Ok(UGen::new(type_name, def, inputs, output, config, generator))
}
