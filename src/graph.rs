//! Graph building - definitions in, unit generators out

use core::fmt;
use std::rc::Rc;

use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, trace};

use crate::buffer::{resolve_buffer, BufferRegistry, BufferSources, Decoder, NullDecoder, SharedBuffers, SharedSources};
use crate::def::{expand_ugen_def, expand_value_def, synth_def, NodeDef};
use crate::error::{kind_of, GraphError, Result};
use crate::factory::make_node;
use crate::node::{new_buses, Buses, Graph, Input, UGen, UGenInputs};
use crate::rate::{expand_rate, Rate};
use crate::registry::TypeRegistry;
use crate::settings::{AudioSettings, Rates};

/// Called with every node right after it is constructed.
pub type Visitor = Rc<dyn Fn(&UGen, &NodeDef, &Rates)>;

/// Context for one graph build.
///
/// Cloning is cheap: the buses, buffers, sources, registry and decoder are
/// shared handles.
#[derive(Clone)]
pub struct ParseOptions {
    pub audio_settings: AudioSettings,
    pub buses: Buses,
    pub buffers: SharedBuffers,
    /// Per-id buffer sources. Without it every buffer reference gets its own source.
    pub buffer_sources: Option<SharedSources>,
    pub decoder: Rc<dyn Decoder>,
    pub registry: Rc<TypeRegistry>,
    /// Requested rate. Only forced onto nodes when `override_rate` is set.
    pub rate: Option<Rate>,
    pub override_rate: bool,
    /// Run in order after each node is constructed.
    pub visitors: Vec<Visitor>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::new(AudioSettings::default())
    }
}

impl ParseOptions {
    /// Fresh shared state for `audio_settings`, built-in types, and a
    /// decoder that rejects every fetch.
    pub fn new(audio_settings: AudioSettings) -> Self {
        Self {
            buses: new_buses(&audio_settings),
            audio_settings,
            buffers: BufferRegistry::shared(),
            buffer_sources: Some(Rc::new(BufferSources::new())),
            decoder: Rc::new(NullDecoder),
            registry: Rc::new(TypeRegistry::with_builtins()),
            rate: None,
            override_rate: false,
            visitors: Vec::new(),
        }
    }

    /// Request `rate` without forcing it on any node.
    pub fn with_rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self.override_rate = false;
        self
    }

    /// Force every node built with these options to `rate`.
    pub fn override_rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self.override_rate = true;
        self
    }

    /// Add a visitor after any already present.
    pub fn visitor<F>(mut self, visitor: F) -> Self
    where
        F: Fn(&UGen, &NodeDef, &Rates) + 'static,
    {
        self.visitors.push(Rc::new(visitor));
        self
    }

    /// Replace the audio settings. Buses already allocated are kept.
    pub fn audio_settings(mut self, audio_settings: AudioSettings) -> Self {
        self.audio_settings = audio_settings;
        self
    }

    pub fn with_registry(mut self, registry: Rc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_decoder(mut self, decoder: Rc<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_buses(mut self, buses: Buses) -> Self {
        self.buses = buses;
        self
    }

    pub fn with_buffers(mut self, buffers: SharedBuffers) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn with_buffer_sources(mut self, sources: Option<SharedSources>) -> Self {
        self.buffer_sources = sources;
        self
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("audio_settings", &self.audio_settings)
            .field("rate", &self.rate)
            .field("override_rate", &self.override_rate)
            .field("visitors", &self.visitors.len())
            .finish_non_exhaustive()
    }
}

/// Build `def` into a graph.
///
/// An array builds into a [`Graph::Sequence`] of the same length and order;
/// anything else builds one node. Inputs are built before the node that
/// reads them, in definition order. Any error aborts the whole build.
///
/// ```
/// # use synthgraph::{build_graph, ParseOptions, Rate};
/// # use serde_json::json;
/// let graph = build_graph(json!({ "type": "sinOsc", "rate": "ar", "freq": 440 }), &ParseOptions::default()).unwrap();
/// let osc = graph.as_node().unwrap();
/// assert_eq!(osc.rate(), Rate::Audio);
/// assert_eq!(osc.output().len(), 64);
/// assert_eq!(osc.inputs().node("freq").unwrap().rate(), Rate::Constant);
/// ```
pub fn build_graph(def: Value, options: &ParseOptions) -> Result<Graph> {
    match def {
        Value::Array(defs) => defs
            .into_iter()
            .map(|def| build_graph(def, options))
            .collect::<Result<Vec<_>>>()
            .map(Graph::Sequence),
        def => build_node(def, options).map(|node| Graph::Node(Box::new(node))),
    }
}

/// Build a top-level synth definition.
///
/// Audio-rate requests that do not already end in an output sink are wrapped
/// in one spanning the environment's channels.
pub fn parse_synth_def(def: Value, options: &ParseOptions) -> Result<Graph> {
    let def = synth_def(def, options.rate, options.audio_settings.chans);
    build_graph(def, options)
}

fn build_node(def: Value, options: &ParseOptions) -> Result<UGen> {
    let map = match expand_value_def(def)? {
        Value::Object(map) => map,
        other => return Err(GraphError::InvalidValueType { found: kind_of(&other) }),
    };

    let mut def = NodeDef::from_map(expand_ugen_def(map))?;
    expand_rate(&mut def, options);
    options.registry.merge_defaults(&mut def);

    let type_name = match def.ugen.as_deref() {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => return Err(GraphError::MissingType),
    };
    trace!(
        ugen = %type_name,
        rate = ?def.rate,
        inputs = %def.inputs.keys().join(", "),
        "expanded definition"
    );

    let mut inputs = UGenInputs::with_capacity(def.inputs.len());
    let mut buffer_def = None;
    for (name, value) in &def.inputs {
        if value.is_null() {
            continue;
        }

        if options.registry.should_expand(&type_name, name) {
            inputs.push(name.as_str(), Input::Graph(build_graph(value.clone(), options)?));
        } else {
            if name == "buffer" {
                buffer_def = Some(value.clone());
            }
            inputs.push(name.as_str(), Input::Literal(value.clone()));
        }
    }

    let mut node = make_node(def, inputs, options)?;

    if let Some(id) = node.def().id.clone() {
        node.tag(&id);
    }

    if let Some(buffer_def) = buffer_def {
        let source = resolve_buffer(buffer_def, node.buffer(), options)?;
        debug!(ugen = %type_name, state = ?source.state(), "bound node to buffer source");
    }

    for visitor in &options.visitors {
        visitor(&node, node.def(), &options.audio_settings.rates);
    }

    Ok(node)
}
