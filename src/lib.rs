//! synthgraph - unit generator graphs from declarative definitions
//!
//! Design principles:
//! - Definitions are plain JSON; shorthands are expanded before anything else
//! - Inputs are built before the nodes that read them, in definition order
//! - Everything shared (buses, buffers, types, decoder) is passed in, no globals
//! - Buffers load asynchronously through one cached source per id
//!
//! ```
//! # use synthgraph::{Environment, Rate};
//! # use serde_json::json;
//! let env = Environment::default();
//! let graph = env.build(json!({ "type": "sinOsc", "rate": "kr", "freq": 2 })).unwrap();
//!
//! let lfo = graph.as_node().unwrap();
//! assert_eq!(lfo.rate(), Rate::Control);
//! assert_eq!(lfo.output().len(), 1);
//! ```

mod def;
mod environment;
mod error;
mod factory;
mod graph;
mod merge;
mod node;
mod rate;
mod registry;
mod settings;

pub mod buffer;
pub mod ugens;

pub use buffer::{
    BackgroundDecoder, BufferDef, BufferDesc, BufferSlot, BufferSource, BufferState, Decoder, NullDecoder, OggLoader,
    SourceState, SyncDecoder,
};
pub use def::{
    expand_ugen_def, expand_value_def, is_out_def, synth_def, NodeDef, OUT_UGEN_ID, OUT_UGEN_TYPE, RESERVED_WORDS,
    SPECIAL_INPUTS, VALUE_UGEN_TYPE,
};
pub use environment::Environment;
pub use error::{DecodeError, GraphError, Result};
pub use factory::{make_node, node_sample_rate};
pub use graph::{build_graph, parse_synth_def, ParseOptions, Visitor};
pub use merge::{merge_deep, merge_layers, merge_maps};
pub use node::{new_buses, Buses, GenContext, Generator, Graph, Input, UGen, UGenConfig, UGenInputs};
pub use rate::{expand_rate, Rate};
pub use registry::{default_should_expand, Constructor, TypeDefaults, TypeInfo, TypeRegistry};
pub use settings::{AudioSettings, Rates};
