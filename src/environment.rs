//! The environment - shared state every graph is built against

use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::buffer::{
    BufferDef, BufferDesc, BufferPromise, BufferRegistry, BufferSource, BufferSources, Decoder, NullDecoder,
    SharedBuffers, SharedSources,
};
use crate::error::Result;
use crate::graph::{build_graph, parse_synth_def, ParseOptions};
use crate::node::{new_buses, Buses, Graph};
use crate::rate::Rate;
use crate::registry::TypeRegistry;
use crate::settings::AudioSettings;

/// Owns the state that graphs share: buses, buffers, per-id buffer sources,
/// the generator types, and the decoder that fetches buffers.
///
/// # Creating an Environment
///
/// ```
/// # use synthgraph::{AudioSettings, Environment, SyncDecoder, OggLoader};
/// let env = Environment::new(AudioSettings::default().with_sample_rate(48_000.0))
///     .with_decoder(SyncDecoder::new(OggLoader));
/// assert_eq!(env.buses().borrow().len(), 8);
/// ```
///
/// # Building Graphs
///
/// [`synth`](Self::synth) builds a top-level definition at audio rate and
/// routes it to an output sink; [`build`](Self::build) builds a definition
/// as written.
///
/// ```
/// # use synthgraph::Environment;
/// # use serde_json::json;
/// let env = Environment::default();
/// let mut synth = env.synth(json!({ "type": "sinOsc", "freq": 440, "mul": 0.25 })).unwrap();
///
/// synth.gen();
/// let buses = env.buses();
/// assert!(buses.borrow()[0].iter().any(|s| *s != 0.0));
/// assert_eq!(buses.borrow()[0], buses.borrow()[1]);
/// ```
///
/// # Buffers
///
/// Buffers referenced by id share one [`BufferSource`] per id. Fetches are
/// delivered through the decoder; a decoder that completes off-thread needs
/// [`poll`](Self::poll) to be called from the thread that owns the environment.
pub struct Environment {
    settings: AudioSettings,
    buses: Buses,
    buffers: SharedBuffers,
    sources: SharedSources,
    registry: Rc<TypeRegistry>,
    decoder: Rc<dyn Decoder>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(AudioSettings::default())
    }
}

impl Environment {
    /// An environment with the built-in generator types and a decoder that
    /// rejects every fetch.
    pub fn new(settings: AudioSettings) -> Self {
        Self {
            buses: new_buses(&settings),
            settings,
            buffers: BufferRegistry::shared(),
            sources: Rc::new(BufferSources::new()),
            registry: Rc::new(TypeRegistry::with_builtins()),
            decoder: Rc::new(NullDecoder),
        }
    }

    /// Use `registry` for generator types (builder pattern).
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = Rc::new(registry);
        self
    }

    /// Fetch buffers with `decoder` (builder pattern).
    pub fn with_decoder<D: Decoder + 'static>(mut self, decoder: D) -> Self {
        self.decoder = Rc::new(decoder);
        self
    }

    /// Like [`with_decoder`](Self::with_decoder), keeping a handle to the decoder.
    pub fn with_shared_decoder(mut self, decoder: Rc<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    #[inline]
    pub fn settings(&self) -> &AudioSettings {
        &self.settings
    }

    pub fn buses(&self) -> Buses {
        Rc::clone(&self.buses)
    }

    pub fn buffers(&self) -> SharedBuffers {
        Rc::clone(&self.buffers)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Options for building against this environment.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions::new(self.settings.clone())
            .with_buses(Rc::clone(&self.buses))
            .with_buffers(Rc::clone(&self.buffers))
            .with_buffer_sources(Some(Rc::clone(&self.sources)))
            .with_registry(Rc::clone(&self.registry))
            .with_decoder(Rc::clone(&self.decoder))
    }

    /// Build `def` as written.
    pub fn build(&self, def: Value) -> Result<Graph> {
        build_graph(def, &self.parse_options())
    }

    /// Build `def` with custom options, see [`parse_options`](Self::parse_options).
    pub fn build_with(&self, def: Value, options: &ParseOptions) -> Result<Graph> {
        build_graph(def, options)
    }

    /// Build a top-level definition at audio rate, ending in an output sink.
    pub fn synth(&self, def: Value) -> Result<Graph> {
        parse_synth_def(def, &self.parse_options().with_rate(Rate::Audio))
    }

    /// Deliver finished decodes. Returns the number delivered.
    pub fn poll(&self) -> usize {
        let delivered = self.decoder.poll();
        if delivered > 0 {
            debug!(delivered, "delivered decoded buffers");
        }
        delivered
    }

    /// Silence every bus, ready for the next block.
    pub fn clear_buses(&self) {
        for bus in self.buses.borrow_mut().iter_mut() {
            bus.fill(0.0);
        }
    }

    /// The registered buffer `id`.
    pub fn buffer(&self, id: &str) -> Option<Rc<BufferDesc>> {
        self.buffers.borrow().get(id)
    }

    /// The source shared by every reference to buffer `id`.
    pub fn buffer_source(&self, id: &str) -> BufferSource {
        self.sources.get_or_insert_with(id, || {
            BufferSource::new(Rc::clone(&self.decoder), Some(Rc::clone(&self.buffers))).with_id(id)
        })
    }

    /// Fetch `src` into buffer `id`, refetching if `replace` is set.
    pub fn load_buffer(&self, def: &BufferDef) -> Option<BufferPromise> {
        let id = def.id.as_deref()?;
        let source = self.buffer_source(id);
        Some(match def.to_inline_desc() {
            Some(desc) => source.set(desc),
            None => source.get(def),
        })
    }

    /// Make `desc` addressable by its id without going through a source.
    pub fn register_buffer(&self, desc: BufferDesc) -> bool {
        self.buffers.borrow_mut().register(Rc::new(desc))
    }
}
