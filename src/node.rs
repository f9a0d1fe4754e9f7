//! Runtime unit generators and the graphs they form.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::buffer::{BufferDesc, BufferSlot, SharedBuffers};
use crate::def::NodeDef;
use crate::rate::Rate;
use crate::settings::AudioSettings;

/// Shared bus signals: one block of samples per bus.
pub type Buses = Rc<RefCell<Vec<Vec<f32>>>>;

/// Allocate `settings.num_buses` silent buses of one control block each.
pub fn new_buses(settings: &AudioSettings) -> Buses {
    Rc::new(RefCell::new(vec![vec![0.0; settings.rates.control]; settings.num_buses]))
}

/// Everything a [`Generator`] sees while producing one block.
pub struct GenContext<'a> {
    pub inputs: &'a UGenInputs,
    /// The node's own output buffer.
    pub output: &'a mut [f32],
    pub config: &'a UGenConfig,
    /// The node's buffer, once one has been delivered.
    pub buffer: Option<Rc<BufferDesc>>,
}

/// Per-type signal behaviour of a unit generator.
///
/// Called once per control block, after every input has been evaluated.
pub trait Generator {
    fn generate(&mut self, ctx: &mut GenContext<'_>);
}

/// A built graph: one node, or an ordered sequence of graphs.
#[derive(Debug)]
pub enum Graph {
    Node(Box<UGen>),
    Sequence(Vec<Graph>),
}

impl Graph {
    pub fn as_node(&self) -> Option<&UGen> {
        match self {
            Graph::Node(node) => Some(node.as_ref()),
            Graph::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Graph]> {
        match self {
            Graph::Node(_) => None,
            Graph::Sequence(items) => Some(items),
        }
    }

    pub fn into_node(self) -> Option<UGen> {
        match self {
            Graph::Node(node) => Some(*node),
            Graph::Sequence(_) => None,
        }
    }

    /// Top-level nodes in order, flattening nested sequences.
    pub fn nodes(&self) -> Vec<&UGen> {
        let mut nodes = Vec::new();
        self.collect_nodes(&mut nodes);
        nodes
    }

    fn collect_nodes<'a>(&'a self, nodes: &mut Vec<&'a UGen>) {
        match self {
            Graph::Node(node) => nodes.push(node.as_ref()),
            Graph::Sequence(items) => items.iter().for_each(|item| item.collect_nodes(nodes)),
        }
    }

    /// Depth-first search for the node tagged `id`, inputs included.
    pub fn find(&self, id: &str) -> Option<&UGen> {
        match self {
            Graph::Node(node) => node.find(id),
            Graph::Sequence(items) => items.iter().find_map(|item| item.find(id)),
        }
    }

    /// Evaluate every node for one control block, in order.
    pub fn gen(&mut self) {
        match self {
            Graph::Node(node) => node.gen(),
            Graph::Sequence(items) => items.iter_mut().for_each(Graph::gen),
        }
    }
}

/// One input of a node: a built sub-graph or a value passed through as is.
#[derive(Debug)]
pub enum Input {
    Graph(Graph),
    Literal(Value),
}

impl Input {
    pub fn as_graph(&self) -> Option<&Graph> {
        match self {
            Input::Graph(graph) => Some(graph),
            Input::Literal(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&UGen> {
        self.as_graph().and_then(Graph::as_node)
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Input::Graph(_) => None,
            Input::Literal(value) => Some(value),
        }
    }
}

/// A node's inputs in definition order.
#[derive(Debug, Default)]
pub struct UGenInputs {
    inputs: Vec<(String, Input)>,
}

impl UGenInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { inputs: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, name: impl Into<String>, input: Input) {
        self.inputs.push((name.into(), input));
    }

    pub fn get(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, input)| input)
    }

    pub fn node(&self, name: &str) -> Option<&UGen> {
        self.get(name).and_then(Input::as_node)
    }

    pub fn literal(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Input::as_literal)
    }

    /// The value of input `name` at sample `idx` of the current block.
    ///
    /// Single-value inputs (anything not at audio rate) hold for the whole
    /// block; a sequence reads its first node; literals must be numbers.
    pub fn sample(&self, name: &str, idx: usize) -> Option<f32> {
        match self.get(name)? {
            Input::Graph(graph) => {
                let first = *graph.nodes().first()?;
                let output = first.output();
                output.get(idx).or_else(|| output.last()).copied()
            }
            Input::Literal(value) => value.as_f64().map(|v| v as f32),
        }
    }

    /// The first sample of input `name`.
    #[inline]
    pub fn scalar(&self, name: &str) -> Option<f32> {
        self.sample(name, 0)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Input)> {
        self.inputs.iter().map(|(name, input)| (name.as_str(), input))
    }

    fn gen(&mut self) {
        for (_, input) in &mut self.inputs {
            if let Input::Graph(graph) = input {
                graph.gen();
            }
        }
    }
}

/// A node's final configuration.
///
/// `options` is the merged mapping of type defaults, definition options and
/// runtime settings. The shared buses and buffers are references into the
/// environment, never copies.
#[derive(Clone, Debug)]
pub struct UGenConfig {
    pub options: Map<String, Value>,
    pub rate: Rate,
    /// Sample rate in Hz at which this node is evaluated.
    pub sample_rate: f64,
    pub audio_settings: AudioSettings,
    pub buses: Buses,
    pub buffers: SharedBuffers,
}

impl UGenConfig {
    /// A numeric option.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.options.get(key).and_then(Value::as_f64)
    }
}

/// A constructed unit generator.
pub struct UGen {
    id: Option<String>,
    nick_name: Option<String>,
    type_name: String,
    output: Vec<f32>,
    inputs: UGenInputs,
    config: UGenConfig,
    def: NodeDef,
    buffer: BufferSlot,
    generator: Box<dyn Generator>,
}

impl UGen {
    pub(crate) fn new(
        type_name: String,
        def: NodeDef,
        inputs: UGenInputs,
        output: Vec<f32>,
        config: UGenConfig,
        generator: Box<dyn Generator>,
    ) -> Self {
        Self {
            id: None,
            nick_name: None,
            type_name,
            output,
            inputs,
            config,
            def,
            buffer: BufferSlot::new(),
            generator,
        }
    }

    /// Tag this node so an owning graph can address it by name.
    pub(crate) fn tag(&mut self, id: &str) {
        self.id = Some(id.to_owned());
        self.nick_name = Some(id.to_owned());
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Alias of [`id`](Self::id).
    pub fn nick_name(&self) -> Option<&str> {
        self.nick_name.as_deref()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[inline]
    pub fn rate(&self) -> Rate {
        self.config.rate
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    #[inline]
    pub fn output(&self) -> &[f32] {
        &self.output
    }

    pub fn inputs(&self) -> &UGenInputs {
        &self.inputs
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.get(name)
    }

    pub fn config(&self) -> &UGenConfig {
        &self.config
    }

    /// The merged options.
    pub fn options(&self) -> &Map<String, Value> {
        &self.config.options
    }

    /// The fully expanded definition this node was built from.
    pub fn def(&self) -> &NodeDef {
        &self.def
    }

    /// The slot any resolved buffer is delivered to.
    pub fn buffer(&self) -> &BufferSlot {
        &self.buffer
    }

    /// This node, or the first node among its inputs, tagged `id`.
    pub fn find(&self, id: &str) -> Option<&UGen> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.inputs
            .iter()
            .filter_map(|(_, input)| input.as_graph())
            .find_map(|graph| graph.find(id))
    }

    /// Evaluate one control block: inputs first, then this node.
    pub fn gen(&mut self) {
        self.inputs.gen();

        let mut ctx = GenContext {
            inputs: &self.inputs,
            output: &mut self.output,
            config: &self.config,
            buffer: self.buffer.get(),
        };
        self.generator.generate(&mut ctx);
    }
}

impl fmt::Debug for UGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UGen")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .field("rate", &self.config.rate)
            .field("sample_rate", &self.config.sample_rate)
            .field("output_len", &self.output.len())
            .field("inputs", &self.inputs)
            .finish()
    }
}
