//! The type registry: generator type names to constructors and defaults.

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::def::{NodeDef, SPECIAL_INPUTS};
use crate::error::{GraphError, Result};
use crate::merge::merge_layers;
use crate::node::{Generator, UGenConfig, UGenInputs};
use crate::rate::Rate;

/// Builds a type's [`Generator`] from its inputs, output buffer and final configuration.
pub type Constructor = Box<dyn Fn(&UGenInputs, &mut [f32], &UGenConfig) -> Box<dyn Generator>>;

/// Defaults declared by a generator type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDefaults {
    /// Rate used when a definition gives none.
    pub rate: Option<Rate>,
    /// Inputs added when a definition does not name them.
    pub inputs: Map<String, Value>,
    /// Base layer of every node's options.
    pub options: Map<String, Value>,
}

impl TypeDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_input(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.to_owned(), value.into());
        self
    }

    pub fn with_option(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.options.insert(name.to_owned(), value.into());
        self
    }
}

/// A registered generator type.
pub struct TypeInfo {
    constructor: Constructor,
    defaults: TypeDefaults,
    expand_overrides: HashMap<String, bool>,
}

impl TypeInfo {
    pub fn defaults(&self) -> &TypeDefaults {
        &self.defaults
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// Decide whether input `name` of this type is built into a sub-graph
    /// (`true`) or passed through literally.
    pub fn expand_input(&mut self, name: &str, expand: bool) -> &mut Self {
        self.expand_overrides.insert(name.to_owned(), expand);
        self
    }

    /// True if input `name` is built into a sub-graph.
    pub fn should_expand(&self, name: &str) -> bool {
        self.expand_overrides
            .get(name)
            .copied()
            .unwrap_or_else(|| default_should_expand(name))
    }
}

/// Special inputs are literal, everything else is a sub-graph.
pub fn default_should_expand(name: &str) -> bool {
    !SPECIAL_INPUTS.contains(&name)
}

/// Generator types known to a build, populated up front.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeInfo>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in types: `value`, `sinOsc`, `out` and `playBuffer`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::ugens::register_builtins(&mut registry);
        registry
    }

    /// Register `name`, replacing any earlier type of that name.
    ///
    /// Returns the entry so input expansion can be adjusted:
    ///
    /// ```
    /// # use synthgraph::{TypeDefaults, TypeRegistry};
    /// # use synthgraph::ugens::Value;
    /// let mut registry = TypeRegistry::new();
    /// registry
    ///     .register("tableLookup", TypeDefaults::new(), |inputs, output, _| Box::new(Value::new(inputs, output)))
    ///     .expand_input("table", true);
    /// assert!(registry.should_expand("tableLookup", "table"));
    /// ```
    pub fn register<F>(&mut self, name: &str, defaults: TypeDefaults, constructor: F) -> &mut TypeInfo
    where
        F: Fn(&UGenInputs, &mut [f32], &UGenConfig) -> Box<dyn Generator> + 'static,
    {
        trace!(%name, "registering generator type");
        let info = TypeInfo {
            constructor: Box::new(constructor),
            defaults,
            expand_overrides: HashMap::new(),
        };
        match self.types.entry(name.to_owned()) {
            Entry::Occupied(mut entry) => {
                entry.insert(info);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(info),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// The type registered as `name`.
    pub fn lookup(&self, name: &str) -> Result<&TypeInfo> {
        self.types
            .get(name)
            .ok_or_else(|| GraphError::UnknownGeneratorType { name: name.to_owned() })
    }

    pub fn defaults_for(&self, name: &str) -> Option<&TypeDefaults> {
        self.types.get(name).map(TypeInfo::defaults)
    }

    /// Input expansion policy for `input` of type `type_name`.
    ///
    /// Unregistered types get the default policy.
    pub fn should_expand(&self, type_name: &str, input: &str) -> bool {
        match self.types.get(type_name) {
            Some(info) => info.should_expand(input),
            None => default_should_expand(input),
        }
    }

    /// Lay the defaults of `def`'s type under `def`.
    ///
    /// The definition's rate wins if it has one, default inputs fill in the
    /// names it does not give, and options merge deep. The registered
    /// defaults are only read.
    pub fn merge_defaults(&self, def: &mut NodeDef) {
        let defaults = match def.ugen.as_deref().and_then(|name| self.defaults_for(name)) {
            Some(defaults) => defaults,
            None => return,
        };

        if def.rate.is_none() {
            def.rate = defaults.rate.map(|rate| rate.name().to_owned());
        }

        if !defaults.inputs.is_empty() {
            let mut inputs = defaults.inputs.clone();
            for (name, value) in core::mem::take(&mut def.inputs) {
                inputs.insert(name, value);
            }
            def.inputs = inputs;
        }

        if !defaults.options.is_empty() {
            def.options = merge_layers([&defaults.options, &def.options]);
        }
    }
}
