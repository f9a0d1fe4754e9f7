//! Node definitions and shorthand expansion.
//!
//! Definitions arrive as JSON values. Two shorthands are legal at the
//! boundary and are expanded here before anything else looks at them:
//!
//! - a bare number is a constant-rate `value` node
//! - an object without an `inputs` field carries its inputs at the top level
//!
//! ```text
//! { "type": "sinOsc", "rate": "ar", "freq": 440 }
//!   => { "type": "sinOsc", "rate": "ar", "inputs": { "freq": 440 } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{kind_of, GraphError, Result};
use crate::rate::Rate;

/// Top-level properties that are never treated as inputs.
pub const RESERVED_WORDS: [&str; 5] = ["id", "type", "rate", "inputs", "options"];

/// Inputs passed through literally unless a type says otherwise.
pub const SPECIAL_INPUTS: [&str; 3] = ["value", "buffer", "table"];

/// Id given to the output sink synthesized around a top-level definition.
pub const OUT_UGEN_ID: &str = "synth-out";

/// Type name of the output sink.
pub const OUT_UGEN_TYPE: &str = "out";

/// Type name of the constant value generator.
pub const VALUE_UGEN_TYPE: &str = "value";

/// The canonical shape of one unit generator definition.
///
/// `rate` holds whatever the author wrote until [`expand_rate`](crate::rate::expand_rate)
/// resolves it; `inputs` keeps authoring order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ugen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl NodeDef {
    /// Convert a normalized definition object into a `NodeDef`.
    pub fn from_map(map: Map<String, Value>) -> Result<NodeDef> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// The resolved rate class, audio when none was given.
    pub fn resolved_rate(&self) -> Result<Rate> {
        self.rate.as_deref().map_or(Ok(Rate::Audio), Rate::parse)
    }

    /// Back to a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Expand the scalar shorthand.
///
/// Numbers become a constant-rate `value` definition holding the number.
/// Objects and arrays pass through unchanged; anything else is an
/// [`GraphError::InvalidValueType`].
pub fn expand_value_def(def: Value) -> Result<Value> {
    match def {
        Value::Number(value) => Ok(json!({
            "type": VALUE_UGEN_TYPE,
            "rate": Rate::Constant.name(),
            "inputs": { "value": value },
        })),
        Value::Object(_) | Value::Array(_) => Ok(def),
        other => Err(GraphError::InvalidValueType { found: kind_of(&other) }),
    }
}

/// Move every non-reserved top-level property into a fresh `inputs` map.
///
/// Definitions that already have an `inputs` field are returned as is.
pub fn expand_ugen_def(mut def: Map<String, Value>) -> Map<String, Value> {
    if def.contains_key("inputs") {
        return def;
    }

    let names: Vec<String> = def
        .keys()
        .filter(|name| !RESERVED_WORDS.contains(&name.as_str()))
        .cloned()
        .collect();

    let mut inputs = Map::with_capacity(names.len());
    for name in names {
        if let Some(value) = def.remove(&name) {
            inputs.insert(name, value);
        }
    }
    def.insert("inputs".to_owned(), Value::Object(inputs));

    def
}

/// True if `def` is already an output sink definition.
pub fn is_out_def(def: &Value) -> bool {
    match def {
        Value::Object(map) => {
            map.get("id").and_then(Value::as_str) == Some(OUT_UGEN_ID)
                || map.get("type").and_then(Value::as_str) == Some(OUT_UGEN_TYPE)
        }
        _ => false,
    }
}

/// Wrap a top-level definition in an output sink.
///
/// Only audio-rate requests are wrapped, and only when the definition is not
/// already a sink. A null definition is an empty sequence of sources.
pub fn synth_def(def: Value, rate: Option<Rate>, chans: usize) -> Value {
    let def = if def.is_null() { Value::Array(Vec::new()) } else { def };

    if rate != Some(Rate::Audio) || is_out_def(&def) {
        return def;
    }

    json!({
        "id": OUT_UGEN_ID,
        "type": OUT_UGEN_TYPE,
        "inputs": {
            "sources": def,
            "bus": 0,
            "expand": chans,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_become_value_defs() {
        let def = expand_value_def(json!(440)).unwrap();
        assert_eq!(def["type"], "value");
        assert_eq!(def["rate"], "constant");
        assert_eq!(def["inputs"]["value"], 440);
    }

    #[test]
    fn objects_and_arrays_pass_through() {
        let obj = json!({ "type": "sinOsc" });
        assert_eq!(expand_value_def(obj.clone()).unwrap(), obj);

        let arr = json!([1, 2]);
        assert_eq!(expand_value_def(arr.clone()).unwrap(), arr);
    }

    #[test]
    fn other_scalars_are_rejected() {
        for bad in [json!("440"), json!(true), Value::Null] {
            assert!(matches!(
                expand_value_def(bad),
                Err(GraphError::InvalidValueType { .. })
            ));
        }
    }

    #[test]
    fn top_level_inputs_move_under_inputs() {
        let def = json!({ "id": "carrier", "type": "sinOsc", "rate": "ar", "freq": 440, "mul": 0.5 });
        let Value::Object(map) = def else { unreachable!() };
        let expanded = expand_ugen_def(map);

        assert_eq!(expanded["inputs"], json!({ "freq": 440, "mul": 0.5 }));
        assert!(!expanded.contains_key("freq"));
        assert!(!expanded.contains_key("mul"));
        assert_eq!(expanded["id"], "carrier");
        assert_eq!(expanded["rate"], "ar");
    }

    #[test]
    fn existing_inputs_are_left_alone() {
        let def = json!({ "type": "sinOsc", "inputs": { "freq": 1 }, "stray": 2 });
        let Value::Object(map) = def else { unreachable!() };
        let expanded = expand_ugen_def(map.clone());
        assert_eq!(expanded, map);
    }

    #[test]
    fn node_def_rejects_malformed_inputs() {
        let def = json!({ "type": "sinOsc", "inputs": 3 });
        let Value::Object(map) = def else { unreachable!() };
        assert!(matches!(NodeDef::from_map(map), Err(GraphError::InvalidDefinition(_))));
    }

    #[test]
    fn synth_def_wraps_audio_requests() {
        let wrapped = synth_def(json!({ "type": "sinOsc" }), Some(Rate::Audio), 2);
        assert_eq!(wrapped["id"], OUT_UGEN_ID);
        assert_eq!(wrapped["type"], OUT_UGEN_TYPE);
        assert_eq!(wrapped["inputs"]["sources"]["type"], "sinOsc");
        assert_eq!(wrapped["inputs"]["bus"], 0);
        assert_eq!(wrapped["inputs"]["expand"], 2);
    }

    #[test]
    fn synth_def_leaves_sinks_and_other_rates_alone() {
        let sink = json!({ "type": "out", "sources": [] });
        assert_eq!(synth_def(sink.clone(), Some(Rate::Audio), 2), sink);

        let control = json!({ "type": "sinOsc" });
        assert_eq!(synth_def(control.clone(), Some(Rate::Control), 2), control);
        assert_eq!(synth_def(control.clone(), None, 2), control);
    }

    #[test]
    fn synth_def_wraps_sequences_and_null() {
        let wrapped = synth_def(json!([{ "type": "a" }, { "type": "b" }]), Some(Rate::Audio), 1);
        assert_eq!(wrapped["inputs"]["sources"].as_array().map(Vec::len), Some(2));

        let empty = synth_def(Value::Null, Some(Rate::Audio), 1);
        assert_eq!(empty["inputs"]["sources"], json!([]));
    }
}
