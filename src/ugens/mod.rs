//! Built-in unit generators.
//!
//! These are deliberately small: enough to drive a graph end to end.

mod out;
mod play_buffer;
mod sin_osc;
mod value;

pub use out::*;
pub use play_buffer::*;
pub use sin_osc::*;
pub use value::*;

use serde_json::json;

use crate::def::{OUT_UGEN_TYPE, VALUE_UGEN_TYPE};
use crate::rate::Rate;
use crate::registry::{TypeDefaults, TypeRegistry};

/// Register `value`, `sinOsc`, `out` and `playBuffer` with their defaults.
pub fn register_builtins(registry: &mut TypeRegistry) {
    registry.register(
        VALUE_UGEN_TYPE,
        TypeDefaults::new().with_rate(Rate::Control).with_input("value", 1.0),
        |inputs, output, _| Box::new(Value::new(inputs, output)),
    );

    registry.register(
        "sinOsc",
        TypeDefaults::new()
            .with_rate(Rate::Audio)
            .with_input("freq", 440.0)
            .with_input("phase", 0.0)
            .with_input("mul", 1.0)
            .with_input("add", 0.0),
        |_, _, _| Box::new(SinOsc::new()),
    );

    registry.register(
        OUT_UGEN_TYPE,
        TypeDefaults::new()
            .with_rate(Rate::Audio)
            .with_input("bus", 0)
            .with_input("expand", 1),
        |_, _, _| Box::new(Out::new()),
    );

    registry.register(
        "playBuffer",
        TypeDefaults::new()
            .with_rate(Rate::Audio)
            .with_input("speed", 1.0)
            .with_input("loop", 0.0)
            .with_option("channel", json!(0)),
        |_, _, _| Box::new(PlayBuffer::new()),
    );
}
