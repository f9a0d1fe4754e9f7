//! Binding nodes to buffer sources.

use std::rc::Rc;

use serde_json::Value;
use tracing::trace;

use super::{expand_buffer_def, BufferDef, BufferSlot, BufferSource};
use crate::error::Result;
use crate::graph::ParseOptions;

/// Resolve the buffer reference `def` into `slot`.
///
/// Inline data is set on the source directly; anything else is fetched.
/// The slot stays subscribed to the source, so a later refresh of the same
/// id reaches it too. Decode failures land in the slot, never in the result.
pub fn resolve_buffer(def: Value, slot: &BufferSlot, options: &ParseOptions) -> Result<BufferSource> {
    let def = expand_buffer_def(def)?;
    let source = find_source(&def, options);

    match def.to_inline_desc() {
        Some(desc) => {
            trace!(id = ?def.id, channels = desc.num_channels(), "setting inline buffer");
            source.set(desc);
        }
        None => {
            source.get(&def);
        }
    }

    bind(&source, slot);
    Ok(source)
}

/// The shared source for `def.id`, or a fresh one if there is no id or no
/// per-id registry to share through.
pub fn find_source(def: &BufferDef, options: &ParseOptions) -> BufferSource {
    let create = || BufferSource::new(Rc::clone(&options.decoder), Some(Rc::clone(&options.buffers)));

    match (&options.buffer_sources, &def.id) {
        (Some(sources), Some(id)) => sources.get_or_insert_with(id, || create().with_id(id.as_str())),
        _ => create(),
    }
}

/// Keep `slot` updated with every result `source` produces from now on.
pub fn bind(source: &BufferSource, slot: &BufferSlot) {
    let slot = slot.clone();
    source.subscribe(move |result| match result {
        Ok(desc) => slot.set(Rc::clone(desc)),
        Err(message) => slot.fail(message.clone()),
    });
}
