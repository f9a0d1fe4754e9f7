//! Buffer references, their cached asynchronous sources, and the decoders
//! that feed them.

mod decode;
mod desc;
mod promise;
mod registry;
mod resolve;
mod slot;
mod source;

pub use decode::{BackgroundDecoder, DecodeCallback, Decoder, Loader, NullDecoder, OggLoader, SyncDecoder};
pub use desc::{expand_buffer_def, BufferData, BufferDef, BufferDesc};
pub use promise::Promise;
pub use registry::{BufferRegistry, SharedBuffers};
pub use resolve::{bind, find_source, resolve_buffer};
pub use slot::{BufferSlot, BufferState};
pub use source::{BufferPromise, BufferResult, BufferSource, BufferSources, SharedSources, SourceState};
