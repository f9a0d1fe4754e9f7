//! Environment-wide registry of resolved buffers.

use core::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use tracing::{debug, trace};

use super::BufferDesc;

/// Buffers addressable by id across the whole environment.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: HashMap<String, Rc<BufferDesc>>,
}

/// The registry as shared between an environment and its nodes.
pub type SharedBuffers = Rc<RefCell<BufferRegistry>>;

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh registry ready to be shared.
    pub fn shared() -> SharedBuffers {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Make `desc` addressable by its id. Anonymous buffers are not stored.
    ///
    /// Returns true if the buffer was stored.
    pub fn register(&mut self, desc: Rc<BufferDesc>) -> bool {
        match desc.id.clone() {
            Some(id) => {
                debug!(%id, channels = desc.num_channels(), frames = desc.num_frames(), "registered buffer");
                self.buffers.insert(id, desc);
                true
            }
            None => {
                trace!("skipping registration of anonymous buffer");
                false
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Rc<BufferDesc>> {
        self.buffers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.buffers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }
}
