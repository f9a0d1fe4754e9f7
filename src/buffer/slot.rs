//! The buffer a node reads from.

use core::cell::{Cell, RefCell};
use std::rc::Rc;

use super::BufferDesc;

/// What a node currently knows about its buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum BufferState {
    /// Nothing delivered yet.
    Pending,
    Ready(Rc<BufferDesc>),
    /// The last fetch failed with this message.
    Failed(String),
}

/// A node's buffer, shared with the subscription that keeps it current.
///
/// Clones refer to the same slot.
#[derive(Clone, Debug)]
pub struct BufferSlot {
    state: Rc<RefCell<BufferState>>,
    deliveries: Rc<Cell<usize>>,
}

impl Default for BufferSlot {
    fn default() -> Self {
        Self {
            state: Rc::new(RefCell::new(BufferState::Pending)),
            deliveries: Rc::new(Cell::new(0)),
        }
    }
}

impl BufferSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, desc: Rc<BufferDesc>) {
        *self.state.borrow_mut() = BufferState::Ready(desc);
        self.deliveries.set(self.deliveries.get() + 1);
    }

    pub fn fail(&self, message: impl Into<String>) {
        *self.state.borrow_mut() = BufferState::Failed(message.into());
        self.deliveries.set(self.deliveries.get() + 1);
    }

    pub fn state(&self) -> BufferState {
        self.state.borrow().clone()
    }

    /// The current buffer, if one has been delivered.
    pub fn get(&self) -> Option<Rc<BufferDesc>> {
        match &*self.state.borrow() {
            BufferState::Ready(desc) => Some(Rc::clone(desc)),
            _ => None,
        }
    }

    /// The last failure message, if the last delivery was a failure.
    pub fn error(&self) -> Option<String> {
        match &*self.state.borrow() {
            BufferState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), BufferState::Pending)
    }

    /// How many results (successes and failures) have been delivered.
    #[inline]
    pub fn deliveries(&self) -> usize {
        self.deliveries.get()
    }
}
