//! A single-threaded, multi-listener promise.
//!
//! A [`Promise`] settles at most once. Continuations attached while it is
//! pending run when it settles, in attach order; continuations attached
//! afterwards run immediately with the settled outcome. Each attach runs its
//! continuation exactly once.
//!
//! Standing subscriptions (updates across refreshes) are built on top of this
//! by [`BufferSource`](super::BufferSource), which re-attaches its subscribers
//! to every fresh promise.

use core::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

type Continuation<T, E> = Box<dyn FnOnce(&Result<T, E>)>;

struct Inner<T, E> {
    outcome: Option<Result<T, E>>,
    continuations: Vec<Continuation<T, E>>,
}

/// Shared handle to a pending or settled result.
///
/// Clones refer to the same promise; use [`ptr_eq`](Self::ptr_eq) to tell
/// promises apart.
pub struct Promise<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T, E> Default for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// A new pending promise.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                outcome: None,
                continuations: Vec::new(),
            })),
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.inner.borrow().outcome.is_none()
    }

    /// The settled outcome, if any.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.inner.borrow().outcome.clone()
    }

    /// True if both handles refer to the same promise.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` once with the outcome: now if settled, otherwise on settlement.
    pub fn then<F>(&self, f: F)
    where
        F: FnOnce(&Result<T, E>) + 'static,
    {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            match &inner.outcome {
                Some(outcome) => Some(outcome.clone()),
                None => {
                    inner.continuations.push(Box::new(f));
                    return;
                }
            }
        };

        // Borrow released: the continuation may attach to this promise again.
        if let Some(outcome) = settled {
            f(&outcome);
        }
    }

    /// Fulfill the promise. Returns false if it had already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Fail the promise. Returns false if it had already settled.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: Result<T, E>) -> bool {
        let continuations = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                warn!("ignoring settlement of an already settled promise");
                return false;
            }
            inner.outcome = Some(outcome.clone());
            core::mem::take(&mut inner.continuations)
        };

        for continuation in continuations {
            continuation(&outcome);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    type P = Promise<u32, String>;

    #[test]
    fn attach_while_pending_runs_on_resolve() {
        let p = P::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in 0..3 {
            let seen = Rc::clone(&seen);
            p.then(move |r| seen.borrow_mut().push((tag, r.clone())));
        }
        assert!(seen.borrow().is_empty());

        assert!(p.resolve(7));
        assert_eq!(*seen.borrow(), vec![(0, Ok(7)), (1, Ok(7)), (2, Ok(7))]);
    }

    #[test]
    fn attach_after_settled_replays_immediately() {
        let p = P::new();
        p.reject("gone".into());

        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        p.then(move |r| {
            assert_eq!(r, &Err("gone".to_string()));
            h.set(h.get() + 1);
        });
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn settles_only_once() {
        let p = P::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        p.then(move |_| h.set(h.get() + 1));

        assert!(p.resolve(1));
        assert!(!p.resolve(2));
        assert!(!p.reject("late".into()));
        assert_eq!(hits.get(), 1);
        assert_eq!(p.outcome(), Some(Ok(1)));
    }

    #[test]
    fn continuation_can_reattach() {
        let p = P::new();
        let hits = Rc::new(Cell::new(0));

        let again = p.clone();
        let h = Rc::clone(&hits);
        p.then(move |_| {
            let h2 = Rc::clone(&h);
            again.then(move |_| h2.set(h2.get() + 1));
            h.set(h.get() + 1);
        });
        p.resolve(3);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn clones_share_identity() {
        let a = P::new();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&P::new()));
    }
}
