//! Cached, de-duplicating buffer loader.
//!
//! ```text
//!            get(src)             decode ok
//!   Start ────────────▶ InProgress ─────────▶ Fetched
//!     ▲                     │                   │
//!     │                     └─────────▶ Error   │
//!     │                      decode err   │     │
//!     └───────────────────────────────────┴─────┘
//!          get(other src) / get(replace) / set() after settling
//! ```
//!
//! Every cycle through `Start` creates a fresh [`BufferPromise`]. Standing
//! subscribers are re-attached to each fresh promise, so a node bound once
//! keeps receiving results across refreshes.

use core::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use tracing::{debug, trace, warn};

use super::decode::Decoder;
use super::{BufferDef, BufferDesc, Promise, SharedBuffers};
use crate::error::DecodeError;

/// Outcome of a buffer request: the buffer, or the failure message.
pub type BufferResult = Result<Rc<BufferDesc>, String>;

/// Pending or settled result of one fetch cycle.
pub type BufferPromise = Promise<Rc<BufferDesc>, String>;

type Subscriber = Rc<dyn Fn(&BufferResult)>;

/// Lifecycle of a [`BufferSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceState {
    Start,
    InProgress,
    Fetched,
    Error,
}

struct Inner {
    state: SourceState,
    id: Option<String>,
    src: Option<String>,
    promise: BufferPromise,
    subscribers: Vec<Subscriber>,
    decoder: Rc<dyn Decoder>,
    buffers: Option<SharedBuffers>,
}

/// Loader and cache for one buffer identifier.
///
/// At most one decode is in flight at a time; every request made while one
/// is running shares its result. Clones refer to the same source.
#[derive(Clone)]
pub struct BufferSource {
    inner: Rc<RefCell<Inner>>,
}

impl BufferSource {
    /// A source that decodes with `decoder` and publishes fetched buffers to `buffers`.
    pub fn new(decoder: Rc<dyn Decoder>, buffers: Option<SharedBuffers>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: SourceState::Start,
                id: None,
                src: None,
                promise: BufferPromise::new(),
                subscribers: Vec::new(),
                decoder,
                buffers,
            })),
        }
    }

    /// Name the buffers this source produces (builder pattern).
    ///
    /// Results that carry no id of their own are given this one.
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.inner.borrow_mut().id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<String> {
        self.inner.borrow().id.clone()
    }

    pub fn state(&self) -> SourceState {
        self.inner.borrow().state
    }

    /// The last requested source reference.
    pub fn src(&self) -> Option<String> {
        self.inner.borrow().src.clone()
    }

    /// The promise of the current cycle.
    pub fn promise(&self) -> BufferPromise {
        self.inner.borrow().promise.clone()
    }

    /// Number of standing subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Request the buffer described by `def`.
    ///
    /// - while a fetch is in progress, returns its promise
    /// - after a fetch, the same `src` without `replace` is a cache hit
    /// - a different `src`, or `replace`, starts a fresh cycle
    /// - without any `src`, returns the current promise untouched
    pub fn get(&self, def: &BufferDef) -> BufferPromise {
        let src = def.source().map(str::to_owned);

        let (decoder, promise, src) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state == SourceState::InProgress || (src == inner.src && !def.replace) {
                trace!(src = ?inner.src, state = ?inner.state, "buffer source cache hit");
                return inner.promise.clone();
            }

            let src = match src {
                Some(src) => src,
                None => return inner.promise.clone(),
            };

            if matches!(inner.state, SourceState::Fetched | SourceState::Error) {
                Self::refresh(&mut inner);
            }

            inner.src = Some(src.clone());
            inner.state = SourceState::InProgress;
            (Rc::clone(&inner.decoder), inner.promise.clone(), src)
        };

        debug!(%src, id = ?def.id, "fetching buffer");
        let source = self.clone();
        let cycle = promise.clone();
        decoder.decode(
            &src,
            Box::new(move |result| source.complete(&cycle, result)),
        );

        promise
    }

    /// Fulfill the current cycle with `desc` directly, without decoding.
    ///
    /// If the current cycle already settled, a fresh one is started first so
    /// that every subscriber sees the new data.
    pub fn set(&self, desc: BufferDesc) -> BufferPromise {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.promise.is_pending() {
                Self::refresh(&mut inner);
            }
        }
        self.fulfill(desc)
    }

    /// Fail the current cycle with `message`.
    ///
    /// Like [`set`](Self::set), a settled cycle is refreshed first.
    pub fn error(&self, message: impl Into<String>) -> BufferPromise {
        let promise = {
            let mut inner = self.inner.borrow_mut();
            if !inner.promise.is_pending() {
                Self::refresh(&mut inner);
            }
            inner.state = SourceState::Error;
            inner.promise.clone()
        };
        promise.reject(message.into());
        promise
    }

    /// Keep `subscriber` informed of this and every later cycle's result.
    ///
    /// If the current cycle already settled, `subscriber` runs immediately.
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&BufferResult) + 'static,
    {
        let subscriber: Subscriber = Rc::new(subscriber);
        let promise = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.push(Rc::clone(&subscriber));
            inner.promise.clone()
        };
        promise.then(move |result| subscriber(result));
    }

    fn complete(&self, cycle: &BufferPromise, result: Result<BufferDesc, DecodeError>) {
        if !cycle.ptr_eq(&self.inner.borrow().promise) {
            warn!("discarding decode result for a superseded fetch");
            return;
        }
        // Data set inline while the decode was running takes precedence.
        if !cycle.is_pending() {
            warn!(src = ?self.src(), "discarding decode result for an already settled cycle");
            return;
        }

        match result {
            Ok(desc) => {
                self.fulfill(desc);
            }
            Err(err) => {
                warn!(src = ?self.src(), error = %err, "buffer decode failed");
                self.error(err.to_string());
            }
        }
    }

    fn fulfill(&self, mut desc: BufferDesc) -> BufferPromise {
        let (promise, buffers) = {
            let mut inner = self.inner.borrow_mut();
            inner.state = SourceState::Fetched;
            if desc.id.is_none() {
                desc.id = inner.id.clone();
            }
            (inner.promise.clone(), inner.buffers.clone())
        };
        let desc = Rc::new(desc);

        if let Some(buffers) = buffers {
            buffers.borrow_mut().register(Rc::clone(&desc));
        }
        promise.resolve(desc);
        promise
    }

    /// Back to `Start` with a fresh promise that every subscriber is attached to.
    fn refresh(inner: &mut Inner) {
        trace!(src = ?inner.src, "refreshing buffer source");
        inner.state = SourceState::Start;
        inner.promise = BufferPromise::new();
        for subscriber in &inner.subscribers {
            let subscriber = Rc::clone(subscriber);
            inner.promise.then(move |result| subscriber(result));
        }
    }
}

/// One [`BufferSource`] per buffer id, created on first reference.
#[derive(Default)]
pub struct BufferSources {
    sources: RefCell<HashMap<String, BufferSource>>,
}

/// The per-id source registry as shared by an environment.
pub type SharedSources = Rc<BufferSources>;

impl BufferSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<BufferSource> {
        self.sources.borrow().get(id).cloned()
    }

    /// The source for `id`, created with `create` if there is none yet.
    pub fn get_or_insert_with<F>(&self, id: &str, create: F) -> BufferSource
    where
        F: FnOnce() -> BufferSource,
    {
        self.sources
            .borrow_mut()
            .entry(id.to_owned())
            .or_insert_with(create)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sources.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferRegistry;
    use crate::buffer::DecodeCallback;
    use core::cell::Cell;

    /// Records requests; the test completes them by hand.
    #[derive(Default)]
    struct Manual {
        calls: RefCell<Vec<(String, DecodeCallback)>>,
    }

    impl Manual {
        fn count(&self) -> usize {
            self.calls.borrow().len()
        }

        fn finish(&self, result: Result<BufferDesc, DecodeError>) {
            let (_, done) = self.calls.borrow_mut().remove(0);
            done(result);
        }
    }

    impl Decoder for Manual {
        fn decode(&self, src: &str, done: DecodeCallback) {
            self.calls.borrow_mut().push((src.to_owned(), done));
        }
    }

    fn source() -> (Rc<Manual>, BufferSource, SharedBuffers) {
        let decoder = Rc::new(Manual::default());
        let buffers = BufferRegistry::shared();
        let source = BufferSource::new(decoder.clone(), Some(Rc::clone(&buffers)));
        (decoder, source, buffers)
    }

    fn tone(id: &str) -> BufferDesc {
        BufferDesc::new(vec![vec![0.1, 0.2]]).with_id(id)
    }

    #[test]
    fn concurrent_gets_share_one_fetch() {
        let (decoder, source, _) = source();
        let def = BufferDef::fetch("kick", "kick.wav");

        let first = source.get(&def);
        assert_eq!(source.state(), SourceState::InProgress);
        let second = source.get(&def);
        let third = source.get(&def.clone().replacing());

        assert_eq!(decoder.count(), 1);
        assert!(first.ptr_eq(&second) && first.ptr_eq(&third));
    }

    #[test]
    fn success_fetches_and_registers() {
        let (decoder, source, buffers) = source();
        let p = source.get(&BufferDef::fetch("kick", "kick.wav"));

        decoder.finish(Ok(tone("kick")));
        assert_eq!(source.state(), SourceState::Fetched);
        assert_eq!(p.outcome().and_then(Result::ok).map(|d| d.num_frames()), Some(2));
        assert!(buffers.borrow().contains("kick"));
    }

    #[test]
    fn same_src_is_a_cache_hit() {
        let (decoder, source, _) = source();
        let def = BufferDef::fetch("kick", "kick.wav");
        let first = source.get(&def);
        decoder.finish(Ok(tone("kick")));

        let again = source.get(&def);
        assert_eq!(decoder.count(), 0);
        assert!(first.ptr_eq(&again));
        assert!(!again.is_pending());
    }

    #[test]
    fn replace_or_new_src_refetches() {
        let (decoder, source, _) = source();
        let def = BufferDef::fetch("kick", "kick.wav");
        let first = source.get(&def);
        decoder.finish(Ok(tone("kick")));

        let replaced = source.get(&def.clone().replacing());
        assert_eq!(source.state(), SourceState::InProgress);
        assert_eq!(decoder.count(), 1);
        assert!(!replaced.ptr_eq(&first));
        decoder.finish(Ok(tone("kick")));

        let other = source.get(&BufferDef::fetch("kick", "kick2.wav"));
        assert!(!other.ptr_eq(&replaced));
        assert_eq!(decoder.count(), 1);
        assert_eq!(source.src().as_deref(), Some("kick2.wav"));
    }

    #[test]
    fn failure_enters_error_and_rejects() {
        let (decoder, source, buffers) = source();
        let p = source.get(&BufferDef::fetch("missing", "missing.wav"));
        decoder.finish(Err(DecodeError::Failed("no such file".into())));

        assert_eq!(source.state(), SourceState::Error);
        assert_eq!(p.outcome(), Some(Err("no such file".to_string())));
        assert!(buffers.borrow().is_empty());

        // Retrying requires replace.
        source.get(&BufferDef::fetch("missing", "missing.wav"));
        assert_eq!(decoder.count(), 0);
        source.get(&BufferDef::fetch("missing", "missing.wav").replacing());
        assert_eq!(decoder.count(), 1);
    }

    #[test]
    fn get_without_src_waits_on_current_cycle() {
        let (decoder, source, _) = source();
        let p = source.get(&BufferDef::by_id("pad"));
        assert_eq!(decoder.count(), 0);
        assert_eq!(source.state(), SourceState::Start);

        source.set(tone("pad"));
        assert!(!p.is_pending());
    }

    #[test]
    fn subscribers_follow_refreshes() {
        let (decoder, source, _) = source();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        source.subscribe(move |r| {
            assert!(r.is_ok());
            h.set(h.get() + 1);
        });

        let def = BufferDef::fetch("kick", "kick.wav");
        source.get(&def);
        decoder.finish(Ok(tone("kick")));
        assert_eq!(hits.get(), 1);

        source.get(&def.clone().replacing());
        decoder.finish(Ok(tone("kick")));
        assert_eq!(hits.get(), 2);

        source.set(tone("kick"));
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn late_subscribers_get_a_replay() {
        let (_, source, _) = source();
        source.set(tone("a"));

        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        source.subscribe(move |_| h.set(h.get() + 1));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn stale_results_are_discarded() {
        let (decoder, source, _) = source();
        source.get(&BufferDef::fetch("kick", "kick.wav"));
        source.set(tone("inline"));
        source.set(tone("inline2"));

        decoder.finish(Ok(tone("decoded")));
        let current = source.promise().outcome().and_then(Result::ok);
        assert_eq!(current.and_then(|d| d.id.clone()).as_deref(), Some("inline2"));
    }

    #[test]
    fn inline_set_wins_over_an_inflight_decode() {
        let (decoder, source, buffers) = source();
        let p = source.get(&BufferDef::fetch("kick", "kick.wav"));
        source.set(BufferDesc::new(vec![vec![0.0; 2]]).with_id("kick"));

        decoder.finish(Ok(BufferDesc::new(vec![vec![0.0; 99]]).with_id("kick")));
        assert_eq!(source.state(), SourceState::Fetched);
        assert!(p.ptr_eq(&source.promise()));
        assert_eq!(p.outcome().and_then(Result::ok).map(|d| d.num_frames()), Some(2));
        assert_eq!(buffers.borrow().get("kick").map(|d| d.num_frames()), Some(2));
    }

    #[test]
    fn failed_decode_after_inline_set_keeps_the_data() {
        let (decoder, source, _) = source();
        source.get(&BufferDef::fetch("kick", "kick.wav"));
        source.set(tone("kick"));

        decoder.finish(Err(DecodeError::Failed("no such file".into())));
        assert_eq!(source.state(), SourceState::Fetched);
        assert!(matches!(source.promise().outcome(), Some(Ok(_))));
    }

    #[test]
    fn error_after_settling_starts_a_new_cycle() {
        let (_, source, _) = source();
        let first = source.set(tone("kick"));
        let failed = source.error("gone");

        assert!(!failed.ptr_eq(&first));
        assert_eq!(source.state(), SourceState::Error);
        assert_eq!(failed.outcome(), Some(Err("gone".to_string())));
    }

    #[test]
    fn registry_creates_once_per_id() {
        let sources = BufferSources::new();
        let created = Cell::new(0);
        let make = || {
            created.set(created.get() + 1);
            BufferSource::new(Rc::new(Manual::default()), None)
        };

        let a = sources.get_or_insert_with("a", make);
        let a2 = sources.get_or_insert_with("a", || unreachable!());
        assert!(Rc::ptr_eq(&a.inner, &a2.inner));
        assert_eq!(created.get(), 1);
        assert_eq!(sources.len(), 1);
    }
}
