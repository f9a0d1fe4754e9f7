//! Decode collaborators: turn a source reference into sample data.
//!
//! A [`Decoder`] accepts requests and reports each result through a
//! callback. Callbacks always run on the thread that owns the decoder; work
//! that happens elsewhere is handed back in [`Decoder::poll`].
//!
//! - [`SyncDecoder`] runs a [`Loader`] inline and completes before returning.
//! - [`BackgroundDecoder`] runs a [`Loader`] on a worker thread and hands
//!   results back through a lock-free ring buffer.
//! - [`NullDecoder`] fails every request.

use core::cell::{Cell, RefCell};
use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hashbrown::HashMap;
use lewton::inside_ogg::OggStreamReader;
use rtrb::{Consumer, Producer, PushError, RingBuffer};
use tracing::{debug, trace, warn};

use super::BufferDesc;
use crate::error::DecodeError;

/// Receives the outcome of one decode request.
pub type DecodeCallback = Box<dyn FnOnce(Result<BufferDesc, DecodeError>)>;

/// Asynchronous decode collaborator.
pub trait Decoder {
    /// Start decoding `src`. `done` runs exactly once, possibly before this returns.
    fn decode(&self, src: &str, done: DecodeCallback);

    /// Deliver finished work. Returns the number of callbacks run.
    fn poll(&self) -> usize {
        0
    }
}

/// Blocking source-to-samples conversion, used by the provided decoders.
pub trait Loader: Send + 'static {
    fn load(&mut self, src: &str) -> Result<BufferDesc, DecodeError>;
}

impl<F> Loader for F
where
    F: FnMut(&str) -> Result<BufferDesc, DecodeError> + Send + 'static,
{
    fn load(&mut self, src: &str) -> Result<BufferDesc, DecodeError> {
        self(src)
    }
}

/// Loads Ogg Vorbis files from disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct OggLoader;

impl Loader for OggLoader {
    fn load(&mut self, src: &str) -> Result<BufferDesc, DecodeError> {
        let file = File::open(src)?;
        let mut reader = OggStreamReader::new(file)?;

        let channels = usize::from(reader.ident_hdr.audio_channels).max(1);
        let sample_rate = f64::from(reader.ident_hdr.audio_sample_rate);
        let mut data = vec![Vec::new(); channels];

        while let Some(packet) = reader.read_dec_packet_itl()? {
            for (idx, sample) in packet.iter().enumerate() {
                data[idx % channels].push(f32::from(*sample) / 32_768.0);
            }
        }

        debug!(src, channels, frames = data[0].len(), "decoded ogg");
        Ok(BufferDesc::new(data).with_src(src).with_sample_rate(sample_rate))
    }
}

/// Fails every request with [`DecodeError::Unsupported`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDecoder;

impl Decoder for NullDecoder {
    fn decode(&self, src: &str, done: DecodeCallback) {
        done(Err(DecodeError::Unsupported { src: src.to_owned() }));
    }
}

/// Runs a [`Loader`] on the calling thread.
pub struct SyncDecoder<L: Loader> {
    loader: RefCell<L>,
}

impl<L: Loader> SyncDecoder<L> {
    pub fn new(loader: L) -> Self {
        Self { loader: RefCell::new(loader) }
    }
}

impl<L: Loader> Decoder for SyncDecoder<L> {
    fn decode(&self, src: &str, done: DecodeCallback) {
        let result = self.loader.borrow_mut().load(src);
        done(result);
    }
}

struct Job {
    ticket: u64,
    src: String,
}

struct Completion {
    ticket: u64,
    result: Result<BufferDesc, DecodeError>,
}

/// Runs a [`Loader`] on a dedicated worker thread.
///
/// Requests and results travel through `rtrb` ring buffers, so the owning
/// thread never blocks on the worker. Call [`poll`](Decoder::poll) from the
/// owning thread's event loop to run the completion callbacks.
pub struct BackgroundDecoder {
    jobs: RefCell<Producer<Job>>,
    results: RefCell<Consumer<Completion>>,
    pending: RefCell<HashMap<u64, DecodeCallback>>,
    next_ticket: Cell<u64>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundDecoder {
    /// Spawn a worker with room for 64 queued requests.
    pub fn new<L: Loader>(loader: L) -> io::Result<Self> {
        Self::with_capacity(loader, 64)
    }

    /// Spawn a worker with room for `capacity` queued requests.
    pub fn with_capacity<L: Loader>(loader: L, capacity: usize) -> io::Result<Self> {
        let (jobs, job_rx) = RingBuffer::new(capacity);
        let (result_tx, results) = RingBuffer::new(capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&shutdown);
        let worker = thread::Builder::new()
            .name("synthgraph-decoder".into())
            .spawn(move || run_worker(loader, job_rx, result_tx, flag))?;

        Ok(Self {
            jobs: RefCell::new(jobs),
            results: RefCell::new(results),
            pending: RefCell::new(HashMap::new()),
            next_ticket: Cell::new(0),
            shutdown,
            worker: Some(worker),
        })
    }

    /// Requests whose callbacks have not run yet.
    pub fn in_flight(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl Decoder for BackgroundDecoder {
    fn decode(&self, src: &str, done: DecodeCallback) {
        let ticket = self.next_ticket.get();
        self.next_ticket.set(ticket + 1);

        let pushed = self.jobs.borrow_mut().push(Job { ticket, src: src.to_owned() });
        match pushed {
            Ok(()) => {
                trace!(src, ticket, "queued decode");
                self.pending.borrow_mut().insert(ticket, done);
                if let Some(worker) = &self.worker {
                    worker.thread().unpark();
                }
            }
            Err(PushError::Full(job)) => {
                warn!(src, "decode queue full");
                done(Err(DecodeError::QueueFull { src: job.src }));
            }
        }
    }

    fn poll(&self) -> usize {
        let mut delivered = 0;
        loop {
            let completion = match self.results.borrow_mut().pop() {
                Ok(completion) => completion,
                Err(_) => break,
            };

            // Borrows released: a callback may queue more work.
            let callback = self.pending.borrow_mut().remove(&completion.ticket);
            if let Some(callback) = callback {
                callback(completion.result);
                delivered += 1;
            }
        }
        delivered
    }
}

impl Drop for BackgroundDecoder {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            if worker.join().is_err() {
                warn!("decoder worker panicked");
            }
        }
    }
}

fn run_worker<L: Loader>(
    mut loader: L,
    mut jobs: Consumer<Job>,
    mut results: Producer<Completion>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        while let Ok(job) = jobs.pop() {
            let mut completion = Completion {
                ticket: job.ticket,
                result: loader.load(&job.src),
            };

            // The owner drains results in poll(); wait for room rather than drop one.
            loop {
                match results.push(completion) {
                    Ok(()) => break,
                    Err(PushError::Full(back)) => {
                        if shutdown.load(Ordering::Acquire) {
                            return;
                        }
                        completion = back;
                        thread::park_timeout(Duration::from_millis(1));
                    }
                }
            }
        }

        if shutdown.load(Ordering::Acquire) {
            return;
        }
        thread::park_timeout(Duration::from_millis(50));
    }
}
