//! Delivery contexts: where observer callbacks actually run.
//!
//! A dispatcher never calls observers on the dispatching thread. It packages
//! each dispatch as one unit of [`Work`] and hands it to a [`DeliveryContext`],
//! a single-consumer FIFO queue. Every unit runs to completion before the next
//! one starts, in enqueue order.
//!
//! Two contexts are provided:
//! - [`DeliveryThread`]: a dedicated worker thread, the usual "main" context.
//! - [`ManualQueue`]: a queue drained by whoever owns it, either a host that
//!   pumps its own event loop or a test that steps delivery one unit at a time.

use std::{
    fmt, io,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle, ThreadId},
};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

/// One scheduled unit of delivery.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// A single-consumer queue that runs [`Work`] in the order it was scheduled.
pub trait DeliveryContext: Send + Sync {
    /// Enqueue `work`. Never blocks on the work itself running.
    fn schedule(&self, work: Work) -> Result<(), DeliveryError>;
}

impl<C: DeliveryContext + ?Sized> DeliveryContext for Arc<C> {
    fn schedule(&self, work: Work) -> Result<(), DeliveryError> {
        (**self).schedule(work)
    }
}

/// Errors raised by delivery contexts.
#[derive(Debug)]
pub enum DeliveryError {
    /// The context has shut down and accepts no more work.
    Closed,
    /// The delivery thread could not be started.
    Spawn(io::Error),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Closed => f.write_str("delivery context is closed"),
            DeliveryError::Spawn(err) => write!(f, "failed to spawn delivery thread: {}", err),
        }
    }
}

impl std::error::Error for DeliveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeliveryError::Spawn(err) => Some(err),
            DeliveryError::Closed => None,
        }
    }
}

// =============================================================================
// Delivery thread
// =============================================================================

enum Message {
    Work(Work),
    Shutdown,
}

/// Builder for a [`DeliveryThread`].
#[derive(Debug, Default)]
pub struct Builder {
    name: Option<String>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the worker thread, shown in panics and debuggers.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Start the worker thread.
    pub fn spawn(self) -> Result<DeliveryThread, DeliveryError> {
        let name = self.name.unwrap_or_else(|| "delivery".to_string());
        let (sender, receiver) = channel::unbounded();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(receiver))
            .map_err(DeliveryError::Spawn)?;

        log::debug!("delivery thread '{}' started", name);

        Ok(DeliveryThread {
            name,
            thread_id: handle.thread().id(),
            handle: Some(handle),
            inner: DeliveryHandle {
                sender,
                closed: Arc::new(RwLock::new(false)),
            },
        })
    }
}

fn run_worker(receiver: Receiver<Message>) {
    loop {
        match receiver.recv() {
            Ok(Message::Work(work)) => {
                if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
                    log::error!("delivery work panicked; continuing with next work");
                }
            }
            Ok(Message::Shutdown) => break,
            // Every sender is gone.
            Err(_) => break,
        }
    }
}

/// A dedicated thread that runs all scheduled work, one unit at a time.
///
/// Dropping the `DeliveryThread` stops accepting work, lets the worker finish
/// everything queued before the drop, and joins it. Work scheduled through a
/// [`DeliveryHandle`] after that point is refused with
/// [`DeliveryError::Closed`].
///
/// ```rust
/// use rusty_dispatch::context::{DeliveryContext, DeliveryThread};
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
///
/// let thread = DeliveryThread::spawn().unwrap();
/// let hits = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&hits);
/// thread.handle().schedule(Box::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// })).unwrap();
///
/// thread.sync().unwrap();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
pub struct DeliveryThread {
    name: String,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
    inner: DeliveryHandle,
}

impl DeliveryThread {
    /// Start a delivery thread with default settings.
    pub fn spawn() -> Result<Self, DeliveryError> {
        Builder::new().spawn()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    /// A cloneable handle that schedules work on this thread.
    pub fn handle(&self) -> DeliveryHandle {
        self.inner.clone()
    }

    /// The worker thread's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the caller is running on this delivery thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Block until every unit scheduled before this call has run.
    ///
    /// Calling this from the delivery thread itself would wait forever, so it
    /// returns immediately in that case.
    pub fn sync(&self) -> Result<(), DeliveryError> {
        if self.is_current() {
            return Ok(());
        }
        let (tx, rx) = channel::bounded::<()>(1);
        self.inner.schedule(Box::new(move || {
            let _ = tx.send(());
        }))?;
        rx.recv().map_err(|_| DeliveryError::Closed)
    }

    /// Stop accepting work, drain what is queued and join the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        {
            // Held across the send so no work can land behind `Shutdown`.
            let mut closed = self
                .inner
                .closed
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return;
            }
            *closed = true;
            let _ = self.inner.sender.send(Message::Shutdown);
        }

        if let Some(handle) = self.handle.take() {
            if self.is_current() {
                // Dropped from inside an observer; the worker exits on its own.
                return;
            }
            if handle.join().is_err() {
                log::error!("delivery thread '{}' terminated abnormally", self.name);
            }
        }
        log::debug!("delivery thread '{}' stopped", self.name);
    }
}

impl Drop for DeliveryThread {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for DeliveryThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryThread")
            .field("name", &self.name)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

/// Schedules work on a [`DeliveryThread`] from any thread.
///
/// Work accepted with `Ok` is always run: the closed check and the enqueue
/// happen under the same lock that shutdown takes.
#[derive(Clone)]
pub struct DeliveryHandle {
    sender: Sender<Message>,
    closed: Arc<RwLock<bool>>,
}

impl DeliveryHandle {
    /// Whether the owning thread has shut down.
    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeliveryContext for DeliveryHandle {
    fn schedule(&self, work: Work) -> Result<(), DeliveryError> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(DeliveryError::Closed);
        }
        self.sender
            .send(Message::Work(work))
            .map_err(|_| DeliveryError::Closed)
    }
}

// =============================================================================
// Manual queue
// =============================================================================

/// A delivery queue drained explicitly by its owner.
///
/// Clones share the same queue. Work only runs when
/// [`run_one`](Self::run_one) or [`run_pending`](Self::run_pending) is called,
/// on the calling thread, so a host's own loop (or a test) decides when
/// observers fire. A panic in scheduled work propagates to the caller;
/// dispatcher deliveries already contain observer panics.
#[derive(Clone)]
pub struct ManualQueue {
    sender: Sender<Work>,
    receiver: Receiver<Work>,
    closed: Arc<AtomicBool>,
}

impl ManualQueue {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            receiver,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of units waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run the oldest waiting unit. Returns `false` if the queue was empty.
    pub fn run_one(&self) -> bool {
        match self.receiver.try_recv() {
            Ok(work) => {
                work();
                true
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    /// Run the units that were waiting when the call started; work scheduled
    /// while they run is left for the next call. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let waiting = self.pending();
        let mut ran = 0;
        while ran < waiting && self.run_one() {
            ran += 1;
        }
        ran
    }

    /// Refuse further work. Units already queued can still be run.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for ManualQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryContext for ManualQueue {
    fn schedule(&self, work: Work) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.sender.send(work).map_err(|_| DeliveryError::Closed)
    }
}

impl fmt::Debug for ManualQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualQueue")
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}
