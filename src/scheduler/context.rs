//! Execution contexts
//!
//! A context is a message-passing worker: one OS thread that owns a foreign
//! thread-state and drains a FIFO `flume` queue, running each job with the
//! engine lock held. Jobs on one context run in submission order; jobs on
//! different contexts are mutually exclusive but unordered.
//!
//! Lifecycle: `Idle -> Running -> Idle` per job, `Idle -> Closed` on close. A
//! close request is queued behind already-submitted work, so in-flight and
//! pending jobs always complete before the thread-state is destroyed.

use flume::{Receiver, Sender};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use super::{holds_lock, ThreadState};
use crate::error::{Error, Result};
use crate::interpreter::{self, Interpreter};
use crate::logging::{debug, error, trace, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    /// Stop after the jobs queued so far; signal `done` once the thread-state is gone.
    Close(Option<Sender<()>>),
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);
static DEFAULT: OnceCell<Context> = OnceCell::new();

struct Shared {
    id: u64,
    name: String,
    is_default: bool,
    /// `None` once closed.
    sender: Mutex<Option<Sender<Message>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Last host reference gone: let the worker drain and exit on its own.
        if let Some(sender) = self.sender.get_mut().take() {
            let _ = sender.send(Message::Close(None));
            debug!(event = "context_release", context = %self.name, id = self.id);
        }
    }
}

/// Handle to an execution context. Clones refer to the same context.
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

impl Context {
    /// Spawn a new context with its own worker thread and thread-state.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::spawn(name.into(), false)
    }

    /// The process-wide default context, created on first use and never closed.
    pub fn default_context() -> Result<Self> {
        DEFAULT
            .get_or_try_init(|| Self::spawn("default".to_string(), true))
            .cloned()
    }

    fn spawn(name: String, is_default: bool) -> Result<Self> {
        let interpreter = interpreter::get()?;
        let config = interpreter::config();
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

        let (sender, receiver) = flume::unbounded();
        let (ready_tx, ready_rx) = flume::bounded(1);

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, name));
        if let Some(size) = config.worker_stack_size {
            builder = builder.stack_size(size);
        }

        let worker_name = name.clone();
        builder
            .spawn(move || run_worker(interpreter, worker_name, receiver, ready_tx))
            .map_err(|e| Error::Initialization(format!("spawning context '{}': {}", name, e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(Error::Initialization(format!(
                    "context '{}' worker exited during startup",
                    name
                )))
            }
        }

        debug!(event = "context_spawn", context = %name, id, is_default);

        Ok(Self {
            shared: Arc::new(Shared {
                id,
                name,
                is_default,
                sender: Mutex::new(Some(sender)),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_default(&self) -> bool {
        self.shared.is_default
    }

    pub fn is_closed(&self) -> bool {
        self.shared.sender.lock().is_none()
    }

    /// Run `f` with the engine lock held and this context's thread-state active.
    ///
    /// Blocks until `f` has finished. A panic in `f` is re-raised here after
    /// the lock has been released. Called from inside another closure (the
    /// caller already holds the lock), `f` runs inline on the current thread.
    pub fn execute<'a, F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'a,
        R: Send + 'a,
    {
        if holds_lock() {
            if self.is_closed() {
                return Err(self.closed());
            }
            return Ok(f());
        }

        let (reply, outcome) = flume::bounded(1);
        let call = Call { f, reply };
        let job: Box<dyn FnOnce() + Send + 'a> = Box::new(move || call.run());

        // SAFETY: we block on `outcome` until the job has run or been dropped.
        // `Call` drops `f` before `reply`, so every borrow in `f` is released
        // before the receive below can return.
        let job: Job = unsafe { mem::transmute::<Box<dyn FnOnce() + Send + 'a>, Job>(job) };
        self.enqueue(job)?;

        match outcome.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => Err(self.closed()),
        }
    }

    /// Queue `f` without waiting for it.
    ///
    /// Called while already holding the lock, `f` runs immediately and the
    /// returned `Pending` is already complete.
    pub fn submit<F, R>(&self, f: F) -> Result<Pending<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, outcome) = flume::bounded(1);
        let pending = Pending {
            outcome,
            context: self.shared.name.clone(),
        };
        let call = Call { f, reply };

        if holds_lock() {
            if self.is_closed() {
                return Err(self.closed());
            }
            call.run();
        } else {
            self.enqueue(Box::new(move || call.run()))?;
        }

        Ok(pending)
    }

    /// Close the context.
    ///
    /// New submissions fail with `ContextClosed` from this point on. Blocks
    /// until every job queued before the close has run and the thread-state is
    /// destroyed, except when called while holding the lock (from inside a
    /// closure): then the close is deferred until the running job completes.
    /// The default context cannot be closed.
    pub fn close(&self) {
        if self.shared.is_default {
            warn!(event = "close_default", "Ignoring close of the default context");
            return;
        }

        let (done_tx, done_rx) = flume::bounded(1);
        let requested = match self.shared.sender.lock().take() {
            Some(sender) => sender.send(Message::Close(Some(done_tx))).is_ok(),
            None => false,
        };
        if !requested {
            return;
        }

        if holds_lock() {
            debug!(event = "close_deferred", context = %self.shared.name);
            return;
        }

        let _ = done_rx.recv();
        debug!(event = "context_closed", context = %self.shared.name, id = self.shared.id);
    }

    fn enqueue(&self, job: Job) -> Result<()> {
        let sender = self.shared.sender.lock();
        match sender.as_ref() {
            Some(tx) => {
                trace!(event = "job_queued", context = %self.shared.name);
                tx.send(Message::Run(job)).map_err(|_| self.closed())
            }
            None => {
                error!(event = "submit_after_close", context = %self.shared.name);
                Err(self.closed())
            }
        }
    }

    fn closed(&self) -> Error {
        Error::ContextClosed(self.shared.name.clone())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A closure and the channel its outcome goes back on.
///
/// Field order matters: `f` must be dropped before `reply`.
struct Call<F, R> {
    f: F,
    reply: Sender<thread::Result<R>>,
}

impl<F, R> Call<F, R>
where
    F: FnOnce() -> R,
{
    fn run(self) {
        let Call { f, reply } = self;
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));
        let _ = reply.send(outcome);
    }
}

/// Result of a [`Context::submit`].
pub struct Pending<R> {
    outcome: Receiver<thread::Result<R>>,
    context: String,
}

impl<R> Pending<R> {
    /// Wait for the job. A panic in the job is re-raised here.
    pub fn wait(self) -> Result<R> {
        match self.outcome.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => Err(Error::ContextClosed(self.context)),
        }
    }

    /// Whether the job has finished (successfully or not).
    pub fn is_done(&self) -> bool {
        !self.outcome.is_empty() || self.outcome.is_disconnected()
    }
}

impl<R> fmt::Debug for Pending<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("context", &self.context)
            .field("done", &self.is_done())
            .finish()
    }
}

fn run_worker(
    interpreter: &'static Interpreter,
    name: String,
    receiver: Receiver<Message>,
    ready: Sender<Result<()>>,
) {
    let state = match ThreadState::new(interpreter) {
        Ok(state) => state,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    drop(ready);

    let mut done = None;
    for message in receiver.iter() {
        match message {
            Message::Run(job) => {
                let entered = state.enter();
                // Jobs catch their own panics; this only guards the worker.
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(event = "job_panicked", context = %name);
                }
                drop(entered);
                trace!(event = "job_done", context = %name);
            }
            Message::Close(reply) => {
                done = reply;
                break;
            }
        }
    }

    // The sender is taken under the same mutex that guards submission, so
    // nothing can be queued behind a close.
    drop(receiver);
    drop(state);
    debug!(event = "worker_exit", context = %name);

    if let Some(done) = done {
        let _ = done.send(());
    }
}
