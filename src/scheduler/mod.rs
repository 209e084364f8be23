//! Scheduler - global lock arbitration between execution contexts
//!
//! Design: one process-wide fair mutex stands in for "the right to run foreign
//! code". A context enters by taking the mutex and switching its thread-state
//! in; it leaves by switching the thread-state out and releasing the mutex.
//! Those two points are the only places the lock changes hands.
//!
//! The mutex is held for the whole closure, even across foreign calls that
//! drop the engine's own lock (sleeps, blocking I/O). A foreign sleep
//! therefore stalls every other context; that is the accepted trade-off for
//! never running two contexts' code at once.
//!
//! - `context.rs` - execution contexts (worker thread + FIFO queue)

mod context;

pub use context::{Context, Pending};

use core::ptr::NonNull;
use parking_lot::{FairMutex, FairMutexGuard};
use pyo3::ffi as py;
use std::cell::Cell;

use crate::error::{Error, Result};
use crate::interpreter::Interpreter;
use crate::logging::{debug, trace};

static ENGINE_LOCK: FairMutex<()> = parking_lot::const_fair_mutex(());

thread_local! {
    static HOLDING: Cell<bool> = const { Cell::new(false) };
}

/// Whether the calling thread is currently inside a closure holding the lock.
#[inline]
pub(crate) fn holds_lock() -> bool {
    HOLDING.with(Cell::get)
}

/// A foreign thread-state owned by one execution context.
///
/// Created and destroyed on the context's worker thread.
pub(crate) struct ThreadState(NonNull<py::PyThreadState>);

impl ThreadState {
    pub(crate) fn new(interpreter: &Interpreter) -> Result<Self> {
        let state = unsafe { py::PyThreadState_New(interpreter.state()) };
        let state = NonNull::new(state)
            .ok_or_else(|| Error::Initialization("PyThreadState_New failed".to_string()))?;

        debug!(event = "thread_state_new", state = ?state);
        Ok(Self(state))
    }

    /// Take the lock and make this thread-state current.
    ///
    /// Blocks until no other context holds the lock.
    pub(crate) fn enter(&self) -> Entered<'_> {
        let guard = ENGINE_LOCK.lock();
        unsafe { py::PyEval_RestoreThread(self.0.as_ptr()) };
        HOLDING.with(|h| h.set(true));
        trace!(event = "lock_acquired", state = ?self.0);

        Entered {
            state: self,
            _guard: guard,
        }
    }
}

impl Drop for ThreadState {
    fn drop(&mut self) {
        let state = self.0.as_ptr();
        unsafe {
            // Clearing needs the lock; deletion needs the state to be non-current.
            let entered = self.enter();
            py::PyThreadState_Clear(state);
            drop(entered);
            py::PyThreadState_Delete(state);
        }
        debug!(event = "thread_state_delete", state = ?self.0);
    }
}

/// Scoped ownership of the engine lock.
///
/// Dropping it (normally or while unwinding) saves the thread-state and then
/// releases the mutex, in that order.
pub(crate) struct Entered<'a> {
    state: &'a ThreadState,
    _guard: FairMutexGuard<'static, ()>,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        HOLDING.with(|h| h.set(false));
        let saved = unsafe { py::PyEval_SaveThread() };
        debug_assert_eq!(saved, self.state.0.as_ptr(), "thread-state switched under the lock");
        trace!(event = "lock_released", state = ?self.state.0);
    }
}
