//! Handle - owner of one long-lived foreign reference
//!
//! Unlike `Owned`, a `Handle` may be dropped on any thread at any time, so its
//! finalizer cannot assume the engine lock. It releases inline when the
//! dropping thread already holds the lock and otherwise hands the release to
//! the default context as a fire-and-forget job.

use core::ptr::NonNull;
use pyo3::ffi as py;
use std::fmt;

use crate::ffi::refcount::Owned;
use crate::interpreter::Interpreter;
use crate::logging::{trace, warn};
use crate::scheduler::{holds_lock, Context};

pub(crate) struct Handle {
    ptr: NonNull<py::PyObject>,
    /// False for the boolean singletons, which the interpreter keeps alive.
    owned: bool,
}

// Only dereferenced under the engine lock.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
    /// Adopt a reference. Must be called with the lock held.
    pub(crate) fn wrap(reference: Owned, interpreter: &Interpreter) -> Self {
        let ptr = reference.as_non_null();
        if interpreter.is_bool_singleton(ptr) {
            drop(reference);
            return Self { ptr, owned: false };
        }
        reference.into_raw();
        Self { ptr, owned: true }
    }

    #[inline]
    pub(crate) fn ptr(&self) -> NonNull<py::PyObject> {
        self.ptr
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }

        let release = Release(self.ptr);
        if holds_lock() {
            release.run();
            return;
        }

        let queued = Context::default_context().and_then(|ctx| ctx.submit(move || release.run()));
        match queued {
            Ok(_) => trace!(event = "release_queued", ptr = ?self.ptr),
            // Leaking is the only option left without the lock.
            Err(err) => warn!(event = "release_leaked", ptr = ?self.ptr, error = %err),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("ptr", &self.ptr)
            .field("owned", &self.owned)
            .finish()
    }
}

/// A pending decrement, movable to the thread that will hold the lock.
struct Release(NonNull<py::PyObject>);

unsafe impl Send for Release {}

impl Release {
    fn run(self) {
        unsafe { py::Py_DECREF(self.0.as_ptr()) }
    }
}
