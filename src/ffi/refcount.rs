//! Reference ownership for foreign objects
//!
//! `Owned` holds exactly one foreign reference and releases it on drop. It is
//! the scoped-acquisition primitive behind every transient reference the codec
//! and facade create: a temporary fetched only to be decoded is released on
//! every exit path, error or not.
//!
//! # Safety
//! An `Owned` may only be created, used and dropped while the engine lock is
//! held. Long-lived references use `object::Handle`, whose drop goes through
//! the scheduler instead.

use core::ptr::NonNull;
use pyo3::ffi as py;

use crate::error::{take_foreign, Error, Result};

pub(crate) struct Owned(NonNull<py::PyObject>);

impl Owned {
    /// Take ownership of a new reference; `None` for null.
    #[inline]
    pub(crate) unsafe fn from_new(ptr: *mut py::PyObject) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Take ownership of the result of an engine call.
    ///
    /// Failure is decided by the error indicator, not by pointer nullity: a
    /// pending exception wins even if a result came back, and a null result
    /// with no exception is reported as a `SystemError`.
    pub(crate) unsafe fn from_result(ptr: *mut py::PyObject) -> Result<Self> {
        if !py::PyErr_Occurred().is_null() {
            py::Py_XDECREF(ptr);
            return Err(take_foreign());
        }

        Self::from_new(ptr).ok_or_else(|| Error::ForeignException {
            kind: "SystemError".to_string(),
            message: "engine returned no result without raising".to_string(),
        })
    }

    /// Add a reference to a borrowed pointer.
    #[inline]
    pub(crate) unsafe fn from_borrowed(ptr: NonNull<py::PyObject>) -> Self {
        py::Py_INCREF(ptr.as_ptr());
        Self(ptr)
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut py::PyObject {
        self.0.as_ptr()
    }

    #[inline]
    pub(crate) fn as_non_null(&self) -> NonNull<py::PyObject> {
        self.0
    }

    /// Give up ownership without decrementing (for stealing APIs)
    #[inline]
    pub(crate) fn into_raw(self) -> *mut py::PyObject {
        let ptr = self.0.as_ptr();
        core::mem::forget(self);
        ptr
    }
}

impl Drop for Owned {
    #[inline]
    fn drop(&mut self) {
        unsafe { py::Py_DECREF(self.0.as_ptr()) }
    }
}

/// Current foreign reference count (diagnostics only)
///
/// # Safety
/// The engine lock must be held and `ptr` must be live.
#[inline]
pub(crate) unsafe fn ref_count(ptr: NonNull<py::PyObject>) -> isize {
    py::Py_REFCNT(ptr.as_ptr())
}
