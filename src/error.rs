//! Bridge errors and foreign exception translation

use pyo3::ffi as py;
use std::ptr;

use crate::ffi::object::{stringify, type_name};
use crate::ffi::refcount::Owned;
use crate::logging::debug;

/// Result alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The engine raised during import, attribute/item access or a call.
    #[error("{kind}: {message}")]
    ForeignException { kind: String, message: String },

    /// A value with no encoding (host side) or no decoding (foreign side).
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("foreign integer does not fit in 64 unsigned bits")]
    IntegerTooLarge,

    #[error("foreign integer does not fit in 64 signed bits")]
    IntegerTooSmall,

    /// Work was submitted to a context after it was closed.
    #[error("execution context '{0}' is closed")]
    ContextClosed(String),

    #[error("invalid name {0:?}: contains a NUL byte")]
    InvalidName(String),

    #[error("interpreter initialization failed: {0}")]
    Initialization(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from the foreign engine
    pub fn is_foreign(&self) -> bool {
        matches!(self, Self::ForeignException { .. })
    }

    /// Foreign exception class name, if any
    pub fn foreign_kind(&self) -> Option<&str> {
        match self {
            Self::ForeignException { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// Fetch the pending foreign exception and translate it.
///
/// The error indicator is always clear afterwards.
///
/// # Safety
/// The engine lock must be held.
#[allow(deprecated)]
pub(crate) unsafe fn take_foreign() -> Error {
    let mut ptype = ptr::null_mut();
    let mut pvalue = ptr::null_mut();
    let mut ptrace = ptr::null_mut();

    py::PyErr_Fetch(&mut ptype, &mut pvalue, &mut ptrace);

    if ptype.is_null() {
        py::Py_XDECREF(pvalue);
        py::Py_XDECREF(ptrace);
        return Error::ForeignException {
            kind: "SystemError".to_string(),
            message: "error return without exception set".to_string(),
        };
    }

    py::PyErr_NormalizeException(&mut ptype, &mut pvalue, &mut ptrace);

    let ptype = Owned::from_new(ptype);
    let pvalue = Owned::from_new(pvalue);
    let _ptrace = Owned::from_new(ptrace);

    let kind = ptype
        .as_ref()
        .map(|t| type_name(t.as_ptr()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Exception".to_string());
    let message = pvalue
        .as_ref()
        .map(|v| stringify(v.as_ptr()))
        .unwrap_or_default();

    py::PyErr_Clear();

    debug!(event = "foreign_exception", kind = %kind, message = %message);

    Error::ForeignException { kind, message }
}
