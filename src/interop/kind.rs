//! Foreign type classification
//!
//! The single place that inspects a foreign object's runtime type. Precedence
//! is fixed and checked top to bottom, so e.g. `True` is never seen as an
//! integer and text is never seen as a sequence.

use core::ptr::NonNull;
use pyo3::ffi as py;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    None,
    False,
    True,
    Text,
    Bytes,
    /// Exact foreign int
    Integer,
    /// Subclass of int (enum members and the like)
    ExtendedInteger,
    Float,
    Complex,
    Sequence,
    Mapping,
    Unrecognized,
}

impl Kind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::False | Self::True => "bool",
            Self::Text => "str",
            Self::Bytes => "bytes",
            Self::Integer | Self::ExtendedInteger => "int",
            Self::Float => "float",
            Self::Complex => "complex",
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Classify a live foreign object.
///
/// # Safety
/// The engine lock must be held.
pub(crate) unsafe fn classify(obj: NonNull<py::PyObject>) -> Kind {
    let o = obj.as_ptr();

    if o == py::Py_None() {
        Kind::None
    } else if o == py::Py_False() {
        Kind::False
    } else if o == py::Py_True() {
        Kind::True
    } else if py::PyUnicode_Check(o) != 0 {
        Kind::Text
    } else if py::PyBytes_Check(o) != 0 {
        Kind::Bytes
    } else if py::PyLong_CheckExact(o) != 0 {
        Kind::Integer
    } else if py::PyLong_Check(o) != 0 {
        Kind::ExtendedInteger
    } else if py::PyFloat_Check(o) != 0 {
        Kind::Float
    } else if py::PyComplex_Check(o) != 0 {
        Kind::Complex
    } else if py::PySequence_Check(o) != 0 {
        Kind::Sequence
    } else if py::PyMapping_Check(o) != 0 {
        Kind::Mapping
    } else {
        Kind::Unrecognized
    }
}
