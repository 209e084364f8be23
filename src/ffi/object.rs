//! Foreign object protocols used by the facade and the codec
//!
//! All functions require the engine lock. Results that carry a new reference
//! come back as `Owned`; failures are translated with `take_foreign`, which
//! leaves the engine's error indicator clear.

use core::ptr::NonNull;
use pyo3::ffi as py;
use std::ffi::CStr;

use super::refcount::Owned;
use crate::error::{take_foreign, Error, Result};

/// Import a module by dotted name.
pub(crate) unsafe fn import(name: &CStr) -> Result<Owned> {
    Owned::from_result(py::PyImport_ImportModule(name.as_ptr()))
}

pub(crate) unsafe fn get_attr(obj: NonNull<py::PyObject>, name: &CStr) -> Result<Owned> {
    Owned::from_result(py::PyObject_GetAttrString(obj.as_ptr(), name.as_ptr()))
}

/// Sequence item; negative indices count from the end as the engine does.
pub(crate) unsafe fn get_item(obj: NonNull<py::PyObject>, index: isize) -> Result<Owned> {
    Owned::from_result(py::PySequence_GetItem(obj.as_ptr(), index))
}

/// Mapping lookup. A missing key (`KeyError`) is `Ok(None)`.
///
/// Only dicts and objects with a `keys()` method count as mappings; anything
/// else (lists, tuples, strings) is `UnsupportedType` rather than indexed.
pub(crate) unsafe fn lookup(obj: NonNull<py::PyObject>, key: &Owned) -> Result<Option<Owned>> {
    if !is_mapping(obj) {
        return Err(Error::UnsupportedType(format!(
            "'{}' is not a mapping",
            object_type_name(obj)
        )));
    }

    let item = py::PyObject_GetItem(obj.as_ptr(), key.as_ptr());
    if item.is_null() && py::PyErr_ExceptionMatches(py::PyExc_KeyError) != 0 {
        py::PyErr_Clear();
        return Ok(None);
    }
    Owned::from_result(item).map(Some)
}

/// Same test the engine's `dict()` constructor uses to tell a mapping apart.
unsafe fn is_mapping(obj: NonNull<py::PyObject>) -> bool {
    py::PyDict_Check(obj.as_ptr()) != 0
        || py::PyObject_HasAttrString(obj.as_ptr(), b"keys\0".as_ptr().cast()) != 0
}

pub(crate) unsafe fn length(obj: NonNull<py::PyObject>) -> Result<usize> {
    let size = py::PyObject_Size(obj.as_ptr());
    if size < 0 {
        return Err(take_foreign());
    }
    Ok(size as usize)
}

/// Call with positional arguments only. `args` must be a tuple.
pub(crate) unsafe fn call(callable: NonNull<py::PyObject>, args: Owned) -> Result<Owned> {
    Owned::from_result(py::PyObject_CallObject(callable.as_ptr(), args.as_ptr()))
}

/// Best-effort `str()`; empty on failure, error indicator always cleared.
pub(crate) unsafe fn stringify(obj: *mut py::PyObject) -> String {
    let mut text = String::new();

    if let Some(s) = Owned::from_new(py::PyObject_Str(obj)) {
        if let Some(utf8) = utf8(s.as_ptr()) {
            text = utf8;
        }
    }

    py::PyErr_Clear();
    text
}

/// `__name__` of a type object, empty on failure.
pub(crate) unsafe fn type_name(ty: *mut py::PyObject) -> String {
    match Owned::from_new(py::PyObject_GetAttrString(ty, b"__name__\0".as_ptr().cast())) {
        Some(name) => stringify(name.as_ptr()),
        None => {
            py::PyErr_Clear();
            String::new()
        }
    }
}

/// Type name of an arbitrary object, for diagnostics.
pub(crate) unsafe fn object_type_name(obj: NonNull<py::PyObject>) -> String {
    type_name(py::Py_TYPE(obj.as_ptr()).cast())
}

/// UTF-8 contents of a text object, `None` with the exception pending on failure.
pub(crate) unsafe fn utf8(text: *mut py::PyObject) -> Option<String> {
    let mut size: py::Py_ssize_t = 0;
    let data = py::PyUnicode_AsUTF8AndSize(text, &mut size);
    if data.is_null() {
        return None;
    }
    let bytes = std::slice::from_raw_parts(data.cast::<u8>(), size as usize);
    Some(String::from_utf8_lossy(bytes).into_owned())
}
