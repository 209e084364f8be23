//! Value marshaling - host `Value` <-> foreign objects
//!
//! Design: pure translation, no locking of its own. Every function requires
//! the engine lock. Containers are built and read recursively with scoped
//! ownership (`Owned`), so a failure at any depth releases every foreign
//! reference taken so far and no partial container escapes in either
//! direction.

use core::ptr::NonNull;
use pyo3::ffi as py;
use std::os::raw::c_int;

use super::kind::{classify, Kind};
use super::value::Value;
use crate::error::{take_foreign, Error, Result};
use crate::ffi::object::{object_type_name, utf8};
use crate::ffi::refcount::Owned;
use crate::interpreter;
use crate::logging::trace;

/// Translate a host value into a new foreign reference.
///
/// # Safety
/// The engine lock must be held.
pub(crate) unsafe fn encode(value: &Value) -> Result<Owned> {
    let interpreter = interpreter::get()?;

    match value {
        Value::None => Ok(Owned::from_borrowed(interpreter.py_none())),
        Value::Bool(true) => Ok(Owned::from_borrowed(interpreter.py_true())),
        Value::Bool(false) => Ok(Owned::from_borrowed(interpreter.py_false())),
        Value::Int(i) => Owned::from_result(py::PyLong_FromLongLong(*i)),
        Value::UInt(u) => Owned::from_result(py::PyLong_FromUnsignedLongLong(*u)),
        Value::Float(f) => Owned::from_result(py::PyFloat_FromDouble(*f)),
        Value::Complex(re, im) => Owned::from_result(py::PyComplex_FromDoubles(*re, *im)),
        Value::Str(s) => Owned::from_result(py::PyUnicode_FromStringAndSize(
            s.as_ptr().cast(),
            s.len() as py::Py_ssize_t,
        )),
        Value::Bytes(b) => Owned::from_result(py::PyBytes_FromStringAndSize(
            b.as_ptr().cast(),
            b.len() as py::Py_ssize_t,
        )),
        Value::Seq(items) => encode_tuple(items),
        Value::Map(pairs) => encode_dict(pairs),
        Value::Object(object) => Ok(Owned::from_borrowed(object.as_non_null())),
    }
}

/// Build the positional argument tuple for a call.
///
/// # Safety
/// The engine lock must be held.
pub(crate) unsafe fn encode_args(args: &[Value]) -> Result<Owned> {
    encode_tuple(args)
}

unsafe fn encode_tuple(items: &[Value]) -> Result<Owned> {
    if items.is_empty() {
        return Ok(Owned::from_borrowed(interpreter::get()?.empty_tuple()));
    }

    let tuple = Owned::from_result(py::PyTuple_New(items.len() as py::Py_ssize_t))?;

    for (i, item) in items.iter().enumerate() {
        let item = encode(item)?;
        // Steals the item reference, even on failure.
        if py::PyTuple_SetItem(tuple.as_ptr(), i as py::Py_ssize_t, item.into_raw()) < 0 {
            return Err(take_foreign());
        }
    }

    Ok(tuple)
}

unsafe fn encode_dict(pairs: &[(Value, Value)]) -> Result<Owned> {
    let dict = Owned::from_result(py::PyDict_New())?;

    for (key, value) in pairs {
        if contains_mapping(key) {
            trace!(event = "encode_rejected", reason = "mapping key");
            return Err(Error::UnsupportedType(
                "mapping cannot be used as a mapping key".to_string(),
            ));
        }

        let key = encode(key)?;
        let value = encode(value)?;

        if py::PyDict_SetItem(dict.as_ptr(), key.as_ptr(), value.as_ptr()) < 0 {
            return Err(take_foreign());
        }
    }

    Ok(dict)
}

/// Whether a key is a mapping or a sequence holding one. Both encode to
/// something the foreign dict can never hash.
fn contains_mapping(key: &Value) -> bool {
    match key {
        Value::Map(_) => true,
        Value::Seq(items) => items.iter().any(contains_mapping),
        _ => false,
    }
}

/// Containers nested deeper than this fail to decode.
pub(crate) const MAX_DEPTH: usize = 256;

/// Translate a borrowed foreign object into a host value.
///
/// Self-containing containers and nesting beyond [`MAX_DEPTH`] fail with
/// `UnsupportedType` instead of recursing without bound.
///
/// # Safety
/// The engine lock must be held and `obj` must be live.
pub(crate) unsafe fn decode(obj: NonNull<py::PyObject>) -> Result<Value> {
    Decoder::default().decode(obj)
}

/// Tracks the containers currently being walked.
#[derive(Default)]
struct Decoder {
    ancestors: Vec<NonNull<py::PyObject>>,
}

impl Decoder {
    unsafe fn decode(&mut self, obj: NonNull<py::PyObject>) -> Result<Value> {
        match classify(obj) {
            Kind::None => Ok(Value::None),
            Kind::False => Ok(Value::Bool(false)),
            Kind::True => Ok(Value::Bool(true)),
            Kind::Text => decode_text(obj),
            Kind::Bytes => decode_bytes(obj),
            Kind::Integer | Kind::ExtendedInteger => decode_int(obj),
            Kind::Float => decode_float(obj),
            Kind::Complex => decode_complex(obj),
            Kind::Sequence => self.nested(obj, Self::decode_sequence),
            Kind::Mapping => self.nested(obj, Self::decode_mapping),
            Kind::Unrecognized => Err(Error::UnsupportedType(format!(
                "cannot decode foreign '{}'",
                object_type_name(obj)
            ))),
        }
    }

    unsafe fn nested(
        &mut self,
        obj: NonNull<py::PyObject>,
        walk: unsafe fn(&mut Self, NonNull<py::PyObject>) -> Result<Value>,
    ) -> Result<Value> {
        if self.ancestors.contains(&obj) {
            trace!(event = "decode_rejected", reason = "cycle");
            return Err(Error::UnsupportedType(format!(
                "foreign '{}' contains itself",
                object_type_name(obj)
            )));
        }
        if self.ancestors.len() >= MAX_DEPTH {
            trace!(event = "decode_rejected", reason = "depth");
            return Err(Error::UnsupportedType(format!(
                "containers nested deeper than {} levels",
                MAX_DEPTH
            )));
        }

        self.ancestors.push(obj);
        let result = walk(self, obj);
        self.ancestors.pop();
        result
    }

    unsafe fn decode_sequence(&mut self, obj: NonNull<py::PyObject>) -> Result<Value> {
        let len = py::PySequence_Size(obj.as_ptr());
        if len < 0 {
            return Err(take_foreign());
        }

        let mut items = reserve(len)?;
        for i in 0..len {
            let item = Owned::from_result(py::PySequence_GetItem(obj.as_ptr(), i))?;
            items.push(self.decode(item.as_non_null())?);
        }

        Ok(Value::Seq(items))
    }

    unsafe fn decode_mapping(&mut self, obj: NonNull<py::PyObject>) -> Result<Value> {
        let items = Owned::from_result(py::PyMapping_Items(obj.as_ptr()))?;

        let len = py::PySequence_Size(items.as_ptr());
        if len < 0 {
            return Err(take_foreign());
        }

        let mut pairs = reserve(len)?;
        for i in 0..len {
            let pair = Owned::from_result(py::PySequence_GetItem(items.as_ptr(), i))?;
            let key = Owned::from_result(py::PySequence_GetItem(pair.as_ptr(), 0))?;
            let value = Owned::from_result(py::PySequence_GetItem(pair.as_ptr(), 1))?;
            pairs.push((self.decode(key.as_non_null())?, self.decode(value.as_non_null())?));
        }

        Ok(Value::Map(pairs))
    }
}

/// Room for a foreign-reported length. The length is not trusted: a lazy
/// sequence can report far more than the host could ever hold, and that is
/// raised as the engine's `MemoryError`.
unsafe fn reserve<T>(len: py::Py_ssize_t) -> Result<Vec<T>> {
    let mut items = Vec::new();
    if items.try_reserve_exact(len as usize).is_err() {
        py::PyErr_NoMemory();
        return Err(take_foreign());
    }
    Ok(items)
}

unsafe fn decode_text(obj: NonNull<py::PyObject>) -> Result<Value> {
    utf8(obj.as_ptr())
        .map(Value::Str)
        .ok_or_else(|| take_foreign())
}

unsafe fn decode_bytes(obj: NonNull<py::PyObject>) -> Result<Value> {
    let data = py::PyBytes_AsString(obj.as_ptr());
    if data.is_null() {
        return Err(take_foreign());
    }
    let size = py::PyBytes_Size(obj.as_ptr());
    let bytes = std::slice::from_raw_parts(data.cast::<u8>(), size as usize);
    Ok(Value::Bytes(bytes.to_vec()))
}

/// Signed 64-bit first, unsigned 64-bit on positive overflow.
unsafe fn decode_int(obj: NonNull<py::PyObject>) -> Result<Value> {
    let mut overflow: c_int = 0;
    let i = py::PyLong_AsLongLongAndOverflow(obj.as_ptr(), &mut overflow);

    if overflow < 0 {
        return Err(Error::IntegerTooSmall);
    }

    if overflow == 0 {
        if i == -1 && !py::PyErr_Occurred().is_null() {
            return Err(take_foreign());
        }
        return Ok(Value::Int(i));
    }

    let u = py::PyLong_AsUnsignedLongLong(obj.as_ptr());
    if u == u64::MAX && !py::PyErr_Occurred().is_null() {
        if py::PyErr_ExceptionMatches(py::PyExc_OverflowError) != 0 {
            py::PyErr_Clear();
            return Err(Error::IntegerTooLarge);
        }
        return Err(take_foreign());
    }

    Ok(Value::UInt(u))
}

unsafe fn decode_float(obj: NonNull<py::PyObject>) -> Result<Value> {
    let f = py::PyFloat_AsDouble(obj.as_ptr());
    if f == -1.0 && !py::PyErr_Occurred().is_null() {
        return Err(take_foreign());
    }
    Ok(Value::Float(f))
}

unsafe fn decode_complex(obj: NonNull<py::PyObject>) -> Result<Value> {
    let re = py::PyComplex_RealAsDouble(obj.as_ptr());
    let im = py::PyComplex_ImagAsDouble(obj.as_ptr());
    if !py::PyErr_Occurred().is_null() {
        return Err(take_foreign());
    }
    Ok(Value::Complex(re, im))
}
