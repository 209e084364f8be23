//! Object facade - host handles to foreign objects
//!
//! Design: an `Object` is an `Arc` around exactly one `Handle` plus the
//! context that produced it. Cloning is host-only and never touches the
//! foreign reference count. Every operation enters the engine through the
//! owning context and results inherit it, so a chain of calls started on one
//! context stays on that context.
//!
//! Most operations come in two forms: a handle form returning another
//! `Object`, and a value form returning a decoded `Value`. In the value form
//! the intermediate foreign reference is released before the call returns,
//! on success and on failure alike.
//!
//! - `handle.rs` - reference ownership and cross-thread finalization

mod handle;

#[cfg(test)]
mod tests;

use core::ptr::NonNull;
use pyo3::ffi as py;
use std::ffi::CString;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use self::handle::Handle;
use crate::error::Result;
use crate::ffi::object::{self as protocol, stringify};
use crate::ffi::refcount::{self, Owned};
use crate::ffi::c_name;
use crate::interop::marshal::{decode, encode, encode_args};
use crate::interop::{classify, Kind, Value};
use crate::interpreter;
use crate::logging::debug;
use crate::scheduler::Context;

/// Host handle to one foreign object.
#[derive(Clone)]
pub struct Object {
    handle: Arc<Handle>,
    context: Context,
}

impl Object {
    /// Wrap a fresh reference. Lock must be held.
    pub(crate) fn adopt(reference: Owned, context: &Context) -> Result<Self> {
        let interpreter = interpreter::get()?;
        Ok(Self {
            handle: Arc::new(Handle::wrap(reference, interpreter)),
            context: context.clone(),
        })
    }

    #[inline]
    pub(crate) fn as_non_null(&self) -> NonNull<py::PyObject> {
        self.handle.ptr()
    }

    /// The context every operation on this object runs on.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Run `f` on the owning context with this object's pointer.
    fn with_engine<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(NonNull<py::PyObject>) -> Result<R> + Send,
        R: Send,
    {
        self.context.execute(|| f(self.as_non_null()))?
    }

    fn derive(&self, reference: Owned) -> Result<Self> {
        Self::adopt(reference, &self.context)
    }

    /// `getattr(obj, name)`
    pub fn attr(&self, name: &str) -> Result<Object> {
        let name = c_name(name)?;
        self.with_engine(|obj| unsafe { self.derive(protocol::get_attr(obj, &name)?) })
    }

    pub fn attr_value(&self, name: &str) -> Result<Value> {
        let name = c_name(name)?;
        self.with_engine(|obj| unsafe {
            let attr = protocol::get_attr(obj, &name)?;
            decode(attr.as_non_null())
        })
    }

    /// `obj[index]` on a sequence; negative indices count from the end.
    pub fn item(&self, index: isize) -> Result<Object> {
        self.with_engine(|obj| unsafe { self.derive(protocol::get_item(obj, index)?) })
    }

    pub fn item_value(&self, index: isize) -> Result<Value> {
        self.with_engine(|obj| unsafe {
            let item = protocol::get_item(obj, index)?;
            decode(item.as_non_null())
        })
    }

    /// Mapping lookup. `Ok(None)` when the key is absent.
    ///
    /// Mapping-only: a dict or any object with `keys()`. Sequences fail with
    /// `UnsupportedType`; use [`Object::item`] for them.
    pub fn get(&self, key: &Value) -> Result<Option<Object>> {
        self.with_engine(|obj| unsafe {
            let key = encode(key)?;
            protocol::lookup(obj, &key)?
                .map(|found| self.derive(found))
                .transpose()
        })
    }

    pub fn get_value(&self, key: &Value) -> Result<Option<Value>> {
        self.with_engine(|obj| unsafe {
            let key = encode(key)?;
            match protocol::lookup(obj, &key)? {
                Some(found) => decode(found.as_non_null()).map(Some),
                None => Ok(None),
            }
        })
    }

    /// Call this object with positional arguments.
    pub fn invoke(&self, args: &[Value]) -> Result<Object> {
        self.with_engine(|obj| unsafe {
            let result = protocol::call(obj, encode_args(args)?)?;
            self.derive(result)
        })
    }

    pub fn invoke_value(&self, args: &[Value]) -> Result<Value> {
        self.with_engine(|obj| unsafe {
            let result = protocol::call(obj, encode_args(args)?)?;
            decode(result.as_non_null())
        })
    }

    /// Look up `name` and call it: `obj.name(*args)`.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Object> {
        let name = c_name(name)?;
        self.with_engine(|obj| unsafe { self.derive(call_method(obj, &name, args)?) })
    }

    pub fn call_value(&self, name: &str, args: &[Value]) -> Result<Value> {
        let name = c_name(name)?;
        self.with_engine(|obj| unsafe {
            let result = call_method(obj, &name, args)?;
            decode(result.as_non_null())
        })
    }

    /// Decode the whole object.
    pub fn value(&self) -> Result<Value> {
        self.with_engine(|obj| unsafe { decode(obj) })
    }

    /// `str(obj)`, or an empty string if that fails.
    pub fn string(&self) -> String {
        self.with_engine(|obj| Ok(unsafe { stringify(obj.as_ptr()) }))
            .unwrap_or_else(|err| {
                debug!(event = "string_failed", error = %err);
                String::new()
            })
    }

    /// `len(obj)`
    pub fn length(&self) -> Result<usize> {
        self.with_engine(|obj| unsafe { protocol::length(obj) })
    }

    /// How this object would decode.
    pub fn kind(&self) -> Result<Kind> {
        self.with_engine(|obj| Ok(unsafe { classify(obj) }))
    }

    /// Foreign reference count. Diagnostics only.
    pub fn ref_count(&self) -> Result<isize> {
        self.with_engine(|obj| Ok(unsafe { refcount::ref_count(obj) }))
    }

    /// Identity check against the foreign `None`.
    pub fn is_none(&self) -> bool {
        interpreter::get().map_or(false, |i| i.py_none() == self.as_non_null())
    }
}

unsafe fn call_method(obj: NonNull<py::PyObject>, name: &CString, args: &[Value]) -> Result<Owned> {
    let callable = protocol::get_attr(obj, name)?;
    protocol::call(callable.as_non_null(), encode_args(args)?)
}

impl PartialEq for Object {
    /// Foreign identity (`is`), not equality.
    fn eq(&self, other: &Self) -> bool {
        self.as_non_null() == other.as_non_null()
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_non_null().hash(state);
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string())
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("ptr", &self.as_non_null())
            .field("context", &self.context.name())
            .finish()
    }
}

impl Context {
    /// Import a module on this context.
    pub fn import(&self, name: &str) -> Result<Object> {
        let name = c_name(name)?;
        self.execute(|| unsafe { Object::adopt(protocol::import(&name)?, self) })?
    }

    /// Encode a host value into a new foreign object owned by this context.
    pub fn encode(&self, value: &Value) -> Result<Object> {
        self.execute(|| unsafe { Object::adopt(encode(value)?, self) })?
    }
}

/// Import a module on the default context.
pub fn import(name: &str) -> Result<Object> {
    Context::default_context()?.import(name)
}
