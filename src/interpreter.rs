//! Process-wide interpreter state
//!
//! Initialized exactly once, on first use, behind a `OnceCell` so concurrent
//! first callers are safe. Never torn down: the engine is not finalized and the
//! singleton references below are held for the life of the process.

use core::ptr::NonNull;
use once_cell::sync::OnceCell;
use pyo3::ffi as py;
use std::fmt;
use std::os::raw::c_int;

use crate::config::BridgeConfig;
use crate::error::{take_foreign, Error, Result};
use crate::ffi::refcount::Owned;
use crate::logging::{debug, info};

static CONFIG: OnceCell<BridgeConfig> = OnceCell::new();
static INTERPRETER: OnceCell<Interpreter> = OnceCell::new();

pub(crate) struct Interpreter {
    state: NonNull<py::PyInterpreterState>,
    empty_tuple: NonNull<py::PyObject>,
    py_none: NonNull<py::PyObject>,
    py_false: NonNull<py::PyObject>,
    py_true: NonNull<py::PyObject>,
    /// Thread-state parked by initialization, leaving no thread holding the
    /// lock. Null when the host initialized the engine itself.
    idle_state: *mut py::PyThreadState,
}

// The pointers are process-lifetime and only dereferenced under the engine lock.
unsafe impl Send for Interpreter {}
unsafe impl Sync for Interpreter {}

/// Install the configuration used at initialization.
pub(crate) fn configure(config: BridgeConfig) -> Result<()> {
    if INTERPRETER.get().is_some() {
        return Err(Error::Config("interpreter already initialized".to_string()));
    }
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("bridge already configured".to_string()))
}

pub(crate) fn config() -> &'static BridgeConfig {
    CONFIG.get_or_init(BridgeConfig::from_env)
}

/// The interpreter, initializing it on first call.
pub(crate) fn get() -> Result<&'static Interpreter> {
    INTERPRETER.get_or_try_init(|| Interpreter::initialize(config()))
}

impl Interpreter {
    fn initialize(config: &BridgeConfig) -> Result<Self> {
        unsafe {
            if py::Py_IsInitialized() != 0 {
                info!(event = "interpreter_attach", "Attaching to running interpreter");

                let gil = py::PyGILState_Ensure();
                let result = Self::capture(config, core::ptr::null_mut());
                py::PyGILState_Release(gil);
                return result;
            }

            info!(
                event = "interpreter_init",
                signal_handlers = config.install_signal_handlers,
                "Initializing interpreter"
            );

            py::Py_InitializeEx(c_int::from(config.install_signal_handlers));
            let mut result = Self::capture(config, core::ptr::null_mut());

            // Release the lock whether or not capture worked.
            let idle = py::PyEval_SaveThread();
            if let Ok(interpreter) = result.as_mut() {
                interpreter.idle_state = idle;
            }
            result
        }
    }

    /// Grab the interpreter pointer and singletons. Lock must be held.
    unsafe fn capture(config: &BridgeConfig, idle_state: *mut py::PyThreadState) -> Result<Self> {
        let state = NonNull::new(py::PyInterpreterState_Get())
            .ok_or_else(|| Error::Initialization("no current interpreter".to_string()))?;

        let empty_tuple = Owned::from_result(py::PyTuple_New(0))
            .map_err(|e| Error::Initialization(e.to_string()))?;
        let py_none = Owned::from_borrowed(non_null(py::Py_None())?);
        let py_false = Owned::from_borrowed(non_null(py::Py_False())?);
        let py_true = Owned::from_borrowed(non_null(py::Py_True())?);

        set_argv(&config.argv).map_err(|e| Error::Initialization(e.to_string()))?;
        prepend_path(&config.python_path).map_err(|e| Error::Initialization(e.to_string()))?;

        let interpreter = Self {
            state,
            empty_tuple: NonNull::new_unchecked(empty_tuple.into_raw()),
            py_none: NonNull::new_unchecked(py_none.into_raw()),
            py_false: NonNull::new_unchecked(py_false.into_raw()),
            py_true: NonNull::new_unchecked(py_true.into_raw()),
            idle_state,
        };

        debug!(event = "interpreter_ready", interpreter = ?interpreter);
        Ok(interpreter)
    }

    pub(crate) fn state(&self) -> *mut py::PyInterpreterState {
        self.state.as_ptr()
    }

    /// Shared empty argument tuple; callers add their own reference.
    pub(crate) fn empty_tuple(&self) -> NonNull<py::PyObject> {
        self.empty_tuple
    }

    pub(crate) fn py_none(&self) -> NonNull<py::PyObject> {
        self.py_none
    }

    pub(crate) fn py_true(&self) -> NonNull<py::PyObject> {
        self.py_true
    }

    pub(crate) fn py_false(&self) -> NonNull<py::PyObject> {
        self.py_false
    }

    pub(crate) fn is_bool_singleton(&self, ptr: NonNull<py::PyObject>) -> bool {
        ptr == self.py_true || ptr == self.py_false
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("state", &self.state)
            .field("owns_main_thread_state", &!self.idle_state.is_null())
            .finish_non_exhaustive()
    }
}

fn non_null(ptr: *mut py::PyObject) -> Result<NonNull<py::PyObject>> {
    NonNull::new(ptr).ok_or_else(|| Error::Initialization("missing builtin singleton".to_string()))
}

unsafe fn text(s: &str) -> Result<Owned> {
    Owned::from_result(py::PyUnicode_FromStringAndSize(
        s.as_ptr().cast(),
        s.len() as py::Py_ssize_t,
    ))
}

unsafe fn set_argv(argv: &[String]) -> Result<()> {
    let list = Owned::from_result(py::PyList_New(argv.len() as py::Py_ssize_t))?;
    for (i, arg) in argv.iter().enumerate() {
        let item = text(arg)?;
        if py::PyList_SetItem(list.as_ptr(), i as py::Py_ssize_t, item.into_raw()) < 0 {
            return Err(take_foreign());
        }
    }
    if py::PySys_SetObject(b"argv\0".as_ptr().cast(), list.as_ptr()) < 0 {
        return Err(take_foreign());
    }
    Ok(())
}

unsafe fn prepend_path(entries: &[String]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }

    // Borrowed reference owned by the sys module.
    let path = py::PySys_GetObject(b"path\0".as_ptr().cast());
    if path.is_null() {
        return Err(Error::Initialization("sys.path is missing".to_string()));
    }

    for entry in entries.iter().rev() {
        let item = text(entry)?;
        if py::PyList_Insert(path, 0, item.as_ptr()) < 0 {
            return Err(take_foreign());
        }
        debug!(event = "sys_path_prepend", entry = %entry);
    }
    Ok(())
}
