//! pybridge - call into an embedded CPython from any host thread
//!
//! The interpreter is brought up once, on first use. Work runs on execution
//! contexts: worker threads that take turns holding the engine lock, each
//! with its own foreign thread-state. Foreign objects come back as `Object`
//! handles that can be cloned, sent and dropped anywhere.
//!
//! ```no_run
//! use pybridge::Value;
//!
//! let os = pybridge::import("os")?;
//! let pid = os.call_value("getpid", &[])?;
//! let entries = os.call_value("listdir", &[Value::from(".")])?;
//! println!("{:?} {:?}", pid, entries.as_seq().map(<[Value]>::len));
//! # Ok::<(), pybridge::Error>(())
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod interop;
pub mod logging;
pub mod object;
pub mod scheduler;

mod ffi;
mod interpreter;

// Re-export commonly used items
pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use interop::{Kind, Value};
pub use object::{import, Object};
pub use scheduler::{Context, Pending};

/// Set the interpreter configuration.
///
/// Must run before anything touches the interpreter; afterwards, or on a
/// second call, it fails with [`Error::Config`].
pub fn configure(config: BridgeConfig) -> Result<()> {
    interpreter::configure(config)
}
