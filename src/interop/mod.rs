//! Interop - the value codec between host values and foreign objects
//!
//! Design: `Value` is the host side's closed set of shapes; `Kind` is the
//! fixed classification of a foreign object. Marshaling is a pure function of
//! the two and never takes the engine lock itself.
//!
//! - `value.rs` - host value model and conversions
//! - `kind.rs` - foreign type classification
//! - `marshal.rs` - encode/decode with scoped reference ownership
//! - `json.rs` - JSON bridging for the command line

mod json;
mod kind;
pub(crate) mod marshal;
mod value;

pub use kind::Kind;
pub use value::Value;

pub(crate) use kind::classify;
