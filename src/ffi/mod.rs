//! Raw engine access - thin helpers over the CPython C API
//!
//! Design: everything in here assumes the engine lock is held by the
//! calling thread. Nothing is public outside the crate; the scheduler is the
//! only way in.
//!
//! - `refcount.rs` - scoped ownership of one foreign reference (`Owned`)
//! - `object.rs` - import, attribute/item/call protocols, stringification

pub(crate) mod object;
pub(crate) mod refcount;

use std::ffi::CString;

use crate::error::{Error, Result};

/// Convert a host name to a C string before any engine entry.
pub(crate) fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::InvalidName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_name_rejects_nul() {
        assert!(c_name("os.path").is_ok());
        assert_eq!(
            c_name("bad\0name").unwrap_err(),
            Error::InvalidName("bad\0name".to_string())
        );
    }
}
