//! Host extended-attribute access for the metadata sidecar.
//!
//! All attributes live under the `user.prodos8.` namespace. Absence and
//! malformed values are never fatal to the caller; reads collapse any
//! failure to `None` so the metadata loader can fall back per field.

use std::path::Path;

use crate::errors;

const ATTR_PREFIX: &str = "user.prodos8.";

fn attr_name(name: &str) -> String {
    format!("{ATTR_PREFIX}{name}")
}

/// Store one sidecar attribute. Returns a ProDOS error code.
pub fn set_attr(path: &Path, name: &str, value: &str) -> u8 {
    match ::xattr::set(path, attr_name(name), value.as_bytes()) {
        Ok(()) => errors::NO_ERROR,
        Err(e) => {
            log::warn!(
                "xattr set {}{} on {} failed: {}",
                ATTR_PREFIX,
                name,
                path.display(),
                e
            );
            errors::io_error_code(&e)
        }
    }
}

/// Read one sidecar attribute as UTF-8, or `None` when it is absent,
/// unreadable, or not valid UTF-8.
pub fn get_attr(path: &Path, name: &str) -> Option<String> {
    match ::xattr::get(path, attr_name(name)) {
        Ok(Some(value)) => String::from_utf8(value).ok(),
        Ok(None) => None,
        Err(_) => None,
    }
}
