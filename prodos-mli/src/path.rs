//! ProDOS pathname parsing and validation.
//!
//! ProDOS pathnames are counted strings with strict syntax:
//!
//! - Components are separated by `/`; a full pathname starts with `/`,
//!   a partial pathname does not.
//! - A component is 1-15 characters, starts with `A`-`Z`, and continues
//!   with `A`-`Z`, `0`-`9` or `.`.
//! - Input is normalized before validation: high bit cleared, `a`-`z`
//!   uppercased.
//! - A single pathname or stored prefix is at most 64 characters; a
//!   fully resolved path (prefix + partial) at most 128.

use std::path::{Path, PathBuf};

use emu_core::Bus;

/// Maximum length of a single pathname argument or the stored prefix.
pub const MAX_PATHNAME_LEN: usize = 64;

/// Maximum length of a resolved full pathname.
pub const MAX_FULL_PATH_LEN: usize = 128;

/// Normalize a ProDOS pathname character: clear the high bit and
/// uppercase ASCII `a`-`z`.
pub fn normalize_char(ch: u8) -> u8 {
    let ch = ch & 0x7F;
    if ch.is_ascii_lowercase() {
        ch.to_ascii_uppercase()
    } else {
        ch
    }
}

/// Read a counted string from emulated memory, normalizing each
/// character. The count byte itself is not included in the result.
pub fn read_normalized_counted_string(bus: &mut impl Bus, addr: u16) -> String {
    let count = bus.read(addr);
    let mut result = String::with_capacity(count as usize);
    for i in 0..count as u16 {
        let ch = bus.read(addr.wrapping_add(1).wrapping_add(i));
        result.push(normalize_char(ch) as char);
    }
    result
}

/// Validate a single pathname component (no slashes).
pub fn is_valid_component(component: &str) -> bool {
    let bytes = component.as_bytes();
    if bytes.is_empty() || bytes.len() > 15 {
        return false;
    }
    if !bytes[0].is_ascii_uppercase() {
        return false;
    }
    bytes[1..]
        .iter()
        .all(|&ch| ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == b'.')
}

/// Validate an already-normalized pathname against `max_len`.
///
/// An optional leading `/` marks a full pathname; every other segment
/// must be a valid component. Empty interior segments (`//`) are
/// invalid; a single trailing `/` is tolerated.
pub fn is_valid_pathname(pathname: &str, max_len: usize) -> bool {
    if pathname.is_empty() || pathname.len() > max_len {
        return false;
    }

    let mut segments: Vec<&str> = pathname.split('/').collect();
    // A trailing '/' produces one empty segment at the end; drop it.
    if segments.len() > 1 && segments.last() == Some(&"") {
        segments.pop();
    }

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            // Only the leading empty segment of an absolute path is ok.
            if i != 0 || !pathname.starts_with('/') {
                return false;
            }
        } else if !is_valid_component(segment) {
            return false;
        }
    }
    true
}

/// Resolve a pathname against the current prefix.
///
/// A pathname starting with `/` is already full and is returned as-is;
/// otherwise the prefix is prepended (with a joining `/` when needed).
/// Returns `None` when the result would exceed 128 characters.
pub fn resolve_full_path(pathname: &str, prefix: &str) -> Option<String> {
    let full = if pathname.starts_with('/') {
        pathname.to_string()
    } else {
        let mut full = prefix.to_string();
        if !full.is_empty() && !full.ends_with('/') && !pathname.is_empty() {
            full.push('/');
        }
        full.push_str(pathname);
        full
    };

    if full.len() > MAX_FULL_PATH_LEN {
        return None;
    }
    Some(full)
}

/// Map a full ProDOS pathname onto the host filesystem below
/// `volumes_root`.
///
/// The pathname must be absolute; `.` and `..` components are rejected
/// so an emulated program can never escape the volumes root.
pub fn map_to_host_path(prodos_path: &str, volumes_root: &Path) -> Option<PathBuf> {
    if !prodos_path.starts_with('/') {
        return None;
    }
    if prodos_path.split('/').any(|c| c == "." || c == "..") {
        return None;
    }
    Some(volumes_root.join(&prodos_path[1..]))
}
