//! ProDOS file metadata stored in host extended attributes.
//!
//! Five attributes make up the sidecar, each stored separately so that
//! one malformed field only loses that field:
//!
//! | Attribute      | Format                                    |
//! |----------------|-------------------------------------------|
//! | `access`       | 8-char glyph string (see [`crate::access`]) |
//! | `file_type`    | 2 lowercase hex digits                    |
//! | `aux_type`     | 4 lowercase hex digits                    |
//! | `storage_type` | 2 lowercase hex digits                    |
//! | `created`      | ISO-8601 UTC, `YYYY-MM-DDTHH:MM:SSZ`      |
//!
//! Modification time is never stored; it is always derived from the
//! host mtime on read. Read defaults are chosen so a plain host file
//! with no sidecar behaves as a full-access untyped file and a plain
//! host directory as a DIR.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use chrono::Local;

use crate::access::{self, ACCESS_READ, ACCESS_WRITE};
use crate::datetime;
use crate::errors;
use crate::xattr;

// ProDOS storage types.
pub const STORAGE_SEEDLING: u8 = 0x01;
pub const STORAGE_SAPLING: u8 = 0x02;
pub const STORAGE_TREE: u8 = 0x03;
pub const STORAGE_SUBDIR: u8 = 0x0D;
pub const STORAGE_SUBDIR_HEADER: u8 = 0x0E;
pub const STORAGE_VOLUME_HEADER: u8 = 0x0F;

/// ProDOS file type byte for directories.
pub const FILE_TYPE_DIR: u8 = 0x0F;

/// ProDOS file type byte for binary files.
pub const FILE_TYPE_BIN: u8 = 0x06;

/// The ProDOS attributes of one file or directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub access: u8,
    pub file_type: u8,
    pub aux_type: u16,
    pub storage_type: u8,
    pub create_date: u16,
    pub create_time: u16,
    pub mod_date: u16,
    pub mod_time: u16,
}

pub(crate) fn format_hex_byte(value: u8) -> String {
    format!("{value:02x}")
}

pub(crate) fn format_hex_word(value: u16) -> String {
    format!("{value:04x}")
}

pub(crate) fn parse_hex_byte(s: &str) -> Option<u8> {
    if s.len() != 2 {
        return None;
    }
    u8::from_str_radix(s, 16).ok()
}

pub(crate) fn parse_hex_word(s: &str) -> Option<u16> {
    if s.len() != 4 {
        return None;
    }
    u16::from_str_radix(s, 16).ok()
}

/// Persist the sidecar attributes for `path`. Returns a ProDOS error
/// code; the first failing attribute aborts the store.
pub fn store_metadata(path: &Path, meta: &Metadata) -> u8 {
    let err = xattr::set_attr(path, "access", &access::format_access_byte(meta.access));
    if err != errors::NO_ERROR {
        return err;
    }

    let err = xattr::set_attr(path, "file_type", &format_hex_byte(meta.file_type));
    if err != errors::NO_ERROR {
        return err;
    }

    let err = xattr::set_attr(path, "aux_type", &format_hex_word(meta.aux_type));
    if err != errors::NO_ERROR {
        return err;
    }

    let err = xattr::set_attr(path, "storage_type", &format_hex_byte(meta.storage_type));
    if err != errors::NO_ERROR {
        return err;
    }

    let created = datetime::prodos_to_iso8601(meta.create_date, meta.create_time);
    let err = xattr::set_attr(path, "created", &created);
    if err != errors::NO_ERROR {
        return err;
    }

    errors::NO_ERROR
}

/// Load the sidecar attributes for `path`, falling back per field when
/// an attribute is absent or malformed.
///
/// Fallbacks: access `$C3` masked down by the host user read/write
/// permission bits; file_type `$0F` for directories, `$00` otherwise;
/// aux_type 0; storage_type `$0D` for directories, `$01` otherwise;
/// creation from the host mtime; modification always from the host
/// mtime.
pub fn load_metadata(path: &Path, is_directory: bool) -> Metadata {
    let mut meta = Metadata::default();
    let host_meta = fs::metadata(path).ok();

    meta.access = xattr::get_attr(path, "access")
        .and_then(|v| access::parse_access_byte(&v))
        .unwrap_or_else(|| {
            let mut acc = access::ACCESS_DEFAULT;
            if let Some(m) = &host_meta {
                let mode = m.permissions().mode();
                if mode & 0o200 == 0 {
                    acc &= !ACCESS_WRITE;
                }
                if mode & 0o400 == 0 {
                    acc &= !ACCESS_READ;
                }
            }
            acc
        });

    meta.file_type = xattr::get_attr(path, "file_type")
        .and_then(|v| parse_hex_byte(&v))
        .unwrap_or(if is_directory { FILE_TYPE_DIR } else { 0x00 });

    meta.aux_type = xattr::get_attr(path, "aux_type")
        .and_then(|v| parse_hex_word(&v))
        .unwrap_or(0);

    meta.storage_type = xattr::get_attr(path, "storage_type")
        .and_then(|v| parse_hex_byte(&v))
        .unwrap_or(if is_directory {
            STORAGE_SUBDIR
        } else {
            STORAGE_SEEDLING
        });

    let mtime = host_meta
        .as_ref()
        .and_then(|m| m.modified().ok())
        .map(datetime::system_time_local);

    let created = xattr::get_attr(path, "created")
        .and_then(|v| datetime::parse_iso8601(&v))
        .map(|t| t.with_timezone(&Local))
        .or(mtime)
        .unwrap_or_else(Local::now);
    meta.create_date = datetime::encode_prodos_date(created);
    meta.create_time = datetime::encode_prodos_time(created);

    let modified = mtime.unwrap_or(created);
    meta.mod_date = datetime::encode_prodos_date(modified);
    meta.mod_time = datetime::encode_prodos_time(modified);

    meta
}

/// Project the read/write access bits onto the host user permission
/// bits. Failures are ignored; access control is advisory on the host
/// side.
pub fn apply_access_to_permissions(path: &Path, access: u8) {
    let Ok(host_meta) = fs::metadata(path) else {
        return;
    };

    let mut perms = host_meta.permissions();
    let mut mode = perms.mode();

    if access & ACCESS_READ != 0 {
        mode |= 0o400;
    } else {
        mode &= !0o400;
    }

    if access & ACCESS_WRITE != 0 {
        mode |= 0o200;
    } else {
        mode &= !0o200;
    }

    perms.set_mode(mode);
    let _ = fs::set_permissions(path, perms);
}
