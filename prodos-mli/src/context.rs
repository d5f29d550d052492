//! The MLI context and call dispatcher.
//!
//! `MliContext` holds everything a running ProDOS needs outside the
//! 64 KiB address space: the current prefix, the host directory that
//! stands in for the volume set, the open-file table and the interrupt
//! allocation slots. [`MliContext::dispatch`] decodes a call number and
//! parameter block and runs one MLI call against that state.
//!
//! Handlers read their parameter blocks and write their results
//! through the same [`Bus`] the CPU executes on; the dispatcher itself
//! never touches emulated memory.

use std::path::{Path, PathBuf};

use emu_core::Bus;

use crate::errors;
use crate::files::OpenFileTable;
use crate::path::{
    is_valid_pathname, map_to_host_path, read_normalized_counted_string, resolve_full_path,
    MAX_FULL_PATH_LEN, MAX_PATHNAME_LEN,
};

/// Number of interrupt-handler slots in the allocation table.
pub const INTERRUPT_SLOTS: usize = 4;

/// A fully resolved pathname argument: the ProDOS form and the host
/// file it maps to.
pub(crate) struct Resolved {
    pub prodos: String,
    pub host: PathBuf,
}

/// State for one emulated ProDOS instance.
pub struct MliContext {
    /// Current prefix; empty until the first SET_PREFIX.
    pub(crate) prefix: String,
    /// Host directory whose immediate children are the volumes.
    pub(crate) volumes_root: PathBuf,
    pub(crate) open_files: OpenFileTable,
    /// Slot i holds a handler address, or 0 when free.
    pub(crate) interrupt_handlers: [u16; INTERRUPT_SLOTS],
}

impl MliContext {
    /// Create a context rooted at the given host directory.
    pub fn new(volumes_root: impl Into<PathBuf>) -> Self {
        Self {
            prefix: String::new(),
            volumes_root: volumes_root.into(),
            open_files: OpenFileTable::new(),
            interrupt_handlers: [0; INTERRUPT_SLOTS],
        }
    }

    /// The current prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The host directory standing in for the volume set.
    pub fn volumes_root(&self) -> &Path {
        &self.volumes_root
    }

    /// The open-file table.
    pub fn open_files(&self) -> &OpenFileTable {
        &self.open_files
    }

    /// Decode and execute one MLI call. Returns the ProDOS error code
    /// for the A register.
    pub fn dispatch(&mut self, mem: &mut impl Bus, call_number: u8, param_addr: u16) -> u8 {
        let result = match call_number {
            // System
            0x40 => self.alloc_interrupt(mem, param_addr),
            0x41 => self.dealloc_interrupt(mem, param_addr),
            0x80 => self.read_block(mem, param_addr),
            0x81 => self.write_block(mem, param_addr),
            0x82 => self.get_time(mem, param_addr),

            // Housekeeping
            0xC0 => self.create(mem, param_addr),
            0xC1 => self.destroy(mem, param_addr),
            0xC2 => self.rename(mem, param_addr),
            0xC3 => self.set_file_info(mem, param_addr),
            0xC4 => self.get_file_info(mem, param_addr),
            0xC5 => self.on_line(mem, param_addr),
            0xC6 => self.set_prefix(mem, param_addr),
            0xC7 => self.get_prefix(mem, param_addr),

            // Filing
            0xC8 => self.open(mem, param_addr),
            0xC9 => self.newline(mem, param_addr),
            0xCA => self.read(mem, param_addr),
            0xCB => self.write(mem, param_addr),
            0xCC => self.close(mem, param_addr),
            0xCD => self.flush(mem, param_addr),
            0xCE => self.set_mark(mem, param_addr),
            0xCF => self.get_mark(mem, param_addr),
            0xD0 => self.set_eof(mem, param_addr),
            0xD1 => self.get_eof(mem, param_addr),

            // Buffer
            0xD2 => self.set_buf(mem, param_addr),
            0xD3 => self.get_buf(mem, param_addr),

            _ => Err(errors::BAD_CALL_NUMBER),
        };

        let code = match result {
            Ok(()) => errors::NO_ERROR,
            Err(code) => code,
        };

        if code == errors::NO_ERROR {
            log::debug!(
                "MLI ${:02X} ({}) param=${:04X} ok",
                call_number,
                call_name(call_number),
                param_addr
            );
        } else {
            log::debug!(
                "MLI ${:02X} ({}) param=${:04X} -> ${:02X} ({})",
                call_number,
                call_name(call_number),
                param_addr,
                code,
                errors::error_name(code)
            );
        }

        code
    }

    // =====================================================================
    // Shared parameter-block helpers
    // =====================================================================

    /// Every call starts by checking the parameter-count byte; a
    /// mismatch beats any other validation.
    pub(crate) fn check_param_count(
        &self,
        mem: &mut impl Bus,
        param_addr: u16,
        expected: u8,
    ) -> Result<(), u8> {
        if mem.read(param_addr) != expected {
            return Err(errors::BAD_CALL_PARAM_COUNT);
        }
        Ok(())
    }

    /// Read the pathname argument whose pointer sits at
    /// `param_addr + offset`: dereference, bound the count byte, and
    /// normalize. Empty and oversized names are syntax errors.
    pub(crate) fn read_pathname_arg(
        &self,
        mem: &mut impl Bus,
        param_addr: u16,
        offset: u16,
    ) -> Result<String, u8> {
        let ptr = mem.read_u16(param_addr.wrapping_add(offset));
        if mem.read(ptr) > MAX_PATHNAME_LEN as u8 {
            return Err(errors::INVALID_PATH_SYNTAX);
        }
        let pathname = read_normalized_counted_string(mem, ptr);
        if pathname.is_empty() {
            return Err(errors::INVALID_PATH_SYNTAX);
        }
        Ok(pathname)
    }

    /// Resolve a normalized pathname against the prefix, validate it,
    /// and map it onto the host filesystem.
    pub(crate) fn resolve_to_host(&self, pathname: &str) -> Result<Resolved, u8> {
        let full = if pathname.starts_with('/') {
            pathname.to_string()
        } else {
            let full =
                resolve_full_path(pathname, &self.prefix).ok_or(errors::INVALID_PATH_SYNTAX)?;
            // A partial path against an empty prefix stays partial.
            if !full.starts_with('/') {
                return Err(errors::INVALID_PATH_SYNTAX);
            }
            full
        };

        if !is_valid_pathname(&full, MAX_FULL_PATH_LEN) {
            return Err(errors::INVALID_PATH_SYNTAX);
        }

        let host =
            map_to_host_path(&full, &self.volumes_root).ok_or(errors::INVALID_PATH_SYNTAX)?;
        Ok(Resolved { prodos: full, host })
    }

    /// `read_pathname_arg` + `resolve_to_host` in one step, for the
    /// calls with no validation between the two.
    pub(crate) fn resolve_pathname_arg(
        &self,
        mem: &mut impl Bus,
        param_addr: u16,
        offset: u16,
    ) -> Result<Resolved, u8> {
        let pathname = self.read_pathname_arg(mem, param_addr, offset)?;
        self.resolve_to_host(&pathname)
    }
}

/// Symbolic name of an MLI call number, for trace output.
pub fn call_name(call_number: u8) -> &'static str {
    match call_number {
        0x40 => "ALLOC_INTERRUPT",
        0x41 => "DEALLOC_INTERRUPT",
        0x80 => "READ_BLOCK",
        0x81 => "WRITE_BLOCK",
        0x82 => "GET_TIME",
        0xC0 => "CREATE",
        0xC1 => "DESTROY",
        0xC2 => "RENAME",
        0xC3 => "SET_FILE_INFO",
        0xC4 => "GET_FILE_INFO",
        0xC5 => "ON_LINE",
        0xC6 => "SET_PREFIX",
        0xC7 => "GET_PREFIX",
        0xC8 => "OPEN",
        0xC9 => "NEWLINE",
        0xCA => "READ",
        0xCB => "WRITE",
        0xCC => "CLOSE",
        0xCD => "FLUSH",
        0xCE => "SET_MARK",
        0xCF => "GET_MARK",
        0xD0 => "SET_EOF",
        0xD1 => "GET_EOF",
        0xD2 => "SET_BUF",
        0xD3 => "GET_BUF",
        _ => "UNKNOWN",
    }
}
