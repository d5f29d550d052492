//! Housekeeping MLI calls: CREATE, DESTROY, RENAME, SET_FILE_INFO,
//! GET_FILE_INFO, ON_LINE, SET_PREFIX, GET_PREFIX.

use std::fs;

use chrono::Local;

use emu_core::Bus;

use crate::context::MliContext;
use crate::datetime::{
    decode_prodos_datetime, encode_prodos_date, encode_prodos_time,
};
use crate::errors;
use crate::metadata::{
    self, Metadata, STORAGE_SEEDLING, STORAGE_SUBDIR, STORAGE_VOLUME_HEADER,
};
use crate::path::{is_valid_component, is_valid_pathname, resolve_full_path, MAX_PATHNAME_LEN};

impl MliContext {
    /// CREATE ($C0): make a new standard file or directory.
    ///
    /// Parameter block: +0 count (7), +1 pathname ptr, +3 access,
    /// +4 file_type, +5 aux_type, +7 storage_type, +8 create_date,
    /// +10 create_time.
    pub(crate) fn create(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 7)?;

        let pathname = self.read_pathname_arg(mem, param_addr, 1)?;

        let access = mem.read(param_addr.wrapping_add(3));
        let file_type = mem.read(param_addr.wrapping_add(4));
        let aux_type = mem.read_u16(param_addr.wrapping_add(5));
        let storage_type = mem.read(param_addr.wrapping_add(7));
        let create_date = mem.read_u16(param_addr.wrapping_add(8));
        let create_time = mem.read_u16(param_addr.wrapping_add(10));

        if storage_type != STORAGE_SEEDLING && storage_type != STORAGE_SUBDIR {
            return Err(errors::UNSUPPORTED_STOR_TYPE);
        }

        let resolved = self.resolve_to_host(&pathname)?;

        if resolved.host.exists() {
            return Err(errors::DUPLICATE_FILENAME);
        }

        match resolved.host.parent() {
            Some(parent) if parent.exists() => {}
            _ => return Err(errors::PATH_NOT_FOUND),
        }

        if storage_type == STORAGE_SUBDIR {
            fs::create_dir(&resolved.host).map_err(|e| errors::io_error_code(&e))?;
        } else {
            fs::File::create(&resolved.host).map_err(|e| errors::io_error_code(&e))?;
        }

        metadata::apply_access_to_permissions(&resolved.host, access);

        // A zero creation stamp means "now".
        let (create_date, create_time) = if create_date == 0 || create_time == 0 {
            let now = Local::now();
            (encode_prodos_date(now), encode_prodos_time(now))
        } else {
            (create_date, create_time)
        };

        let meta = Metadata {
            access,
            file_type,
            aux_type,
            storage_type,
            create_date,
            create_time,
            mod_date: create_date,
            mod_time: create_time,
        };

        let err = metadata::store_metadata(&resolved.host, &meta);
        if err != errors::NO_ERROR {
            return Err(err);
        }
        Ok(())
    }

    /// DESTROY ($C1): delete a file or empty directory.
    pub(crate) fn destroy(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 1)?;

        let resolved = self.resolve_pathname_arg(mem, param_addr, 1)?;

        if !resolved.host.exists() {
            return Err(errors::FILE_NOT_FOUND);
        }

        if resolved.host.is_dir() {
            let mut iter = fs::read_dir(&resolved.host).map_err(|e| errors::io_error_code(&e))?;
            if iter.next().is_some() {
                // ProDOS refuses to destroy a non-empty directory.
                return Err(errors::ACCESS_ERROR);
            }
            fs::remove_dir(&resolved.host).map_err(|e| errors::io_error_code(&e))?;
        } else {
            fs::remove_file(&resolved.host).map_err(|e| errors::io_error_code(&e))?;
        }

        Ok(())
    }

    /// RENAME ($C2): rename within a single directory.
    pub(crate) fn rename(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 2)?;

        let old = self.resolve_pathname_arg(mem, param_addr, 1)?;
        let new = self.resolve_pathname_arg(mem, param_addr, 3)?;

        // RENAME cannot move between directories; both full paths must
        // share the same parent.
        let old_dir = old
            .prodos
            .rfind('/')
            .map(|pos| &old.prodos[..pos])
            .ok_or(errors::INVALID_PATH_SYNTAX)?;
        let new_dir = new
            .prodos
            .rfind('/')
            .map(|pos| &new.prodos[..pos])
            .ok_or(errors::INVALID_PATH_SYNTAX)?;
        if old_dir != new_dir {
            return Err(errors::INVALID_PATH_SYNTAX);
        }

        if !old.host.exists() {
            return Err(errors::FILE_NOT_FOUND);
        }
        if new.host.exists() {
            return Err(errors::DUPLICATE_FILENAME);
        }

        // A host rename carries the xattr sidecar along with the inode.
        fs::rename(&old.host, &new.host).map_err(|e| errors::io_error_code(&e))?;
        Ok(())
    }

    /// SET_FILE_INFO ($C3): update access, type and modification stamp.
    ///
    /// Parameter block: +0 count (7), +1 pathname ptr, +3 access,
    /// +4 file_type, +5 aux_type, +7 null field (3 bytes, ignored),
    /// +10 mod_date, +12 mod_time.
    pub(crate) fn set_file_info(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 7)?;

        let pathname = self.read_pathname_arg(mem, param_addr, 1)?;

        let access = mem.read(param_addr.wrapping_add(3));
        let file_type = mem.read(param_addr.wrapping_add(4));
        let aux_type = mem.read_u16(param_addr.wrapping_add(5));
        let mod_date = mem.read_u16(param_addr.wrapping_add(10));
        let mod_time = mem.read_u16(param_addr.wrapping_add(12));

        let resolved = self.resolve_to_host(&pathname)?;

        if !resolved.host.exists() {
            return Err(errors::FILE_NOT_FOUND);
        }

        // Load first so storage type and creation stamp survive.
        let is_dir = resolved.host.is_dir();
        let mut meta = metadata::load_metadata(&resolved.host, is_dir);
        meta.access = access;
        meta.file_type = file_type;
        meta.aux_type = aux_type;
        meta.mod_date = mod_date;
        meta.mod_time = mod_time;

        // Host times are stamped before the new access bits take
        // effect; the access byte may clear this file's write bit.
        if mod_date != 0 && mod_time != 0 {
            let mtime = std::time::SystemTime::from(decode_prodos_datetime(mod_date, mod_time));
            let times = fs::FileTimes::new().set_accessed(mtime).set_modified(mtime);
            let file = fs::File::open(&resolved.host).map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => errors::ACCESS_ERROR,
                _ => errors::IO_ERROR,
            })?;
            file.set_times(times).map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => errors::ACCESS_ERROR,
                _ => errors::IO_ERROR,
            })?;
        }

        metadata::apply_access_to_permissions(&resolved.host, access);

        let err = metadata::store_metadata(&resolved.host, &meta);
        if err != errors::NO_ERROR {
            return Err(err);
        }
        Ok(())
    }

    /// GET_FILE_INFO ($C4): report access, type, size and stamps.
    ///
    /// Parameter block: +0 count ($0A), +1 pathname ptr, then results:
    /// +3 access, +4 file_type, +5 aux_type, +7 storage_type,
    /// +8 blocks_used, +10 mod_date, +12 mod_time, +14 create_date,
    /// +16 create_time.
    pub(crate) fn get_file_info(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 0x0A)?;

        let resolved = self.resolve_pathname_arg(mem, param_addr, 1)?;

        if !resolved.host.exists() {
            return Err(errors::FILE_NOT_FOUND);
        }

        let is_dir = resolved.host.is_dir();
        let file_size = if is_dir {
            0
        } else {
            fs::metadata(&resolved.host).map(|md| md.len()).unwrap_or(0)
        };

        let mut meta = metadata::load_metadata(&resolved.host, is_dir);

        let blocks_used = file_size.div_ceil(512).min(u16::MAX as u64) as u16;

        // Immediate children of the volumes root are volumes, whatever
        // their sidecar says.
        if is_dir && self.is_volume_root_child(&resolved.host) {
            meta.storage_type = STORAGE_VOLUME_HEADER;
        }

        mem.write(param_addr.wrapping_add(3), meta.access);
        mem.write(param_addr.wrapping_add(4), meta.file_type);
        mem.write_u16(param_addr.wrapping_add(5), meta.aux_type);
        mem.write(param_addr.wrapping_add(7), meta.storage_type);
        mem.write_u16(param_addr.wrapping_add(8), blocks_used);
        mem.write_u16(param_addr.wrapping_add(10), meta.mod_date);
        mem.write_u16(param_addr.wrapping_add(12), meta.mod_time);
        mem.write_u16(param_addr.wrapping_add(14), meta.create_date);
        mem.write_u16(param_addr.wrapping_add(16), meta.create_time);

        Ok(())
    }

    fn is_volume_root_child(&self, host: &std::path::Path) -> bool {
        let Some(parent) = host.parent() else {
            return false;
        };
        match (fs::canonicalize(parent), fs::canonicalize(&self.volumes_root)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    /// ON_LINE ($C5): enumerate mounted volumes.
    ///
    /// Parameter block: +0 count (2), +1 unit_num, +2 data_buffer ptr.
    /// Each record is 16 bytes: `(drive << 7) | (slot << 4) | name_len`
    /// then the name, zero padded. unit_num 0 lists everything (up to
    /// 14 records and a terminator byte); a specific unit yields one
    /// record.
    pub(crate) fn on_line(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 2)?;

        let unit_num = mem.read(param_addr.wrapping_add(1));
        let data_buffer = mem.read_u16(param_addr.wrapping_add(2));

        let volumes = self.list_volumes();

        if unit_num != 0 {
            let drive = (unit_num >> 7) & 0x01;
            let slot = (unit_num >> 4) & 0x07;
            if !(1..=7).contains(&slot) {
                return Err(errors::NO_DEVICE);
            }

            let index = ((slot - 1) * 2 + drive) as usize;
            let name = volumes.get(index).ok_or(errors::NO_DEVICE)?;
            if name.len() > 15 {
                return Err(errors::NO_DEVICE);
            }

            write_volume_record(mem, data_buffer, slot, drive, name);
            return Ok(());
        }

        // Slots 1-7 with two drives each bound the listing at 14.
        if volumes.len() > 14 {
            log::debug!("ON_LINE: {} volumes, listing first 14", volumes.len());
        }

        let mut offset = data_buffer;
        for (i, name) in volumes.iter().take(14).enumerate() {
            let slot = (i / 2 + 1) as u8;
            let drive = (i % 2) as u8;
            write_volume_record(mem, offset, slot, drive, name);
            offset = offset.wrapping_add(16);
        }
        mem.write(offset, 0); // terminator

        Ok(())
    }

    /// Immediate subdirectories of the volumes root whose names are
    /// valid ProDOS volume names, sorted.
    fn list_volumes(&self) -> Vec<String> {
        let mut volumes = Vec::new();
        if let Ok(iter) = fs::read_dir(&self.volumes_root) {
            for entry in iter.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_valid_component(&name) {
                    volumes.push(name);
                }
            }
        }
        volumes.sort();
        volumes
    }

    /// SET_PREFIX ($C6): replace the current prefix.
    pub(crate) fn set_prefix(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 1)?;

        let ptr = mem.read_u16(param_addr.wrapping_add(1));
        if mem.read(ptr) > MAX_PATHNAME_LEN as u8 {
            return Err(errors::INVALID_PATH_SYNTAX);
        }
        let pathname = crate::path::read_normalized_counted_string(mem, ptr);

        // A partial path is meaningless without a prefix to hang it on.
        if !pathname.is_empty() && !pathname.starts_with('/') && self.prefix.is_empty() {
            return Err(errors::INVALID_PATH_SYNTAX);
        }

        let full =
            resolve_full_path(&pathname, &self.prefix).ok_or(errors::INVALID_PATH_SYNTAX)?;

        // The stored prefix obeys the single-pathname length bound.
        if !is_valid_pathname(&full, MAX_PATHNAME_LEN) {
            return Err(errors::INVALID_PATH_SYNTAX);
        }

        self.prefix = full;
        Ok(())
    }

    /// GET_PREFIX ($C7): write the prefix as a counted string.
    pub(crate) fn get_prefix(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 1)?;

        let buffer = mem.read_u16(param_addr.wrapping_add(1));
        mem.write(buffer, self.prefix.len() as u8);
        for (i, byte) in self.prefix.bytes().enumerate() {
            mem.write(buffer.wrapping_add(1 + i as u16), byte);
        }
        Ok(())
    }
}

/// Write one 16-byte ON_LINE volume record.
fn write_volume_record(mem: &mut impl Bus, addr: u16, slot: u8, drive: u8, name: &str) {
    let name_len = name.len().min(15);
    mem.write(addr, (drive << 7) | (slot << 4) | name_len as u8);
    for i in 0..15 {
        let byte = name.as_bytes().get(i).copied().unwrap_or(0);
        mem.write(addr.wrapping_add(1 + i as u16), byte);
    }
}
