//! Filing MLI calls: OPEN, NEWLINE, READ, WRITE, CLOSE, FLUSH,
//! SET_MARK, GET_MARK, SET_EOF, GET_EOF, and the buffer calls SET_BUF
//! and GET_BUF.

use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::fs::FileExt;

use emu_core::Bus;

use crate::access::{self, ACCESS_READ};
use crate::context::MliContext;
use crate::directory::{synthesize_directory_blocks, BLOCK_SIZE};
use crate::errors;
use crate::files::{OpenFile, MARK_LIMIT};
use crate::xattr;

impl MliContext {
    /// OPEN ($C8): open a file or directory for access.
    ///
    /// Parameter block: +0 count (3), +1 pathname ptr, +3 io_buffer,
    /// +5 ref_num (result).
    pub(crate) fn open(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 3)?;

        let io_buffer = mem.read_u16(param_addr.wrapping_add(3));
        let resolved = self.resolve_pathname_arg(mem, param_addr, 1)?;

        if !resolved.host.exists() {
            return Err(errors::FILE_NOT_FOUND);
        }

        let is_directory = resolved.host.is_dir();

        // The stored access byte gates OPEN; host permissions get their
        // say at the open(2) below.
        let stored_access = xattr::get_attr(&resolved.host, "access")
            .and_then(|v| access::parse_access_byte(&v))
            .unwrap_or(access::ACCESS_DEFAULT);
        if stored_access & ACCESS_READ == 0 {
            return Err(errors::ACCESS_ERROR);
        }

        let ref_num = self
            .open_files
            .free_ref_num()
            .ok_or(errors::TOO_MANY_FILES_OPEN)?;

        let host_file = if is_directory {
            File::open(&resolved.host)
        } else {
            // Read/write when possible, read-only when not.
            File::options()
                .read(true)
                .write(true)
                .open(&resolved.host)
                .or_else(|_| File::open(&resolved.host))
        };
        let host_file = host_file.map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => errors::ACCESS_ERROR,
            _ => errors::IO_ERROR,
        })?;

        let mut open_file = OpenFile::new(host_file, io_buffer);
        open_file.is_directory = is_directory;

        if is_directory {
            let full = &resolved.prodos;
            let dir_name = match full.rfind('/') {
                Some(pos) if pos + 1 < full.len() => &full[pos + 1..],
                _ => full.as_str(),
            };
            let is_volume = full.starts_with('/') && !full[1..].contains('/');
            open_file.directory_blocks =
                synthesize_directory_blocks(&resolved.host, dir_name, is_volume);
        }

        self.open_files.insert(ref_num, open_file);
        mem.write(param_addr.wrapping_add(5), ref_num);

        Ok(())
    }

    /// NEWLINE ($C9): set the read-stop mask and character.
    ///
    /// Parameter block: +0 count (3), +1 ref_num, +2 enable_mask,
    /// +3 newline_char. A zero mask disables newline mode.
    pub(crate) fn newline(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 3)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));
        let mask = mem.read(param_addr.wrapping_add(2));
        let newline_char = mem.read(param_addr.wrapping_add(3));

        let open_file = self
            .open_files
            .get_mut(ref_num)
            .ok_or(errors::BAD_REF_NUM)?;

        open_file.newline_enabled = mask != 0;
        open_file.newline_mask = mask;
        open_file.newline_char = newline_char;

        Ok(())
    }

    /// READ ($CA): read up to request_count bytes at the current mark.
    ///
    /// Parameter block: +0 count (4), +1 ref_num, +2 data_buffer,
    /// +4 request_count, +6 trans_count (result; written even on
    /// error). In newline mode the transfer stops after the first byte
    /// whose masked value matches the newline character. A read that
    /// runs into end-of-file reports `EOF_ENCOUNTERED`, with whatever
    /// was transferred counted in trans_count.
    pub(crate) fn read(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 4)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));
        let data_buffer = mem.read_u16(param_addr.wrapping_add(2));
        let request_count = mem.read_u16(param_addr.wrapping_add(4));

        mem.write_u16(param_addr.wrapping_add(6), 0);

        let open_file = self
            .open_files
            .get_mut(ref_num)
            .ok_or(errors::BAD_REF_NUM)?;

        // Directories read from their synthesized blocks.
        if open_file.is_directory {
            let dir_eof = (open_file.directory_blocks.len() * BLOCK_SIZE) as u32;
            if open_file.mark >= dir_eof {
                return Err(errors::EOF_ENCOUNTERED);
            }

            let available = dir_eof - open_file.mark;
            let to_read = (request_count as u32).min(available);

            let mut transferred: u16 = 0;
            while (transferred as u32) < to_read {
                let block = (open_file.mark / BLOCK_SIZE as u32) as usize;
                let offset = (open_file.mark % BLOCK_SIZE as u32) as usize;
                let byte = open_file.directory_blocks[block][offset];
                mem.write(data_buffer.wrapping_add(transferred), byte);
                open_file.mark += 1;
                transferred += 1;
            }

            mem.write_u16(param_addr.wrapping_add(6), transferred);
            if transferred == 0 {
                return Err(errors::EOF_ENCOUNTERED);
            }
            return Ok(());
        }

        let eof = open_file.host_eof().map_err(|_| errors::IO_ERROR)?;
        if open_file.mark >= eof {
            return Err(errors::EOF_ENCOUNTERED);
        }

        // One byte at a time: newline mode can stop the transfer on any
        // byte.
        let mut transferred: u16 = 0;
        let mut result = Ok(());
        for i in 0..request_count {
            if open_file.mark >= eof {
                result = Err(errors::EOF_ENCOUNTERED);
                break;
            }

            let mut byte = [0u8; 1];
            match open_file.file.read_at(&mut byte, open_file.mark as u64) {
                Ok(0) => {
                    result = Err(errors::EOF_ENCOUNTERED);
                    break;
                }
                Ok(_) => {}
                Err(_) => {
                    result = Err(errors::IO_ERROR);
                    break;
                }
            }

            mem.write(data_buffer.wrapping_add(i), byte[0]);
            open_file.mark += 1;
            transferred += 1;

            if open_file.newline_enabled
                && byte[0] & open_file.newline_mask
                    == open_file.newline_char & open_file.newline_mask
            {
                break;
            }
        }

        mem.write_u16(param_addr.wrapping_add(6), transferred);
        result
    }

    /// WRITE ($CB): write request_count bytes at the current mark.
    ///
    /// Parameter block as for READ. Directories are never writable.
    pub(crate) fn write(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 4)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));
        let data_buffer = mem.read_u16(param_addr.wrapping_add(2));
        let request_count = mem.read_u16(param_addr.wrapping_add(4));

        mem.write_u16(param_addr.wrapping_add(6), 0);

        let open_file = self
            .open_files
            .get_mut(ref_num)
            .ok_or(errors::BAD_REF_NUM)?;

        if open_file.is_directory {
            return Err(errors::ACCESS_ERROR);
        }

        let mut transferred: u16 = 0;
        for i in 0..request_count {
            // The mark saturates at the 24-bit limit.
            if open_file.mark > MARK_LIMIT {
                break;
            }

            let byte = [mem.read(data_buffer.wrapping_add(i))];
            match open_file.file.write_at(&byte, open_file.mark as u64) {
                Ok(1..) => {}
                Ok(0) => {
                    mem.write_u16(param_addr.wrapping_add(6), transferred);
                    return Err(errors::IO_ERROR);
                }
                Err(e) => {
                    mem.write_u16(param_addr.wrapping_add(6), transferred);
                    return Err(errors::io_error_code(&e));
                }
            }

            open_file.mark += 1;
            transferred += 1;
        }

        mem.write_u16(param_addr.wrapping_add(6), transferred);
        Ok(())
    }

    /// CLOSE ($CC): close one file, or every file when ref_num is 0.
    pub(crate) fn close(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 1)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));

        if ref_num == 0 {
            self.open_files.clear();
            return Ok(());
        }

        self.open_files
            .remove(ref_num)
            .map(|_| ())
            .ok_or(errors::BAD_REF_NUM)
    }

    /// FLUSH ($CD): fsync one file, or every file when ref_num is 0.
    pub(crate) fn flush(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 1)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));

        if ref_num == 0 {
            for (_, open_file) in self.open_files.iter_mut() {
                let _ = open_file.file.sync_all();
            }
            return Ok(());
        }

        let open_file = self
            .open_files
            .get_mut(ref_num)
            .ok_or(errors::BAD_REF_NUM)?;
        open_file.file.sync_all().map_err(|_| errors::IO_ERROR)?;
        Ok(())
    }

    /// SET_MARK ($CE): position must not pass the current EOF.
    pub(crate) fn set_mark(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 2)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));
        let position = mem.read_u24(param_addr.wrapping_add(2));

        let open_file = self
            .open_files
            .get_mut(ref_num)
            .ok_or(errors::BAD_REF_NUM)?;

        let eof = open_file.host_eof().map_err(|_| errors::IO_ERROR)?;
        if position > eof {
            return Err(errors::POSITION_OUT_OF_RANGE);
        }

        open_file.mark = position;
        Ok(())
    }

    /// GET_MARK ($CF): report the current mark.
    pub(crate) fn get_mark(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 2)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));
        let mark = self
            .open_files
            .get(ref_num)
            .ok_or(errors::BAD_REF_NUM)?
            .mark;

        mem.write_u24(param_addr.wrapping_add(2), mark);
        Ok(())
    }

    /// SET_EOF ($D0): truncate or extend the host file; the mark is
    /// clamped to the new EOF.
    pub(crate) fn set_eof(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 2)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));
        let new_eof = mem.read_u24(param_addr.wrapping_add(2));

        let open_file = self
            .open_files
            .get_mut(ref_num)
            .ok_or(errors::BAD_REF_NUM)?;

        open_file
            .file
            .set_len(new_eof as u64)
            .map_err(|e| errors::io_error_code(&e))?;

        if open_file.mark > new_eof {
            open_file.mark = new_eof;
        }
        Ok(())
    }

    /// GET_EOF ($D1): report the host file size, capped at 24 bits.
    pub(crate) fn get_eof(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 2)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));
        let eof = self
            .open_files
            .get(ref_num)
            .ok_or(errors::BAD_REF_NUM)?
            .host_eof()
            .map_err(|_| errors::IO_ERROR)?;

        mem.write_u24(param_addr.wrapping_add(2), eof);
        Ok(())
    }

    /// SET_BUF ($D2): remember a new io_buffer pointer.
    pub(crate) fn set_buf(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 2)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));
        let io_buffer = mem.read_u16(param_addr.wrapping_add(2));

        let open_file = self
            .open_files
            .get_mut(ref_num)
            .ok_or(errors::BAD_REF_NUM)?;
        open_file.io_buffer = io_buffer;
        Ok(())
    }

    /// GET_BUF ($D3): report the remembered io_buffer pointer.
    pub(crate) fn get_buf(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 2)?;

        let ref_num = mem.read(param_addr.wrapping_add(1));
        let io_buffer = self
            .open_files
            .get(ref_num)
            .ok_or(errors::BAD_REF_NUM)?
            .io_buffer;

        mem.write_u16(param_addr.wrapping_add(2), io_buffer);
        Ok(())
    }
}
