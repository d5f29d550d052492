//! ProDOS directory block synthesis.
//!
//! An open directory is served to READ as a byte-addressable run of
//! 512-byte ProDOS directory blocks, synthesized once at OPEN time from
//! the host directory contents. Each block holds a 4-byte header
//! (previous/next block pointers) and thirteen 39-byte entries; the key
//! block's first entry is the directory header (volume header `$0F` or
//! subdirectory header `$0E`), so twelve file entries fit there.
//! Entries are sorted by name.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::access;
use crate::datetime;
use crate::files::MARK_LIMIT;
use crate::metadata::{
    self, FILE_TYPE_BIN, FILE_TYPE_DIR, STORAGE_SAPLING, STORAGE_SEEDLING, STORAGE_SUBDIR,
    STORAGE_SUBDIR_HEADER, STORAGE_TREE, STORAGE_VOLUME_HEADER,
};
use crate::xattr;

/// ProDOS directory blocks are 512 bytes.
pub const BLOCK_SIZE: usize = 512;

/// Directory entries are 39 bytes.
pub const ENTRY_LENGTH: usize = 0x27;

/// Thirteen entries per block (the key block trades one for its
/// header).
pub const ENTRIES_PER_BLOCK: usize = 0x0D;

/// Everything needed to fill one 39-byte file entry.
struct EntryInfo {
    name: String,
    storage_type: u8,
    file_type: u8,
    aux_type: u16,
    eof: u32,
    blocks_used: u16,
    created: DateTime<Local>,
    modified: DateTime<Local>,
    access: u8,
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset] = (value & 0xFF) as u8;
    buf[offset + 1] = (value >> 8) as u8;
}

fn put_u24(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset] = (value & 0xFF) as u8;
    buf[offset + 1] = ((value >> 8) & 0xFF) as u8;
    buf[offset + 2] = ((value >> 16) & 0xFF) as u8;
}

fn put_name(entry: &mut [u8; ENTRY_LENGTH], storage_type: u8, name: &str) {
    let bytes = name.as_bytes();
    let len = bytes.len().min(15);
    entry[0] = (storage_type << 4) | len as u8;
    entry[1..1 + len].copy_from_slice(&bytes[..len]);
}

/// Encode one 39-byte ProDOS file entry.
fn file_entry(info: &EntryInfo) -> [u8; ENTRY_LENGTH] {
    let mut entry = [0u8; ENTRY_LENGTH];

    put_name(&mut entry, info.storage_type, &info.name);
    entry[0x10] = info.file_type;
    put_u16(&mut entry, 0x11, 0); // key_pointer: no real block map
    put_u16(&mut entry, 0x13, info.blocks_used);
    put_u24(&mut entry, 0x15, info.eof);
    put_u16(&mut entry, 0x18, datetime::encode_prodos_date(info.created));
    put_u16(&mut entry, 0x1A, datetime::encode_prodos_time(info.created));
    entry[0x1C] = 0; // version
    entry[0x1D] = 0; // min_version
    entry[0x1E] = info.access;
    put_u16(&mut entry, 0x1F, info.aux_type);
    put_u16(&mut entry, 0x21, datetime::encode_prodos_date(info.modified));
    put_u16(&mut entry, 0x23, datetime::encode_prodos_time(info.modified));
    put_u16(&mut entry, 0x25, 0); // header_pointer

    entry
}

/// Encode the 39-byte directory header entry that leads the key block.
fn header_entry(
    name: &str,
    file_count: u16,
    is_volume: bool,
    created: DateTime<Local>,
    access: u8,
) -> [u8; ENTRY_LENGTH] {
    let mut entry = [0u8; ENTRY_LENGTH];

    let storage_type = if is_volume {
        STORAGE_VOLUME_HEADER
    } else {
        STORAGE_SUBDIR_HEADER
    };
    put_name(&mut entry, storage_type, name);
    // Bytes $10-$17 are reserved in the header entry.
    put_u16(&mut entry, 0x18, datetime::encode_prodos_date(created));
    put_u16(&mut entry, 0x1A, datetime::encode_prodos_time(created));
    entry[0x1C] = 0; // version
    entry[0x1D] = 0; // min_version
    entry[0x1E] = access;
    entry[0x1F] = ENTRY_LENGTH as u8;
    entry[0x20] = ENTRIES_PER_BLOCK as u8;
    put_u16(&mut entry, 0x21, file_count);
    put_u16(&mut entry, 0x23, 0); // bitmap pointer
    put_u16(&mut entry, 0x25, 0); // total blocks / parent pointer

    entry
}

/// Pack entries into 512-byte blocks with chained prev/next pointers.
fn build_blocks(
    dir_name: &str,
    entries: &[[u8; ENTRY_LENGTH]],
    is_volume: bool,
    created: DateTime<Local>,
    access: u8,
) -> Vec<[u8; BLOCK_SIZE]> {
    // Key block carries the header plus 12 file entries; each later
    // block carries 13.
    let block_count = if entries.len() <= ENTRIES_PER_BLOCK - 1 {
        1
    } else {
        1 + (entries.len() - (ENTRIES_PER_BLOCK - 1)).div_ceil(ENTRIES_PER_BLOCK)
    };

    let mut blocks = Vec::with_capacity(block_count);
    for block_idx in 0..block_count {
        let mut block = [0u8; BLOCK_SIZE];

        let prev = if block_idx > 0 { block_idx - 1 } else { 0 };
        let next = if block_idx + 1 < block_count {
            block_idx + 1
        } else {
            0
        };
        put_u16(&mut block, 0, prev as u16);
        put_u16(&mut block, 2, next as u16);

        let mut offset = 4;
        let mut slots = ENTRIES_PER_BLOCK;
        let mut entry_idx = if block_idx == 0 {
            let header = header_entry(dir_name, entries.len() as u16, is_volume, created, access);
            block[offset..offset + ENTRY_LENGTH].copy_from_slice(&header);
            offset += ENTRY_LENGTH;
            slots -= 1;
            0
        } else {
            (ENTRIES_PER_BLOCK - 1) + (block_idx - 1) * ENTRIES_PER_BLOCK
        };

        while slots > 0 && entry_idx < entries.len() {
            block[offset..offset + ENTRY_LENGTH].copy_from_slice(&entries[entry_idx]);
            offset += ENTRY_LENGTH;
            slots -= 1;
            entry_idx += 1;
        }

        blocks.push(block);
    }

    blocks
}

fn entry_access(path: &Path) -> u8 {
    xattr::get_attr(path, "access")
        .and_then(|v| access::parse_access_byte(&v))
        .unwrap_or(access::ACCESS_DEFAULT)
}

fn entry_times(md: &fs::Metadata) -> (DateTime<Local>, DateTime<Local>) {
    let modified = md
        .modified()
        .map(datetime::system_time_local)
        .unwrap_or_else(|_| Local::now());
    let created = md
        .created()
        .map(datetime::system_time_local)
        .unwrap_or(modified);
    (created, modified)
}

/// Classify a plain file by its size, the way ProDOS block maps would.
fn file_storage_type(eof: u32, blocks_used: u16) -> u8 {
    if eof <= BLOCK_SIZE as u32 {
        STORAGE_SEEDLING
    } else if blocks_used <= 256 {
        STORAGE_SAPLING
    } else {
        STORAGE_TREE
    }
}

/// Synthesize the ProDOS directory blocks for a host directory.
///
/// Host entries whose uppercased names are empty or longer than 15
/// characters are skipped; the rest appear sorted by name. Metadata
/// comes from the sidecar attributes with the usual per-field
/// defaults (files with no stored type read as BIN).
pub fn synthesize_directory_blocks(
    host_path: &Path,
    dir_name: &str,
    is_volume: bool,
) -> Vec<[u8; BLOCK_SIZE]> {
    let mut entries: Vec<EntryInfo> = Vec::new();

    let dir_iter = match fs::read_dir(host_path) {
        Ok(iter) => iter,
        // An unreadable directory synthesizes as empty.
        Err(_) => {
            let created = fs::metadata(host_path)
                .map(|md| entry_times(&md).0)
                .unwrap_or_else(|_| Local::now());
            return build_blocks(dir_name, &[], is_volume, created, entry_access(host_path));
        }
    };

    for dir_entry in dir_iter.flatten() {
        let name = dir_entry.file_name().to_string_lossy().to_uppercase();
        if name.is_empty() || name.len() > 15 {
            continue;
        }

        let path = dir_entry.path();
        let Ok(md) = fs::metadata(&path) else {
            continue;
        };

        let (created, modified) = entry_times(&md);
        let access = entry_access(&path);

        let info = if md.is_dir() {
            EntryInfo {
                name,
                storage_type: STORAGE_SUBDIR,
                file_type: FILE_TYPE_DIR,
                aux_type: 0,
                eof: BLOCK_SIZE as u32,
                blocks_used: 1,
                created,
                modified,
                access,
            }
        } else {
            let eof = md.len().min(MARK_LIMIT as u64) as u32;
            let mut blocks_used = eof.div_ceil(BLOCK_SIZE as u32) as u16;
            if blocks_used == 0 {
                blocks_used = 1;
            }
            let file_type = xattr::get_attr(&path, "file_type")
                .and_then(|v| metadata::parse_hex_byte(&v))
                .unwrap_or(FILE_TYPE_BIN);
            let aux_type = xattr::get_attr(&path, "aux_type")
                .and_then(|v| metadata::parse_hex_word(&v))
                .unwrap_or(0);
            EntryInfo {
                name,
                storage_type: file_storage_type(eof, blocks_used),
                file_type,
                aux_type,
                eof,
                blocks_used,
                created,
                modified,
                access,
            }
        };

        entries.push(info);
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    let encoded: Vec<[u8; ENTRY_LENGTH]> = entries.iter().map(file_entry).collect();

    let dir_created = fs::metadata(host_path)
        .map(|md| entry_times(&md).0)
        .unwrap_or_else(|_| Local::now());

    build_blocks(
        dir_name,
        &encoded,
        is_volume,
        dir_created,
        entry_access(host_path),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(name: &str, eof: u32) -> EntryInfo {
        let blocks_used = eof.div_ceil(BLOCK_SIZE as u32).max(1) as u16;
        EntryInfo {
            name: name.to_string(),
            storage_type: file_storage_type(eof, blocks_used),
            file_type: FILE_TYPE_BIN,
            aux_type: 0x1234,
            eof,
            blocks_used,
            created: Local.with_ymd_and_hms(1990, 5, 20, 8, 30, 0).unwrap(),
            modified: Local.with_ymd_and_hms(1991, 6, 21, 9, 45, 0).unwrap(),
            access: 0xC3,
        }
    }

    #[test]
    fn test_file_entry_layout() {
        let e = file_entry(&entry("HELLO", 0x0123));
        assert_eq!(e[0], (STORAGE_SEEDLING << 4) | 5);
        assert_eq!(&e[1..6], b"HELLO");
        assert_eq!(e[0x10], FILE_TYPE_BIN);
        assert_eq!(u16::from_le_bytes([e[0x13], e[0x14]]), 1); // blocks
        assert_eq!(e[0x15], 0x23);
        assert_eq!(e[0x16], 0x01);
        assert_eq!(e[0x17], 0x00);
        assert_eq!(e[0x1E], 0xC3);
        assert_eq!(u16::from_le_bytes([e[0x1F], e[0x20]]), 0x1234);
    }

    #[test]
    fn test_storage_type_classification() {
        assert_eq!(file_storage_type(0, 1), STORAGE_SEEDLING);
        assert_eq!(file_storage_type(512, 1), STORAGE_SEEDLING);
        assert_eq!(file_storage_type(513, 2), STORAGE_SAPLING);
        assert_eq!(file_storage_type(128 * 1024, 256), STORAGE_SAPLING);
        assert_eq!(file_storage_type(128 * 1024 + 1, 257), STORAGE_TREE);
    }

    #[test]
    fn test_single_block_directory() {
        let created = Local.with_ymd_and_hms(1988, 1, 2, 3, 4, 0).unwrap();
        let encoded: Vec<_> = (0..3)
            .map(|i| file_entry(&entry(&format!("F{i}"), 10)))
            .collect();
        let blocks = build_blocks("VOL", &encoded, true, created, 0xC3);
        assert_eq!(blocks.len(), 1);
        // prev/next pointers are 0 on a lone block
        assert_eq!(&blocks[0][0..4], &[0, 0, 0, 0]);
        // header entry: volume header storage type, name "VOL"
        assert_eq!(blocks[0][4], (STORAGE_VOLUME_HEADER << 4) | 3);
        assert_eq!(&blocks[0][5..8], b"VOL");
        assert_eq!(blocks[0][4 + 0x1F], ENTRY_LENGTH as u8);
        assert_eq!(blocks[0][4 + 0x20], ENTRIES_PER_BLOCK as u8);
        assert_eq!(
            u16::from_le_bytes([blocks[0][4 + 0x21], blocks[0][4 + 0x22]]),
            3
        );
        // first file entry follows the header
        assert_eq!(blocks[0][4 + ENTRY_LENGTH] & 0x0F, 2); // name "F0"
    }

    #[test]
    fn test_multi_block_directory_chains_pointers() {
        let created = Local.with_ymd_and_hms(1988, 1, 2, 3, 4, 0).unwrap();
        // 12 fit in the key block; 14 forces a second block.
        let encoded: Vec<_> = (0..14)
            .map(|i| file_entry(&entry(&format!("F{i:02}"), 10)))
            .collect();
        let blocks = build_blocks("VOL", &encoded, false, created, 0xC3);
        assert_eq!(blocks.len(), 2);
        assert_eq!(u16::from_le_bytes([blocks[0][0], blocks[0][1]]), 0);
        assert_eq!(u16::from_le_bytes([blocks[0][2], blocks[0][3]]), 1);
        assert_eq!(u16::from_le_bytes([blocks[1][0], blocks[1][1]]), 0);
        assert_eq!(u16::from_le_bytes([blocks[1][2], blocks[1][3]]), 0);
        // subdirectory header in the key block
        assert_eq!(blocks[0][4] >> 4, STORAGE_SUBDIR_HEADER);
        // second block starts with the 13th entry (F12)
        assert_eq!(&blocks[1][5..8], b"F12");
    }
}
