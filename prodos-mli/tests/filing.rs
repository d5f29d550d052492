//! Filing call tests: open-file lifecycle, reads, writes, marks and
//! EOFs against a scratch volumes root.

use std::fs;
use std::path::PathBuf;

use emu_core::Bus;
use prodos_mli::{errors, MliContext};

struct TestMemory {
    ram: Vec<u8>,
}

impl TestMemory {
    fn new() -> Self {
        Self {
            ram: vec![0; 0x10000],
        }
    }

    fn put_counted(&mut self, addr: u16, s: &str) {
        self.ram[addr as usize] = s.len() as u8;
        for (i, b) in s.bytes().enumerate() {
            self.ram[addr as usize + 1 + i] = b;
        }
    }
}

impl Bus for TestMemory {
    fn read(&mut self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.ram[addr as usize] = value;
    }
}

fn scratch_root(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("prodos8-fil-{tag}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

const PARAM: u16 = 0x0300;
const PATH1: u16 = 0x0400;
const DATA: u16 = 0x0500;
const IO_BUF: u16 = 0x0800;

fn open(ctx: &mut MliContext, mem: &mut TestMemory, pathname: &str) -> (u8, u8) {
    mem.put_counted(PATH1, pathname);
    mem.ram[PARAM as usize] = 3;
    mem.write_u16(PARAM + 1, PATH1);
    mem.write_u16(PARAM + 3, IO_BUF);
    mem.ram[PARAM as usize + 5] = 0;
    let err = ctx.dispatch(mem, 0xC8, PARAM);
    (err, mem.ram[PARAM as usize + 5])
}

fn read(ctx: &mut MliContext, mem: &mut TestMemory, ref_num: u8, request: u16) -> (u8, u16) {
    mem.ram[PARAM as usize] = 4;
    mem.ram[PARAM as usize + 1] = ref_num;
    mem.write_u16(PARAM + 2, DATA);
    mem.write_u16(PARAM + 4, request);
    let err = ctx.dispatch(mem, 0xCA, PARAM);
    let trans = mem.read_u16(PARAM + 6);
    (err, trans)
}

fn write_call(ctx: &mut MliContext, mem: &mut TestMemory, ref_num: u8, data: &[u8]) -> (u8, u16) {
    for (i, &b) in data.iter().enumerate() {
        mem.ram[DATA as usize + i] = b;
    }
    mem.ram[PARAM as usize] = 4;
    mem.ram[PARAM as usize + 1] = ref_num;
    mem.write_u16(PARAM + 2, DATA);
    mem.write_u16(PARAM + 4, data.len() as u16);
    let err = ctx.dispatch(mem, 0xCB, PARAM);
    let trans = mem.read_u16(PARAM + 6);
    (err, trans)
}

fn close(ctx: &mut MliContext, mem: &mut TestMemory, ref_num: u8) -> u8 {
    mem.ram[PARAM as usize] = 1;
    mem.ram[PARAM as usize + 1] = ref_num;
    ctx.dispatch(mem, 0xCC, PARAM)
}

fn set_mark(ctx: &mut MliContext, mem: &mut TestMemory, ref_num: u8, position: u32) -> u8 {
    mem.ram[PARAM as usize] = 2;
    mem.ram[PARAM as usize + 1] = ref_num;
    mem.write_u24(PARAM + 2, position);
    ctx.dispatch(mem, 0xCE, PARAM)
}

fn get_mark(ctx: &mut MliContext, mem: &mut TestMemory, ref_num: u8) -> (u8, u32) {
    mem.ram[PARAM as usize] = 2;
    mem.ram[PARAM as usize + 1] = ref_num;
    let err = ctx.dispatch(mem, 0xCF, PARAM);
    let mark = mem.read_u24(PARAM + 2);
    (err, mark)
}

fn get_eof(ctx: &mut MliContext, mem: &mut TestMemory, ref_num: u8) -> (u8, u32) {
    mem.ram[PARAM as usize] = 2;
    mem.ram[PARAM as usize + 1] = ref_num;
    let err = ctx.dispatch(mem, 0xD1, PARAM);
    let eof = mem.read_u24(PARAM + 2);
    (err, eof)
}

#[test]
fn open_read_close_round_trip() {
    let root = scratch_root("roundtrip");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/TEST"), b"HELLO").unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (err, ref_num) = open(&mut ctx, &mut mem, "/V1/TEST");
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(ref_num, 1);

    // Reading past the end transfers what exists and reports EOF.
    let (err, trans) = read(&mut ctx, &mut mem, 1, 10);
    assert_eq!(err, errors::EOF_ENCOUNTERED);
    assert_eq!(trans, 5);
    assert_eq!(&mem.ram[DATA as usize..DATA as usize + 5], b"HELLO");

    assert_eq!(close(&mut ctx, &mut mem, 1), errors::NO_ERROR);
    assert_eq!(read(&mut ctx, &mut mem, 1, 1).0, errors::BAD_REF_NUM);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn read_in_chunks_advances_mark() {
    let root = scratch_root("chunks");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/TEST"), b"ABCDE").unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (_, ref_num) = open(&mut ctx, &mut mem, "/V1/TEST");

    let (err, trans) = read(&mut ctx, &mut mem, ref_num, 3);
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(trans, 3);
    assert_eq!(&mem.ram[DATA as usize..DATA as usize + 3], b"ABC");

    let (err, trans) = read(&mut ctx, &mut mem, ref_num, 10);
    assert_eq!(err, errors::EOF_ENCOUNTERED);
    assert_eq!(trans, 2);
    assert_eq!(&mem.ram[DATA as usize..DATA as usize + 2], b"DE");

    // At EOF with nothing left, nothing transfers.
    let (err, trans) = read(&mut ctx, &mut mem, ref_num, 1);
    assert_eq!(err, errors::EOF_ENCOUNTERED);
    assert_eq!(trans, 0);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn newline_mode_stops_at_match() {
    let root = scratch_root("newline");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/TEXT"), b"LINE1\rLINE2\rLINE3").unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (_, ref_num) = open(&mut ctx, &mut mem, "/V1/TEXT");

    // NEWLINE: mask $FF, char $0D.
    mem.ram[PARAM as usize] = 3;
    mem.ram[PARAM as usize + 1] = ref_num;
    mem.ram[PARAM as usize + 2] = 0xFF;
    mem.ram[PARAM as usize + 3] = 0x0D;
    assert_eq!(ctx.dispatch(&mut mem, 0xC9, PARAM), errors::NO_ERROR);

    let (err, trans) = read(&mut ctx, &mut mem, ref_num, 100);
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(trans, 6);
    assert_eq!(&mem.ram[DATA as usize..DATA as usize + 6], b"LINE1\r");

    let (err, trans) = read(&mut ctx, &mut mem, ref_num, 100);
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(trans, 6);
    assert_eq!(&mem.ram[DATA as usize..DATA as usize + 6], b"LINE2\r");

    // Disabling newline mode reads to EOF.
    mem.ram[PARAM as usize] = 3;
    mem.ram[PARAM as usize + 1] = ref_num;
    mem.ram[PARAM as usize + 2] = 0x00;
    mem.ram[PARAM as usize + 3] = 0x0D;
    assert_eq!(ctx.dispatch(&mut mem, 0xC9, PARAM), errors::NO_ERROR);

    let (err, trans) = read(&mut ctx, &mut mem, ref_num, 100);
    assert_eq!(err, errors::EOF_ENCOUNTERED);
    assert_eq!(trans, 5);
    assert_eq!(&mem.ram[DATA as usize..DATA as usize + 5], b"LINE3");
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn write_then_read_back() {
    let root = scratch_root("write");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/OUT"), b"").unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (_, ref_num) = open(&mut ctx, &mut mem, "/V1/OUT");

    let (err, trans) = write_call(&mut ctx, &mut mem, ref_num, b"DATA");
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(trans, 4);

    let (err, eof) = get_eof(&mut ctx, &mut mem, ref_num);
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(eof, 4);

    // The mark followed the write; rewind and read back.
    let (_, mark) = get_mark(&mut ctx, &mut mem, ref_num);
    assert_eq!(mark, 4);
    assert_eq!(set_mark(&mut ctx, &mut mem, ref_num, 0), errors::NO_ERROR);
    let (err, trans) = read(&mut ctx, &mut mem, ref_num, 4);
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(trans, 4);
    assert_eq!(&mem.ram[DATA as usize..DATA as usize + 4], b"DATA");

    assert_eq!(fs::read(root.join("V1/OUT")).unwrap(), b"DATA");
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn mark_and_eof_bounds() {
    let root = scratch_root("marks");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/TEN"), b"0123456789").unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (_, ref_num) = open(&mut ctx, &mut mem, "/V1/TEN");

    assert_eq!(set_mark(&mut ctx, &mut mem, ref_num, 10), errors::NO_ERROR);
    assert_eq!(
        set_mark(&mut ctx, &mut mem, ref_num, 11),
        errors::POSITION_OUT_OF_RANGE
    );

    // SET_EOF truncates and clamps the mark.
    mem.ram[PARAM as usize] = 2;
    mem.ram[PARAM as usize + 1] = ref_num;
    mem.write_u24(PARAM + 2, 4);
    assert_eq!(ctx.dispatch(&mut mem, 0xD0, PARAM), errors::NO_ERROR);

    let (_, eof) = get_eof(&mut ctx, &mut mem, ref_num);
    assert_eq!(eof, 4);
    let (_, mark) = get_mark(&mut ctx, &mut mem, ref_num);
    assert_eq!(mark, 4);
    assert_eq!(fs::read(root.join("V1/TEN")).unwrap(), b"0123");
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn ref_num_allocation_and_exhaustion() {
    let root = scratch_root("refnums");
    fs::create_dir(root.join("V1")).unwrap();
    for i in 0..9 {
        fs::write(root.join(format!("V1/F{i}")), b"x").unwrap();
    }
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    for i in 0..8 {
        let (err, ref_num) = open(&mut ctx, &mut mem, &format!("/V1/F{i}"));
        assert_eq!(err, errors::NO_ERROR);
        assert_eq!(ref_num, i + 1);
    }
    let (err, _) = open(&mut ctx, &mut mem, "/V1/F8");
    assert_eq!(err, errors::TOO_MANY_FILES_OPEN);

    // Closing frees the smallest ref_num for reuse.
    assert_eq!(close(&mut ctx, &mut mem, 3), errors::NO_ERROR);
    let (err, ref_num) = open(&mut ctx, &mut mem, "/V1/F8");
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(ref_num, 3);

    // CLOSE with ref_num 0 closes everything.
    assert_eq!(close(&mut ctx, &mut mem, 0), errors::NO_ERROR);
    assert!(ctx.open_files().is_empty());
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn open_missing_file() {
    let root = scratch_root("open-miss");
    fs::create_dir(root.join("V1")).unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (err, _) = open(&mut ctx, &mut mem, "/V1/NOPE");
    assert_eq!(err, errors::FILE_NOT_FOUND);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn open_respects_stored_access_byte() {
    let root = scratch_root("open-access");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/SECRET"), b"x").unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    // SET_FILE_INFO with the read bit clear.
    mem.put_counted(PATH1, "/V1/SECRET");
    mem.ram[PARAM as usize] = 7;
    mem.write_u16(PARAM + 1, PATH1);
    mem.ram[PARAM as usize + 3] = 0xC2; // write but no read
    mem.ram[PARAM as usize + 4] = 0x00;
    mem.write_u16(PARAM + 5, 0);
    mem.write_u16(PARAM + 10, 0);
    mem.write_u16(PARAM + 12, 0);
    assert_eq!(ctx.dispatch(&mut mem, 0xC3, PARAM), errors::NO_ERROR);

    let (err, _) = open(&mut ctx, &mut mem, "/V1/SECRET");
    assert_eq!(err, errors::ACCESS_ERROR);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn write_to_directory_is_rejected() {
    let root = scratch_root("dir-write");
    fs::create_dir(root.join("V1")).unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (err, ref_num) = open(&mut ctx, &mut mem, "/V1");
    assert_eq!(err, errors::NO_ERROR);

    let (err, trans) = write_call(&mut ctx, &mut mem, ref_num, b"NO");
    assert_eq!(err, errors::ACCESS_ERROR);
    assert_eq!(trans, 0);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn directory_read_returns_synthesized_blocks() {
    let root = scratch_root("dir-read");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/BETA"), b"12345").unwrap();
    fs::write(root.join("V1/ALPHA"), b"1").unwrap();
    fs::create_dir(root.join("V1/SUB")).unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (err, ref_num) = open(&mut ctx, &mut mem, "/V1");
    assert_eq!(err, errors::NO_ERROR);

    let (err, trans) = read(&mut ctx, &mut mem, ref_num, 512);
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(trans, 512);

    let block = &mem.ram[DATA as usize..DATA as usize + 512];

    // Key block header entry: volume header for "V1".
    assert_eq!(block[4], (0x0F << 4) | 2);
    assert_eq!(&block[5..7], b"V1");
    assert_eq!(block[4 + 0x1F], 39); // entry_length
    assert_eq!(block[4 + 0x20], 13); // entries_per_block
    assert_eq!(u16::from_le_bytes([block[4 + 0x21], block[4 + 0x22]]), 3);

    // Entries are sorted: ALPHA, BETA, SUB.
    let e1 = &block[4 + 39..4 + 39 * 2];
    assert_eq!(e1[0] & 0x0F, 5);
    assert_eq!(&e1[1..6], b"ALPHA");
    assert_eq!(e1[0] >> 4, 0x01); // seedling

    let e2 = &block[4 + 39 * 2..4 + 39 * 3];
    assert_eq!(&e2[1..5], b"BETA");
    assert_eq!(u32::from_le_bytes([e2[0x15], e2[0x16], e2[0x17], 0]), 5); // eof

    let e3 = &block[4 + 39 * 3..4 + 39 * 4];
    assert_eq!(&e3[1..4], b"SUB");
    assert_eq!(e3[0] >> 4, 0x0D); // subdirectory
    assert_eq!(e3[0x10], 0x0F); // DIR file type

    // Reading past the synthesized blocks hits EOF.
    let (err, trans) = read(&mut ctx, &mut mem, ref_num, 512);
    assert_eq!(err, errors::EOF_ENCOUNTERED);
    assert_eq!(trans, 0);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn buffer_pointer_round_trip() {
    let root = scratch_root("bufptr");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/F"), b"x").unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (_, ref_num) = open(&mut ctx, &mut mem, "/V1/F");

    // GET_BUF returns the io_buffer recorded at OPEN.
    mem.ram[PARAM as usize] = 2;
    mem.ram[PARAM as usize + 1] = ref_num;
    mem.write_u16(PARAM + 2, 0);
    assert_eq!(ctx.dispatch(&mut mem, 0xD3, PARAM), errors::NO_ERROR);
    assert_eq!(mem.read_u16(PARAM + 2), IO_BUF);

    // SET_BUF replaces it.
    mem.ram[PARAM as usize] = 2;
    mem.ram[PARAM as usize + 1] = ref_num;
    mem.write_u16(PARAM + 2, 0x1234);
    assert_eq!(ctx.dispatch(&mut mem, 0xD2, PARAM), errors::NO_ERROR);

    mem.ram[PARAM as usize] = 2;
    mem.ram[PARAM as usize + 1] = ref_num;
    mem.write_u16(PARAM + 2, 0);
    assert_eq!(ctx.dispatch(&mut mem, 0xD3, PARAM), errors::NO_ERROR);
    assert_eq!(mem.read_u16(PARAM + 2), 0x1234);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn flush_syncs_open_files() {
    let root = scratch_root("flush");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/F"), b"").unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    let (_, ref_num) = open(&mut ctx, &mut mem, "/V1/F");
    write_call(&mut ctx, &mut mem, ref_num, b"abc");

    mem.ram[PARAM as usize] = 1;
    mem.ram[PARAM as usize + 1] = ref_num;
    assert_eq!(ctx.dispatch(&mut mem, 0xCD, PARAM), errors::NO_ERROR);

    // FLUSH all.
    mem.ram[PARAM as usize] = 1;
    mem.ram[PARAM as usize + 1] = 0;
    assert_eq!(ctx.dispatch(&mut mem, 0xCD, PARAM), errors::NO_ERROR);

    // FLUSH of a dead ref_num fails.
    mem.ram[PARAM as usize] = 1;
    mem.ram[PARAM as usize + 1] = 7;
    assert_eq!(ctx.dispatch(&mut mem, 0xCD, PARAM), errors::BAD_REF_NUM);
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn partial_pathname_resolves_against_prefix() {
    let root = scratch_root("partial");
    fs::create_dir(root.join("V1")).unwrap();
    fs::write(root.join("V1/NOTES"), b"hi").unwrap();
    let mut ctx = MliContext::new(&root);
    let mut mem = TestMemory::new();

    // SET_PREFIX /V1, then OPEN "NOTES".
    mem.put_counted(PATH1, "/V1");
    mem.ram[PARAM as usize] = 1;
    mem.write_u16(PARAM + 1, PATH1);
    assert_eq!(ctx.dispatch(&mut mem, 0xC6, PARAM), errors::NO_ERROR);

    let (err, ref_num) = open(&mut ctx, &mut mem, "NOTES");
    assert_eq!(err, errors::NO_ERROR);
    assert_eq!(ref_num, 1);
    let _ = fs::remove_dir_all(&root);
}
