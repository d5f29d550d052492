//! ProDOS 8 MLI error codes.
//!
//! As documented in the ProDOS 8 Technical Reference Manual, section
//! 4.8 "MLI Error Codes". MLI calls return these byte codes to the
//! caller in A, with carry set when the code is nonzero.

pub const NO_ERROR: u8 = 0x00;
pub const BAD_CALL_NUMBER: u8 = 0x01;
pub const BAD_CALL_PARAM_COUNT: u8 = 0x04;
pub const INTERRUPT_TABLE_FULL: u8 = 0x25;
pub const IO_ERROR: u8 = 0x27;
pub const NO_DEVICE: u8 = 0x28;
pub const WRITE_PROTECTED: u8 = 0x2B;
pub const DISK_SWITCHED: u8 = 0x2E;
pub const INVALID_PATH_SYNTAX: u8 = 0x40;
pub const TOO_MANY_FILES_OPEN: u8 = 0x42;
pub const BAD_REF_NUM: u8 = 0x43;
pub const PATH_NOT_FOUND: u8 = 0x44;
pub const VOL_NOT_FOUND: u8 = 0x45;
pub const FILE_NOT_FOUND: u8 = 0x46;
pub const DUPLICATE_FILENAME: u8 = 0x47;
pub const VOLUME_FULL: u8 = 0x48;
pub const VOL_DIR_FULL: u8 = 0x49;
pub const INCOMPATIBLE_VERSION: u8 = 0x4A;
pub const UNSUPPORTED_STOR_TYPE: u8 = 0x4B;
pub const EOF_ENCOUNTERED: u8 = 0x4C;
pub const POSITION_OUT_OF_RANGE: u8 = 0x4D;
pub const ACCESS_ERROR: u8 = 0x4E;
pub const FILE_OPEN: u8 = 0x50;
pub const DIR_COUNT_ERROR: u8 = 0x51;
pub const NOT_PRODOS_VOL: u8 = 0x52;
pub const INVALID_PARAMETER: u8 = 0x53;
pub const VCB_TABLE_FULL: u8 = 0x55;
pub const BAD_BUFFER_ADDR: u8 = 0x56;
pub const DUPLICATE_VOLUME: u8 = 0x57;
pub const FILE_STRUCTURE_DAMAGED: u8 = 0x5A;

/// Symbolic name of an error code, for trace output. Unknown codes and
/// `NO_ERROR` yield the empty string.
pub fn error_name(code: u8) -> &'static str {
    match code {
        BAD_CALL_NUMBER => "BAD_CALL_NUMBER",
        BAD_CALL_PARAM_COUNT => "BAD_CALL_PARAM_COUNT",
        INTERRUPT_TABLE_FULL => "INTERRUPT_TABLE_FULL",
        IO_ERROR => "IO_ERROR",
        NO_DEVICE => "NO_DEVICE",
        WRITE_PROTECTED => "WRITE_PROTECTED",
        DISK_SWITCHED => "DISK_SWITCHED",
        INVALID_PATH_SYNTAX => "INVALID_PATH_SYNTAX",
        TOO_MANY_FILES_OPEN => "TOO_MANY_FILES_OPEN",
        BAD_REF_NUM => "BAD_REF_NUM",
        PATH_NOT_FOUND => "PATH_NOT_FOUND",
        VOL_NOT_FOUND => "VOL_NOT_FOUND",
        FILE_NOT_FOUND => "FILE_NOT_FOUND",
        DUPLICATE_FILENAME => "DUPLICATE_FILENAME",
        VOLUME_FULL => "VOLUME_FULL",
        VOL_DIR_FULL => "VOL_DIR_FULL",
        INCOMPATIBLE_VERSION => "INCOMPATIBLE_VERSION",
        UNSUPPORTED_STOR_TYPE => "UNSUPPORTED_STOR_TYPE",
        EOF_ENCOUNTERED => "EOF_ENCOUNTERED",
        POSITION_OUT_OF_RANGE => "POSITION_OUT_OF_RANGE",
        ACCESS_ERROR => "ACCESS_ERROR",
        FILE_OPEN => "FILE_OPEN",
        DIR_COUNT_ERROR => "DIR_COUNT_ERROR",
        NOT_PRODOS_VOL => "NOT_PRODOS_VOL",
        INVALID_PARAMETER => "INVALID_PARAMETER",
        VCB_TABLE_FULL => "VCB_TABLE_FULL",
        BAD_BUFFER_ADDR => "BAD_BUFFER_ADDR",
        DUPLICATE_VOLUME => "DUPLICATE_VOLUME",
        FILE_STRUCTURE_DAMAGED => "FILE_STRUCTURE_DAMAGED",
        _ => "",
    }
}

/// Map a host I/O error onto a ProDOS code at the syscall edge.
///
/// Permission problems become `ACCESS_ERROR`, a full filesystem becomes
/// `VOLUME_FULL`, and everything else I/O-shaped becomes `IO_ERROR`.
pub fn io_error_code(err: &std::io::Error) -> u8 {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::PermissionDenied => ACCESS_ERROR,
        ErrorKind::StorageFull => VOLUME_FULL,
        _ => IO_ERROR,
    }
}
