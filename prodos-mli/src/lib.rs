//! ProDOS 8 Machine Language Interface over a host filesystem.
//!
//! This crate implements the ProDOS 8 MLI - the syscall surface a
//! ProDOS system program reaches through `JSR $BF00` - against a host
//! directory standing in for the volume set. Each immediate child
//! directory of the volumes root is one ProDOS volume; files inside
//! keep their ProDOS attributes in a `user.prodos8.*` extended-
//! attribute sidecar.
//!
//! The layering:
//!
//! - [`path`]: pathname normalization, validation, prefix resolution,
//!   and the mapping onto host paths.
//! - [`access`] / [`datetime`] / [`metadata`]: the attribute codecs and
//!   the sidecar load/store with per-field fallback.
//! - [`files`] / [`directory`]: the open-file table and the directory
//!   block synthesis that lets programs READ a directory.
//! - [`MliContext`]: the dispatcher plus the 24 call handlers.
//!
//! Calls communicate exclusively through ProDOS byte error codes (see
//! [`errors`]); no Rust error type crosses the trap boundary.

pub mod access;
pub mod datetime;
pub mod directory;
pub mod errors;
pub mod files;
pub mod metadata;
pub mod path;

mod context;
mod filing;
mod housekeeping;
mod system;
mod xattr;

pub use context::{call_name, MliContext, INTERRUPT_SLOTS};
pub use system::{GLOBAL_DATE_ADDR, GLOBAL_TIME_ADDR};
