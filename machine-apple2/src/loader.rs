//! ROM and system-file loading, and the startup memory fixtures a
//! ProDOS system program expects.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::memory::{Apple2Memory, ROM_SIZE};

/// Default load address for system files.
pub const DEFAULT_LOAD_ADDR: u16 = 0x2000;

/// Warm-restart vector location (`$03F2/$03F3`).
pub const WARM_START_VECTOR: u16 = 0x03F2;

/// Power-up byte location; `$A5` marks the warm-start vector valid.
pub const POWER_UP_BYTE: u16 = 0x03F4;

/// Where ProDOS stores the running system program's pathname.
pub const PROGRAM_NAME_ADDR: u16 = 0x0280;

// System files must stay below the I/O space.
const LOAD_CEILING: u32 = 0xC000;

/// Host-side failures while preparing the machine.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("ROM image must be exactly {ROM_SIZE} bytes, got {0}")]
    RomSize(usize),

    #[error("invalid load address ${0:04X}: must be below $C000")]
    LoadAddress(u16),

    #[error("system file is empty: {0}")]
    EmptySystemFile(PathBuf),

    #[error("system file too large: {size} bytes exceeds the {max} available at ${load_addr:04X}")]
    SystemFileTooLarge { size: usize, max: u32, load_addr: u16 },

    #[error("system file {path} is not inside the volumes root {root}")]
    OutsideVolumesRoot { path: PathBuf, root: PathBuf },

    #[error("program pathname {0} does not fit in a counted string")]
    ProgramNameTooLong(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Install a ROM image covering `$D000-$FFFF`. Any size other than
/// exactly 12,288 bytes is rejected.
pub fn load_rom_image(mem: &mut Apple2Memory, image: &[u8]) -> Result<(), LoadError> {
    let image: &[u8; ROM_SIZE] = image.try_into().map_err(|_| LoadError::RomSize(image.len()))?;
    mem.load_rom(image);
    Ok(())
}

/// Read a ROM file and install it.
pub fn load_rom_file(mem: &mut Apple2Memory, path: &Path) -> Result<(), LoadError> {
    let image = fs::read(path)?;
    load_rom_image(mem, &image)
}

/// Load a ProDOS system file (a flat byte image) at `load_addr`.
///
/// The file must be non-empty and fit between `load_addr` and `$BFFF`.
/// Contents are unconstrained: ProDOS jumps to the load address
/// unconditionally, so no leading `JMP` is required.
pub fn load_system_file(
    mem: &mut Apple2Memory,
    path: &Path,
    load_addr: u16,
) -> Result<(), LoadError> {
    if load_addr as u32 >= LOAD_CEILING {
        return Err(LoadError::LoadAddress(load_addr));
    }

    let data = fs::read(path)?;
    if data.is_empty() {
        return Err(LoadError::EmptySystemFile(path.to_path_buf()));
    }

    let max = LOAD_CEILING - load_addr as u32;
    if data.len() as u32 > max {
        return Err(LoadError::SystemFileTooLarge {
            size: data.len(),
            max,
            load_addr,
        });
    }

    for (i, &byte) in data.iter().enumerate() {
        mem.poke(load_addr.wrapping_add(i as u16), byte);
    }

    log::info!(
        "loaded system file {} ({} bytes at ${load_addr:04X})",
        path.display(),
        data.len()
    );
    Ok(())
}

/// Initialize the Control-Reset warm-start vector: the entry address
/// at `$03F2/$03F3` and the `$A5` power-up byte at `$03F4`.
pub fn init_warm_start_vector(mem: &mut Apple2Memory, entry_addr: u16) {
    mem.poke_u16(WARM_START_VECTOR, entry_addr);
    mem.poke(POWER_UP_BYTE, 0xA5);
}

/// Store the system program's ProDOS pathname at `$0280` as a counted
/// string.
///
/// The pathname is derived from the host path of the system file
/// relative to the volumes root: `<root>/EDASM/EDASM.SYSTEM` becomes
/// `/EDASM/EDASM.SYSTEM`. The system file must live inside the volumes
/// root and the result must fit the 64-character pathname bound.
pub fn init_system_program_name(
    mem: &mut Apple2Memory,
    system_file: &Path,
    volumes_root: &Path,
) -> Result<(), LoadError> {
    let file = fs::canonicalize(system_file)?;
    let root = fs::canonicalize(volumes_root)?;

    let relative = file
        .strip_prefix(&root)
        .map_err(|_| LoadError::OutsideVolumesRoot {
            path: system_file.to_path_buf(),
            root: volumes_root.to_path_buf(),
        })?;

    let mut prodos_path = String::new();
    for component in relative.components() {
        prodos_path.push('/');
        prodos_path.push_str(&component.as_os_str().to_string_lossy().to_uppercase());
    }

    if prodos_path.is_empty() || prodos_path.len() > 64 {
        return Err(LoadError::ProgramNameTooLong(prodos_path));
    }

    mem.poke(PROGRAM_NAME_ADDR, prodos_path.len() as u8);
    for (i, byte) in prodos_path.bytes().enumerate() {
        mem.poke(PROGRAM_NAME_ADDR.wrapping_add(1 + i as u16), byte);
    }
    Ok(())
}
