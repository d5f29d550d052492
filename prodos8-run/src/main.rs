//! prodos8-run - execute a ProDOS 8 system file in emulation.
//!
//! Usage:
//!   prodos8-run [OPTIONS] ROM SYSTEM_FILE
//!
//! The ROM image fills $D000-$FFFF; the system file is loaded at the
//! load address (default $2000) and executed from there with an MLI
//! context rooted at --volume-root. Each immediate subdirectory of the
//! volume root is one ProDOS volume.

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use machine_apple2::{loader, Apple2};
use prodos_mli::MliContext;

/// Run a ProDOS 8 system program against host volumes.
#[derive(Parser, Debug)]
#[command(name = "prodos8-run")]
struct Args {
    /// Apple II ROM image covering $D000-$FFFF (exactly 12 KiB)
    rom: PathBuf,

    /// ProDOS system file (type $FF image) to execute
    system_file: PathBuf,

    /// Directory whose immediate subdirectories are the ProDOS volumes
    #[arg(long, default_value = ".")]
    volume_root: PathBuf,

    /// Stop after this many instructions (default: run until STP/WAI)
    #[arg(long)]
    max_instructions: Option<u64>,

    /// Load address for the system file, e.g. 0x2000
    #[arg(long, value_parser = parse_addr, default_value = "0x2000")]
    load_addr: u16,

    /// Echo COUT character output to stdout
    #[arg(long)]
    trace_cout: bool,
}

fn parse_addr(s: &str) -> Result<u16, String> {
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("$")) {
        u16::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut machine = Apple2::new();

    loader::load_rom_file(machine.memory_mut(), &args.rom)?;
    loader::load_system_file(machine.memory_mut(), &args.system_file, args.load_addr)?;
    loader::init_warm_start_vector(machine.memory_mut(), args.load_addr);

    // The program name at $280 is advisory; a system file living
    // outside the volume root just goes without one.
    if let Err(e) = loader::init_system_program_name(
        machine.memory_mut(),
        &args.system_file,
        &args.volume_root,
    ) {
        log::warn!("no program name at $280: {e}");
    }

    machine.attach_mli(MliContext::new(&args.volume_root));
    if args.trace_cout {
        machine.set_cout_trace(Box::new(io::stdout()));
    }

    // ProDOS transfers to the load address after loading; emulate that
    // by pointing the reset vector there. The vector sits in the ROM
    // overlay, so stage it in LC RAM for the reset and restore ROM
    // mode for execution.
    let mem = machine.memory_mut();
    mem.set_lc_read_enabled(true);
    mem.set_lc_write_enabled(true);
    mem.poke_u16(0xFFFC, args.load_addr);
    machine.reset();
    let mem = machine.memory_mut();
    mem.set_lc_read_enabled(false);
    mem.set_lc_write_enabled(false);

    let limit = args.max_instructions.unwrap_or(u64::MAX);
    let executed = machine.run(limit);

    let cpu = machine.cpu();
    let cause = if cpu.is_stopped() {
        "STP"
    } else if cpu.is_waiting() {
        "WAI"
    } else {
        "instruction limit"
    };
    println!(
        "executed {executed} instructions, stopped by {cause} at PC=${:04X}",
        cpu.pc()
    );

    Ok(())
}
