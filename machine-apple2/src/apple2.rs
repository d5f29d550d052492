//! The Apple II machine: memory, CPU, MLI and trace wiring.
//!
//! [`Apple2`] owns the banked memory, the 65C02 and (optionally) an
//! attached [`MliContext`] and a COUT trace sink. Each instruction it
//! assembles a short-lived [`SystemBus`] over borrowed parts, which is
//! what the CPU executes against: reads and writes go through the
//! memory's bank maps (with soft-switch interception), the MLI hook
//! dispatches into the context, and the COUT hook feeds the trace
//! sink.

use std::io::Write;

use cpu_65c02::Wdc65C02;
use emu_core::Bus;
use prodos_mli::MliContext;

use crate::memory::Apple2Memory;
use crate::trace::write_cout_byte;

/// An Apple II+ / IIe able to run ProDOS 8 system programs.
pub struct Apple2 {
    cpu: Wdc65C02,
    memory: Apple2Memory,
    mli: Option<MliContext>,
    cout_trace: Option<Box<dyn Write>>,
}

/// The per-instruction bus view the CPU executes against.
struct SystemBus<'a> {
    memory: &'a mut Apple2Memory,
    mli: Option<&'a mut MliContext>,
    cout_trace: Option<&'a mut (dyn Write + 'a)>,
}

impl Bus for SystemBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.memory.write(addr, value)
    }

    fn mli_active(&self) -> bool {
        self.mli.is_some()
    }

    fn mli_call(&mut self, call_number: u8, param_addr: u16) -> u8 {
        match self.mli.as_mut() {
            Some(ctx) => ctx.dispatch(self.memory, call_number, param_addr),
            None => 0,
        }
    }

    fn cout_vector(&mut self, a: u8) {
        if let Some(sink) = self.cout_trace.as_deref_mut() {
            if let Err(e) = write_cout_byte(sink, a) {
                log::warn!("COUT trace sink failed: {e}");
            }
        }
    }
}

impl Apple2 {
    pub fn new() -> Self {
        Self {
            cpu: Wdc65C02::new(),
            memory: Apple2Memory::new(),
            mli: None,
            cout_trace: None,
        }
    }

    pub fn memory(&self) -> &Apple2Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Apple2Memory {
        &mut self.memory
    }

    pub fn cpu(&self) -> &Wdc65C02 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Wdc65C02 {
        &mut self.cpu
    }

    /// Attach an MLI context; from here on `JSR $BF00` dispatches into
    /// it instead of jumping.
    pub fn attach_mli(&mut self, mli: MliContext) {
        self.mli = Some(mli);
    }

    /// Detach and return the MLI context, closing nothing.
    pub fn detach_mli(&mut self) -> Option<MliContext> {
        self.mli.take()
    }

    pub fn mli(&self) -> Option<&MliContext> {
        self.mli.as_ref()
    }

    pub fn mli_mut(&mut self) -> Option<&mut MliContext> {
        self.mli.as_mut()
    }

    /// Attach a COUT trace sink; transfers through the vector at
    /// `$0036` render into it.
    pub fn set_cout_trace(&mut self, sink: Box<dyn Write>) {
        self.cout_trace = Some(sink);
    }

    /// Detach and return the COUT trace sink.
    pub fn take_cout_trace(&mut self) -> Option<Box<dyn Write>> {
        self.cout_trace.take()
    }

    /// Reset the CPU through the current memory state (the reset
    /// vector at `$FFFC` decides where execution starts). Memory
    /// contents are left alone.
    pub fn reset(&mut self) {
        let mut bus = SystemBus {
            memory: &mut self.memory,
            mli: self.mli.as_mut(),
            cout_trace: self.cout_trace.as_mut().map(|b| &mut **b as &mut dyn Write),
        };
        self.cpu.reset(&mut bus);
    }

    /// Execute one instruction. Returns the nominal cycle count, 0 when
    /// the CPU is waiting or stopped.
    pub fn step(&mut self) -> u32 {
        let mut bus = SystemBus {
            memory: &mut self.memory,
            mli: self.mli.as_mut(),
            cout_trace: self.cout_trace.as_mut().map(|b| &mut **b as &mut dyn Write),
        };
        self.cpu.step(&mut bus)
    }

    /// Execute up to `limit` instructions; stops early on WAI or STP.
    /// Returns the number actually executed.
    pub fn run(&mut self, limit: u64) -> u64 {
        let mut bus = SystemBus {
            memory: &mut self.memory,
            mli: self.mli.as_mut(),
            cout_trace: self.cout_trace.as_mut().map(|b| &mut **b as &mut dyn Write),
        };
        self.cpu.run(&mut bus, limit)
    }
}

impl Default for Apple2 {
    fn default() -> Self {
        Self::new()
    }
}
