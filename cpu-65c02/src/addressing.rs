//! 65C02 addressing modes.
//!
//! The 65C02 keeps the NMOS addressing modes and adds three of its own:
//! - Implied: No operand (e.g., CLC, RTS)
//! - Accumulator: Operates on A register (e.g., ASL A)
//! - Immediate: #$nn (literal value)
//! - Zero Page: $nn (8-bit address in page zero)
//! - Zero Page,X: $nn,X (8-bit address + X, wraps in page zero)
//! - Zero Page,Y: $nn,Y (8-bit address + Y, wraps in page zero)
//! - Absolute: $nnnn (16-bit address)
//! - Absolute,X: $nnnn,X (16-bit address + X, may cross page)
//! - Absolute,Y: $nnnn,Y (16-bit address + Y, may cross page)
//! - Indirect: ($nnnn) (JMP only, page-wrap bug fixed on the 65C02)
//! - Indexed Indirect: ($nn,X) (pointer in zero page indexed by X)
//! - Indirect Indexed: ($nn),Y (zero page pointer + Y)
//! - Zero Page Indirect: ($nn) (65C02; pointer in zero page, no index)
//! - Absolute Indexed Indirect: ($nnnn,X) (65C02; JMP only)
//! - Relative: Branch offset (-128 to +127)
//!
//! On page-crossing indexed reads the CMOS part re-reads the last
//! instruction byte rather than an invalid effective address; see
//! `dummy_read_last_operand`.

use crate::Wdc65C02;
use emu_core::Bus;

impl Wdc65C02 {
    /// Fetch the next byte at PC and increment PC.
    pub(crate) fn fetch(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    /// Fetch a 16-bit word (little-endian) at PC.
    pub(crate) fn fetch_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.fetch(bus);
        let high = self.fetch(bus);
        u16::from_le_bytes([low, high])
    }

    /// Read a 16-bit word from memory (little-endian).
    pub(crate) fn read_word(&self, bus: &mut impl Bus, addr: u16) -> u16 {
        let low = bus.read(addr);
        let high = bus.read(addr.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    /// Read a 16-bit word from a zero-page pointer, wrapping within page
    /// zero.
    pub(crate) fn read_word_zp(&self, bus: &mut impl Bus, zp: u8) -> u16 {
        let low = bus.read(zp as u16);
        let high = bus.read(zp.wrapping_add(1) as u16);
        u16::from_le_bytes([low, high])
    }

    /// Extra bus read on page-crossing indexed accesses and taken
    /// branches.
    ///
    /// The CMOS 65C02 re-reads the last instruction byte (`PC - 1`), not
    /// an invalid effective address as the NMOS part does.
    pub(crate) fn dummy_read_last_operand(&self, bus: &mut impl Bus) {
        let _ = bus.read(self.pc.wrapping_sub(1));
    }

    /// Read from an effective address, applying the page-cross dummy
    /// read first when needed.
    pub(crate) fn read_page_crossed(
        &self,
        bus: &mut impl Bus,
        addr: u16,
        page_crossed: bool,
    ) -> u8 {
        if page_crossed {
            self.dummy_read_last_operand(bus);
        }
        bus.read(addr)
    }

    /// Push a byte onto the stack.
    pub(crate) fn push(&mut self, bus: &mut impl Bus, value: u8) {
        bus.write(0x0100 | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    /// Pull a byte from the stack.
    pub(crate) fn pull(&mut self, bus: &mut impl Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | self.sp as u16)
    }

    /// Push a 16-bit word onto the stack (high byte first).
    pub(crate) fn push_word(&mut self, bus: &mut impl Bus, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    /// Pull a 16-bit word from the stack (low byte first).
    pub(crate) fn pull_word(&mut self, bus: &mut impl Bus) -> u16 {
        let low = self.pull(bus);
        let high = self.pull(bus);
        u16::from_le_bytes([low, high])
    }

    // =========================================================================
    // Addressing mode helpers
    // =========================================================================

    /// Zero Page: $nn
    pub(crate) fn addr_zero_page(&mut self, bus: &mut impl Bus) -> u16 {
        self.fetch(bus) as u16
    }

    /// Zero Page,X: $nn,X (wraps within zero page)
    pub(crate) fn addr_zero_page_x(&mut self, bus: &mut impl Bus) -> u16 {
        let base = self.fetch(bus);
        base.wrapping_add(self.x) as u16
    }

    /// Zero Page,Y: $nn,Y (wraps within zero page)
    pub(crate) fn addr_zero_page_y(&mut self, bus: &mut impl Bus) -> u16 {
        let base = self.fetch(bus);
        base.wrapping_add(self.y) as u16
    }

    /// Absolute: $nnnn
    pub(crate) fn addr_absolute(&mut self, bus: &mut impl Bus) -> u16 {
        self.fetch_word(bus)
    }

    /// Absolute,X: $nnnn,X
    /// Returns (address, page_crossed) - page crossing adds a cycle for reads.
    pub(crate) fn addr_absolute_x(&mut self, bus: &mut impl Bus) -> (u16, bool) {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(self.x as u16);
        let page_crossed = (base & 0xFF00) != (addr & 0xFF00);
        (addr, page_crossed)
    }

    /// Absolute,Y: $nnnn,Y
    /// Returns (address, page_crossed) - page crossing adds a cycle for reads.
    pub(crate) fn addr_absolute_y(&mut self, bus: &mut impl Bus) -> (u16, bool) {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(self.y as u16);
        let page_crossed = (base & 0xFF00) != (addr & 0xFF00);
        (addr, page_crossed)
    }

    /// Indirect: ($nnnn) - JMP only.
    ///
    /// The 65C02 fixes the NMOS page-wrap bug: the pointer's high byte
    /// is read from the next address even across a page boundary.
    /// Returns (pointer, target).
    pub(crate) fn addr_indirect(&mut self, bus: &mut impl Bus) -> (u16, u16) {
        let ptr = self.fetch_word(bus);
        let target = self.read_word(bus, ptr);
        (ptr, target)
    }

    /// Indexed Indirect: ($nn,X)
    /// The pointer is at zero page address (operand + X), wrapping within ZP.
    pub(crate) fn addr_indexed_indirect(&mut self, bus: &mut impl Bus) -> u16 {
        let base = self.fetch(bus);
        let ptr = base.wrapping_add(self.x);
        self.read_word_zp(bus, ptr)
    }

    /// Indirect Indexed: ($nn),Y
    /// Returns (address, page_crossed).
    pub(crate) fn addr_indirect_indexed(&mut self, bus: &mut impl Bus) -> (u16, bool) {
        let ptr = self.fetch(bus);
        let base = self.read_word_zp(bus, ptr);
        let addr = base.wrapping_add(self.y as u16);
        let page_crossed = (base & 0xFF00) != (addr & 0xFF00);
        (addr, page_crossed)
    }

    /// Zero Page Indirect: ($nn) (65C02)
    pub(crate) fn addr_zp_indirect(&mut self, bus: &mut impl Bus) -> u16 {
        let ptr = self.fetch(bus);
        self.read_word_zp(bus, ptr)
    }

    /// Absolute Indexed Indirect: ($nnnn,X) (65C02; JMP only)
    pub(crate) fn addr_absolute_indirect_x(&mut self, bus: &mut impl Bus) -> u16 {
        let base = self.fetch_word(bus);
        let ptr = base.wrapping_add(self.x as u16);
        self.read_word(bus, ptr)
    }
}
