//! Apple II banked memory with Language Card switching.
//!
//! The 64 KiB address space is organized as 16 banks of 4 KiB, indexed
//! by the top four address bits:
//!
//! | Banks  | Range         | Contents                                |
//! |--------|---------------|-----------------------------------------|
//! | 0-12   | `$0000-$CFFF` | Main RAM, always read/write             |
//! | 13     | `$D000-$DFFF` | ROM, or LC bank 1 / LC bank 2 RAM       |
//! | 14-15  | `$E000-$FFFF` | ROM, or the single LC high RAM region   |
//!
//! The Language Card overlays `$D000-$FFFF` with RAM: two independent
//! 4 KiB banks at `$D000` and one shared region above. Because the
//! ROMIN-style modes read from ROM while writing to LC RAM, reads and
//! writes route through two separate bank maps, recomputed together
//! whenever the LC state changes. When LC write is disabled, writes to
//! the overlay land in a throwaway sink.
//!
//! The sixteen soft switches at `$C080-$C08F` control the overlay as a
//! side effect of any access. Bit 3 of the address selects the `$D000`
//! bank (set = bank 1); bits 1-0 encode the command:
//!
//! | Bits 1-0 | Read from | Write enable request |
//! |----------|-----------|----------------------|
//! | `00`     | LC RAM    | no (write protect)   |
//! | `01`     | ROM       | yes                  |
//! | `10`     | ROM       | no (write protect)   |
//! | `11`     | LC RAM    | yes                  |
//!
//! Write enabling is pre-qualified: it takes *two consecutive read
//! accesses* to a write-enable switch to actually enable writes. Any
//! write to a soft switch, or any read of a write-protect command,
//! clears both the latch and the write enable.

use emu_core::Bus;

/// One bank is 4 KiB.
pub const BANK_SIZE: usize = 4096;

/// Sixteen banks cover the 64 KiB address space.
pub const NUM_BANKS: usize = 16;

/// The ROM image covers `$D000-$FFFF`.
pub const ROM_SIZE: usize = BANK_SIZE * 3;

// Banks 0-12 are always main RAM.
const MAIN_BANKS: usize = 13;

const SOFT_SWITCH_FIRST: u16 = 0xC080;
const SOFT_SWITCH_LAST: u16 = 0xC08F;

/// Where one bank's accesses land under the current LC state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BankTarget {
    /// Main RAM bank 0-12.
    Main(u8),
    /// LC `$D000` bank 1.
    LcD000Bank1,
    /// LC `$D000` bank 2.
    LcD000Bank2,
    /// LC `$E000-$FFFF` region, bank 0 or 1.
    LcHigh(u8),
    /// ROM image bank 0-2 (read mapping only).
    Rom(u8),
    /// Write sink bank 0-2 (write mapping only).
    Sink(u8),
}

/// The Apple II memory subsystem.
pub struct Apple2Memory {
    /// `$0000-$CFFF`, plus nothing else: the overlay region has its own
    /// dedicated buffers below so LC bank 2 can never alias bank 1.
    main_ram: Box<[[u8; BANK_SIZE]; MAIN_BANKS]>,
    lc_bank1_d000: Box<[u8; BANK_SIZE]>,
    lc_bank2_d000: Box<[u8; BANK_SIZE]>,
    /// Single LC region for `$E000-$FFFF`, shared by both bank
    /// selections.
    lc_high: Box<[[u8; BANK_SIZE]; 2]>,
    /// ROM image; zero-filled until loaded. Survives reset.
    rom_area: Box<[[u8; BANK_SIZE]; 3]>,
    /// Absorbs writes while LC write is disabled.
    write_sink: Box<[[u8; BANK_SIZE]; 3]>,

    read_map: [BankTarget; NUM_BANKS],
    write_map: [BankTarget; NUM_BANKS],

    lc_read_enabled: bool,
    lc_write_enabled: bool,
    lc_bank1_selected: bool,
    /// Write-enable pre-qualification latch.
    lc_write_prequalified: bool,
}

impl Apple2Memory {
    /// All RAM zeroed, LC read/write disabled, bank 1 selected.
    pub fn new() -> Self {
        let mut mem = Self {
            main_ram: Box::new([[0; BANK_SIZE]; MAIN_BANKS]),
            lc_bank1_d000: Box::new([0; BANK_SIZE]),
            lc_bank2_d000: Box::new([0; BANK_SIZE]),
            lc_high: Box::new([[0; BANK_SIZE]; 2]),
            rom_area: Box::new([[0; BANK_SIZE]; 3]),
            write_sink: Box::new([[0; BANK_SIZE]; 3]),
            read_map: [BankTarget::Main(0); NUM_BANKS],
            write_map: [BankTarget::Main(0); NUM_BANKS],
            lc_read_enabled: false,
            lc_write_enabled: false,
            lc_bank1_selected: true,
            lc_write_prequalified: false,
        };
        mem.recompute_views();
        mem
    }

    /// Zero all RAM and restore the initial LC state. The loaded ROM
    /// image is preserved.
    pub fn reset(&mut self) {
        for bank in self.main_ram.iter_mut() {
            bank.fill(0);
        }
        self.lc_bank1_d000.fill(0);
        self.lc_bank2_d000.fill(0);
        for bank in self.lc_high.iter_mut() {
            bank.fill(0);
        }

        self.lc_read_enabled = false;
        self.lc_write_enabled = false;
        self.lc_bank1_selected = true;
        self.lc_write_prequalified = false;
        self.recompute_views();
    }

    /// Install the `$D000-$FFFF` ROM image. Visible whenever LC read is
    /// disabled.
    pub fn load_rom(&mut self, image: &[u8; ROM_SIZE]) {
        for (bank, chunk) in self.rom_area.iter_mut().zip(image.chunks_exact(BANK_SIZE)) {
            bank.copy_from_slice(chunk);
        }
    }

    pub fn is_lc_read_enabled(&self) -> bool {
        self.lc_read_enabled
    }

    pub fn is_lc_write_enabled(&self) -> bool {
        self.lc_write_enabled
    }

    pub fn is_lc_bank1_selected(&self) -> bool {
        self.lc_bank1_selected
    }

    /// True after one read of a write-enable switch; the next such read
    /// enables writes.
    pub fn is_lc_write_prequalified(&self) -> bool {
        self.lc_write_prequalified
    }

    pub fn set_lc_read_enabled(&mut self, enable: bool) {
        if self.lc_read_enabled != enable {
            self.lc_read_enabled = enable;
            self.recompute_views();
        }
    }

    pub fn set_lc_write_enabled(&mut self, enable: bool) {
        if self.lc_write_enabled != enable {
            self.lc_write_enabled = enable;
            self.recompute_views();
        }
    }

    pub fn set_lc_bank1_selected(&mut self, bank1: bool) {
        if self.lc_bank1_selected != bank1 {
            self.lc_bank1_selected = bank1;
            self.recompute_views();
        }
    }

    /// Process one Language Card soft-switch access.
    ///
    /// Returns true when `addr` was in `$C080-$C08F` (whether or not
    /// any state changed); other addresses are ignored.
    pub fn apply_soft_switch(&mut self, addr: u16, is_read: bool) -> bool {
        if !(SOFT_SWITCH_FIRST..=SOFT_SWITCH_LAST).contains(&addr) {
            return false;
        }

        let off = addr & 0x0F;
        self.lc_bank1_selected = off & 0x08 != 0;

        let cmd = off & 0x03;
        let wants_write = cmd == 0x01 || cmd == 0x03;
        let wants_lc_read = cmd == 0x00 || cmd == 0x03;

        if !is_read {
            self.lc_write_prequalified = false;
            self.lc_write_enabled = false;
        } else if wants_write {
            if self.lc_write_prequalified {
                self.lc_write_enabled = true;
                self.lc_write_prequalified = false;
            } else {
                self.lc_write_prequalified = true;
            }
        } else {
            self.lc_write_prequalified = false;
            self.lc_write_enabled = false;
        }

        self.lc_read_enabled = wants_lc_read;

        self.recompute_views();
        true
    }

    /// Rebuild both bank maps from the LC flags. The only place the
    /// maps are written.
    fn recompute_views(&mut self) {
        for i in 0..MAIN_BANKS {
            self.read_map[i] = BankTarget::Main(i as u8);
            self.write_map[i] = BankTarget::Main(i as u8);
        }

        let d000 = if self.lc_bank1_selected {
            BankTarget::LcD000Bank1
        } else {
            BankTarget::LcD000Bank2
        };

        if self.lc_read_enabled {
            self.read_map[13] = d000;
            self.read_map[14] = BankTarget::LcHigh(0);
            self.read_map[15] = BankTarget::LcHigh(1);
        } else {
            self.read_map[13] = BankTarget::Rom(0);
            self.read_map[14] = BankTarget::Rom(1);
            self.read_map[15] = BankTarget::Rom(2);
        }

        if self.lc_write_enabled {
            self.write_map[13] = d000;
            self.write_map[14] = BankTarget::LcHigh(0);
            self.write_map[15] = BankTarget::LcHigh(1);
        } else {
            self.write_map[13] = BankTarget::Sink(0);
            self.write_map[14] = BankTarget::Sink(1);
            self.write_map[15] = BankTarget::Sink(2);
        }
    }

    fn bank(&self, target: BankTarget) -> &[u8; BANK_SIZE] {
        match target {
            BankTarget::Main(i) => &self.main_ram[i as usize],
            BankTarget::LcD000Bank1 => &self.lc_bank1_d000,
            BankTarget::LcD000Bank2 => &self.lc_bank2_d000,
            BankTarget::LcHigh(i) => &self.lc_high[i as usize],
            BankTarget::Rom(i) => &self.rom_area[i as usize],
            BankTarget::Sink(i) => &self.write_sink[i as usize],
        }
    }

    fn bank_mut(&mut self, target: BankTarget) -> &mut [u8; BANK_SIZE] {
        match target {
            BankTarget::Main(i) => &mut self.main_ram[i as usize],
            BankTarget::LcD000Bank1 => &mut self.lc_bank1_d000,
            BankTarget::LcD000Bank2 => &mut self.lc_bank2_d000,
            BankTarget::LcHigh(i) => &mut self.lc_high[i as usize],
            BankTarget::Rom(i) => &mut self.rom_area[i as usize],
            BankTarget::Sink(i) => &mut self.write_sink[i as usize],
        }
    }

    /// Read through the current read mapping without soft-switch side
    /// effects.
    pub fn peek(&self, addr: u16) -> u8 {
        let target = self.read_map[(addr >> 12) as usize];
        self.bank(target)[(addr & 0x0FFF) as usize]
    }

    /// Write through the current write mapping without soft-switch side
    /// effects.
    pub fn poke(&mut self, addr: u16, value: u8) {
        let target = self.write_map[(addr >> 12) as usize];
        self.bank_mut(target)[(addr & 0x0FFF) as usize] = value;
    }

    /// Write a 16-bit little-endian value without side effects.
    pub fn poke_u16(&mut self, addr: u16, value: u16) {
        self.poke(addr, (value & 0xFF) as u8);
        self.poke(addr.wrapping_add(1), (value >> 8) as u8);
    }
}

impl Default for Apple2Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for Apple2Memory {
    fn read(&mut self, addr: u16) -> u8 {
        // A soft-switch access reads as 0.
        if self.apply_soft_switch(addr, true) {
            return 0;
        }
        self.peek(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        if self.apply_soft_switch(addr, false) {
            return;
        }
        self.poke(addr, value);
    }
}
