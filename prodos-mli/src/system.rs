//! System MLI calls: GET_TIME, ALLOC_INTERRUPT, DEALLOC_INTERRUPT, and
//! the READ_BLOCK/WRITE_BLOCK stubs.

use chrono::Local;

use emu_core::Bus;

use crate::context::{MliContext, INTERRUPT_SLOTS};
use crate::datetime::{encode_prodos_date, encode_prodos_time};
use crate::errors;

/// ProDOS global page location of the current date word.
pub const GLOBAL_DATE_ADDR: u16 = 0xBF90;

/// ProDOS global page location of the current time word.
pub const GLOBAL_TIME_ADDR: u16 = 0xBF92;

impl MliContext {
    /// GET_TIME ($82): stamp the current local date and time into the
    /// ProDOS global page.
    ///
    /// This call has no parameter list and cannot fail; the
    /// parameter-count byte is not checked.
    pub(crate) fn get_time(&mut self, mem: &mut impl Bus, _param_addr: u16) -> Result<(), u8> {
        let now = Local::now();
        mem.write_u16(GLOBAL_DATE_ADDR, encode_prodos_date(now));
        mem.write_u16(GLOBAL_TIME_ADDR, encode_prodos_time(now));
        Ok(())
    }

    /// ALLOC_INTERRUPT ($40): claim the lowest free handler slot.
    ///
    /// Parameter block: +0 count (2), +1 int_num (result),
    /// +2 int_code pointer (must be nonzero).
    pub(crate) fn alloc_interrupt(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 2)?;

        let int_code = mem.read_u16(param_addr.wrapping_add(2));
        if int_code == 0 {
            return Err(errors::INVALID_PARAMETER);
        }

        let slot = self
            .interrupt_handlers
            .iter()
            .position(|&handler| handler == 0)
            .ok_or(errors::INTERRUPT_TABLE_FULL)?;

        self.interrupt_handlers[slot] = int_code;
        mem.write(param_addr.wrapping_add(1), slot as u8 + 1);
        Ok(())
    }

    /// DEALLOC_INTERRUPT ($41): release a handler slot.
    ///
    /// Parameter block: +0 count (1), +1 int_num (1-4).
    pub(crate) fn dealloc_interrupt(
        &mut self,
        mem: &mut impl Bus,
        param_addr: u16,
    ) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 1)?;

        let int_num = mem.read(param_addr.wrapping_add(1)) as usize;
        if !(1..=INTERRUPT_SLOTS).contains(&int_num) {
            return Err(errors::INVALID_PARAMETER);
        }

        self.interrupt_handlers[int_num - 1] = 0;
        Ok(())
    }

    /// READ_BLOCK ($80): no block devices exist; always an I/O error.
    pub(crate) fn read_block(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 3)?;
        Err(errors::IO_ERROR)
    }

    /// WRITE_BLOCK ($81): no block devices exist; always an I/O error.
    pub(crate) fn write_block(&mut self, mem: &mut impl Bus, param_addr: u16) -> Result<(), u8> {
        self.check_param_count(mem, param_addr, 3)?;
        Err(errors::IO_ERROR)
    }
}
