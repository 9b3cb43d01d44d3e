use memory::MmioHandler;
use tracing::trace;

use super::LS7A_NR_REGS;

/// Internal register window of the bridge.
///
/// Registers hold the values given at construction; guest writes are accepted and discarded.
/// Only naturally aligned 32-bit accesses reach a register; misaligned reads return all-ones.
#[derive(Debug, Clone)]
pub struct Ls7aRegisterBank {
    initial: [u32; LS7A_NR_REGS],
    regs: [u32; LS7A_NR_REGS],
}

impl Ls7aRegisterBank {
    pub fn new() -> Self {
        Self::with_values([0; LS7A_NR_REGS])
    }

    pub fn with_values(values: [u32; LS7A_NR_REGS]) -> Self {
        Self {
            initial: values,
            regs: values,
        }
    }

    pub fn reg(&self, index: usize) -> Option<u32> {
        self.regs.get(index).copied()
    }

    pub fn reset(&mut self) {
        self.regs = self.initial;
    }
}

impl Default for Ls7aRegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl MmioHandler for Ls7aRegisterBank {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        debug_assert_eq!(size, 4);
        if offset & 3 != 0 {
            trace!(offset, size, "misaligned LS7A register read");
            return 0xFFFF_FFFF;
        }
        let index = (offset >> 2) as usize;
        self.reg(index).map_or(0xFFFF_FFFF, u64::from)
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        trace!(offset, size, value, "ignored LS7A register write");
    }
}
