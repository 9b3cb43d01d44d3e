use memory::MmioHandler;

use crate::pci::SharedPciBus;

use super::LS7A_BRIDGE_BDF;

/// Folds an extended-window offset into a mechanism #1 style config address.
///
/// Offsets with bit 24 set keep only the low 16 bits (bus 0, devfn + register); the rest keep
/// 24 bits (bus, devfn, register). The split mirrors the LS7A decode and is not derived from a
/// standard layout.
pub const fn fold_config_address(offset: u64) -> u32 {
    if offset & 0x0100_0000 != 0 {
        (offset & 0xFFFF) as u32
    } else {
        (offset & 0x00FF_FFFF) as u32
    }
}

/// Extended configuration window (`HT1LO_PCICFG_BASE`), 1 to 4 byte accesses.
pub struct Ls7aConfigWindow {
    bus: SharedPciBus,
}

impl Ls7aConfigWindow {
    pub fn new(bus: SharedPciBus) -> Self {
        Self { bus }
    }
}

impl MmioHandler for Ls7aConfigWindow {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        let addr = fold_config_address(offset);
        u64::from(self.bus.borrow().config_data_read(addr, size))
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        let addr = fold_config_address(offset);
        self.bus
            .borrow_mut()
            .config_data_write(addr, size, value as u32);
    }
}

/// Short configuration window: the bridge function's own config space, 4-byte accesses.
pub struct Ls7aShortConfigWindow {
    bus: SharedPciBus,
}

impl Ls7aShortConfigWindow {
    pub fn new(bus: SharedPciBus) -> Self {
        Self { bus }
    }
}

impl MmioHandler for Ls7aShortConfigWindow {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        u64::from(
            self.bus
                .borrow()
                .read_config(LS7A_BRIDGE_BDF, offset as u16, size as u8),
        )
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        self.bus
            .borrow_mut()
            .write_config(LS7A_BRIDGE_BDF, offset as u16, size as u8, value as u32);
    }
}
