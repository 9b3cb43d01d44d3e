//! LS7A PCI/PCIe host bridge.
//!
//! The bridge exposes three CPU-visible windows:
//! - the internal register window (read-only register bank),
//! - the short config window onto the bridge function's own config space,
//! - the extended config window decoding `bus/devfn/register` for the whole root bus.
//!
//! The root bus is registered with the LS7A INTx swizzle as its interrupt hooks.

mod bridge;
mod config_window;
mod regs;

use std::cell::RefCell;
use std::rc::Rc;

use ls3_platform::interrupts::PicIrqLevelSink;
use memory::{AddressWindow, MapError, PhysicalMemoryBus};

use crate::pci::{Ls7aIntxRouter, PciBdf, PciBus, SharedPciBus};

pub use bridge::Ls7aBridgeFunction;
pub use config_window::{fold_config_address, Ls7aConfigWindow, Ls7aShortConfigWindow};
pub use regs::Ls7aRegisterBank;

pub const LS7A_VENDOR_ID: u16 = 0x0014;
pub const LS7A_HOST_DEVICE_ID: u16 = 0x7A00;

pub const LS7A_REG_BASE: u64 = 0x1FE0_0000;
pub const LS7A_PCICONFIG_BASE: u64 = LS7A_REG_BASE;
pub const LS7A_PCICONFIG_SIZE: u64 = 0x100;
pub const LS7A_INTERNAL_REG_BASE: u64 = LS7A_REG_BASE + 0x100;
pub const LS7A_INTERNAL_REG_SIZE: u64 = 0xE0;
pub const LS7A_NR_REGS: usize = (LS7A_INTERNAL_REG_SIZE >> 2) as usize;

pub const HT1LO_PCICFG_BASE: u64 = 0x1A00_0000;
pub const HT1LO_PCICFG_SIZE: u64 = 0x0200_0000;

/// First devfn used for automatically placed functions (slot 1).
pub const LS7A_DEVFN_MIN: u8 = 1 << 3;
/// Interrupt inputs reachable from the root bus.
pub const LS7A_NIRQ: usize = 128;

pub const LS7A_BRIDGE_BDF: PciBdf = PciBdf::new(0, 0, 0);

pub const fn internal_register_window() -> AddressWindow {
    AddressWindow::new(LS7A_INTERNAL_REG_BASE, LS7A_INTERNAL_REG_SIZE).with_access(4, 4)
}

pub const fn short_config_window() -> AddressWindow {
    AddressWindow::new(LS7A_PCICONFIG_BASE, LS7A_PCICONFIG_SIZE).with_access(4, 4)
}

pub const fn extended_config_window() -> AddressWindow {
    AddressWindow::new(HT1LO_PCICFG_BASE, HT1LO_PCICFG_SIZE).with_access(1, 4)
}

/// Host bridge composer: owns the root bus (with the bridge function at 00:00.0) and the
/// register bank, and hands out MMIO handlers for its windows. Clones share the same state.
#[derive(Clone)]
pub struct Ls7aHostBridge {
    bus: SharedPciBus,
    regs: Rc<RefCell<Ls7aRegisterBank>>,
}

impl Ls7aHostBridge {
    pub fn new(pic: Box<dyn PicIrqLevelSink>) -> Self {
        let mut bus = PciBus::new_root(
            LS7A_DEVFN_MIN,
            LS7A_NIRQ,
            Box::new(Ls7aIntxRouter::new(pic)),
        );
        bus.add_device(LS7A_BRIDGE_BDF, Box::new(Ls7aBridgeFunction::new()));

        Self {
            bus: Rc::new(RefCell::new(bus)),
            regs: Rc::new(RefCell::new(Ls7aRegisterBank::new())),
        }
    }

    pub fn bus(&self) -> SharedPciBus {
        self.bus.clone()
    }

    pub fn register_bank(&self) -> Rc<RefCell<Ls7aRegisterBank>> {
        self.regs.clone()
    }

    /// Maps the internal register window and the short config window.
    pub fn map_bridge_windows(&self, mem: &mut PhysicalMemoryBus) -> Result<(), MapError> {
        mem.map_mmio(internal_register_window(), Box::new(self.regs.clone()))?;
        mem.map_mmio(
            short_config_window(),
            Box::new(Ls7aShortConfigWindow::new(self.bus.clone())),
        )
    }

    pub fn map_extended_config_window(&self, mem: &mut PhysicalMemoryBus) -> Result<(), MapError> {
        mem.map_mmio(
            extended_config_window(),
            Box::new(Ls7aConfigWindow::new(self.bus.clone())),
        )
    }

    /// Reinstalls the bridge's reset image and resets every function on the root bus.
    pub fn reset(&self) {
        self.bus.borrow_mut().reset();
        self.regs.borrow_mut().reset();
    }
}
