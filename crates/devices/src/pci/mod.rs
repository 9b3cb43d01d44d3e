//! PCI core types: function addressing, configuration space and the root bus.

pub mod config;
pub mod irq_router;

mod bus;

pub use bus::{PciBus, PciIntxRouting, SharedPciBus, PCI_ABSENT_VALUE};
pub use config::{
    PciClassCode, PciCommand, PciConfigSpace, PciDevice, PciVendorDeviceId, PCI_CONFIG_SPACE_SIZE,
};
pub use irq_router::{ls7a_map_irq, Ls7aIntxRouter, LS7A_INTX_LINES};

/// PCI bus/device/function identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PciBdf {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl PciBdf {
    /// Creates a new BDF.
    ///
    /// The caller is responsible for ensuring the values are within the PCI ranges:
    /// device < 32, function < 8.
    pub const fn new(bus: u8, device: u8, function: u8) -> Self {
        Self {
            bus,
            device,
            function,
        }
    }

    /// Builds a BDF from a bus number and an 8-bit `devfn` (`device << 3 | function`).
    pub const fn from_devfn(bus: u8, devfn: u8) -> Self {
        Self {
            bus,
            device: devfn >> 3,
            function: devfn & 0x7,
        }
    }

    pub const fn devfn(self) -> u8 {
        debug_assert!(self.device < 32);
        debug_assert!(self.function < 8);
        (self.device << 3) | self.function
    }
}

impl core::cmp::Ord for PciBdf {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.bus, self.device, self.function).cmp(&(other.bus, other.device, other.function))
    }
}

impl core::cmp::PartialOrd for PciBdf {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
