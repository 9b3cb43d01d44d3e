use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::pci::config::{PciConfigSpace, PciDevice, PCI_CONFIG_SPACE_SIZE};
use crate::pci::PciBdf;

/// Value returned by config reads that target a function nobody implements.
pub const PCI_ABSENT_VALUE: u32 = 0xFFFF_FFFF;

pub type SharedPciBus = Rc<RefCell<PciBus>>;

/// Host-bridge specific INTx hooks of a root bus.
pub trait PciIntxRouting {
    /// Maps a device slot and its config-space interrupt pin (1 = INTA#) to a controller input.
    fn map_irq(&self, slot: u8, pin: u8) -> u8;
    /// Drives a controller input after the bus has aggregated all sources sharing it.
    fn set_irq(&mut self, line: u8, level: bool);
}

#[inline]
fn size_mask(size: usize) -> u32 {
    match size {
        1 => 0xFF,
        2 => 0xFFFF,
        _ => 0xFFFF_FFFF,
    }
}

/// Root PCI bus.
///
/// Besides config-space dispatch the bus owns shared-INTx bookkeeping: several functions may map
/// to the same controller input, so the input stays asserted until the last source deasserts.
#[derive(Default)]
pub struct PciBus {
    devfn_min: u8,
    devices: BTreeMap<PciBdf, Box<dyn PciDevice>>,
    routing: Option<Box<dyn PciIntxRouting>>,
    intx_levels: BTreeMap<PciBdf, bool>,
    irq_count: Vec<u32>,
}

impl PciBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root bus whose INTx lines are delivered through `routing`.
    ///
    /// `devfn_min` is the first devfn handed out by [`Self::add_device_auto`]; `nirq` is the
    /// number of controller inputs the routing hook can drive.
    pub fn new_root(devfn_min: u8, nirq: usize, routing: Box<dyn PciIntxRouting>) -> Self {
        Self {
            devfn_min,
            devices: BTreeMap::new(),
            routing: Some(routing),
            intx_levels: BTreeMap::new(),
            irq_count: vec![0; nirq],
        }
    }

    pub fn devfn_min(&self) -> u8 {
        self.devfn_min
    }

    pub fn irq_count(&self) -> usize {
        self.irq_count.len()
    }

    pub fn add_device(&mut self, bdf: PciBdf, device: Box<dyn PciDevice>) {
        let prev = self.devices.insert(bdf, device);
        assert!(prev.is_none(), "duplicate PCI BDF {bdf:?}");
    }

    /// Places `device` at function 0 of the first free slot at or above `devfn_min`.
    pub fn add_device_auto(&mut self, device: Box<dyn PciDevice>) -> Option<PciBdf> {
        let first_slot = self.devfn_min >> 3;
        let bdf = (first_slot..32)
            .map(|slot| PciBdf::new(0, slot, 0))
            .find(|bdf| !self.devices.contains_key(bdf))?;
        self.devices.insert(bdf, device);
        Some(bdf)
    }

    pub fn device_config(&self, bdf: PciBdf) -> Option<&PciConfigSpace> {
        self.devices.get(&bdf).map(|dev| dev.config())
    }

    pub fn read_config(&self, bdf: PciBdf, offset: u16, size: u8) -> u32 {
        let size = usize::from(size);
        let absent = PCI_ABSENT_VALUE & size_mask(size);
        let Some(dev) = self.devices.get(&bdf) else {
            return absent;
        };
        if !matches!(size, 1 | 2 | 4) || usize::from(offset) + size > PCI_CONFIG_SPACE_SIZE {
            return absent;
        }
        dev.config().read(offset, size)
    }

    pub fn write_config(&mut self, bdf: PciBdf, offset: u16, size: u8, value: u32) {
        let size = usize::from(size);
        let Some(dev) = self.devices.get_mut(&bdf) else {
            return;
        };
        if !matches!(size, 1 | 2 | 4) || usize::from(offset) + size > PCI_CONFIG_SPACE_SIZE {
            return;
        }
        dev.config_mut().write(offset, size, value);
    }

    /// Decodes a configuration address in mechanism #1 layout:
    /// bus = bits 16..=23, devfn = bits 8..=15, register = bits 0..=7.
    pub fn decode_config_address(addr: u32) -> (PciBdf, u16) {
        let bus = (addr >> 16) as u8;
        let devfn = (addr >> 8) as u8;
        (PciBdf::from_devfn(bus, devfn), (addr & 0xFF) as u16)
    }

    pub fn config_data_read(&self, addr: u32, size: usize) -> u32 {
        let (bdf, reg) = Self::decode_config_address(addr);
        self.read_config(bdf, reg, size as u8)
    }

    pub fn config_data_write(&mut self, addr: u32, size: usize, value: u32) {
        let (bdf, reg) = Self::decode_config_address(addr);
        self.write_config(bdf, reg, size as u8, value);
    }

    /// Sets the level of a function's INTx output (the pin it advertises at config `0x3D`).
    pub fn set_intx_level(&mut self, bdf: PciBdf, level: bool) {
        let Some(pin) = self.device_config(bdf).map(|cfg| cfg.interrupt_pin()) else {
            return;
        };
        if pin == 0 {
            debug!(?bdf, "INTx change from a function without an interrupt pin");
            return;
        }
        let Some(routing) = self.routing.as_mut() else {
            return;
        };

        let prev = self.intx_levels.insert(bdf, level).unwrap_or(false);
        if prev == level {
            return;
        }

        let line = routing.map_irq(bdf.device, pin);
        let Some(count) = self.irq_count.get_mut(usize::from(line)) else {
            debug!(?bdf, line, "INTx routed outside the bus interrupt range");
            return;
        };

        if level {
            *count += 1;
            if *count == 1 {
                routing.set_irq(line, true);
            }
        } else {
            debug_assert!(*count > 0, "INTx deassert would underflow assert count");
            if *count > 0 {
                *count -= 1;
                if *count == 0 {
                    routing.set_irq(line, false);
                }
            }
        }
    }

    /// Number of asserted sources currently sharing controller input `line`.
    pub fn irq_level(&self, line: u8) -> u32 {
        self.irq_count.get(usize::from(line)).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        for dev in self.devices.values_mut() {
            dev.reset();
        }

        self.intx_levels.clear();
        if let Some(routing) = self.routing.as_mut() {
            for (line, count) in self.irq_count.iter_mut().enumerate() {
                if *count > 0 {
                    *count = 0;
                    routing.set_irq(line as u8, false);
                }
            }
        }
    }
}
