use crate::pci::{PciCommand, PciConfigSpace, PciDevice};

use super::{LS7A_HOST_DEVICE_ID, LS7A_VENDOR_ID};

/// The host bridge's own PCI function (00:00.0).
pub struct Ls7aBridgeFunction {
    config: PciConfigSpace,
}

impl Ls7aBridgeFunction {
    pub fn new() -> Self {
        let mut bridge = Self {
            config: PciConfigSpace::new(LS7A_VENDOR_ID, LS7A_HOST_DEVICE_ID),
        };
        bridge.load_reset_image();
        bridge
    }

    /// Installs the power-on register values and write masks.
    fn load_reset_image(&mut self) {
        let cfg = &mut self.config;
        cfg.clear();

        cfg.set_u16(PciConfigSpace::VENDOR_ID_OFFSET, LS7A_VENDOR_ID);
        cfg.set_u16(PciConfigSpace::DEVICE_ID_OFFSET, LS7A_HOST_DEVICE_ID);
        cfg.set_u16(PciConfigSpace::COMMAND_OFFSET, 0x0000);
        // Capabilities list.
        cfg.set_u16(PciConfigSpace::STATUS_OFFSET, 0x0010);
        // Host bridge (class 0x06, subclass 0x00, prog-if 0, revision 0).
        cfg.set_class_code(0x06, 0x00, 0x00, 0x00);
        cfg.set_u8(PciConfigSpace::CACHE_LINE_SIZE_OFFSET, 0x00);
        cfg.set_u8(PciConfigSpace::HEADER_TYPE_OFFSET, 0x80);

        for bar in 0..6u16 {
            cfg.set_u32(PciConfigSpace::BAR0_OFFSET + bar * 4, 0);
        }
        cfg.set_u32(PciConfigSpace::BAR0_OFFSET + 3 * 4, 0x0000_0004);

        cfg.set_u32(PciConfigSpace::CARDBUS_CIS_OFFSET, 0);
        cfg.set_u16(PciConfigSpace::SUBSYSTEM_VENDOR_ID_OFFSET, LS7A_VENDOR_ID);
        cfg.set_u16(PciConfigSpace::SUBSYSTEM_ID_OFFSET, LS7A_HOST_DEVICE_ID);
        cfg.set_u8(PciConfigSpace::CAPABILITY_LIST_OFFSET, 0x40);
        cfg.set_u8(PciConfigSpace::INTERRUPT_LINE_OFFSET, 0x00);
        cfg.set_u8(PciConfigSpace::INTERRUPT_PIN_OFFSET, 0x00);
        cfg.set_u16(0x3E, 0x0000);
        cfg.set_u8(0x4C, 0x60);

        let command_mask = PciCommand::IO_SPACE
            | PciCommand::MEMORY_SPACE
            | PciCommand::BUS_MASTER
            | PciCommand::INTX_DISABLE;
        cfg.set_wmask_u16(PciConfigSpace::COMMAND_OFFSET, command_mask.bits());
        cfg.set_wmask_u8(PciConfigSpace::LATENCY_TIMER_OFFSET, 0xFF);
        for bar in 0..6u16 {
            cfg.set_wmask_u32(PciConfigSpace::BAR0_OFFSET + bar * 4, 0xFFFF_FFFF);
        }
        cfg.set_wmask_u8(PciConfigSpace::INTERRUPT_LINE_OFFSET, 0xFF);
    }
}

impl Default for Ls7aBridgeFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl PciDevice for Ls7aBridgeFunction {
    fn config(&self) -> &PciConfigSpace {
        &self.config
    }

    fn config_mut(&mut self) -> &mut PciConfigSpace {
        &mut self.config
    }

    fn reset(&mut self) {
        self.load_reset_image();
    }
}
