use bitflags::bitflags;

pub const PCI_CONFIG_SPACE_SIZE: usize = 256;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PciVendorDeviceId {
    pub vendor_id: u16,
    pub device_id: u16,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PciClassCode {
    pub class: u8,
    pub subclass: u8,
    pub prog_if: u8,
    pub revision_id: u8,
}

impl PciClassCode {
    /// `class << 8 | subclass`, the form class IDs are usually quoted in (e.g. `0x0600`).
    pub const fn class_id(&self) -> u16 {
        ((self.class as u16) << 8) | self.subclass as u16
    }
}

bitflags! {
    /// Command register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PciCommand: u16 {
        const IO_SPACE = 1 << 0;
        const MEMORY_SPACE = 1 << 1;
        const BUS_MASTER = 1 << 2;
        const INTX_DISABLE = 1 << 10;
    }
}

/// PCI configuration space with a per-byte guest write mask.
///
/// Device code initializes registers through the `set_*` helpers, which bypass the mask. Guest
/// accesses go through [`PciConfigSpace::write`], which only changes bits set in the mask:
/// `new = (old & !wmask) | (value & wmask)`.
#[derive(Clone)]
pub struct PciConfigSpace {
    bytes: [u8; PCI_CONFIG_SPACE_SIZE],
    wmask: [u8; PCI_CONFIG_SPACE_SIZE],
}

impl PciConfigSpace {
    pub const VENDOR_ID_OFFSET: u16 = 0x00;
    pub const DEVICE_ID_OFFSET: u16 = 0x02;
    pub const COMMAND_OFFSET: u16 = 0x04;
    pub const STATUS_OFFSET: u16 = 0x06;
    pub const REVISION_ID_OFFSET: u16 = 0x08;
    pub const CACHE_LINE_SIZE_OFFSET: u16 = 0x0C;
    pub const LATENCY_TIMER_OFFSET: u16 = 0x0D;
    pub const HEADER_TYPE_OFFSET: u16 = 0x0E;
    pub const BAR0_OFFSET: u16 = 0x10;
    pub const CARDBUS_CIS_OFFSET: u16 = 0x28;
    pub const SUBSYSTEM_VENDOR_ID_OFFSET: u16 = 0x2C;
    pub const SUBSYSTEM_ID_OFFSET: u16 = 0x2E;
    pub const CAPABILITY_LIST_OFFSET: u16 = 0x34;
    pub const INTERRUPT_LINE_OFFSET: u16 = 0x3C;
    pub const INTERRUPT_PIN_OFFSET: u16 = 0x3D;

    /// Creates a config space with the given IDs and every byte read-only.
    pub fn new(vendor_id: u16, device_id: u16) -> Self {
        let mut config = Self {
            bytes: [0; PCI_CONFIG_SPACE_SIZE],
            wmask: [0; PCI_CONFIG_SPACE_SIZE],
        };
        config.set_u16(Self::VENDOR_ID_OFFSET, vendor_id);
        config.set_u16(Self::DEVICE_ID_OFFSET, device_id);
        config
    }

    /// Zeroes every register and makes every byte read-only.
    pub fn clear(&mut self) {
        self.bytes = [0; PCI_CONFIG_SPACE_SIZE];
        self.wmask = [0; PCI_CONFIG_SPACE_SIZE];
    }

    pub fn set_u8(&mut self, offset: u16, value: u8) {
        self.bytes[usize::from(offset)] = value;
    }

    pub fn set_u16(&mut self, offset: u16, value: u16) {
        let off = usize::from(offset);
        self.bytes[off..off + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_u32(&mut self, offset: u16, value: u32) {
        let off = usize::from(offset);
        self.bytes[off..off + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_wmask_u8(&mut self, offset: u16, mask: u8) {
        self.wmask[usize::from(offset)] = mask;
    }

    pub fn set_wmask_u16(&mut self, offset: u16, mask: u16) {
        let off = usize::from(offset);
        self.wmask[off..off + 2].copy_from_slice(&mask.to_le_bytes());
    }

    pub fn set_wmask_u32(&mut self, offset: u16, mask: u32) {
        let off = usize::from(offset);
        self.wmask[off..off + 4].copy_from_slice(&mask.to_le_bytes());
    }

    pub fn get_u8(&self, offset: u16) -> u8 {
        self.bytes[usize::from(offset)]
    }

    pub fn get_u16(&self, offset: u16) -> u16 {
        self.read(offset, 2) as u16
    }

    pub fn get_u32(&self, offset: u16) -> u32 {
        self.read(offset, 4)
    }

    /// Guest-writable bits of the `size`-byte register at `offset`.
    pub fn writable_bits(&self, offset: u16, size: usize) -> u32 {
        assert!(matches!(size, 1 | 2 | 4));
        let off = usize::from(offset);
        assert!(off + size <= PCI_CONFIG_SPACE_SIZE);
        self.wmask[off..off + size]
            .iter()
            .enumerate()
            .fold(0, |acc, (i, b)| acc | (u32::from(*b) << (8 * i)))
    }

    pub fn read(&self, offset: u16, size: usize) -> u32 {
        assert!(matches!(size, 1 | 2 | 4));
        let off = usize::from(offset);
        assert!(off + size <= PCI_CONFIG_SPACE_SIZE);

        self.bytes[off..off + size]
            .iter()
            .enumerate()
            .fold(0, |acc, (i, b)| acc | (u32::from(*b) << (8 * i)))
    }

    pub fn write(&mut self, offset: u16, size: usize, value: u32) {
        assert!(matches!(size, 1 | 2 | 4));
        let off = usize::from(offset);
        assert!(off + size <= PCI_CONFIG_SPACE_SIZE);

        for i in 0..size {
            let addr = off + i;
            let val = (value >> (8 * i)) as u8;
            let mask = self.wmask[addr];
            self.bytes[addr] = (self.bytes[addr] & !mask) | (val & mask);
        }
    }

    pub fn vendor_device_id(&self) -> PciVendorDeviceId {
        PciVendorDeviceId {
            vendor_id: self.get_u16(Self::VENDOR_ID_OFFSET),
            device_id: self.get_u16(Self::DEVICE_ID_OFFSET),
        }
    }

    pub fn class_code(&self) -> PciClassCode {
        PciClassCode {
            revision_id: self.bytes[0x08],
            prog_if: self.bytes[0x09],
            subclass: self.bytes[0x0a],
            class: self.bytes[0x0b],
        }
    }

    pub fn set_class_code(&mut self, class: u8, subclass: u8, prog_if: u8, revision_id: u8) {
        self.bytes[0x08] = revision_id;
        self.bytes[0x09] = prog_if;
        self.bytes[0x0a] = subclass;
        self.bytes[0x0b] = class;
    }

    pub fn header_type(&self) -> u8 {
        self.get_u8(Self::HEADER_TYPE_OFFSET)
    }

    pub fn command(&self) -> PciCommand {
        PciCommand::from_bits_retain(self.get_u16(Self::COMMAND_OFFSET))
    }

    pub fn set_command(&mut self, command: u16) {
        self.set_u16(Self::COMMAND_OFFSET, command);
    }

    pub fn bar(&self, index: u8) -> u32 {
        assert!(index < 6);
        self.get_u32(Self::BAR0_OFFSET + u16::from(index) * 4)
    }

    pub fn interrupt_line(&self) -> u8 {
        self.get_u8(Self::INTERRUPT_LINE_OFFSET)
    }

    pub fn interrupt_pin(&self) -> u8 {
        self.get_u8(Self::INTERRUPT_PIN_OFFSET)
    }

    pub fn set_interrupt_pin(&mut self, pin: u8) {
        self.set_u8(Self::INTERRUPT_PIN_OFFSET, pin);
    }
}

pub trait PciDevice {
    fn config(&self) -> &PciConfigSpace;
    fn config_mut(&mut self) -> &mut PciConfigSpace;

    fn reset(&mut self) {
        // Default: stop decoding. Devices with a full reset image override this.
        self.config_mut().set_command(0);
    }
}
