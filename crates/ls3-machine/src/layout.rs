//! Guest physical address map.

pub use firmware::bios_stub::{BIOS_BASE, BIOS_SIZE};
pub use firmware::bootparam::BOOTPARAM_PHYADDR;
pub use firmware::fw_config::FW_CONF_ADDR;
pub use ls3_devices::pm::{PM_MMIO_BASE, PM_MMIO_SIZE};

/// Low RAM window, an alias of the first 256 MiB of RAM.
pub const LOW_RAM_BASE: u64 = 0x0000_0000;
pub const LOW_RAM_SIZE: u64 = 256 << 20;

/// Full RAM.
pub const HIGH_RAM_BASE: u64 = 0x8000_0000;

pub const MIN_RAM_SIZE: u64 = LOW_RAM_SIZE;
pub const DEFAULT_RAM_SIZE: u64 = 560 << 20;
pub const MAX_CPUS: u32 = 16;

/// Lowest address a ram-disk is placed at.
pub const INITRD_OFFSET: u64 = 0x03EA_0000;
pub const INITRD_PAGE_SIZE: u64 = 0x1000;

/// KSEG0/KSEG1 to physical.
pub const fn kseg_to_phys(addr: u64) -> u64 {
    addr & 0x7FFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kseg_translation() {
        assert_eq!(kseg_to_phys(0xFFFF_FFFF_8020_0000), 0x0020_0000);
        assert_eq!(kseg_to_phys(0x8020_0000), 0x0020_0000);
        assert_eq!(kseg_to_phys(0x0020_0000), 0x0020_0000);
    }
}
