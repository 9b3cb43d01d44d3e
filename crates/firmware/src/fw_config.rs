//! Machine description blob read by an external BIOS image.

use crate::boot_info::records::MEM_FREQ_HZ;

pub const FW_CONF_ADDR: u64 = 0x0FFF_0000;
pub const FW_CONFIG_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FwConfig {
    pub ram_size: u64,
    pub mem_freq: u32,
    pub nr_cpus: u32,
    pub cpu_clock_freq: u32,
}

impl FwConfig {
    pub fn new(ram_size: u64, nr_cpus: u32, cpu_clock_freq: u32) -> Self {
        Self {
            ram_size,
            mem_freq: MEM_FREQ_HZ,
            nr_cpus,
            cpu_clock_freq,
        }
    }

    /// Natural-alignment little-endian layout; the trailing 4 bytes are padding.
    pub fn to_bytes(&self) -> [u8; FW_CONFIG_SIZE] {
        let mut out = [0u8; FW_CONFIG_SIZE];
        out[0..8].copy_from_slice(&self.ram_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.mem_freq.to_le_bytes());
        out[12..16].copy_from_slice(&self.nr_cpus.to_le_bytes());
        out[16..20].copy_from_slice(&self.cpu_clock_freq.to_le_bytes());
        out
    }
}
