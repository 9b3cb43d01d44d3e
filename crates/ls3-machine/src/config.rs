use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::MachineError;
use crate::layout::{DEFAULT_RAM_SIZE, MAX_CPUS, MIN_RAM_SIZE};

pub const DEFAULT_BIOS_NAME: &str = "bios_loongson3.bin";

/// Configuration for [`crate::Loongson3Machine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Guest RAM size in bytes. Must be at least 256 MiB.
    pub ram_size_bytes: u64,
    /// Number of vCPUs, 1 to 16.
    pub cpu_count: u32,
    /// ELF kernel to boot directly. When absent the machine boots through [`Self::bios`].
    pub kernel: Option<PathBuf>,
    pub initrd: Option<PathBuf>,
    pub cmdline: String,
    /// Raw BIOS image for firmware boots.
    ///
    /// `None` leaves the boot ROM empty, which is only useful for harnesses that drive the
    /// machine without executing guest code.
    pub bios: Option<PathBuf>,
    /// Guest CPU clock. Defaults to the host clock.
    pub cpu_clock_hz: Option<u32>,
    /// Publish `memsize`/`highmemsize` in the process environment after a kernel load.
    pub export_env: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_size_bytes: DEFAULT_RAM_SIZE,
            cpu_count: 1,
            kernel: None,
            initrd: None,
            cmdline: String::new(),
            bios: Some(PathBuf::from(DEFAULT_BIOS_NAME)),
            cpu_clock_hz: None,
            export_env: true,
        }
    }
}

impl MachineConfig {
    pub fn validate(&self) -> Result<(), MachineError> {
        if self.ram_size_bytes < MIN_RAM_SIZE {
            return Err(MachineError::RamTooSmall {
                size: self.ram_size_bytes,
                min: MIN_RAM_SIZE,
            });
        }
        if self.cpu_count == 0 || self.cpu_count > MAX_CPUS {
            return Err(MachineError::InvalidCpuCount(self.cpu_count));
        }
        Ok(())
    }
}
