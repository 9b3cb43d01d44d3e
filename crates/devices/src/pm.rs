//! Power-management trap used by the firmware reset/shutdown stubs.

use ls3_platform::lifecycle::{LifecycleRequest, LifecycleSink};
use memory::{AddressWindow, MmioHandler};
use tracing::debug;

pub const PM_MMIO_BASE: u64 = 0x0E00_1008_0000;
pub const PM_MMIO_SIZE: u64 = 0x100;
/// Control register; the only offset with side effects.
pub const PM_CNTL_MODE: u64 = 0x10;

pub const PM_CNTL_RESET: u64 = 0x00;
pub const PM_CNTL_SHUTDOWN: u64 = 0xFF;

pub const fn pm_window() -> AddressWindow {
    AddressWindow::new(PM_MMIO_BASE, PM_MMIO_SIZE).with_access(1, 4)
}

/// Turns guest writes to the control register into queued lifecycle requests.
pub struct PowerManagementTrap {
    sink: Box<dyn LifecycleSink>,
}

impl PowerManagementTrap {
    pub fn new(sink: Box<dyn LifecycleSink>) -> Self {
        Self { sink }
    }
}

impl MmioHandler for PowerManagementTrap {
    fn read(&mut self, _offset: u64, _size: usize) -> u64 {
        0
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        if offset != PM_CNTL_MODE {
            debug!(offset, size, value, "ignored PM write");
            return;
        }
        match value {
            PM_CNTL_RESET => self.sink.request(LifecycleRequest::Reset),
            PM_CNTL_SHUTDOWN => self.sink.request(LifecycleRequest::Shutdown),
            _ => debug!(value, "ignored PM control value"),
        }
    }
}
