//! Guest physical memory: RAM backing stores, the MMIO handler seam and the physical address
//! router used by the Loongson-3 platform.

#![forbid(unsafe_code)]

mod bus;
mod phys;
mod window;

pub use bus::{MapError, MmioHandler, PhysicalMemoryBus};
pub use phys::{DenseMemory, GuestMemory, GuestMemoryError, GuestMemoryResult};
pub use window::AddressWindow;

#[cfg(test)]
mod tests;
