//! Loongson-3 virtual machine board.
//!
//! [`Loongson3Machine`] wires guest RAM, the boot ROM, the LS7A host bridge and the PM trap into
//! one physical address map, prepares direct kernel boots (ELF kernel, ram-disk and the
//! EFI-loongson boot parameter block) and keeps the per-vCPU reset state that hands control to the
//! kernel.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod layout;
pub mod loader;
pub mod params;
pub mod vcpu;

mod machine;

pub use config::MachineConfig;
pub use error::{LoaderError, MachineError};
pub use loader::{BootImage, ImageTarget, KernelBootConfig, LoadReport};
pub use machine::Loongson3Machine;
pub use params::LoaderParameters;
