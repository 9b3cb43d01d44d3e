use std::io;
use std::path::PathBuf;

use firmware::bootparam::BootParamsError;
use memory::{GuestMemoryError, MapError};
use thiserror::Error;

/// Kernel, ram-disk and boot parameter preparation failures.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("could not read {}", path.display())]
    ReadImage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not load kernel {}: {reason}", path.display())]
    InvalidElf { path: PathBuf, reason: String },
    #[error(
        "kernel {} segment at {paddr:#x} (+{size:#x}) lies outside low RAM",
        path.display()
    )]
    SegmentOutsideRam { path: PathBuf, paddr: u64, size: u64 },
    #[error(
        "initrd {} too large: {size:#x} bytes at {offset:#x} exceeds RAM size {ram_size:#x}",
        path.display()
    )]
    InitrdTooLarge {
        path: PathBuf,
        offset: u64,
        size: u64,
        ram_size: u64,
    },
    #[error(
        "{} at {start:#x}..{end:#x} overlaps {other}",
        path.display()
    )]
    ImageOverlap {
        path: PathBuf,
        start: u64,
        end: u64,
        other: String,
    },
    #[error(transparent)]
    BootParams(#[from] BootParamsError),
}

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("RAM size {size:#x} is below the {min:#x} byte minimum")]
    RamTooSmall { size: u64, min: u64 },
    #[error("invalid cpu_count={0}; must be 1..=16")]
    InvalidCpuCount(u32),
    #[error(transparent)]
    Memory(#[from] GuestMemoryError),
    #[error("address map: {0}")]
    Map(#[from] MapError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("could not load BIOS {}: {reason}", path.display())]
    BiosLoad { path: PathBuf, reason: String },
    #[error("loader parameters are already set")]
    LoaderParamsFrozen,
}
