use std::cell::OnceCell;
use std::path::PathBuf;

use crate::error::MachineError;

/// Values the boot vCPU is seeded with on every reset after a direct kernel boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderParameters {
    pub ram_size: u64,
    pub kernel: PathBuf,
    pub initrd: Option<PathBuf>,
    pub cmdline: String,
    pub kernel_entry: u64,
    pub a0: u64,
    pub a1: u64,
    pub a2: u64,
}

/// Write-once holder for [`LoaderParameters`].
#[derive(Debug, Default)]
pub struct FrozenLoaderParameters {
    cell: OnceCell<LoaderParameters>,
}

impl FrozenLoaderParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freeze(&self, params: LoaderParameters) -> Result<(), MachineError> {
        self.cell
            .set(params)
            .map_err(|_| MachineError::LoaderParamsFrozen)
    }

    pub fn get(&self) -> Option<&LoaderParameters> {
        self.cell.get()
    }

    pub fn is_frozen(&self) -> bool {
        self.cell.get().is_some()
    }
}
