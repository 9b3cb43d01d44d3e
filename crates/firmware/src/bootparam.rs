//! Kernel argument block handed to the guest in `a0..a2`.
//!
//! The block lives in a 1 MiB buffer at [`BOOTPARAM_PHYADDR`]:
//!
//! ```text
//! +0   u32 argv[0] -> "g"
//! +4   u32 argv[1] -> command line
//! +8   u32 0
//! +12  u32 0
//! +16  "g\0" "<command line>\0"
//! +N   boot_params header, then the boot info record chain
//! ```
//!
//! Argument pointers are 32-bit KSEG0 addresses. The strings share a 256-byte area.

use thiserror::Error;
use tracing::warn;

use crate::boot_info::{build_boot_info, BootInfoConfig, BootInfoError, BootInfoLayout, MemorySplit};

pub const BOOTPARAM_PHYADDR: u64 = 0x0FF0_0000;
pub const KSEG0_BASE: u64 = 0xFFFF_FFFF_8000_0000;
pub const BOOTPARAM_ADDR: u64 = KSEG0_BASE | BOOTPARAM_PHYADDR;
pub const PARAMS_BUF_SIZE: usize = 0x10_0000;
/// Space shared by the pointer slots and argument strings.
pub const ARGV_AREA_SIZE: usize = 256;
/// Number of argument slots: argv[0], argv[1], terminator, and an empty environment list.
const ARGV_SLOTS: usize = 4;

pub const BOOT_ARGC: u64 = 2;

/// Sign-extended KSEG0 alias of a 32-bit physical address.
pub const fn phys_to_virt(paddr: u64) -> u64 {
    (paddr & 0xFFFF_FFFF) | KSEG0_BASE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitrdPlacement {
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootParamsConfig {
    pub ram_size: u64,
    pub cpu_count: u32,
    pub cpu_clock_hz: u32,
    pub cmdline: String,
    pub initrd: Option<InitrdPlacement>,
}

/// `memsize`/`highmemsize` values for firmware environment consumers, in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyEnv {
    pub memsize: u32,
    pub highmemsize: u32,
}

impl LegacyEnv {
    pub fn from_ram_size(ram_size: u64) -> Self {
        let split = MemorySplit::from_ram_size(ram_size);
        Self {
            memsize: split.low_mib,
            highmemsize: split.high_mib,
        }
    }

    pub fn vars(&self) -> [(&'static str, String); 2] {
        [
            ("memsize", self.memsize.to_string()),
            ("highmemsize", self.highmemsize.to_string()),
        ]
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BootParamsError {
    #[error(transparent)]
    BootInfo(#[from] BootInfoError),
}

pub struct BootParams {
    /// Full `PARAMS_BUF_SIZE` image to copy to `BOOTPARAM_PHYADDR`.
    pub blob: Vec<u8>,
    /// Offset of the `boot_params` header inside `blob`.
    pub blob_len: usize,
    pub layout: BootInfoLayout,
    pub a0: u64,
    pub a1: u64,
    pub a2: u64,
    pub env: LegacyEnv,
    /// Command line as the guest sees it, after any truncation.
    pub argv1: String,
}

fn format_argv1(cfg: &BootParamsConfig) -> String {
    match cfg.initrd {
        Some(initrd) => format!(
            "rd_start=0x{:016x} rd_size={} {}",
            phys_to_virt(initrd.offset),
            initrd.size,
            cfg.cmdline
        ),
        None => cfg.cmdline.clone(),
    }
}

/// Writes `s` NUL-terminated at `pos`, clipped to the argument area. Returns the written string
/// and the next free position.
fn push_str<'s>(buf: &mut [u8], pos: usize, s: &'s str) -> (&'s str, usize) {
    let room = ARGV_AREA_SIZE - pos - 1;
    let mut len = s.len().min(room);
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    if len < s.len() {
        warn!(
            len = s.len(),
            kept = len,
            "kernel command line truncated"
        );
    }
    buf[pos..pos + len].copy_from_slice(&s.as_bytes()[..len]);
    buf[pos + len] = 0;
    (&s[..len], pos + len + 1)
}

fn put_slot(buf: &mut [u8], slot: usize, value: u32) {
    buf[slot * 4..slot * 4 + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn build_boot_params(cfg: &BootParamsConfig) -> Result<BootParams, BootParamsError> {
    let mut blob = vec![0u8; PARAMS_BUF_SIZE];
    let argv_base = BOOTPARAM_ADDR as u32;

    let mut pos = ARGV_SLOTS * 4;
    put_slot(&mut blob, 0, argv_base + pos as u32);
    (_, pos) = push_str(&mut blob, pos, "g");

    put_slot(&mut blob, 1, argv_base + pos as u32);
    let argv1 = format_argv1(cfg);
    let (kept, next) = push_str(&mut blob, pos, &argv1);
    let argv1 = kept.to_owned();
    pos = next;

    let blob_len = (pos + 32) & !31;
    let layout = build_boot_info(
        &mut blob,
        blob_len,
        &BootInfoConfig {
            ram_size: cfg.ram_size,
            cpu_count: cfg.cpu_count,
            cpu_clock_hz: cfg.cpu_clock_hz,
        },
    )?;

    Ok(BootParams {
        blob,
        blob_len,
        layout,
        a0: BOOT_ARGC,
        a1: BOOTPARAM_ADDR,
        a2: BOOTPARAM_ADDR + blob_len as u64,
        env: LegacyEnv::from_ram_size(cfg.ram_size),
        argv1,
    })
}
