//! Direct kernel boot: ELF loading, ram-disk placement and the boot parameter block.
//!
//! Preparation is side-effect free. [`prepare_kernel_boot`] reads the files and produces a list of
//! [`BootImage`]s plus the register values for the boot vCPU; the machine installs the images
//! only once everything has been validated.

use std::path::{Path, PathBuf};

use firmware::bootparam::{
    build_boot_params, BootParamsConfig, InitrdPlacement, LegacyEnv, BOOTPARAM_PHYADDR,
    PARAMS_BUF_SIZE,
};
use tracing::info;
use xmas_elf::header::{Class, Data, Machine};
use xmas_elf::program::Type as PhType;
use xmas_elf::ElfFile;

use crate::error::LoaderError;
use crate::layout::{kseg_to_phys, INITRD_OFFSET, INITRD_PAGE_SIZE, LOW_RAM_SIZE};
use crate::params::LoaderParameters;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelBootConfig {
    pub kernel: PathBuf,
    pub initrd: Option<PathBuf>,
    pub cmdline: String,
}

/// Where a boot image is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    /// Byte offset into guest RAM.
    Ram { offset: u64 },
    /// Guest physical address inside a ROM region.
    Rom { paddr: u64 },
}

/// A blob installed at boot and again on every system reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImage {
    pub name: String,
    pub target: ImageTarget,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedKernel {
    pub entry: u64,
    /// Lowest physical address written.
    pub low: u64,
    /// First physical address past the highest segment.
    pub high: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub kernel: LoadedKernel,
    pub initrd: Option<InitrdPlacement>,
    pub env: LegacyEnv,
    /// Offset of the `boot_params` header inside the parameter block.
    pub boot_params_offset: usize,
    /// Command line as passed to the guest.
    pub argv1: String,
}

pub struct PreparedBoot {
    pub images: Vec<BootImage>,
    pub params: LoaderParameters,
    pub report: LoadReport,
}

fn read_image(path: &Path) -> Result<Vec<u8>, LoaderError> {
    std::fs::read(path).map_err(|source| LoaderError::ReadImage {
        path: path.to_path_buf(),
        source,
    })
}

/// Sign-extends 32-bit entries and drops the ISA mode bit.
fn normalize_entry(entry: u64, class: Class) -> u64 {
    let entry = match class {
        Class::ThirtyTwo => entry as u32 as i32 as i64 as u64,
        _ => entry,
    };
    entry & !1
}

/// Parses a little-endian MIPS ELF and returns its `PT_LOAD` segments as RAM images.
pub fn load_elf_segments(
    path: &Path,
    data: &[u8],
) -> Result<(LoadedKernel, Vec<BootImage>), LoaderError> {
    let invalid = |reason: &str| LoaderError::InvalidElf {
        path: path.to_path_buf(),
        reason: reason.to_owned(),
    };

    let elf = ElfFile::new(data).map_err(invalid)?;
    let class = elf.header.pt1.class();
    if !matches!(class, Class::ThirtyTwo | Class::SixtyFour) {
        return Err(invalid("unknown ELF class"));
    }
    if elf.header.pt1.data() != Data::LittleEndian {
        return Err(invalid("not a little-endian image"));
    }
    if elf.header.pt2.machine().as_machine() != Machine::Mips {
        return Err(invalid("not a MIPS image"));
    }

    let mut images = Vec::new();
    let mut low = u64::MAX;
    let mut high = 0u64;
    for ph in elf.program_iter() {
        if ph.get_type().ok() != Some(PhType::Load) {
            continue;
        }
        let paddr = kseg_to_phys(ph.physical_addr());
        let file_size = ph.file_size();
        let mem_size = ph.mem_size();
        if file_size > mem_size {
            return Err(invalid("segment file size exceeds memory size"));
        }
        let offset = ph.offset();
        let file_end = offset
            .checked_add(file_size)
            .filter(|end| *end <= data.len() as u64)
            .ok_or_else(|| invalid("segment extends past end of file"))?;
        let end = paddr
            .checked_add(mem_size)
            .filter(|end| *end <= LOW_RAM_SIZE)
            .ok_or_else(|| LoaderError::SegmentOutsideRam {
                path: path.to_path_buf(),
                paddr,
                size: mem_size,
            })?;

        let mut bytes = data[offset as usize..file_end as usize].to_vec();
        bytes.resize(mem_size as usize, 0);
        images.push(BootImage {
            name: format!("{}@{paddr:#x}", path.display()),
            target: ImageTarget::Ram { offset: paddr },
            bytes,
        });

        low = low.min(paddr);
        high = high.max(end);
    }
    if images.is_empty() {
        return Err(invalid("no loadable segments"));
    }

    let kernel = LoadedKernel {
        entry: normalize_entry(elf.header.pt2.entry_point(), class),
        low,
        high,
    };
    Ok((kernel, images))
}

/// Ram-disk placement: page-aligned after the kernel, never below [`INITRD_OFFSET`].
pub fn place_initrd(
    path: &Path,
    kernel_high: u64,
    size: u64,
    ram_size: u64,
) -> Result<InitrdPlacement, LoaderError> {
    let aligned = (kernel_high + INITRD_PAGE_SIZE - 1) & !(INITRD_PAGE_SIZE - 1);
    let offset = aligned.max(INITRD_OFFSET);
    match offset.checked_add(size) {
        Some(end) if end <= ram_size => Ok(InitrdPlacement { offset, size }),
        _ => Err(LoaderError::InitrdTooLarge {
            path: path.to_path_buf(),
            offset,
            size,
            ram_size,
        }),
    }
}

/// Guest RAM claimed by one boot image. `source` is `None` for the parameter block.
#[derive(Debug, Clone, Copy)]
struct RamClaim<'a> {
    source: Option<&'a Path>,
    start: u64,
    end: u64,
}

impl RamClaim<'_> {
    fn describe(&self) -> String {
        self.source
            .map_or_else(|| "boot parameters".to_owned(), |p| p.display().to_string())
    }
}

/// Rejects any two images sharing guest RAM. Claims are in load order; on a collision the later
/// file is reported.
fn check_image_overlaps(claims: &[RamClaim<'_>]) -> Result<(), LoaderError> {
    let mut sorted: Vec<(usize, &RamClaim<'_>)> = claims
        .iter()
        .enumerate()
        .filter(|(_, c)| c.end > c.start)
        .collect();
    sorted.sort_by_key(|(_, c)| c.start);

    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b.1.start >= a.1.end {
            continue;
        }
        let (blamed, other) = match (a.1.source, b.1.source) {
            (Some(_), None) => (a.1, b.1),
            (None, _) => (b.1, a.1),
            _ if a.0 > b.0 => (a.1, b.1),
            _ => (b.1, a.1),
        };
        return Err(LoaderError::ImageOverlap {
            path: blamed.source.unwrap_or(Path::new("")).to_path_buf(),
            start: blamed.start,
            end: blamed.end,
            other: other.describe(),
        });
    }
    Ok(())
}

pub fn prepare_kernel_boot(
    cfg: &KernelBootConfig,
    ram_size: u64,
    cpu_count: u32,
    cpu_clock_hz: u32,
) -> Result<PreparedBoot, LoaderError> {
    let kernel_data = read_image(&cfg.kernel)?;
    let (kernel, mut images) = load_elf_segments(&cfg.kernel, &kernel_data)?;
    info!(
        kernel = %cfg.kernel.display(),
        entry = format_args!("{:#x}", kernel.entry),
        low = format_args!("{:#x}", kernel.low),
        high = format_args!("{:#x}", kernel.high),
        "loaded kernel"
    );

    let mut claims: Vec<RamClaim<'_>> = images
        .iter()
        .filter_map(|image| match image.target {
            ImageTarget::Ram { offset } => Some(RamClaim {
                source: Some(cfg.kernel.as_path()),
                start: offset,
                end: offset + image.bytes.len() as u64,
            }),
            ImageTarget::Rom { .. } => None,
        })
        .collect();

    let mut initrd = None;
    if let Some(path) = &cfg.initrd {
        let data = read_image(path)?;
        if !data.is_empty() {
            let placement = place_initrd(path, kernel.high, data.len() as u64, ram_size)?;
            info!(
                initrd = %path.display(),
                offset = format_args!("{:#x}", placement.offset),
                size = placement.size,
                "loaded initrd"
            );
            claims.push(RamClaim {
                source: Some(path.as_path()),
                start: placement.offset,
                end: placement.offset + placement.size,
            });
            images.push(BootImage {
                name: path.display().to_string(),
                target: ImageTarget::Ram {
                    offset: placement.offset,
                },
                bytes: data,
            });
            initrd = Some(placement);
        }
    }

    claims.push(RamClaim {
        source: None,
        start: BOOTPARAM_PHYADDR,
        end: BOOTPARAM_PHYADDR + PARAMS_BUF_SIZE as u64,
    });
    check_image_overlaps(&claims)?;

    let boot = build_boot_params(&BootParamsConfig {
        ram_size,
        cpu_count,
        cpu_clock_hz,
        cmdline: cfg.cmdline.clone(),
        initrd,
    })?;
    images.push(BootImage {
        name: "params".to_owned(),
        target: ImageTarget::Ram {
            offset: BOOTPARAM_PHYADDR,
        },
        bytes: boot.blob,
    });

    let params = LoaderParameters {
        ram_size,
        kernel: cfg.kernel.clone(),
        initrd: cfg.initrd.clone(),
        cmdline: cfg.cmdline.clone(),
        kernel_entry: kernel.entry,
        a0: boot.a0,
        a1: boot.a1,
        a2: boot.a2,
    };
    let report = LoadReport {
        kernel,
        initrd,
        env: boot.env,
        boot_params_offset: boot.blob_len,
        argv1: boot.argv1,
    };
    Ok(PreparedBoot {
        images,
        params,
        report,
    })
}
