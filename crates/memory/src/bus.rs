use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

use crate::phys::GuestMemory;
use crate::window::AddressWindow;

/// Memory-mapped I/O handler.
///
/// `offset` is relative to the start of the window the handler is mapped at. The bus only calls
/// the handler for accesses that fit the window and satisfy its width constraints.
pub trait MmioHandler {
    fn read(&mut self, offset: u64, size: usize) -> u64;
    fn write(&mut self, offset: u64, size: usize, value: u64);
}

impl<T: MmioHandler + ?Sized> MmioHandler for Rc<RefCell<T>> {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        self.borrow_mut().read(offset, size)
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        self.borrow_mut().write(offset, size, value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("mapping at 0x{base:x} has zero length")]
    Empty { base: u64 },
    #[error("mapping at 0x{base:x} with length 0x{len:x} overflows the address space")]
    AddressOverflow { base: u64, len: u64 },
    #[error(
        "mapping [0x{base:x}, 0x{end:x}) overlaps existing region [0x{existing_base:x}, 0x{existing_end:x})"
    )]
    Overlap {
        base: u64,
        end: u64,
        existing_base: u64,
        existing_end: u64,
    },
    #[error("RAM mapping [0x{ram_offset:x}, +0x{len:x}) exceeds guest RAM size 0x{ram_size:x}")]
    RamOutOfRange {
        ram_offset: u64,
        len: u64,
        ram_size: u64,
    },
    #[error("no ROM region covers [0x{addr:x}, +0x{len:x})")]
    NotRom { addr: u64, len: usize },
}

enum RegionKind {
    Ram { ram_offset: u64 },
    Rom { data: Box<[u8]> },
    Mmio { handler: Box<dyn MmioHandler> },
}

struct Region {
    window: AddressWindow,
    kind: RegionKind,
}

enum Span {
    Unmapped(usize),
    Ram { ram_addr: u64, len: usize },
    Rom { base: u64, offset: usize, len: usize },
    Mmio,
}

#[inline]
fn all_ones(size: usize) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    }
}

/// Guest physical address router.
///
/// Regions are RAM windows (views into the single guest RAM backing store, so the same RAM can be
/// visible at several physical addresses), read-only ROM regions, and MMIO windows. Regions never
/// overlap. Reads from unmapped addresses return all-ones and writes are dropped.
pub struct PhysicalMemoryBus {
    pub ram: Box<dyn GuestMemory>,
    regions: BTreeMap<u64, Region>,
}

impl PhysicalMemoryBus {
    pub fn new(ram: Box<dyn GuestMemory>) -> Self {
        Self {
            ram,
            regions: BTreeMap::new(),
        }
    }

    pub fn ram(&self) -> &dyn GuestMemory {
        &*self.ram
    }

    pub fn ram_mut(&mut self) -> &mut dyn GuestMemory {
        &mut *self.ram
    }

    /// Maps `len` bytes of guest RAM starting at `ram_offset` at physical address `base`.
    pub fn map_ram(&mut self, base: u64, ram_offset: u64, len: u64) -> Result<(), MapError> {
        let ram_size = self.ram.size();
        match ram_offset.checked_add(len) {
            Some(end) if end <= ram_size => {}
            _ => {
                return Err(MapError::RamOutOfRange {
                    ram_offset,
                    len,
                    ram_size,
                })
            }
        }
        self.insert(AddressWindow::new(base, len), RegionKind::Ram { ram_offset })
    }

    /// Maps a zero-filled ROM region. Contents are installed with [`Self::load_rom`].
    pub fn map_rom(&mut self, base: u64, size: usize) -> Result<(), MapError> {
        self.insert(
            AddressWindow::new(base, size as u64),
            RegionKind::Rom {
                data: vec![0u8; size].into_boxed_slice(),
            },
        )
    }

    pub fn map_mmio(
        &mut self,
        window: AddressWindow,
        handler: Box<dyn MmioHandler>,
    ) -> Result<(), MapError> {
        self.insert(window, RegionKind::Mmio { handler })
    }

    /// Host-side write into a mapped ROM region (firmware image installation).
    pub fn load_rom(&mut self, addr: u64, bytes: &[u8]) -> Result<(), MapError> {
        let err = MapError::NotRom {
            addr,
            len: bytes.len(),
        };
        let Some(region) = self.region_mut(addr) else {
            return Err(err);
        };
        let Some(offset) = region.window.offset_of(addr, bytes.len()) else {
            return Err(err);
        };
        let RegionKind::Rom { data } = &mut region.kind else {
            return Err(err);
        };
        let start = offset as usize;
        data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Returns `true` if `[addr, addr + len)` lies entirely inside one RAM window.
    pub fn is_ram(&self, addr: u64, len: usize) -> bool {
        self.region(addr).is_some_and(|region| {
            matches!(region.kind, RegionKind::Ram { .. })
                && region.window.offset_of(addr, len).is_some()
        })
    }

    fn insert(&mut self, window: AddressWindow, kind: RegionKind) -> Result<(), MapError> {
        if window.size == 0 {
            return Err(MapError::Empty { base: window.base });
        }
        if window.base.checked_add(window.size).is_none() {
            return Err(MapError::AddressOverflow {
                base: window.base,
                len: window.size,
            });
        }
        if let Some(existing) = self
            .regions
            .values()
            .find(|region| region.window.overlaps(&window))
        {
            return Err(MapError::Overlap {
                base: window.base,
                end: window.end(),
                existing_base: existing.window.base,
                existing_end: existing.window.end(),
            });
        }
        self.regions.insert(window.base, Region { window, kind });
        Ok(())
    }

    fn region(&self, addr: u64) -> Option<&Region> {
        self.regions
            .range(..=addr)
            .next_back()
            .map(|(_, region)| region)
            .filter(|region| region.window.contains(addr))
    }

    fn region_mut(&mut self, addr: u64) -> Option<&mut Region> {
        self.regions
            .range_mut(..=addr)
            .next_back()
            .map(|(_, region)| region)
            .filter(|region| region.window.contains(addr))
    }

    /// Length of the unmapped gap starting at `addr`, capped at `max`.
    fn gap_len(&self, addr: u64, max: usize) -> usize {
        let next = addr
            .checked_add(1)
            .and_then(|from| self.regions.range(from..).next())
            .map(|(base, _)| *base);
        match next {
            Some(base) => usize::try_from(base - addr).map_or(max, |gap| gap.min(max)),
            None => max,
        }
    }

    /// Performs a single access of `size` bytes (1..=8).
    pub fn read(&mut self, addr: u64, size: usize) -> u64 {
        debug_assert!((1..=8).contains(&size));
        let is_mmio = matches!(
            self.region(addr).map(|region| &region.kind),
            Some(RegionKind::Mmio { .. })
        );
        if !is_mmio {
            let mut buf = [0u8; 8];
            self.read_physical(addr, &mut buf[..size]);
            return u64::from_le_bytes(buf);
        }

        let Some(region) = self.region_mut(addr) else {
            return all_ones(size);
        };
        let window = region.window;
        let RegionKind::Mmio { handler } = &mut region.kind else {
            return all_ones(size);
        };
        match window.offset_of(addr, size) {
            Some(offset) if window.accepts_width(size) => handler.read(offset, size) & all_ones(size),
            _ => {
                trace!(addr, size, base = window.base, "rejected MMIO read");
                all_ones(size)
            }
        }
    }

    pub fn write(&mut self, addr: u64, size: usize, value: u64) {
        debug_assert!((1..=8).contains(&size));
        let is_mmio = matches!(
            self.region(addr).map(|region| &region.kind),
            Some(RegionKind::Mmio { .. })
        );
        if !is_mmio {
            let bytes = value.to_le_bytes();
            self.write_physical(addr, &bytes[..size]);
            return;
        }

        let Some(region) = self.region_mut(addr) else {
            return;
        };
        let window = region.window;
        let RegionKind::Mmio { handler } = &mut region.kind else {
            return;
        };
        match window.offset_of(addr, size) {
            Some(offset) if window.accepts_width(size) => {
                handler.write(offset, size, value & all_ones(size));
            }
            _ => trace!(addr, size, value, base = window.base, "rejected MMIO write"),
        }
    }

    /// Classifies the longest run starting at `addr` (at most `max` bytes) served by one target.
    fn span(&self, addr: u64, max: usize) -> Span {
        let Some(region) = self.region(addr) else {
            return Span::Unmapped(self.gap_len(addr, max));
        };
        let len = (region.window.end() - addr).min(max as u64) as usize;
        let offset = addr - region.window.base;
        match &region.kind {
            RegionKind::Ram { ram_offset } => Span::Ram {
                ram_addr: ram_offset + offset,
                len,
            },
            RegionKind::Rom { .. } => Span::Rom {
                base: region.window.base,
                offset: offset as usize,
                len,
            },
            RegionKind::Mmio { .. } => Span::Mmio,
        }
    }

    pub fn read_physical(&mut self, paddr: u64, dst: &mut [u8]) {
        let mut pos = 0usize;
        while pos < dst.len() {
            let Some(addr) = paddr.checked_add(pos as u64) else {
                dst[pos..].fill(0xFF);
                return;
            };
            pos += match self.span(addr, dst.len() - pos) {
                Span::Unmapped(len) => {
                    dst[pos..pos + len].fill(0xFF);
                    len
                }
                Span::Ram { ram_addr, len } => {
                    let out = &mut dst[pos..pos + len];
                    if self.ram.read_into(ram_addr, out).is_err() {
                        out.fill(0xFF);
                    }
                    len
                }
                Span::Rom { base, offset, len } => {
                    if let Some(Region {
                        kind: RegionKind::Rom { data },
                        ..
                    }) = self.regions.get(&base)
                    {
                        dst[pos..pos + len].copy_from_slice(&data[offset..offset + len]);
                    }
                    len
                }
                Span::Mmio => {
                    dst[pos] = self.read(addr, 1) as u8;
                    1
                }
            };
        }
    }

    pub fn write_physical(&mut self, paddr: u64, src: &[u8]) {
        let mut pos = 0usize;
        while pos < src.len() {
            let Some(addr) = paddr.checked_add(pos as u64) else {
                return;
            };
            pos += match self.span(addr, src.len() - pos) {
                Span::Unmapped(len) => len,
                Span::Ram { ram_addr, len } => {
                    if let Err(err) = self.ram.write_from(ram_addr, &src[pos..pos + len]) {
                        trace!(%err, addr, "dropped RAM write");
                    }
                    len
                }
                Span::Rom { len, .. } => {
                    trace!(addr, len, "dropped write to ROM");
                    len
                }
                Span::Mmio => {
                    self.write(addr, 1, u64::from(src[pos]));
                    1
                }
            };
        }
    }

    pub fn read_u8(&mut self, paddr: u64) -> u8 {
        self.read(paddr, 1) as u8
    }

    pub fn read_u16(&mut self, paddr: u64) -> u16 {
        self.read(paddr, 2) as u16
    }

    pub fn read_u32(&mut self, paddr: u64) -> u32 {
        self.read(paddr, 4) as u32
    }

    pub fn read_u64(&mut self, paddr: u64) -> u64 {
        self.read(paddr, 8)
    }

    pub fn write_u8(&mut self, paddr: u64, value: u8) {
        self.write(paddr, 1, u64::from(value));
    }

    pub fn write_u16(&mut self, paddr: u64, value: u16) {
        self.write(paddr, 2, u64::from(value));
    }

    pub fn write_u32(&mut self, paddr: u64, value: u32) {
        self.write(paddr, 4, u64::from(value));
    }

    pub fn write_u64(&mut self, paddr: u64, value: u64) {
        self.write(paddr, 8, value);
    }
}
