//! EFI-loongson boot information tables.
//!
//! The tables are a `boot_params` header followed by seven records, each placed at the next
//! 64-byte aligned position after its predecessor. The header's `loongson_params` block stores
//! every record position as an offset relative to itself, so the guest can walk the chain
//! without knowing where the blob was loaded.

pub mod records;

use thiserror::Error;
use tracing::debug;

use records::{
    CpuInfo, LoongsonParams, MemoryMapEntry, UartDevice, BOARD_DEVICES_SIZE, BOOT_PARAMS_SIZE,
    CPU_INFO_SIZE, HIGH_MEMORY_BASE, INTERFACE_INFO_SIZE, IRQ_ROUTING_SIZE, LOONGSON_PARAMS_OFFSET,
    MEMORY_MAP_SIZE, MEM_FREQ_HZ, SPECIAL_ATTRIBUTE_SIZE, SYSTEM_INFO_SIZE, SYSTEM_RAM_HIGH,
    SYSTEM_RAM_LOW, UART_BASE, UART_CLOCK_HZ,
};

pub const BOOT_INFO_ALIGN: usize = 64;
pub const LOW_MEMORY_LIMIT: u64 = 256 << 20;

pub const fn align64(value: usize) -> usize {
    (value + BOOT_INFO_ALIGN - 1) & !(BOOT_INFO_ALIGN - 1)
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BootInfoError {
    #[error("boot info does not fit: need {needed:#x} bytes, have {capacity:#x}")]
    Overflow { needed: usize, capacity: usize },
}

/// Bump allocator over the params buffer. Every allocation starts at the cursor and moves it to
/// the next 64-byte boundary past the allocation.
pub struct BootInfoArena<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}

impl<'a> BootInfoArena<'a> {
    pub fn new(buf: &'a mut [u8], cursor: usize) -> Self {
        Self { buf, cursor }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Reserves `len` zeroed bytes. Returns the start offset and the slice.
    pub fn append(&mut self, len: usize) -> Result<(usize, &mut [u8]), BootInfoError> {
        let start = self.cursor;
        let needed = start + len;
        if needed > self.buf.len() {
            return Err(BootInfoError::Overflow {
                needed,
                capacity: self.buf.len(),
            });
        }
        self.cursor = start + align64(len);
        let slot = &mut self.buf[start..needed];
        slot.fill(0);
        Ok((start, slot))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootInfoConfig {
    pub ram_size: u64,
    pub cpu_count: u32,
    pub cpu_clock_hz: u32,
}

/// RAM split between the low window (below 256 MiB) and the high window at `0x9000_0000`, both
/// in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySplit {
    pub low_mib: u32,
    pub high_mib: u32,
}

impl MemorySplit {
    pub fn from_ram_size(ram_size: u64) -> Self {
        let total_mib = ram_size >> 20;
        if ram_size <= LOW_MEMORY_LIMIT {
            Self {
                low_mib: total_mib as u32,
                high_mib: 0,
            }
        } else {
            Self {
                low_mib: (LOW_MEMORY_LIMIT >> 20) as u32,
                high_mib: (total_mib - (LOW_MEMORY_LIMIT >> 20)) as u32,
            }
        }
    }

    pub fn memory_map(&self) -> [MemoryMapEntry; 2] {
        [
            MemoryMapEntry {
                node_id: 0,
                mem_type: SYSTEM_RAM_LOW,
                mem_start: 0,
                mem_size: self.low_mib,
            },
            MemoryMapEntry {
                node_id: 0,
                mem_type: SYSTEM_RAM_HIGH,
                mem_start: HIGH_MEMORY_BASE,
                mem_size: self.high_mib,
            },
        ]
    }
}

/// Records in the order they are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootRecord {
    MemoryMap,
    Cpu,
    System,
    IrqRouting,
    Interface,
    BoardDevices,
    Special,
}

impl BootRecord {
    pub const CHAIN: [BootRecord; 7] = [
        BootRecord::MemoryMap,
        BootRecord::Cpu,
        BootRecord::System,
        BootRecord::IrqRouting,
        BootRecord::Interface,
        BootRecord::BoardDevices,
        BootRecord::Special,
    ];

    pub const fn size(self) -> usize {
        match self {
            BootRecord::MemoryMap => MEMORY_MAP_SIZE,
            BootRecord::Cpu => CPU_INFO_SIZE,
            BootRecord::System => SYSTEM_INFO_SIZE,
            BootRecord::IrqRouting => IRQ_ROUTING_SIZE,
            BootRecord::Interface => INTERFACE_INFO_SIZE,
            BootRecord::BoardDevices => BOARD_DEVICES_SIZE,
            BootRecord::Special => SPECIAL_ATTRIBUTE_SIZE,
        }
    }

    fn encode(self, out: &mut [u8], cfg: &BootInfoConfig) {
        match self {
            BootRecord::MemoryMap => {
                let split = MemorySplit::from_ram_size(cfg.ram_size);
                records::encode_memory_map(out, MEM_FREQ_HZ, &split.memory_map());
            }
            BootRecord::Cpu => records::encode_cpu_info(
                out,
                &CpuInfo::loongson_3a(cfg.cpu_count, cfg.cpu_clock_hz),
            ),
            BootRecord::System => records::encode_system_info(
                out,
                &[UartDevice {
                    iotype: 2,
                    uartclk: UART_CLOCK_HZ,
                    int_offset: 2,
                    uart_base: UART_BASE,
                }],
            ),
            BootRecord::IrqRouting => records::encode_irq_routing(out),
            BootRecord::Interface => records::encode_interface_info(out),
            BootRecord::BoardDevices => records::encode_board_devices(out),
            BootRecord::Special => records::encode_special_attribute(out),
        }
    }
}

/// Where each part of the tables landed, as offsets into the buffer passed to
/// [`build_boot_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootInfoLayout {
    pub header: usize,
    /// Position of the `loongson_params` block; record offsets are relative to it.
    pub anchor: usize,
    pub params: LoongsonParams,
    /// First byte after the last record (64-byte aligned).
    pub end: usize,
}

impl BootInfoLayout {
    /// Absolute buffer offset of `record`.
    pub fn record_offset(&self, record: BootRecord) -> usize {
        let rel = match record {
            BootRecord::MemoryMap => self.params.memory_offset,
            BootRecord::Cpu => self.params.cpu_offset,
            BootRecord::System => self.params.system_offset,
            BootRecord::IrqRouting => self.params.irq_offset,
            BootRecord::Interface => self.params.interface_offset,
            BootRecord::BoardDevices => self.params.boarddev_offset,
            BootRecord::Special => self.params.special_offset,
        };
        self.anchor + rel as usize
    }
}

/// Writes the header at `header` and the record chain after it.
pub fn build_boot_info(
    buf: &mut [u8],
    header: usize,
    cfg: &BootInfoConfig,
) -> Result<BootInfoLayout, BootInfoError> {
    let anchor = header + LOONGSON_PARAMS_OFFSET;
    let mut arena = BootInfoArena::new(buf, header);
    arena.append(BOOT_PARAMS_SIZE)?;

    let mut params = LoongsonParams::default();
    for record in BootRecord::CHAIN {
        let (start, slot) = arena.append(record.size())?;
        record.encode(slot, cfg);
        let rel = (start - anchor) as u64;
        match record {
            BootRecord::MemoryMap => params.memory_offset = rel,
            BootRecord::Cpu => params.cpu_offset = rel,
            BootRecord::System => params.system_offset = rel,
            BootRecord::IrqRouting => params.irq_offset = rel,
            BootRecord::Interface => params.interface_offset = rel,
            BootRecord::BoardDevices => params.boarddev_offset = rel,
            BootRecord::Special => params.special_offset = rel,
        }
    }
    let end = arena.cursor();

    records::encode_boot_params_header(&mut buf[header..header + BOOT_PARAMS_SIZE], &params);
    debug!(header, end, "built boot info tables");

    Ok(BootInfoLayout {
        header,
        anchor,
        params,
        end,
    })
}
