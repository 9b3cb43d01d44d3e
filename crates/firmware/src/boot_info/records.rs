//! Byte layouts of the EFI-loongson records.
//!
//! Every record is little-endian. Records marked packed in the guest ABI have no padding between
//! fields; `resource_loongson`, `board_devices` and `loongson_special_attribute` use natural
//! alignment. Field offsets are noted next to each write as `name (type) @ offset`.

use crate::bios_stub::{RESET_VECTOR, SHUTDOWN_VECTOR};

pub const MAX_MEMORY_MAP_ENTRIES: usize = 128;
pub const MAX_UARTS: usize = 64;
pub const MAX_SENSORS: usize = 64;
pub const MAX_RESOURCES: usize = 128;

pub const MEMORY_MAP_ENTRY_SIZE: usize = 24;
pub const MEMORY_MAP_SIZE: usize = 10 + MAX_MEMORY_MAP_ENTRIES * MEMORY_MAP_ENTRY_SIZE;
pub const CPU_INFO_SIZE: usize = 90;
pub const UART_DEVICE_SIZE: usize = 20;
pub const SENSOR_DEVICE_SIZE: usize = 120;
pub const SYSTEM_INFO_SIZE: usize = 9076;
pub const IRQ_ROUTING_SIZE: usize = 84;
pub const INTERFACE_INFO_SIZE: usize = 69;
pub const RESOURCE_SIZE: usize = 88;
pub const BOARD_DEVICES_SIZE: usize = 72 + MAX_RESOURCES * RESOURCE_SIZE;
pub const SPECIAL_ATTRIBUTE_SIZE: usize = 72 + MAX_RESOURCES * RESOURCE_SIZE;

pub const LOONGSON_PARAMS_SIZE: usize = 56;
pub const SMBIOS_TABLES_SIZE: usize = 16 + LOONGSON_PARAMS_SIZE;
pub const EFI_LOONGSON_SIZE: usize = 112;
pub const RESET_SYSTEM_SIZE: usize = 40;
pub const BOOT_PARAMS_SIZE: usize = EFI_LOONGSON_SIZE + RESET_SYSTEM_SIZE;

/// Offset of `smbios_tables` inside `efi_loongson`.
const SMBIOS_OFFSET: usize = 24;
/// Offset of `loongson_params` inside `boot_params`; record offsets are relative to it.
pub const LOONGSON_PARAMS_OFFSET: usize = SMBIOS_OFFSET + 16;

pub const MEM_FREQ_HZ: u32 = 300_000_000;
pub const LOONGSON_3A_CPUTYPE: u32 = 0x300;
pub const LOONGSON_3A_PRID: u32 = 0x14C000;
pub const UART_BASE: u64 = 0x1FE0_01E0;
pub const UART_CLOCK_HZ: u32 = 25_000_000;
pub const PCI_MEM_BASE: u64 = 0x4000_0000;
pub const PCI_MEM_SIZE: u64 = 0x4000_0000;
pub const PCI_IO_BASE: u64 = 0x1800_0000;

pub const INTERFACE_DESCRIPTION: &str = "UEFI_Version_v1.0";
pub const BOARD_NAME: &str = "Loongson-3A-VIRT-1w-V1.00-demo";
pub const SPECIAL_NAME: &str = "2014-09-11";

/// Memory type of [`MemoryMapEntry`] describing RAM below 256 MiB.
pub const SYSTEM_RAM_LOW: u32 = 1;
/// Memory type of [`MemoryMapEntry`] describing RAM above 256 MiB.
pub const SYSTEM_RAM_HIGH: u32 = 2;
pub const HIGH_MEMORY_BASE: u64 = 0x9000_0000;

#[inline]
fn put(out: &mut [u8], offset: usize, bytes: &[u8]) {
    out[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Copies `s` into a NUL-terminated fixed-size field, truncating if needed.
fn put_cstr(out: &mut [u8], offset: usize, field_len: usize, s: &str) {
    let len = s.len().min(field_len - 1);
    put(out, offset, &s.as_bytes()[..len]);
    out[offset + len..offset + field_len].fill(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMapEntry {
    pub node_id: u32,
    pub mem_type: u32,
    pub mem_start: u64,
    /// Size in MiB.
    pub mem_size: u32,
}

pub fn encode_memory_map(out: &mut [u8], mem_freq: u32, entries: &[MemoryMapEntry]) {
    assert!(entries.len() <= MAX_MEMORY_MAP_ENTRIES);
    put(out, 2, &(entries.len() as u32).to_le_bytes()); // nr_map (u32) @ 2
    put(out, 6, &mem_freq.to_le_bytes()); // mem_freq (u32) @ 6
    for (i, entry) in entries.iter().enumerate() {
        let base = 10 + i * MEMORY_MAP_ENTRY_SIZE;
        put(out, base, &entry.node_id.to_le_bytes());
        put(out, base + 4, &entry.mem_type.to_le_bytes());
        put(out, base + 8, &entry.mem_start.to_le_bytes());
        put(out, base + 16, &entry.mem_size.to_le_bytes());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuInfo {
    pub processor_id: u32,
    pub cputype: u32,
    pub total_node: u32,
    pub cpu_startup_core_id: u16,
    pub cpu_clock_freq: u32,
    pub nr_cpus: u32,
}

impl CpuInfo {
    pub fn loongson_3a(nr_cpus: u32, cpu_clock_freq: u32) -> Self {
        Self {
            processor_id: LOONGSON_3A_PRID,
            cputype: LOONGSON_3A_CPUTYPE,
            total_node: (nr_cpus + 3) / 4,
            cpu_startup_core_id: 0,
            cpu_clock_freq,
            nr_cpus,
        }
    }
}

pub fn encode_cpu_info(out: &mut [u8], info: &CpuInfo) {
    put(out, 2, &info.processor_id.to_le_bytes()); // processor_id (u32) @ 2
    put(out, 6, &info.cputype.to_le_bytes()); // cputype (u32) @ 6
    put(out, 10, &info.total_node.to_le_bytes()); // total_node (u32) @ 10
    put(out, 14, &info.cpu_startup_core_id.to_le_bytes()); // cpu_startup_core_id (u16) @ 14
    put(out, 16, &0u16.to_le_bytes()); // reserved_cores_mask (u16) @ 16
    put(out, 18, &info.cpu_clock_freq.to_le_bytes()); // cpu_clock_freq (u32) @ 18
    put(out, 22, &info.nr_cpus.to_le_bytes()); // nr_cpus (u32) @ 22
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartDevice {
    pub iotype: u32,
    pub uartclk: u32,
    pub int_offset: u32,
    pub uart_base: u64,
}

pub fn encode_system_info(out: &mut [u8], uarts: &[UartDevice]) {
    assert!(uarts.len() <= MAX_UARTS);
    put(out, 2, &0u32.to_le_bytes()); // ccnuma_smp (u32) @ 2
    put(out, 6, &1u32.to_le_bytes()); // sing_double_channel (u32) @ 6
    put(out, 10, &(uarts.len() as u32).to_le_bytes()); // nr_uarts (u32) @ 10
    for (i, uart) in uarts.iter().enumerate() {
        let base = 14 + i * UART_DEVICE_SIZE;
        put(out, base, &uart.iotype.to_le_bytes());
        put(out, base + 4, &uart.uartclk.to_le_bytes());
        put(out, base + 8, &uart.int_offset.to_le_bytes());
        put(out, base + 12, &uart.uart_base.to_le_bytes());
    }
    // nr_sensors (u32) @ 1294, sensors @ 1298, EC/TCM/workarounds/of_dtb_addr @ 8978.. stay zero.
}

pub fn encode_irq_routing(out: &mut [u8]) {
    put(out, 16, &0u32.to_le_bytes()); // PIC_type (u32) @ 16
    put(out, 36, &0u32.to_le_bytes()); // node_id (u32) @ 36
    put(out, 40, &PCI_MEM_BASE.to_le_bytes()); // pci_mem_start_addr (u64) @ 40
    put(out, 48, &(PCI_MEM_BASE + PCI_MEM_SIZE - 1).to_le_bytes()); // pci_mem_end_addr (u64) @ 48
    put(out, 56, &PCI_IO_BASE.to_le_bytes()); // pci_io_start_addr (u64) @ 56
    put(out, 80, &64u16.to_le_bytes()); // dma_mask_bits (u16) @ 80
}

pub fn encode_interface_info(out: &mut [u8]) {
    put(out, 0, &1u16.to_le_bytes()); // vers (u16) @ 0
    put_cstr(out, 5, 64, INTERFACE_DESCRIPTION); // description[64] @ 5
}

pub fn encode_board_devices(out: &mut [u8]) {
    put_cstr(out, 0, 64, BOARD_NAME); // name[64] @ 0
    put(out, 64, &0u32.to_le_bytes()); // num_resources (u32) @ 64
}

pub fn encode_special_attribute(out: &mut [u8]) {
    put_cstr(out, 2, 64, SPECIAL_NAME); // special_name[64] @ 2
}

/// Record offsets stored in `loongson_params`, relative to the `loongson_params` block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoongsonParams {
    pub memory_offset: u64,
    pub cpu_offset: u64,
    pub system_offset: u64,
    pub irq_offset: u64,
    pub interface_offset: u64,
    pub special_offset: u64,
    pub boarddev_offset: u64,
}

/// Encodes the `boot_params` header (`efi_loongson` followed by `efi_reset_system`).
pub fn encode_boot_params_header(out: &mut [u8], lp: &LoongsonParams) {
    // efi_loongson: mps/acpi/acpi20 (u64) @ 0/8/16 stay zero.
    put(out, SMBIOS_OFFSET, &1u16.to_le_bytes()); // smbios.vers (u16) @ 24
    put(out, SMBIOS_OFFSET + 8, &0u64.to_le_bytes()); // smbios.vga_bios (u64) @ 32

    let lp_base = LOONGSON_PARAMS_OFFSET;
    put(out, lp_base, &lp.memory_offset.to_le_bytes());
    put(out, lp_base + 8, &lp.cpu_offset.to_le_bytes());
    put(out, lp_base + 16, &lp.system_offset.to_le_bytes());
    put(out, lp_base + 24, &lp.irq_offset.to_le_bytes());
    put(out, lp_base + 32, &lp.interface_offset.to_le_bytes());
    put(out, lp_base + 40, &lp.special_offset.to_le_bytes());
    put(out, lp_base + 48, &lp.boarddev_offset.to_le_bytes());
    // sal_systab (u64) @ 96, boot_info (u64) @ 104 stay zero.

    let reset = EFI_LOONGSON_SIZE;
    put(out, reset, &RESET_VECTOR.to_le_bytes()); // ResetCold (u64) @ 112
    put(out, reset + 8, &RESET_VECTOR.to_le_bytes()); // ResetWarm (u64) @ 120
    put(out, reset + 24, &SHUTDOWN_VECTOR.to_le_bytes()); // Shutdown (u64) @ 136
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sizes() {
        assert_eq!(MEMORY_MAP_SIZE, 3082);
        assert_eq!(BOARD_DEVICES_SIZE, 11336);
        assert_eq!(SPECIAL_ATTRIBUTE_SIZE, 11336);
        assert_eq!(SMBIOS_TABLES_SIZE, 72);
        assert_eq!(EFI_LOONGSON_SIZE, SMBIOS_OFFSET + SMBIOS_TABLES_SIZE + 16);
        assert_eq!(BOOT_PARAMS_SIZE, 152);
        assert_eq!(
            SYSTEM_INFO_SIZE,
            14 + MAX_UARTS * UART_DEVICE_SIZE + 4 + MAX_SENSORS * SENSOR_DEVICE_SIZE + 1 + 32 + 8 + 1 + 32 + 8 + 8 + 8
        );
    }

    #[test]
    fn cpu_info_layout() {
        let mut out = [0u8; CPU_INFO_SIZE];
        encode_cpu_info(&mut out, &CpuInfo::loongson_3a(5, 400_000_000));
        assert_eq!(u32::from_le_bytes(out[2..6].try_into().unwrap()), 0x14C000);
        assert_eq!(u32::from_le_bytes(out[6..10].try_into().unwrap()), 0x300);
        assert_eq!(u32::from_le_bytes(out[10..14].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(out[18..22].try_into().unwrap()), 400_000_000);
        assert_eq!(u32::from_le_bytes(out[22..26].try_into().unwrap()), 5);
    }

    #[test]
    fn system_info_uart() {
        let mut out = vec![0u8; SYSTEM_INFO_SIZE];
        encode_system_info(
            &mut out,
            &[UartDevice {
                iotype: 2,
                uartclk: UART_CLOCK_HZ,
                int_offset: 2,
                uart_base: UART_BASE,
            }],
        );
        assert_eq!(u32::from_le_bytes(out[6..10].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(out[10..14].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(out[14..18].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(out[18..22].try_into().unwrap()), 25_000_000);
        assert_eq!(u32::from_le_bytes(out[22..26].try_into().unwrap()), 2);
        assert_eq!(u64::from_le_bytes(out[26..34].try_into().unwrap()), 0x1FE0_01E0);
        assert!(out[34..].iter().all(|b| *b == 0));
    }

    #[test]
    fn irq_routing_layout() {
        let mut out = [0u8; IRQ_ROUTING_SIZE];
        encode_irq_routing(&mut out);
        assert_eq!(u64::from_le_bytes(out[40..48].try_into().unwrap()), 0x4000_0000);
        assert_eq!(u64::from_le_bytes(out[48..56].try_into().unwrap()), 0x7FFF_FFFF);
        assert_eq!(u64::from_le_bytes(out[56..64].try_into().unwrap()), 0x1800_0000);
        assert_eq!(u64::from_le_bytes(out[64..72].try_into().unwrap()), 0);
        assert_eq!(u16::from_le_bytes(out[80..82].try_into().unwrap()), 64);
    }

    #[test]
    fn strings_are_nul_terminated() {
        let mut out = [0xAAu8; INTERFACE_INFO_SIZE];
        encode_interface_info(&mut out);
        assert_eq!(&out[5..5 + 17], b"UEFI_Version_v1.0");
        assert_eq!(out[5 + 17], 0);
        assert!(out[5 + 17..].iter().all(|b| *b == 0));

        let mut special = vec![0u8; SPECIAL_ATTRIBUTE_SIZE];
        encode_special_attribute(&mut special);
        assert_eq!(&special[2..12], b"2014-09-11");
    }
}
