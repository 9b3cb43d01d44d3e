//! Firmware-side data the Loongson-3 platform hands to a directly booted kernel: the
//! EFI-loongson boot information tables, the argv/environment parameter blob, the BIOS boot stub
//! and the `fw_config` block used when booting through a BIOS image.

#![forbid(unsafe_code)]

pub mod bios_stub;
pub mod boot_info;
pub mod bootparam;
pub mod fw_config;
pub mod host_cpu;
