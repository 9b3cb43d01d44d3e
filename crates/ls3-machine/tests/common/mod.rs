#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use ls3_machine::MachineConfig;
use tempfile::{NamedTempFile, TempDir};

pub const KSEG0: u64 = 0xFFFF_FFFF_8000_0000;

pub struct Segment {
    pub paddr: u64,
    pub data: Vec<u8>,
    pub mem_size: u64,
}

fn put(out: &mut [u8], off: usize, bytes: &[u8]) {
    out[off..off + bytes.len()].copy_from_slice(bytes);
}

/// Builds a little-endian ELF64 MIPS executable with one `PT_LOAD` per segment. Segment
/// addresses are given as KSEG0 virtual addresses in both `p_vaddr` and `p_paddr`.
pub fn elf64_mips(entry: u64, segments: &[Segment]) -> Vec<u8> {
    let ph_off = 64usize;
    let ph_size = 56usize;
    let mut data_off = ph_off + ph_size * segments.len();
    let mut out = vec![0u8; data_off];

    put(&mut out, 0, &[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]);
    put(&mut out, 16, &2u16.to_le_bytes()); // ET_EXEC
    put(&mut out, 18, &8u16.to_le_bytes()); // EM_MIPS
    put(&mut out, 20, &1u32.to_le_bytes());
    put(&mut out, 24, &entry.to_le_bytes());
    put(&mut out, 32, &(ph_off as u64).to_le_bytes());
    put(&mut out, 52, &64u16.to_le_bytes());
    put(&mut out, 54, &(ph_size as u16).to_le_bytes());
    put(&mut out, 56, &(segments.len() as u16).to_le_bytes());
    put(&mut out, 58, &64u16.to_le_bytes());

    for (i, seg) in segments.iter().enumerate() {
        let ph = ph_off + i * ph_size;
        let addr = KSEG0 | seg.paddr;
        put(&mut out, ph, &1u32.to_le_bytes()); // PT_LOAD
        put(&mut out, ph + 4, &7u32.to_le_bytes());
        put(&mut out, ph + 8, &(data_off as u64).to_le_bytes());
        put(&mut out, ph + 16, &addr.to_le_bytes());
        put(&mut out, ph + 24, &addr.to_le_bytes());
        put(&mut out, ph + 32, &(seg.data.len() as u64).to_le_bytes());
        put(&mut out, ph + 40, &seg.mem_size.to_le_bytes());
        put(&mut out, ph + 48, &0x1000u64.to_le_bytes());
        data_off += seg.data.len();
    }
    for seg in segments {
        out.extend_from_slice(&seg.data);
    }
    out
}

/// Little-endian ELF32 MIPS executable with a single `PT_LOAD`.
pub fn elf32_mips(entry: u32, paddr: u32, data: &[u8], mem_size: u32) -> Vec<u8> {
    let ph_off = 52usize;
    let data_off = ph_off + 32;
    let mut out = vec![0u8; data_off];

    put(&mut out, 0, &[0x7F, b'E', b'L', b'F', 1, 1, 1, 0]);
    put(&mut out, 16, &2u16.to_le_bytes());
    put(&mut out, 18, &8u16.to_le_bytes());
    put(&mut out, 20, &1u32.to_le_bytes());
    put(&mut out, 24, &entry.to_le_bytes());
    put(&mut out, 28, &(ph_off as u32).to_le_bytes());
    put(&mut out, 40, &52u16.to_le_bytes());
    put(&mut out, 42, &32u16.to_le_bytes());
    put(&mut out, 44, &1u16.to_le_bytes());
    put(&mut out, 46, &40u16.to_le_bytes());

    let addr = 0x8000_0000 | paddr;
    put(&mut out, ph_off, &1u32.to_le_bytes());
    put(&mut out, ph_off + 4, &(data_off as u32).to_le_bytes());
    put(&mut out, ph_off + 8, &addr.to_le_bytes());
    put(&mut out, ph_off + 12, &addr.to_le_bytes());
    put(&mut out, ph_off + 16, &(data.len() as u32).to_le_bytes());
    put(&mut out, ph_off + 20, &mem_size.to_le_bytes());
    put(&mut out, ph_off + 24, &7u32.to_le_bytes());
    put(&mut out, ph_off + 28, &0x1000u32.to_le_bytes());
    out.extend_from_slice(data);
    out
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// Kernel image used by most tests: 16 bytes of text at 2 MiB followed by bss.
pub fn small_kernel() -> Vec<u8> {
    elf64_mips(
        KSEG0 | 0x0020_0000,
        &[Segment {
            paddr: 0x0020_0000,
            data: (0u8..16).collect(),
            mem_size: 0x100,
        }],
    )
}

pub fn base_config() -> MachineConfig {
    MachineConfig {
        ram_size_bytes: 512 << 20,
        cpu_count: 2,
        bios: None,
        cpu_clock_hz: Some(800_000_000),
        export_env: false,
        ..Default::default()
    }
}

pub fn temp_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

pub fn path_in(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
