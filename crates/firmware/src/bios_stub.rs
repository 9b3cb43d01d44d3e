//! Built-in boot ROM used when a kernel is loaded directly.
//!
//! The stub has three entry points:
//! - `0x000`: secondary CPU spin loop. Enables the coprocessors, sets BEV, then polls the
//!   per-core mailbox at `0x9000_0000_3FF0_1000` (offset `+0x20`) and jumps to the published
//!   function with `sp`/`gp`/`a1` loaded from the mailbox.
//! - `0x088`: reset, stores `0x00` to the PM control register.
//! - `0x0B0`: shutdown, stores `0xFF` to the PM control register.
//!
//! The reset and shutdown addresses are published in the boot info `efi_reset_system` table.

pub const BIOS_BASE: u64 = 0x1FC0_0000;
pub const BIOS_SIZE: u64 = 0x20_0000;

pub const RESET_STUB_OFFSET: u64 = 0x88;
pub const SHUTDOWN_STUB_OFFSET: u64 = 0xB0;

/// KSEG1 address of the reset entry.
pub const RESET_VECTOR: u64 = 0xFFFF_FFFF_A000_0000 | BIOS_BASE | RESET_STUB_OFFSET;
/// KSEG1 address of the shutdown entry.
pub const SHUTDOWN_VECTOR: u64 = 0xFFFF_FFFF_A000_0000 | BIOS_BASE | SHUTDOWN_STUB_OFFSET;

#[rustfmt::skip]
pub const BIOS_BOOT_STUB: [u32; 55] = [
    0x40086000, // mfc0  t0, CP0_STATUS
    0x240900E2, // li    t1, 0xe2
    0x01094025, // or    t0, t0, t1
    0x40886000, // mtc0  t0, CP0_STATUS
    0x00000000,
    0x40086000, // mfc0  t0, CP0_STATUS
    0x3C090040, // lui   t1, 0x40 (BEV)
    0x01094025, // or    t0, t0, t1
    0x40886000, // mtc0  t0, CP0_STATUS
    0x00000000,
    0x40806800, // mtc0  zero, CP0_CAUSE
    0x00000000,
    0x400A7801, // mfc0  t2, EBase
    0x314A00FF, // andi  t2, 0xff
    0x3C089000, // dli   t0, 0x900000003ff01000
    0x00084438,
    0x35083FF0,
    0x00084438,
    0x35081000,
    0x314B0003, // andi  t3, t2, 0x3 (core)
    0x000B5A00, // sll   t3, 8
    0x010B4025, // or    t0, t0, t3
    0x314C000C, // andi  t4, t2, 0xc (node)
    0x000C62BC, // dsll  t4, 42
    0x010C4025, // or    t0, t0, t4
    0xDD020020, // ld    v0, 0x20(t0)
    0x1040FFFE, // beqz  v0, -1
    0x00000000,
    0xDD1D0028, // ld    sp, 0x28(t0)
    0xDD1C0030, // ld    gp, 0x30(t0)
    0xDD050038, // ld    a1, 0x38(t0)
    0x00400008, // jr    v0
    0x00000000,
    0x1000FFFF, // b     .
    0x00000000,
    // reset
    0x3C0C9000, // dli   t0, 0x90000e0010080010
    0x358C0E00,
    0x000C6438,
    0x358C1008,
    0x000C6438,
    0x358C0010,
    0x240D0000, // li    t1, 0x00
    0xA18D0000, // sb    t1, (t0)
    0x1000FFFF, // b     .
    0x00000000,
    // shutdown
    0x3C0C9000, // dli   t0, 0x90000e0010080010
    0x358C0E00,
    0x000C6438,
    0x358C1008,
    0x000C6438,
    0x358C0010,
    0x240D00FF, // li    t1, 0xff
    0xA18D0000, // sb    t1, (t0)
    0x1000FFFF, // b     .
    0x00000000,
];

/// Little-endian byte image of [`BIOS_BOOT_STUB`].
pub fn boot_stub_image() -> Vec<u8> {
    BIOS_BOOT_STUB
        .iter()
        .flat_map(|word| word.to_le_bytes())
        .collect()
}
