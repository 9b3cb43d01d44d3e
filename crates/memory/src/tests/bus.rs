use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;

use crate::{AddressWindow, DenseMemory, GuestMemory, MapError, MmioHandler, PhysicalMemoryBus};

#[derive(Default)]
struct RecordingMmio {
    reads: Vec<(u64, usize)>,
    writes: Vec<(u64, usize, u64)>,
    value: u64,
}

impl MmioHandler for RecordingMmio {
    fn read(&mut self, offset: u64, size: usize) -> u64 {
        self.reads.push((offset, size));
        self.value
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) {
        self.writes.push((offset, size, value));
    }
}

fn bus_with_ram(size: u64) -> PhysicalMemoryBus {
    PhysicalMemoryBus::new(Box::new(DenseMemory::new(size).unwrap()))
}

#[test]
fn ram_alias_shares_backing_store() {
    let mut bus = bus_with_ram(0x4000);
    bus.map_ram(0x0, 0x0, 0x1000).unwrap();
    bus.map_ram(0x8000_0000, 0x0, 0x4000).unwrap();

    bus.write_u32(0x10, 0xDEAD_BEEF);
    assert_eq!(bus.read_u32(0x8000_0010), 0xDEAD_BEEF);
    assert_eq!(bus.ram().read_u32_le(0x10).unwrap(), 0xDEAD_BEEF);

    bus.write_u16(0x8000_2000, 0x1234);
    assert_eq!(bus.ram().read_u16_le(0x2000).unwrap(), 0x1234);
    // Outside the low alias.
    assert_eq!(bus.read_u16(0x2000), 0xFFFF);
}

#[test]
fn rom_is_read_only_for_the_guest() {
    let mut bus = bus_with_ram(0x1000);
    bus.map_rom(0x1fc0_0000, 0x100).unwrap();
    bus.load_rom(0x1fc0_0004, &[0xAA, 0xBB]).unwrap();

    assert_eq!(bus.read_u16(0x1fc0_0004), 0xBBAA);
    bus.write_u16(0x1fc0_0004, 0x5555);
    assert_eq!(bus.read_u16(0x1fc0_0004), 0xBBAA);

    assert_eq!(
        bus.load_rom(0x1fc0_00ff, &[0, 0]),
        Err(MapError::NotRom {
            addr: 0x1fc0_00ff,
            len: 2
        })
    );
}

#[test]
fn mmio_receives_window_relative_offsets() {
    let dev = Rc::new(RefCell::new(RecordingMmio {
        value: 0x1122_3344,
        ..Default::default()
    }));
    let mut bus = bus_with_ram(0x1000);
    bus.map_mmio(AddressWindow::new(0x1fe0_0100, 0xE0), Box::new(dev.clone()))
        .unwrap();

    assert_eq!(bus.read_u32(0x1fe0_0108), 0x1122_3344);
    assert_eq!(bus.read_u8(0x1fe0_0100), 0x44);
    bus.write_u32(0x1fe0_010C, 7);

    let dev = dev.borrow();
    assert_eq!(dev.reads, vec![(8, 4), (0, 1)]);
    assert_eq!(dev.writes, vec![(0xC, 4, 7)]);
}

#[test]
fn width_violations_are_not_dispatched() {
    let dev = Rc::new(RefCell::new(RecordingMmio::default()));
    let mut bus = bus_with_ram(0x1000);
    bus.map_mmio(
        AddressWindow::new(0x1000_0000, 0x100).with_access(4, 4),
        Box::new(dev.clone()),
    )
    .unwrap();

    assert_eq!(bus.read_u16(0x1000_0000), 0xFFFF);
    bus.write_u8(0x1000_0000, 1);
    // Straddles the end of the window.
    assert_eq!(bus.read_u32(0x1000_00FE), 0xFFFF_FFFF);

    assert!(dev.borrow().reads.is_empty());
    assert!(dev.borrow().writes.is_empty());
}

#[test]
fn overlapping_mappings_are_rejected() {
    let mut bus = bus_with_ram(0x1000);
    bus.map_ram(0, 0, 0x1000).unwrap();
    let err = bus
        .map_mmio(
            AddressWindow::new(0x800, 0x100),
            Box::new(RecordingMmio::default()),
        )
        .unwrap_err();
    assert_eq!(
        err,
        MapError::Overlap {
            base: 0x800,
            end: 0x900,
            existing_base: 0,
            existing_end: 0x1000,
        }
    );
    assert!(matches!(
        bus.map_ram(0x10_0000, 0x800, 0x1000),
        Err(MapError::RamOutOfRange { .. })
    ));
    assert_eq!(bus.map_rom(0x2000, 0), Err(MapError::Empty { base: 0x2000 }));
}

#[test]
fn unmapped_reads_return_all_ones() {
    let mut bus = bus_with_ram(0x10);

    assert_eq!(bus.read_u8(0x1000), 0xFF);
    assert_eq!(bus.read_u16(0x1000), 0xFFFF);
    assert_eq!(bus.read_u32(0x1000), 0xFFFF_FFFF);
    assert_eq!(bus.read_u64(0x1000), 0xFFFF_FFFF_FFFF_FFFF);
}

#[test]
fn bulk_access_spans_region_boundaries() {
    let mut bus = bus_with_ram(0x2000);
    bus.map_ram(0x0, 0x0, 0x1000).unwrap();
    bus.map_rom(0x1000, 0x10).unwrap();
    bus.load_rom(0x1000, &[1, 2, 3, 4]).unwrap();

    bus.write_physical(0xFFE, &[0x11, 0x22, 0x33, 0x44]);
    let mut buf = [0u8; 6];
    bus.read_physical(0xFFE, &mut buf);
    assert_eq!(buf, [0x11, 0x22, 1, 2, 3, 4]);

    let mut tail = [0u8; 4];
    bus.read_physical(0x100E, &mut tail);
    assert_eq!(tail, [0, 0, 0xFF, 0xFF]);
}

proptest! {
    #[test]
    fn ram_roundtrips_through_either_alias(offset in 0u64..0xFF8, value: u64) {
        let mut bus = bus_with_ram(0x1000);
        bus.map_ram(0x0, 0x0, 0x1000).unwrap();
        bus.map_ram(0x8000_0000, 0x0, 0x1000).unwrap();

        bus.write_u64(offset, value);
        prop_assert_eq!(bus.read_u64(0x8000_0000 + offset), value);
    }
}
