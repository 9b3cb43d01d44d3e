use ls3_devices::pm::{pm_window, PowerManagementTrap, PM_CNTL_MODE, PM_MMIO_BASE};
use ls3_platform::lifecycle::{LifecycleLatch, LifecycleRequest};
use memory::{DenseMemory, PhysicalMemoryBus};

fn mapped_trap() -> (PhysicalMemoryBus, LifecycleLatch) {
    let latch = LifecycleLatch::new();
    let mut mem = PhysicalMemoryBus::new(Box::new(DenseMemory::new(0x1000).unwrap()));
    mem.map_mmio(
        pm_window(),
        Box::new(PowerManagementTrap::new(Box::new(latch.clone()))),
    )
    .unwrap();
    (mem, latch)
}

#[test]
fn reset_value_queues_exactly_one_reset() {
    let (mut mem, latch) = mapped_trap();
    mem.write_u8(PM_MMIO_BASE + PM_CNTL_MODE, 0x00);
    assert_eq!(latch.reset_requests(), 1);
    assert_eq!(latch.shutdown_requests(), 0);
    assert_eq!(latch.take(), Some(LifecycleRequest::Reset));
}

#[test]
fn shutdown_value_queues_exactly_one_shutdown() {
    let (mut mem, latch) = mapped_trap();
    mem.write_u8(PM_MMIO_BASE + PM_CNTL_MODE, 0xFF);
    assert_eq!(latch.reset_requests(), 0);
    assert_eq!(latch.shutdown_requests(), 1);
}

#[test]
fn other_values_and_offsets_are_ignored() {
    let (mut mem, latch) = mapped_trap();
    for value in [0x01u8, 0x7F, 0xFE] {
        mem.write_u8(PM_MMIO_BASE + PM_CNTL_MODE, value);
    }
    mem.write_u8(PM_MMIO_BASE, 0x00);
    mem.write_u8(PM_MMIO_BASE + 0xFF, 0xFF);

    assert_eq!(latch.peek(), None);
    assert_eq!(latch.reset_requests() + latch.shutdown_requests(), 0);
    assert_eq!(mem.read_u32(PM_MMIO_BASE + PM_CNTL_MODE), 0);
}

#[test]
fn wide_accesses_are_rejected() {
    let (mut mem, latch) = mapped_trap();
    mem.write_u64(PM_MMIO_BASE + PM_CNTL_MODE, 0xFF);
    assert_eq!(latch.peek(), None);
    assert_eq!(mem.read_u64(PM_MMIO_BASE + PM_CNTL_MODE), u64::MAX);

    mem.write_u32(PM_MMIO_BASE + PM_CNTL_MODE, 0xFF);
    assert_eq!(latch.take(), Some(LifecycleRequest::Shutdown));
}
