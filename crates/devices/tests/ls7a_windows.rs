use std::cell::RefCell;
use std::rc::Rc;

use ls3_devices::ls7a::{
    Ls7aHostBridge, HT1LO_PCICFG_BASE, LS7A_INTERNAL_REG_BASE, LS7A_PCICONFIG_BASE,
};
use ls3_devices::pci::{PciBdf, PciConfigSpace, PciDevice};
use ls3_platform::interrupts::LegacyIrqLines;
use memory::{DenseMemory, PhysicalMemoryBus};

struct NicStub {
    config: PciConfigSpace,
}

impl NicStub {
    fn new() -> Self {
        let mut config = PciConfigSpace::new(0x8086, 0x100E);
        config.set_interrupt_pin(1);
        config.set_wmask_u8(PciConfigSpace::INTERRUPT_LINE_OFFSET, 0xFF);
        Self { config }
    }
}

impl PciDevice for NicStub {
    fn config(&self) -> &PciConfigSpace {
        &self.config
    }

    fn config_mut(&mut self) -> &mut PciConfigSpace {
        &mut self.config
    }
}

fn platform() -> (PhysicalMemoryBus, Ls7aHostBridge, Rc<RefCell<LegacyIrqLines>>) {
    let pic = Rc::new(RefCell::new(LegacyIrqLines::new()));
    let bridge = Ls7aHostBridge::new(Box::new(pic.clone()));
    let mut mem = PhysicalMemoryBus::new(Box::new(DenseMemory::new(0x1000).unwrap()));
    bridge.map_bridge_windows(&mut mem).unwrap();
    bridge.map_extended_config_window(&mut mem).unwrap();
    (mem, bridge, pic)
}

#[test]
fn extended_window_reaches_bridge_identity() {
    let (mut mem, _bridge, _) = platform();
    assert_eq!(mem.read_u32(HT1LO_PCICFG_BASE), 0x7A00_0014);
    assert_eq!(mem.read_u16(HT1LO_PCICFG_BASE + 0x0A), 0x0600);
    assert_eq!(mem.read_u8(HT1LO_PCICFG_BASE + 0x0E), 0x80);
    // Short-form fold: bit 24 set keeps 16 bits.
    assert_eq!(mem.read_u32(HT1LO_PCICFG_BASE + 0x0100_0000), 0x7A00_0014);
}

#[test]
fn absent_function_reads_all_ones() {
    let (mut mem, _bridge, _) = platform();
    // Bus 0, device 3.
    let addr = HT1LO_PCICFG_BASE + (3 << 11);
    assert_eq!(mem.read_u32(addr), 0xFFFF_FFFF);
    assert_eq!(mem.read_u16(addr), 0xFFFF);
    assert_eq!(mem.read_u8(addr), 0xFF);
    // Bus 1 has nothing behind it.
    assert_eq!(mem.read_u32(HT1LO_PCICFG_BASE + (1 << 16)), 0xFFFF_FFFF);
}

#[test]
fn short_window_is_the_bridge_function() {
    let (mut mem, bridge, _) = platform();
    assert_eq!(mem.read_u32(LS7A_PCICONFIG_BASE), 0x7A00_0014);
    assert_eq!(mem.read_u32(LS7A_PCICONFIG_BASE + 0x1C), 0x0000_0004);

    mem.write_u32(LS7A_PCICONFIG_BASE + 0x10, 0xFFFF_FFFF);
    assert_eq!(mem.read_u32(HT1LO_PCICFG_BASE + 0x10), 0xFFFF_FFFF);
    // Narrow accesses are rejected by the window.
    assert_eq!(mem.read_u16(LS7A_PCICONFIG_BASE), 0xFFFF);

    bridge.reset();
    assert_eq!(mem.read_u32(LS7A_PCICONFIG_BASE + 0x10), 0);
}

#[test]
fn register_window_reads_zero_and_ignores_writes() {
    let (mut mem, bridge, _) = platform();
    mem.write_u32(LS7A_INTERNAL_REG_BASE + 0x20, 0xDEAD_BEEF);
    assert_eq!(mem.read_u32(LS7A_INTERNAL_REG_BASE + 0x20), 0);
    assert_eq!(mem.read_u8(LS7A_INTERNAL_REG_BASE), 0xFF);
    assert_eq!(bridge.register_bank().borrow().reg(8), Some(0));
}

#[test]
fn register_window_rejects_misaligned_words() {
    let (mut mem, _, _) = platform();
    assert_eq!(mem.read_u32(LS7A_INTERNAL_REG_BASE + 0x4), 0);
    assert_eq!(mem.read_u32(LS7A_INTERNAL_REG_BASE + 0x2), 0xFFFF_FFFF);
    assert_eq!(mem.read_u32(LS7A_INTERNAL_REG_BASE + 0x7), 0xFFFF_FFFF);
}

#[test]
fn device_intx_reaches_the_pic_through_the_swizzle() {
    let (mut mem, bridge, pic) = platform();
    let bdf = bridge
        .bus()
        .borrow_mut()
        .add_device_auto(Box::new(NicStub::new()))
        .unwrap();
    assert_eq!(bdf, PciBdf::new(0, 1, 0));

    let cfg_base = HT1LO_PCICFG_BASE + (u64::from(bdf.devfn()) << 8);
    assert_eq!(mem.read_u32(cfg_base), 0x100E_8086);
    assert_eq!(mem.read_u8(cfg_base + 0x3D), 1);

    // Slot 1, INTA#: (1 + 1) % 8 = 2 -> line 5.
    bridge.bus().borrow_mut().set_intx_level(bdf, true);
    assert_eq!(pic.borrow().asserted(), vec![5]);
    bridge.bus().borrow_mut().set_intx_level(bdf, false);
    assert!(pic.borrow().asserted().is_empty());
}
