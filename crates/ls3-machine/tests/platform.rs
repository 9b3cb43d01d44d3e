mod common;

use common::*;
use ls3_devices::ls7a::HT1LO_PCICFG_BASE;
use ls3_devices::pci::{PciBdf, PciConfigSpace, PciDevice};
use ls3_machine::layout::{BIOS_BASE, BIOS_SIZE, FW_CONF_ADDR, HIGH_RAM_BASE};
use ls3_machine::vcpu::{MipsVcpu, CP0_STATUS_BEV, RESET_PC};
use ls3_machine::{Loongson3Machine, MachineConfig, MachineError};
use memory::GuestMemory;

#[test]
fn firmware_boot_writes_fw_config() {
    let dir = temp_dir();
    let bios: Vec<u8> = (0..64u8).collect();
    let machine = Loongson3Machine::new(MachineConfig {
        bios: Some(path_in(&dir, "bios_loongson3.bin", &bios)),
        cpu_count: 4,
        ..base_config()
    })
    .unwrap();

    assert!(machine.loader_params().is_none());
    assert!(machine.load_report().is_none());

    let mut mem = machine.memory();
    assert_eq!(mem.read_u64(FW_CONF_ADDR), 512 << 20);
    assert_eq!(mem.read_u32(FW_CONF_ADDR + 8), 300_000_000);
    assert_eq!(mem.read_u32(FW_CONF_ADDR + 12), 4);
    assert_eq!(mem.read_u32(FW_CONF_ADDR + 16), 800_000_000);
    assert_eq!(mem.read_u32(BIOS_BASE), 0x0302_0100);
    drop(mem);

    // No kernel: every vCPU stays in its power-on state.
    for i in 0..4 {
        let cpu = machine.vcpu(i).unwrap();
        assert_eq!(cpu.pc(), RESET_PC);
        assert_ne!(cpu.cp0_status() & CP0_STATUS_BEV, 0);
    }
}

#[test]
fn bios_errors() {
    let dir = temp_dir();
    let err = Loongson3Machine::new(MachineConfig {
        bios: Some(dir.path().join("missing.bin")),
        ..base_config()
    })
    .err()
    .unwrap();
    assert!(matches!(err, MachineError::BiosLoad { .. }));

    let huge = vec![0u8; BIOS_SIZE as usize + 1];
    let err = Loongson3Machine::new(MachineConfig {
        bios: Some(path_in(&dir, "huge.bin", &huge)),
        ..base_config()
    })
    .err()
    .unwrap();
    assert!(matches!(err, MachineError::BiosLoad { .. }));
}

#[test]
fn invalid_configs() {
    let err = Loongson3Machine::new(MachineConfig {
        ram_size_bytes: 128 << 20,
        ..base_config()
    })
    .err()
    .unwrap();
    assert!(matches!(err, MachineError::RamTooSmall { .. }));

    let err = Loongson3Machine::new(MachineConfig {
        cpu_count: 17,
        ..base_config()
    })
    .err()
    .unwrap();
    assert!(matches!(err, MachineError::InvalidCpuCount(17)));
}

#[test]
fn address_map() {
    let machine = Loongson3Machine::new(base_config()).unwrap();
    let mut mem = machine.memory();

    // The low window aliases the start of RAM.
    mem.write_u32(0x0000_1000, 0x1234_5678);
    assert_eq!(mem.read_u32(HIGH_RAM_BASE + 0x1000), 0x1234_5678);

    // RAM above 256 MiB is only visible through the high window.
    mem.write_u32(HIGH_RAM_BASE + 0x1800_0000, 0xCAFE_BABE);
    assert_eq!(mem.read_u32(HIGH_RAM_BASE + 0x1800_0000), 0xCAFE_BABE);
    assert_eq!(mem.ram().read_u32_le(0x1800_0000).unwrap(), 0xCAFE_BABE);

    // Past the end of RAM.
    assert_eq!(mem.read_u32(HIGH_RAM_BASE + (512 << 20)), 0xFFFF_FFFF);
}

#[test]
fn pci_config_through_extended_window() {
    let machine = Loongson3Machine::new(base_config()).unwrap();
    let mut mem = machine.memory();

    assert_eq!(mem.read_u32(HT1LO_PCICFG_BASE), 0x7A00_0014);

    // Bus 0, device 5: nothing there.
    let absent = HT1LO_PCICFG_BASE + (5 << 11);
    assert_eq!(mem.read_u32(absent), 0xFFFF_FFFF);
    // Bus 1.
    assert_eq!(mem.read_u32(HT1LO_PCICFG_BASE + (1 << 16)), 0xFFFF_FFFF);
}

struct Nic {
    config: PciConfigSpace,
}

impl PciDevice for Nic {
    fn config(&self) -> &PciConfigSpace {
        &self.config
    }

    fn config_mut(&mut self) -> &mut PciConfigSpace {
        &mut self.config
    }
}

#[test]
fn device_interrupts_reach_the_pic_and_reset_clears_them() {
    let mut machine = Loongson3Machine::new(base_config()).unwrap();

    let mut config = PciConfigSpace::new(0x8086, 0x100E);
    config.set_interrupt_pin(1);
    let bdf = machine
        .pci_bus()
        .borrow_mut()
        .add_device_auto(Box::new(Nic { config }))
        .unwrap();
    assert_eq!(bdf, PciBdf::new(0, 1, 0));

    // Slot 1, INTA -> line 5.
    machine.pci_bus().borrow_mut().set_intx_level(bdf, true);
    assert!(machine.pic().is_asserted(5));
    assert_eq!(machine.pic().asserted(), vec![5]);

    machine.reset();
    assert!(machine.pic().asserted().is_empty());
    assert_eq!(
        machine.memory().read_u32(HT1LO_PCICFG_BASE + (1 << 11)),
        0x100E_8086
    );
}

#[test]
fn bridge_config_survives_guest_writes_across_reset() {
    let mut machine = Loongson3Machine::new(base_config()).unwrap();
    {
        let mut mem = machine.memory();
        mem.write_u32(HT1LO_PCICFG_BASE + 0x10, 0xFFFF_FFFF);
        assert_eq!(mem.read_u32(HT1LO_PCICFG_BASE + 0x10), 0xFFFF_FFFF);
    }
    machine.reset();
    assert_eq!(machine.memory().read_u32(HT1LO_PCICFG_BASE + 0x10), 0);
}

#[test]
fn reset_order() {
    let machine = Loongson3Machine::new(base_config()).unwrap();
    let names: Vec<_> = machine.reset_handler_names().collect();
    assert_eq!(names, ["boot-images", "ls7a", "cpu0", "cpu1"]);
}
