use std::cell::{Ref, RefCell, RefMut};
use std::path::Path;
use std::rc::Rc;

use firmware::bios_stub::boot_stub_image;
use firmware::fw_config::FwConfig;
use firmware::host_cpu::{resolve_cpu_clock_hz, ProcCpuInfo};
use ls3_devices::ls7a::Ls7aHostBridge;
use ls3_devices::pci::SharedPciBus;
use ls3_devices::pm::{pm_window, PowerManagementTrap};
use ls3_platform::interrupts::LegacyIrqLines;
use ls3_platform::lifecycle::{LifecycleLatch, LifecycleRequest};
use ls3_platform::reset::ResetList;
use memory::{DenseMemory, PhysicalMemoryBus};
use tracing::{debug, info, warn};

use crate::config::MachineConfig;
use crate::error::MachineError;
use crate::layout::{
    BIOS_BASE, BIOS_SIZE, FW_CONF_ADDR, HIGH_RAM_BASE, LOW_RAM_BASE, LOW_RAM_SIZE,
};
use crate::loader::{prepare_kernel_boot, BootImage, ImageTarget, KernelBootConfig, LoadReport};
use crate::params::{FrozenLoaderParameters, LoaderParameters};
use crate::vcpu::{reset_vcpu, MipsCpuState};

fn install_image(mem: &mut PhysicalMemoryBus, image: &BootImage) -> Result<(), MachineError> {
    match image.target {
        ImageTarget::Ram { offset } => mem.ram_mut().write_from(offset, &image.bytes)?,
        ImageTarget::Rom { paddr } => mem.load_rom(paddr, &image.bytes)?,
    }
    Ok(())
}

/// Loongson-3 virtual board: RAM, boot ROM, LS7A host bridge, PM trap and vCPU reset state.
///
/// Every component is reset through one ordered [`ResetList`]: boot images are replayed first,
/// then the host bridge, then the vCPUs.
pub struct Loongson3Machine {
    cfg: MachineConfig,
    cpu_clock_hz: u32,

    mem: Rc<RefCell<PhysicalMemoryBus>>,
    bridge: Ls7aHostBridge,
    pic: Rc<RefCell<LegacyIrqLines>>,
    lifecycle: LifecycleLatch,
    vcpus: Vec<Rc<RefCell<MipsCpuState>>>,

    boot_images: Rc<RefCell<Vec<BootImage>>>,
    loader_params: Rc<FrozenLoaderParameters>,
    load_report: Option<LoadReport>,
    resets: ResetList,
}

impl Loongson3Machine {
    pub fn new(cfg: MachineConfig) -> Result<Self, MachineError> {
        cfg.validate()?;

        let cpu_clock_hz = resolve_cpu_clock_hz(cfg.cpu_clock_hz, &ProcCpuInfo::new());

        let ram = DenseMemory::new(cfg.ram_size_bytes)?;
        let mut mem = PhysicalMemoryBus::new(Box::new(ram));
        mem.map_ram(LOW_RAM_BASE, 0, LOW_RAM_SIZE)?;
        mem.map_rom(BIOS_BASE, BIOS_SIZE as usize)?;
        mem.map_ram(HIGH_RAM_BASE, 0, cfg.ram_size_bytes)?;

        let lifecycle = LifecycleLatch::new();
        mem.map_mmio(
            pm_window(),
            Box::new(PowerManagementTrap::new(Box::new(lifecycle.clone()))),
        )?;

        let pic = Rc::new(RefCell::new(LegacyIrqLines::new()));
        let bridge = Ls7aHostBridge::new(Box::new(pic.clone()));
        bridge.map_bridge_windows(&mut mem)?;
        bridge.map_extended_config_window(&mut mem)?;

        let mem = Rc::new(RefCell::new(mem));
        let boot_images: Rc<RefCell<Vec<BootImage>>> = Rc::default();
        let loader_params = Rc::new(FrozenLoaderParameters::new());
        let vcpus: Vec<_> = (0..cfg.cpu_count)
            .map(|_| Rc::new(RefCell::new(MipsCpuState::new())))
            .collect();

        let mut resets = ResetList::new();
        {
            let mem = mem.clone();
            let images = boot_images.clone();
            resets.register(
                "boot-images",
                Box::new(move || {
                    let mut mem = mem.borrow_mut();
                    for image in images.borrow().iter() {
                        if let Err(err) = install_image(&mut mem, image) {
                            warn!(image = %image.name, %err, "failed to reinstall boot image");
                        }
                    }
                }),
            );
        }
        {
            let bridge = bridge.clone();
            resets.register("ls7a", Box::new(move || bridge.reset()));
        }
        for (index, vcpu) in vcpus.iter().enumerate() {
            let vcpu = vcpu.clone();
            let params = loader_params.clone();
            resets.register(
                format!("cpu{index}"),
                Box::new(move || {
                    reset_vcpu(&mut *vcpu.borrow_mut(), index == 0, params.get());
                }),
            );
        }

        let mut machine = Self {
            cfg,
            cpu_clock_hz,
            mem,
            bridge,
            pic,
            lifecycle,
            vcpus,
            boot_images,
            loader_params,
            load_report: None,
            resets,
        };

        if let Some(kernel) = machine.cfg.kernel.clone() {
            machine.load_kernel(&KernelBootConfig {
                kernel,
                initrd: machine.cfg.initrd.clone(),
                cmdline: machine.cfg.cmdline.clone(),
            })?;
        } else {
            machine.load_firmware()?;
        }

        machine.reset();
        Ok(machine)
    }

    /// Loads a kernel for direct boot and freezes the loader parameters.
    ///
    /// Nothing is written to guest memory unless every step succeeds. The boot vCPU picks up the
    /// new entry state on the next [`Self::reset`].
    pub fn load_kernel(&mut self, boot: &KernelBootConfig) -> Result<&LoadReport, MachineError> {
        if self.loader_params.is_frozen() {
            return Err(MachineError::LoaderParamsFrozen);
        }

        let prepared = prepare_kernel_boot(
            boot,
            self.cfg.ram_size_bytes,
            self.cfg.cpu_count,
            self.cpu_clock_hz,
        )?;
        self.loader_params.freeze(prepared.params)?;

        let mut images = prepared.images;
        images.push(BootImage {
            name: "bios".to_owned(),
            target: ImageTarget::Rom { paddr: BIOS_BASE },
            bytes: boot_stub_image(),
        });
        self.install_boot_images(images)?;

        let env = prepared.report.env;
        if self.cfg.export_env {
            for (key, value) in env.vars() {
                std::env::set_var(key, value);
            }
        }
        info!(
            memsize = env.memsize,
            highmemsize = env.highmemsize,
            "boot parameters installed"
        );

        Ok(self.load_report.insert(prepared.report))
    }

    fn load_firmware(&mut self) -> Result<(), MachineError> {
        let mut images = Vec::new();
        match self.cfg.bios.clone() {
            Some(path) => images.push(read_bios(&path)?),
            None => debug!("no BIOS image configured; boot ROM left empty"),
        }

        let fw_config = FwConfig::new(
            self.cfg.ram_size_bytes,
            self.cfg.cpu_count,
            self.cpu_clock_hz,
        );
        images.push(BootImage {
            name: "fw_conf".to_owned(),
            target: ImageTarget::Ram {
                offset: FW_CONF_ADDR,
            },
            bytes: fw_config.to_bytes().to_vec(),
        });
        self.install_boot_images(images)
    }

    fn install_boot_images(&mut self, images: Vec<BootImage>) -> Result<(), MachineError> {
        {
            let mut mem = self.mem.borrow_mut();
            for image in &images {
                install_image(&mut mem, image)?;
            }
        }
        self.boot_images.borrow_mut().extend(images);
        Ok(())
    }

    /// System reset: replays boot images, resets the host bridge and every vCPU.
    pub fn reset(&mut self) {
        self.lifecycle.clear();
        self.pic.borrow_mut().reset();
        self.resets.run();
    }

    /// Applies a pending PM-trap request. Resets are handled here; shutdowns are returned for the
    /// caller to act on.
    pub fn poll_lifecycle(&mut self) -> Option<LifecycleRequest> {
        let request = self.lifecycle.take()?;
        info!(?request, "guest lifecycle request");
        if request == LifecycleRequest::Reset {
            self.reset();
        }
        Some(request)
    }

    pub fn config(&self) -> &MachineConfig {
        &self.cfg
    }

    pub fn cpu_clock_hz(&self) -> u32 {
        self.cpu_clock_hz
    }

    pub fn memory(&self) -> RefMut<'_, PhysicalMemoryBus> {
        self.mem.borrow_mut()
    }

    pub fn host_bridge(&self) -> &Ls7aHostBridge {
        &self.bridge
    }

    pub fn pci_bus(&self) -> SharedPciBus {
        self.bridge.bus()
    }

    pub fn pic(&self) -> Ref<'_, LegacyIrqLines> {
        self.pic.borrow()
    }

    pub fn lifecycle(&self) -> &LifecycleLatch {
        &self.lifecycle
    }

    pub fn vcpu_count(&self) -> usize {
        self.vcpus.len()
    }

    pub fn vcpu(&self, index: usize) -> Option<Ref<'_, MipsCpuState>> {
        self.vcpus.get(index).map(|vcpu| vcpu.borrow())
    }

    pub fn loader_params(&self) -> Option<&LoaderParameters> {
        self.loader_params.get()
    }

    pub fn load_report(&self) -> Option<&LoadReport> {
        self.load_report.as_ref()
    }

    pub fn reset_handler_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.resets.names()
    }
}

fn read_bios(path: &Path) -> Result<BootImage, MachineError> {
    let bytes = std::fs::read(path).map_err(|err| MachineError::BiosLoad {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    if bytes.len() as u64 > BIOS_SIZE {
        return Err(MachineError::BiosLoad {
            path: path.to_path_buf(),
            reason: format!("image is {} bytes, ROM is {BIOS_SIZE}", bytes.len()),
        });
    }
    info!(bios = %path.display(), size = bytes.len(), "loaded BIOS image");
    Ok(BootImage {
        name: path.display().to_string(),
        target: ImageTarget::Rom { paddr: BIOS_BASE },
        bytes,
    })
}
