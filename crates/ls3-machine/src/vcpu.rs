//! Architectural vCPU state touched by the board on reset.
//!
//! Instruction execution lives outside this crate; the board only needs to put each vCPU in its
//! power-on state and hand the boot vCPU its entry registers.

use crate::params::LoaderParameters;

pub const CP0_STATUS_ERL: u64 = 1 << 2;
pub const CP0_STATUS_BEV: u64 = 1 << 22;

/// Power-on PC (`0xBFC0_0000`, sign-extended).
pub const RESET_PC: u64 = 0xFFFF_FFFF_BFC0_0000;

pub const GPR_A0: usize = 4;
pub const GPR_A1: usize = 5;
pub const GPR_A2: usize = 6;

pub trait MipsVcpu {
    /// Returns the vCPU to its power-on state.
    fn power_on_reset(&mut self);

    fn gpr(&self, index: usize) -> u64;
    fn set_gpr(&mut self, index: usize, value: u64);

    fn pc(&self) -> u64;
    fn set_pc(&mut self, pc: u64);

    fn cp0_status(&self) -> u64;
    fn set_cp0_status(&mut self, value: u64);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipsCpuState {
    gpr: [u64; 32],
    pc: u64,
    cp0_status: u64,
}

impl MipsCpuState {
    pub fn new() -> Self {
        let mut cpu = Self {
            gpr: [0; 32],
            pc: 0,
            cp0_status: 0,
        };
        cpu.power_on_reset();
        cpu
    }
}

impl Default for MipsCpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl MipsVcpu for MipsCpuState {
    fn power_on_reset(&mut self) {
        self.gpr = [0; 32];
        self.pc = RESET_PC;
        self.cp0_status = CP0_STATUS_BEV | CP0_STATUS_ERL;
    }

    fn gpr(&self, index: usize) -> u64 {
        self.gpr[index]
    }

    fn set_gpr(&mut self, index: usize, value: u64) {
        // $zero is hardwired.
        if index != 0 {
            self.gpr[index] = value;
        }
    }

    fn pc(&self) -> u64 {
        self.pc
    }

    fn set_pc(&mut self, pc: u64) {
        self.pc = pc;
    }

    fn cp0_status(&self) -> u64 {
        self.cp0_status
    }

    fn set_cp0_status(&mut self, value: u64) {
        self.cp0_status = value;
    }
}

/// Resets `cpu` and, after a direct kernel boot, applies the boot register state.
pub fn reset_vcpu(cpu: &mut dyn MipsVcpu, is_boot_cpu: bool, params: Option<&LoaderParameters>) {
    cpu.power_on_reset();

    let Some(params) = params else {
        return;
    };
    if is_boot_cpu {
        cpu.set_gpr(GPR_A0, params.a0);
        cpu.set_gpr(GPR_A1, params.a1);
        cpu.set_gpr(GPR_A2, params.a2);
        cpu.set_pc(params.kernel_entry);
    }
    let status = cpu.cp0_status() & !(CP0_STATUS_BEV | CP0_STATUS_ERL);
    cpu.set_cp0_status(status);
}
