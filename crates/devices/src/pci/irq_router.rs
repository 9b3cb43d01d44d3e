use ls3_platform::interrupts::PicIrqLevelSink;
use tracing::trace;

use super::bus::PciIntxRouting;

/// Legacy interrupt controller inputs the LS7A swizzles PCI INTx onto.
pub const LS7A_INTX_LINES: [u8; 8] = [3, 4, 5, 6, 7, 9, 10, 11];

/// LS7A INTx swizzle: `LS7A_INTX_LINES[(pin + slot) % 8]`.
///
/// `pin` uses the config-space encoding (1 = INTA#). The mapping is total and pure.
pub const fn ls7a_map_irq(slot: u8, pin: u8) -> u8 {
    LS7A_INTX_LINES[(pin as usize + slot as usize) % LS7A_INTX_LINES.len()]
}

/// Routes root-bus INTx onto the legacy 8259 inputs.
///
/// Shared-line aggregation happens in [`super::PciBus`]; `set_irq` forwards levels unchanged.
pub struct Ls7aIntxRouter {
    pic: Box<dyn PicIrqLevelSink>,
}

impl Ls7aIntxRouter {
    pub fn new(pic: Box<dyn PicIrqLevelSink>) -> Self {
        Self { pic }
    }
}

impl PciIntxRouting for Ls7aIntxRouter {
    fn map_irq(&self, slot: u8, pin: u8) -> u8 {
        ls7a_map_irq(slot, pin)
    }

    fn set_irq(&mut self, line: u8, level: bool) {
        trace!(line, level, "LS7A INTx");
        self.pic.set_irq_level(line, level);
    }
}
