use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

/// Number of inputs on the cascaded legacy interrupt controller.
pub const LEGACY_IRQ_LINES: usize = 16;

/// A sink that accepts level changes for a legacy PIC IRQ input (0-15).
pub trait PicIrqLevelSink {
    fn set_irq_level(&mut self, irq: u8, level: bool);
}

impl<T: PicIrqLevelSink + ?Sized> PicIrqLevelSink for Rc<RefCell<T>> {
    fn set_irq_level(&mut self, irq: u8, level: bool) {
        self.borrow_mut().set_irq_level(irq, level);
    }
}

/// Input-line latch of the legacy 8259 pair.
///
/// Only the input levels are modeled; vectoring and masking belong to the interrupt controller
/// model that consumes these lines.
#[derive(Debug, Clone, Default)]
pub struct LegacyIrqLines {
    levels: u16,
    rising_edges: [u32; LEGACY_IRQ_LINES],
}

impl LegacyIrqLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_asserted(&self, irq: u8) -> bool {
        irq < LEGACY_IRQ_LINES as u8 && self.levels & (1 << irq) != 0
    }

    /// Currently asserted inputs in ascending order.
    pub fn asserted(&self) -> Vec<u8> {
        (0..LEGACY_IRQ_LINES as u8)
            .filter(|irq| self.is_asserted(*irq))
            .collect()
    }

    /// Number of low-to-high transitions seen on `irq`.
    pub fn rising_edges(&self, irq: u8) -> u32 {
        self.rising_edges
            .get(usize::from(irq))
            .copied()
            .unwrap_or(0)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl PicIrqLevelSink for LegacyIrqLines {
    fn set_irq_level(&mut self, irq: u8, level: bool) {
        if usize::from(irq) >= LEGACY_IRQ_LINES {
            debug!(irq, level, "level change for nonexistent PIC input");
            return;
        }
        let bit = 1u16 << irq;
        if level {
            if self.levels & bit == 0 {
                self.rising_edges[usize::from(irq)] += 1;
            }
            self.levels |= bit;
        } else {
            self.levels &= !bit;
        }
    }
}
