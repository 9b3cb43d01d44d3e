//! Platform-level plumbing shared by the Loongson-3 device models: lifecycle (reset/shutdown)
//! requests, legacy interrupt controller inputs and the system reset handler list.

#![forbid(unsafe_code)]

pub mod interrupts;
pub mod lifecycle;
pub mod reset;
