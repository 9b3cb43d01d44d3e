#![forbid(unsafe_code)]

pub mod ls7a;
pub mod pci;
pub mod pm;
