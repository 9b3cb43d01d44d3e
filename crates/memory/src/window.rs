/// A contiguous guest-physical address range with access-width constraints.
///
/// Windows are decoded by [`crate::PhysicalMemoryBus`]; an access is dispatched to a window only
/// when it lies entirely inside it and its width is within `min_access..=max_access`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressWindow {
    pub base: u64,
    pub size: u64,
    pub min_access: usize,
    pub max_access: usize,
}

impl AddressWindow {
    /// A window accepting 1, 2, 4 and 8 byte accesses.
    pub const fn new(base: u64, size: u64) -> Self {
        Self {
            base,
            size,
            min_access: 1,
            max_access: 8,
        }
    }

    pub const fn with_access(mut self, min_access: usize, max_access: usize) -> Self {
        self.min_access = min_access;
        self.max_access = max_access;
        self
    }

    /// Exclusive end address (saturating at `u64::MAX`).
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Returns the window-relative offset if `[addr, addr + len)` fits inside the window.
    pub fn offset_of(&self, addr: u64, len: usize) -> Option<u64> {
        let end = addr.checked_add(len as u64)?;
        if addr < self.base || end > self.end() {
            return None;
        }
        Some(addr - self.base)
    }

    pub const fn accepts_width(&self, size: usize) -> bool {
        size >= self.min_access && size <= self.max_access
    }

    pub const fn overlaps(&self, other: &AddressWindow) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}
