use std::cell::Cell;
use std::rc::Rc;

use tracing::info;

/// Lifecycle request emitted by chipset devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleRequest {
    /// Guest-initiated warm system reset.
    Reset,
    /// Guest-initiated power off.
    Shutdown,
}

/// Platform-level sink for lifecycle requests coming from device models (e.g. the PM trap).
///
/// Device models must not reset or stop the system from inside an MMIO handler; doing so would
/// re-enter the address router while it is borrowed. They queue a request here and the platform
/// coordinator applies it at a safe boundary.
pub trait LifecycleSink {
    fn request(&mut self, request: LifecycleRequest);
}

impl<F> LifecycleSink for F
where
    F: FnMut(LifecycleRequest),
{
    fn request(&mut self, request: LifecycleRequest) {
        self(request);
    }
}

#[derive(Debug, Default)]
struct LatchState {
    pending: Cell<Option<LifecycleRequest>>,
    resets: Cell<u32>,
    shutdowns: Cell<u32>,
}

/// A cloneable request latch bridging device lifecycle requests into the platform loop.
///
/// The latch holds at most one pending request; [`LifecycleRequest::Shutdown`] wins over
/// [`LifecycleRequest::Reset`]. Every request is also counted so callers can observe how many
/// were raised regardless of coalescing.
#[derive(Debug, Clone, Default)]
pub struct LifecycleLatch {
    state: Rc<LatchState>,
}

impl LifecycleLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the currently pending request without clearing it.
    pub fn peek(&self) -> Option<LifecycleRequest> {
        self.state.pending.get()
    }

    /// Takes and clears the pending request.
    pub fn take(&self) -> Option<LifecycleRequest> {
        self.state.pending.take()
    }

    pub fn clear(&self) {
        self.state.pending.set(None);
    }

    pub fn reset_requests(&self) -> u32 {
        self.state.resets.get()
    }

    pub fn shutdown_requests(&self) -> u32 {
        self.state.shutdowns.get()
    }

    fn set_pending(&self, request: LifecycleRequest) {
        let next = match (self.state.pending.get(), request) {
            (Some(LifecycleRequest::Shutdown), _) | (_, LifecycleRequest::Shutdown) => {
                LifecycleRequest::Shutdown
            }
            _ => LifecycleRequest::Reset,
        };
        self.state.pending.set(Some(next));
    }
}

impl LifecycleSink for LifecycleLatch {
    fn request(&mut self, request: LifecycleRequest) {
        info!(?request, "guest lifecycle request");
        match request {
            LifecycleRequest::Reset => self.state.resets.set(self.state.resets.get() + 1),
            LifecycleRequest::Shutdown => {
                self.state.shutdowns.set(self.state.shutdowns.get() + 1)
            }
        }
        self.set_pending(request);
    }
}
