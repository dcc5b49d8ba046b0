//! Contract with the external coordination service a promoted event
//! delegates to. The crate only ever holds an opaque reference to the
//! backing object and touches the service at two points: seeding the
//! object's state when a slot is promoted, and releasing it on close.

use std::fmt;

/// Opaque reference to the cross-process object a slot shadows. Assigned at
/// creation and never reassigned while the slot is live.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackingHandle(u64);

impl BackingHandle {
    pub const fn from_raw(raw: u64) -> BackingHandle {
        BackingHandle(raw)
    }

    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BackingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackingHandle(0x{:x})", self.0)
    }
}

/// The external coordination service that owns the backing objects.
///
/// Implementations are registered by the surrounding system when the
/// [`EventTable`](crate::EventTable) is constructed; the table never
/// inspects a backing object's internals.
pub trait Backend: Send + Sync {
    /// Forces the backing object's signaled state. Called once per slot, by
    /// the promotion winner, so external waiters observe the state local
    /// waiters would have.
    fn set_state(&self, handle: BackingHandle, signaled: bool);

    /// Releases the backing object when the owning slot is closed.
    fn close(&self, handle: BackingHandle);
}
