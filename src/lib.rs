//! `fastevents` is a process-local fast path for auto-reset events: a waiter
//! blocks until signaled, and a signal wakes at most one waiter, consuming
//! itself. Events live in a fixed table of lock-free slots and suspend
//! waiters with the `parking_lot_core` crate, so the common case, an event
//! only ever touched by threads of one process, never pays for a
//! cross-process coordination round-trip.
//!
//! Every event is created against a [`BackingHandle`], an opaque reference
//! to an equivalent object owned by an external coordination service
//! (modeled by the [`Backend`] trait). The moment cross-process visibility
//! is needed, [`EventTable::promote`] performs a one-way handoff: the slot's
//! current state is pushed to the backing object, and from then on every
//! operation on the handle returns a `Delegated` outcome carrying the
//! backing handle, telling the caller to re-issue the operation against the
//! external service instead. Promotion never reverts.
//!
//! Operations on a promoted or closed slot are reported through return
//! values, never panics; see [`Error`] for the taxonomy.

mod backend;
mod handle;
mod waitword;


pub use backend::{Backend, BackingHandle};
pub use handle::Handle;
pub use waitword::{BlockOutcome, Parker, WaitWord};

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{trace, warn};
use thiserror::Error;

/// Number of event slots in a table. Fixed at compile time; the table never
/// grows.
pub const CAPACITY: usize = 64;

const UNSIGNALED: u32 = 0;
const SIGNALED: u32 = 1;

/// Failures reported by [`EventTable`] operations.
///
/// `Delegated` and `TimedOut` are *not* here: a promoted slot and an expired
/// wait are expected outcomes, carried by [`SignalOutcome`] and
/// [`WaitOutcome`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The handle does not name a live event: it failed to decode, or the
    /// slot it names is not allocated.
    #[error("handle does not name a live fast event")]
    InvalidHandle,
    /// All slots are allocated. The caller must fall back to a heavier
    /// object or fail the higher-level request.
    #[error("fast event table is full")]
    Exhausted,
    /// The slot was already freed when `close` ran: a use-after-close bug
    /// in the caller, surfaced distinctly so it can be told apart from a
    /// merely stale handle passed to other operations.
    #[error("fast event was already closed")]
    AlreadyClosed,
    /// The block primitive reported something that is neither a wake nor a
    /// timeout.
    #[error("wait failed in the underlying block primitive")]
    WaitFailed,
}

/// Outcome of [`EventTable::set`], [`EventTable::pulse`] and
/// [`EventTable::reset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The operation took effect on the local slot.
    Applied,
    /// The slot has been promoted; repeat the operation against the backing
    /// handle via the external coordination service.
    Delegated(BackingHandle),
}

/// Outcome of [`EventTable::wait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The signal was delivered to this caller and consumed.
    Signaled,
    /// The deadline passed without a signal. The slot's state is unchanged.
    TimedOut,
    /// The slot has been promoted; wait on the backing handle instead.
    Delegated(BackingHandle),
}

struct Slot {
    /// The wait word. `0` unsignaled, `1` signaled-and-not-yet-consumed.
    word: AtomicU32,
    in_use: AtomicBool,
    /// Monotonic: never reverts to `false` while the slot is live.
    promoted: AtomicBool,
    backing: AtomicU64,
}

impl Slot {
    fn unused() -> Slot {
        Slot {
            word: AtomicU32::new(UNSIGNALED),
            in_use: AtomicBool::new(false),
            promoted: AtomicBool::new(false),
            backing: AtomicU64::new(0),
        }
    }

    fn backing(&self) -> BackingHandle {
        BackingHandle::from_raw(self.backing.load(Ordering::Acquire))
    }

    fn is_promoted(&self) -> bool {
        self.promoted.load(Ordering::Acquire)
    }

    /// Consumes a pending sticky signal. Returns whether there was one.
    fn consume(&self) -> bool {
        self.word
            .compare_exchange(SIGNALED, UNSIGNALED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// The process-wide registry of fast events.
///
/// A table owns a fixed array of [`CAPACITY`] slots, the [`Backend`] used
/// after promotion and on close, and the [`WaitWord`] primitive that parks
/// waiters. No operation takes a table-wide lock; slots coordinate through
/// their own atomics and the wait word's queue. Only [`EventTable::wait`]
/// can suspend the calling thread.
///
/// The surrounding system typically keeps a single table in a `static`:
///
/// ```
/// use std::sync::LazyLock;
/// use fastevents::{Backend, BackingHandle, EventTable};
///
/// struct Service;
/// impl Backend for Service {
///     fn set_state(&self, _handle: BackingHandle, _signaled: bool) {}
///     fn close(&self, _handle: BackingHandle) {}
/// }
///
/// static EVENTS: LazyLock<EventTable<Service>> =
///     LazyLock::new(|| EventTable::new(Service));
///
/// let handle = EVENTS.create(BackingHandle::from_raw(0x30), false).unwrap();
/// EVENTS.close(handle).unwrap();
/// ```
pub struct EventTable<B: Backend, W: WaitWord = Parker> {
    slots: [Slot; CAPACITY],
    backend: B,
    wait_word: W,
}

impl<B: Backend> EventTable<B> {
    /// Creates a table backed by `backend`, parking waiters with the
    /// production [`Parker`].
    pub fn new(backend: B) -> EventTable<B> {
        EventTable::with_wait_word(backend, Parker)
    }
}

impl<B: Backend, W: WaitWord> EventTable<B, W> {
    /// Creates a table with an explicit block/wake primitive.
    pub fn with_wait_word(backend: B, wait_word: W) -> EventTable<B, W> {
        EventTable {
            slots: std::array::from_fn(|_| Slot::unused()),
            backend,
            wait_word,
        }
    }

    /// Allocates a slot shadowing `backing` and returns its handle.
    ///
    /// The backing object is not touched here; its state only matters once
    /// the slot is promoted. Fails with [`Error::Exhausted`] when every slot
    /// is taken.
    pub fn create(&self, backing: BackingHandle, initially_set: bool) -> Result<Handle, Error> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .in_use
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            let word = if initially_set { SIGNALED } else { UNSIGNALED };
            slot.word.store(word, Ordering::Relaxed);
            slot.promoted.store(false, Ordering::Relaxed);
            slot.backing.store(backing.into_raw(), Ordering::Release);

            let handle = Handle::encode(index);
            trace!("allocated {:?} shadowing {:?}", handle, backing);
            return Ok(handle);
        }

        warn!("fast event table is full");
        Err(Error::Exhausted)
    }

    fn live_slot(&self, handle: Handle) -> Result<&Slot, Error> {
        let slot = &self.slots[handle.index()];
        if !slot.in_use.load(Ordering::Acquire) {
            warn!("stale {:?}", handle);
            return Err(Error::InvalidHandle);
        }
        Ok(slot)
    }

    /// Signals the event, releasing exactly one waiter.
    ///
    /// If a thread was blocked on the slot, the wake itself delivers the
    /// signal and the word is left untouched. Otherwise a sticky signal is
    /// stored for the next waiter to consume.
    pub fn set(&self, handle: Handle) -> Result<SignalOutcome, Error> {
        let slot = self.live_slot(handle)?;
        if slot.is_promoted() {
            return Ok(SignalOutcome::Delegated(slot.backing()));
        }

        if self.wait_word.wake_one(&slot.word) == 0 {
            // No one was parked: leave the signal sticky. A concurrent set
            // may have already stored it, in which case losing this CAS
            // produced the same effect.
            let _ = slot.word.compare_exchange(
                UNSIGNALED,
                SIGNALED,
                Ordering::Release,
                Ordering::Relaxed,
            );
        }
        Ok(SignalOutcome::Applied)
    }

    /// Signals the event only if someone is listening: releases one waiter
    /// if present, and leaves no residue otherwise.
    pub fn pulse(&self, handle: Handle) -> Result<SignalOutcome, Error> {
        let slot = self.live_slot(handle)?;
        if slot.is_promoted() {
            return Ok(SignalOutcome::Delegated(slot.backing()));
        }

        if self.wait_word.wake_one(&slot.word) == 0 {
            // A pulse nobody heard must not linger; force the word back down
            // in case an earlier set left it sticky.
            let _ = slot.word.compare_exchange(
                SIGNALED,
                UNSIGNALED,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
        Ok(SignalOutcome::Applied)
    }

    /// Clears any pending sticky signal. No-op if the event is unsignaled.
    pub fn reset(&self, handle: Handle) -> Result<SignalOutcome, Error> {
        let slot = self.live_slot(handle)?;
        if slot.is_promoted() {
            return Ok(SignalOutcome::Delegated(slot.backing()));
        }

        let _ = slot.word.compare_exchange(
            SIGNALED,
            UNSIGNALED,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
        Ok(SignalOutcome::Applied)
    }

    /// Blocks until the event is signaled, for at most `timeout` (forever
    /// when `None`). Consumes the signal on delivery.
    ///
    /// A timeout of zero probes for a pending sticky signal without
    /// sleeping.
    pub fn wait(&self, handle: Handle, timeout: Option<Duration>) -> Result<WaitOutcome, Error> {
        let slot = self.live_slot(handle)?;
        if slot.is_promoted() {
            return Ok(WaitOutcome::Delegated(slot.backing()));
        }

        let deadline = timeout.map(|limit| Instant::now() + limit);
        loop {
            if slot.consume() {
                return Ok(WaitOutcome::Signaled);
            }

            match self.wait_word.block(&slot.word, UNSIGNALED, deadline) {
                // The word may still read 0 here: wakes are delivered by
                // queue membership, not by value. A wake is authoritative
                // proof of delivery; re-checking the word and parking again
                // would lose the signal.
                BlockOutcome::Woken => return Ok(WaitOutcome::Signaled),
                BlockOutcome::Interrupted => continue,
                BlockOutcome::TimedOut => return Ok(WaitOutcome::TimedOut),
                BlockOutcome::Failed => {
                    warn!("wait on {:?} failed in the block primitive", handle);
                    return Err(Error::WaitFailed);
                }
            }
        }
    }

    /// Frees the slot and releases the backing object.
    ///
    /// Closing a handle twice fails with [`Error::AlreadyClosed`] on the
    /// second call; exactly one caller releases the backing object.
    pub fn close(&self, handle: Handle) -> Result<(), Error> {
        let slot = &self.slots[handle.index()];
        // Resolve the backing object before giving up the slot; a racing
        // create could repopulate it immediately after the release.
        let backing = slot.backing();

        if slot
            .in_use
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            warn!("close of already-freed {:?}", handle);
            return Err(Error::AlreadyClosed);
        }

        trace!("closed {:?}, backing {:?}", handle, backing);
        self.backend.close(backing);
        Ok(())
    }

    /// Promotes the slot to its backing object, one way.
    ///
    /// The first caller pushes the slot's current signaled state to the
    /// external service so outside waiters observe what local waiters would
    /// have; every later caller gets the same backing handle back with no
    /// second synchronization. Callers racing a promotion with local
    /// set/pulse/reset may observe a state one step stale; the handoff is
    /// best-effort, not a linearization barrier.
    pub fn promote(&self, handle: Handle) -> Result<BackingHandle, Error> {
        let slot = self.live_slot(handle)?;
        let backing = slot.backing();

        if slot.promoted.swap(true, Ordering::AcqRel) {
            return Ok(backing);
        }

        let signaled = slot.word.load(Ordering::Acquire) == SIGNALED;
        trace!("promoting {:?}, local state {}", handle, signaled);
        self.backend.set_state(backing, signaled);
        Ok(backing)
    }

    /// The backing object's handle, available whether or not the slot has
    /// been promoted. Does not force promotion.
    pub fn underlying_handle(&self, handle: Handle) -> Result<BackingHandle, Error> {
        Ok(self.live_slot(handle)?.backing())
    }
}
