//! The kernel-assisted block/wake facility keyed on a single memory word.
//!
//! This is the only place the crate suspends a thread. The contract mirrors
//! a futex: `block` sleeps while the word holds an expected value, and
//! `wake_one` releases a queued thread *regardless of the word's current
//! value*. The wake count returned by `wake_one` is load-bearing: it is the
//! sole way the event state machine distinguishes "a waiter existed and was
//! handed the signal" from "no one was listening".

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use parking_lot_core as plc;
use parking_lot_core::ParkResult;

/// Outcome of [`WaitWord::block`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Released by a wake. Authoritative even if the word never changed
    /// value: wakes are delivered by queue membership, not by the word.
    Woken,
    /// The word no longer held the expected value at queueing time, or the
    /// sleep was cut short without a wake or a timeout. Callers retry
    /// transparently.
    Interrupted,
    /// The deadline passed without a wake.
    TimedOut,
    /// The primitive reported a condition that is neither a wake, a retry,
    /// nor a timeout.
    Failed,
}

/// A futex-style block/wake primitive operating on a single `AtomicU32`.
pub trait WaitWord: Send + Sync {
    /// Wakes at most one thread currently blocked on `word`, regardless of
    /// the word's value. Returns how many threads were woken (0 or 1).
    fn wake_one(&self, word: &AtomicU32) -> usize;

    /// Blocks the calling thread while `*word == expected`, until woken or
    /// until `deadline` passes (forever when `None`).
    fn block(&self, word: &AtomicU32, expected: u32, deadline: Option<Instant>) -> BlockOutcome;
}

/// The production primitive: parks threads with `parking_lot_core`, keyed
/// on the address of the word.
#[derive(Clone, Copy, Debug, Default)]
pub struct Parker;

fn key(word: &AtomicU32) -> usize {
    word as *const AtomicU32 as usize
}

impl WaitWord for Parker {
    fn wake_one(&self, word: &AtomicU32) -> usize {
        let result = unsafe { plc::unpark_one(key(word), |_| plc::DEFAULT_UNPARK_TOKEN) };
        result.unparked_threads
    }

    fn block(&self, word: &AtomicU32, expected: u32, deadline: Option<Instant>) -> BlockOutcome {
        let result = unsafe {
            plc::park(
                key(word),
                || word.load(Ordering::Acquire) == expected,
                || {},
                |_, _| {},
                plc::DEFAULT_PARK_TOKEN,
                deadline,
            )
        };

        match result {
            ParkResult::Unparked(_) => BlockOutcome::Woken,
            ParkResult::Invalid => BlockOutcome::Interrupted,
            ParkResult::TimedOut => BlockOutcome::TimedOut,
        }
    }
}
