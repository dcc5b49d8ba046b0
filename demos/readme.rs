//! This example dispatches work to one worker at a time through a fast
//! event, then promotes the event mid-run and shows how callers follow the
//! `Delegated` redirect to the backing object.

use std::sync::LazyLock;
use std::time::Duration;

use fastevents::{Backend, BackingHandle, EventTable, SignalOutcome, WaitOutcome};

/// Stand-in for the cross-process coordination service. A real embedding
/// would forward these calls over its server connection.
struct PrintingService;

impl Backend for PrintingService {
    fn set_state(&self, handle: BackingHandle, signaled: bool) {
        eprintln!("service: {handle:?} seeded with signaled={signaled}");
    }

    fn close(&self, handle: BackingHandle) {
        eprintln!("service: {handle:?} released");
    }
}

static EVENTS: LazyLock<EventTable<PrintingService>> =
    LazyLock::new(|| EventTable::new(PrintingService));

pub fn main() {
    // The backing handle would normally come from creating the real event
    // object in the coordination service up front.
    let task_ready = EVENTS.create(BackingHandle::from_raw(0x30), false).unwrap();

    let worker = std::thread::spawn(move || loop {
        match EVENTS.wait(task_ready, Some(Duration::from_millis(500))).unwrap() {
            WaitOutcome::Signaled => eprintln!("worker: handling one task"),
            // No work for a while: let the worker drain.
            WaitOutcome::TimedOut => break,
            WaitOutcome::Delegated(backing) => {
                // The event went cross-process visible. From here on the
                // worker would wait on `backing` through the service; this
                // demo just stops.
                eprintln!("worker: redirected to {backing:?}");
                break;
            }
        }
    });

    // Dispatch a few tasks on the fast path. Each set wakes at most one
    // waiter and consumes itself.
    for _ in 0..3 {
        EVENTS.set(task_ready).unwrap();
        std::thread::sleep(Duration::from_millis(20));
    }

    // Some other process now needs to observe this event: promote it. The
    // current local state is handed to the service exactly once.
    let backing = EVENTS.promote(task_ready).unwrap();
    eprintln!("promoted to {backing:?}");

    // Local signaling now redirects instead of touching the slot.
    match EVENTS.set(task_ready).unwrap() {
        SignalOutcome::Delegated(handle) => {
            eprintln!("set must now go through the service against {handle:?}")
        }
        SignalOutcome::Applied => unreachable!("the event was just promoted"),
    }

    worker.join().unwrap();
    EVENTS.close(task_ready).unwrap();
}
