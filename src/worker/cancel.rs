//! Cancellation requests addressed to a specific problem.
//!
//! The master tags every cancel with the id of the problem it means to stop.
//! A request may land before the worker has even read that problem, or long
//! after the worker answered it; only a request whose id matches the attempt
//! in flight raises the flag solvers poll.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Marks a slot as holding an id; zero means empty.
const TAGGED: u64 = 1 << 32;

fn tag(id: u32) -> u64 {
    TAGGED | u64::from(id)
}

/// Every method only touches atomics, so `request` may be called from a
/// signal handler.
#[derive(Debug, Default)]
pub struct CancelToken {
    flag: AtomicBool,
    /// Problem being attempted.
    current: AtomicU64,
    /// Problem most recently named by a cancel request.
    requested: AtomicU64,
}

impl CancelToken {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            current: AtomicU64::new(0),
            requested: AtomicU64::new(0),
        }
    }

    /// Ask to cancel problem `id`, whether or not it is in flight yet.
    pub fn request(&self, id: u32) {
        self.requested.store(tag(id), Ordering::SeqCst);
        if self.current.load(Ordering::SeqCst) == tag(id) {
            self.flag.store(true, Ordering::SeqCst);
        }
    }

    /// Cancel whatever is in flight, without naming it.
    pub fn request_current(&self) {
        if self.current.load(Ordering::SeqCst) != 0 {
            self.flag.store(true, Ordering::SeqCst);
        }
    }

    /// Start attempting `id`. The returned flag is already raised when a
    /// request for `id` arrived before this call.
    pub fn arm(&self, id: u32) -> &AtomicBool {
        self.flag.store(false, Ordering::SeqCst);
        self.current.store(tag(id), Ordering::SeqCst);
        // Pairs with the store-then-load in `request`: at least one side
        // sees the other.
        if self.requested.load(Ordering::SeqCst) == tag(id) {
            self.flag.store(true, Ordering::SeqCst);
        }
        &self.flag
    }

    /// The attempt has been answered; later requests for it are ignored.
    pub fn disarm(&self) {
        self.current.store(0, Ordering::SeqCst);
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
