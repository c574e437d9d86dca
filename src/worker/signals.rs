//! Job-control signals as pending events.
//!
//! Handlers only store into static atomics; the runtime drains them from its
//! own loop. The master queues SIGHUP with the id of the problem to cancel
//! (`sigqueue`), which the handler reads from its `siginfo_t`.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{
    SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal, kill, sigaction, sigprocmask,
};
use nix::unistd::getpid;

use crate::error::WorkerError;
use crate::worker::{CancelToken, Control, Event};

static TERMINATE: AtomicBool = AtomicBool::new(false);
static RUN: AtomicBool = AtomicBool::new(false);
static CANCEL: AtomicBool = AtomicBool::new(false);
static CANCEL_TOKEN: CancelToken = CancelToken::new();

const HANDLED: [Signal; 3] = [Signal::SIGTERM, Signal::SIGCONT, Signal::SIGHUP];

extern "C" fn record_signal(signal: libc::c_int, info: *mut libc::siginfo_t, _: *mut libc::c_void) {
    match signal {
        libc::SIGTERM => TERMINATE.store(true, Ordering::SeqCst),
        libc::SIGCONT => RUN.store(true, Ordering::SeqCst),
        libc::SIGHUP => {
            // SAFETY: the kernel passes a valid siginfo_t to SA_SIGINFO handlers.
            match unsafe { queued_id(info) } {
                Some(id) => CANCEL_TOKEN.request(id),
                None => CANCEL_TOKEN.request_current(),
            }
            CANCEL.store(true, Ordering::SeqCst);
        }
        _ => {}
    }
}

/// The problem id carried by a signal sent with `sigqueue`.
///
/// # Safety
/// `info` must be null or point to a valid `siginfo_t`.
unsafe fn queued_id(info: *const libc::siginfo_t) -> Option<u32> {
    if info.is_null() || (*info).si_code != libc::SI_QUEUE {
        return None;
    }
    Some((*info).si_value().sival_ptr as usize as u32)
}

fn handled_set() -> SigSet {
    let mut set = SigSet::empty();
    for signal in HANDLED {
        set.add(signal);
    }
    set
}

/// Drain the next pending event in priority order: terminate, run, cancel.
fn take_pending() -> Option<Event> {
    if TERMINATE.swap(false, Ordering::SeqCst) {
        Some(Event::Terminate)
    } else if RUN.swap(false, Ordering::SeqCst) {
        Some(Event::Run)
    } else if CANCEL.swap(false, Ordering::SeqCst) {
        Some(Event::Cancel)
    } else {
        None
    }
}

/// [`Control`] backed by real process signals.
///
/// SIGCONT means "a problem is ready", SIGHUP means "abandon problem N",
/// SIGTERM means "exit". Readiness is announced by stopping with SIGSTOP.
pub struct SignalControl(());

impl SignalControl {
    /// Install the handlers. Only one worker runtime may exist per process.
    pub fn install() -> Result<Self, WorkerError> {
        let action = SigAction::new(
            SigHandler::SigAction(record_signal),
            SaFlags::SA_RESTART | SaFlags::SA_SIGINFO,
            SigSet::empty(),
        );
        for signal in HANDLED {
            // SAFETY: the handler only performs atomic stores.
            unsafe { sigaction(signal, &action) }
                .map_err(|source| WorkerError::Install { signal, source })?;
        }
        Ok(Self(()))
    }
}

impl Control for SignalControl {
    fn next_event(&mut self) -> Result<Event, WorkerError> {
        let mask = handled_set();
        let mut previous = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_BLOCK, Some(&mask), Some(&mut previous))?;

        // With the signals blocked no flag can change between the check and
        // sigsuspend, which atomically restores the old mask while waiting.
        let event = loop {
            if let Some(event) = take_pending() {
                break event;
            }
            // SAFETY: `previous` is a valid, initialised signal set. sigsuspend
            // always returns -1/EINTR once a handler has run.
            unsafe {
                libc::sigsuspend(previous.as_ref());
            }
        };

        sigprocmask(SigmaskHow::SIG_SETMASK, Some(&previous), None)?;
        Ok(event)
    }

    fn cancel(&self) -> &CancelToken {
        &CANCEL_TOKEN
    }

    fn suspend(&mut self) -> Result<(), WorkerError> {
        kill(getpid(), Signal::SIGSTOP)?;
        Ok(())
    }
}
