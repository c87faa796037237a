//! Asynchronous interrupt, timeout and low-memory requests.
//!
//! [`InterruptHandle`] is the only part of an interpreter that may cross
//! threads. Other threads set flags on it; the interpreter drains them at
//! safe points through its [`InterruptSupervisor`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rip_value::ErrorCode;

const INTERRUPT: u8 = 1 << 0;
const TIMEOUT: u8 = 1 << 1;
const LOW_MEMORY: u8 = 1 << 2;

/// Thread-safe request handle.
#[derive(Clone, Debug, Default)]
pub struct InterruptHandle {
    flags: Arc<AtomicU8>,
    deadline: Arc<Mutex<Option<Instant>>>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_interrupt(&self) {
        self.flags.fetch_or(INTERRUPT, Ordering::SeqCst);
    }

    pub fn request_timeout(&self) {
        self.flags.fetch_or(TIMEOUT, Ordering::SeqCst);
    }

    pub fn signal_low_memory(&self) {
        self.flags.fetch_or(LOW_MEMORY, Ordering::SeqCst);
    }

    /// Raise `Timeout` at the first safe point after `deadline`.
    pub fn set_deadline(&self, deadline: Option<Instant>) {
        *self.deadline.lock() = deadline;
    }

    pub fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock()
    }

    /// Any request outstanding.
    pub fn is_pending(&self) -> bool {
        self.flags.load(Ordering::SeqCst) != 0
    }

    pub fn clear(&self) {
        self.flags.store(0, Ordering::SeqCst);
        *self.deadline.lock() = None;
    }

    fn take(&self, bit: u8) -> bool {
        (self.flags.fetch_and(!bit, Ordering::SeqCst) & bit) != 0
    }
}

/// Interpreter-side consumer of an [`InterruptHandle`].
#[derive(Debug)]
pub struct InterruptSupervisor {
    handle: InterruptHandle,
    poll_interval: u32,
    countdown: u32,
}

impl InterruptSupervisor {
    pub fn new(poll_interval: u32) -> Self {
        let poll_interval = poll_interval.max(1);
        InterruptSupervisor {
            handle: InterruptHandle::new(),
            poll_interval,
            countdown: poll_interval,
        }
    }

    pub fn handle(&self) -> &InterruptHandle {
        &self.handle
    }

    /// Next asynchronous error to raise, interrupt before timeout.
    pub fn poll(&mut self) -> Option<ErrorCode> {
        if self.handle.take(INTERRUPT) {
            return Some(ErrorCode::Interrupt);
        }
        if self.handle.take(TIMEOUT) {
            return Some(ErrorCode::Timeout);
        }
        self.countdown -= 1;
        if self.countdown == 0 {
            self.countdown = self.poll_interval;
            return self.check_deadline();
        }
        None
    }

    /// Signal only, without touching the deadline countdown.
    pub fn take_signal(&mut self) -> Option<ErrorCode> {
        if self.handle.take(INTERRUPT) {
            Some(ErrorCode::Interrupt)
        } else if self.handle.take(TIMEOUT) {
            Some(ErrorCode::Timeout)
        } else {
            None
        }
    }

    fn check_deadline(&mut self) -> Option<ErrorCode> {
        let mut deadline = self.handle.deadline.lock();
        match *deadline {
            Some(at) if Instant::now() >= at => {
                *deadline = None;
                Some(ErrorCode::Timeout)
            }
            _ => None,
        }
    }

    pub fn take_low_memory(&mut self) -> bool {
        self.handle.take(LOW_MEMORY)
    }

    pub fn reset(&mut self) {
        self.handle.clear();
        self.countdown = self.poll_interval;
    }
}
