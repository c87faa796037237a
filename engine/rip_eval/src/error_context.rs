//! Error bookkeeping for one interpreter.
//!
//! Tracks the error being raised (`new_error`), the last one a handler
//! acknowledged (`old_error`), the first one since the last reset
//! (`orig_error`) and any asynchronous signal that must still reach the job
//! boundary. Regions run by `try_nested` push a snapshot with [`save`] and pop
//! it with [`restore`]; while a snapshot is outstanding, errors unwind to the
//! calling operator without running handlers.
//!
//! [`save`]: ErrorContext::save
//! [`restore`]: ErrorContext::restore

use rip_value::{ErrorCode, Value};

/// The last error handled, with the object that was executing.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorRecord {
    pub code: ErrorCode,
    pub command: Value,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorState {
    Clear,
    Signalled(ErrorCode),
    /// Inside a saved region with no error raised yet.
    Saved,
    /// An interrupt or timeout handler has been scheduled.
    Interrupting,
}

#[derive(Clone, Debug)]
struct Snapshot {
    new_error: Option<ErrorCode>,
    old_error: Option<ErrorCode>,
    orig_error: Option<ErrorCode>,
    detail: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    new_error: Option<ErrorCode>,
    old_error: Option<ErrorCode>,
    orig_error: Option<ErrorCode>,
    pending_signal: Option<ErrorCode>,
    /// Execution-stack depth of the outermost running signal handler.
    signal_handler_depth: Option<usize>,
    detail: Option<String>,
    last: Option<ErrorRecord>,
    saved: Vec<Snapshot>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ErrorState {
        if self.is_interrupting() {
            ErrorState::Interrupting
        } else if let Some(code) = self.new_error {
            ErrorState::Signalled(code)
        } else if self.saved.is_empty() {
            ErrorState::Clear
        } else {
            ErrorState::Saved
        }
    }

    /// Record `code` as the error being raised and return the code that is
    /// actually in effect. A pending interrupt or timeout wins over any
    /// clearable error.
    pub fn raise(&mut self, code: ErrorCode) -> ErrorCode {
        let effective = match (self.new_error, self.pending_signal) {
            (Some(current), _) if current.is_unclearable() && !code.is_unclearable() => current,
            (_, Some(signal)) if !self.is_interrupting() && !code.is_unclearable() => signal,
            _ => code,
        };
        self.new_error = Some(effective);
        self.orig_error.get_or_insert(effective);
        if effective.is_unclearable() && self.pending_signal.is_none() {
            self.pending_signal = Some(effective);
        }
        effective
    }

    #[inline]
    pub fn new_error(&self) -> Option<ErrorCode> {
        self.new_error
    }

    #[inline]
    pub fn old_error(&self) -> Option<ErrorCode> {
        self.old_error
    }

    #[inline]
    pub fn orig_error(&self) -> Option<ErrorCode> {
        self.orig_error
    }

    #[inline]
    pub fn pending_signal(&self) -> Option<ErrorCode> {
        self.pending_signal
    }

    #[inline]
    pub fn is_interrupting(&self) -> bool {
        self.signal_handler_depth.is_some()
    }

    pub fn last(&self) -> Option<&ErrorRecord> {
        self.last.as_ref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Attach free-form detail to the error being raised.
    pub fn set_detail(&mut self, detail: impl Into<String>) {
        self.detail = Some(detail.into());
    }

    pub(crate) fn record(&mut self, record: ErrorRecord) {
        self.last = Some(record);
    }

    /// A handler has taken responsibility for the current error.
    pub(crate) fn acknowledge(&mut self) {
        if let Some(code) = self.new_error.take() {
            self.old_error = Some(code);
        }
        self.detail = None;
    }

    /// Drop the current error without acknowledging it.
    pub(crate) fn clear(&mut self) {
        self.new_error = None;
        self.detail = None;
    }

    /// An interrupt or timeout handler was scheduled at the top level, at
    /// execution-stack index `depth`: the signal has reached its destination.
    pub(crate) fn deliver_signal(&mut self, depth: usize) {
        self.pending_signal = None;
        let outer = self.signal_handler_depth.map_or(depth, |d| d.min(depth));
        self.signal_handler_depth = Some(outer);
    }

    /// The execution stack is at `exec_depth`. Once it is no deeper than the
    /// handler's own entry, the handler has finished and later signals are
    /// tracked afresh.
    pub(crate) fn settle_signal(&mut self, exec_depth: usize) {
        if self.signal_handler_depth.is_some_and(|d| exec_depth <= d) {
            self.signal_handler_depth = None;
        }
    }

    /// A signal that was raised but then dropped on the floor, and must be
    /// raised again at the next safe point.
    pub(crate) fn swallowed_signal(&self) -> Option<ErrorCode> {
        if self.is_interrupting() {
            return None;
        }
        self.pending_signal
    }

    /// Enter a region whose errors go back to the caller.
    pub fn save(&mut self) {
        self.saved.push(Snapshot {
            new_error: self.new_error.take(),
            old_error: self.old_error,
            orig_error: self.orig_error,
            detail: self.detail.take(),
        });
    }

    #[inline]
    pub fn in_saved_region(&self) -> bool {
        !self.saved.is_empty()
    }

    /// Leave a saved region, reinstating the outer error state.
    ///
    /// `Ok` when the region finished clean or unwound with `NotAnError`;
    /// otherwise the code it failed with. A pending interrupt or timeout is
    /// always returned.
    pub fn restore(&mut self) -> Result<(), ErrorCode> {
        debug_assert!(self.in_saved_region(), "ErrorContext::restore without save");
        let inner = self.new_error;
        if let Some(snapshot) = self.saved.pop() {
            self.new_error = snapshot.new_error;
            self.old_error = snapshot.old_error;
            self.orig_error = snapshot.orig_error;
            self.detail = snapshot.detail;
        } else {
            self.new_error = None;
        }
        if let Some(signal) = self.pending_signal {
            return Err(signal);
        }
        match inner {
            None | Some(ErrorCode::NotAnError) => Ok(()),
            Some(code) => Err(code),
        }
    }

    /// Back to a clean state at a job boundary.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests;
