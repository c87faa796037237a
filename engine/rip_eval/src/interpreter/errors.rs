//! Error dispatch.
//!
//! Runs right after a failed dispatch. Either the error's handler from the
//! error table is scheduled and the loop continues, or the level is unwound
//! and the error leaves `interpret`.

use rip_value::{ErrorCode, Value};

use super::{Interpreter, Outcome};
use crate::error_context::ErrorRecord;
use crate::exec::ExecEntry;

impl Interpreter {
    /// Handle `code`, raised while executing `command`, in the level whose
    /// floor sits just below `base`. `None` means a handler was scheduled.
    pub(super) fn handle_error(
        &mut self,
        code: ErrorCode,
        command: Value,
        base: usize,
    ) -> Option<Outcome> {
        self.pending_exit = None;
        let mut code = code;
        if !code.is_unclearable() {
            if let Some(signal) = self.supervisor.take_signal() {
                code = signal;
            }
        }

        if code == ErrorCode::NotAnError {
            self.errors.clear();
            self.unwind(base);
            tracing::debug!("nested interpreter unwound");
            return Some(Outcome::Propagate(ErrorCode::NotAnError));
        }

        if code == ErrorCode::DiskVmError {
            tracing::warn!("disk-backed VM exhausted; reporting VMerror");
            if let Some(counters) = &mut self.counters {
                counters.count_disk_vm_warning();
            }
            code = ErrorCode::VmError;
        }

        let code = self.errors.raise(code);
        if code.is_stack_overflow() {
            self.trim_overflow(code, base);
        }
        if let Some(counters) = &mut self.counters {
            counters.count_error();
        }
        self.errors.record(ErrorRecord {
            code,
            command: command.clone(),
        });

        if self.errors.in_saved_region() {
            self.unwind(base);
            tracing::debug!(error = code.name(), "error returned to saved context");
            return Some(Outcome::Propagate(code));
        }

        self.errors.acknowledge();
        // Signals are handled at the top level only.
        if code.is_unclearable() && self.level > 1 {
            self.unwind(base);
            tracing::debug!(error = code.name(), "signal leaves nested level");
            return Some(Outcome::Propagate(code));
        }

        let Some(handler) = self.error_handler(code) else {
            self.unwind(base);
            tracing::debug!(error = code.name(), "no error handler");
            return Some(Outcome::Propagate(code));
        };
        if self.operands.is_full() {
            let keep = self
                .operands
                .limit()
                .saturating_sub(self.config.overflow_headroom);
            self.operands.truncate(keep);
        }
        let handler_depth = self.exec.len();
        if self.operands.push(command).is_err()
            || self.exec.push(ExecEntry::Value(handler)).is_err()
        {
            self.unwind(base);
            return Some(Outcome::Propagate(code));
        }
        if code.is_unclearable() {
            self.errors.deliver_signal(handler_depth);
        }
        tracing::debug!(error = code.name(), "error handler scheduled");
        None
    }

    fn error_handler(&self, code: ErrorCode) -> Option<Value> {
        let key = self.names.get(code.name())?;
        self.dicts.lookup_in(self.error_table, key)
    }

    /// Make room on an overflowed stack for the handler to run.
    fn trim_overflow(&mut self, code: ErrorCode, base: usize) {
        let headroom = self.config.overflow_headroom;
        match code {
            ErrorCode::StackOverflow => {
                let keep = self.operands.limit().saturating_sub(headroom);
                self.operands.truncate(keep);
            }
            ErrorCode::ExecStackOverflow => {
                let keep = self.exec.limit().saturating_sub(headroom).max(base);
                self.truncate_exec(keep);
            }
            ErrorCode::DictStackOverflow => {
                let keep = self.dicts.limit().saturating_sub(headroom);
                self.dicts.end_to(keep);
            }
            _ => {}
        }
    }
}
