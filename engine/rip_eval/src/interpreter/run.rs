//! The interpreter loop.
//!
//! `interpret` runs one program to completion on top of whatever is already
//! on the execution stack. It pushes an `Exit` entry as its floor, so the
//! loop knows where its own work ends, and returns once that floor is
//! reached again.

use rip_stack::{ensure_sufficient_stack, remaining_stack};
use rip_value::{ErrorCode, Name, OpId, PsString, Sequence, StreamId, Value, ValueKind};

use super::{Interpreter, Outcome};
use crate::exec::{ExecEntry, ExitKind, SeqFrame, SourceCursor, SourceFrame};
use crate::scanner::ScanSource;

/// A failed dispatch: the error and the object that was executing.
#[derive(Debug)]
pub(crate) struct Fault {
    pub(crate) code: ErrorCode,
    pub(crate) command: Value,
}

/// How a value reached dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Origin {
    /// Taken off the execution stack or found by name lookup.
    Direct,
    /// An element of a running procedure or a scanned token. Executable
    /// sequences met this way are procedure bodies and are pushed as data.
    Element,
}

enum Action {
    Push,
    Resolve(Name),
    Open(Sequence),
    Call(OpId),
    ScanString(PsString),
    ScanStream(StreamId),
    Nothing,
}

impl Action {
    fn of(value: &Value, origin: Origin) -> Self {
        if !value.is_executable() {
            return Action::Push;
        }
        match value.kind() {
            ValueKind::Name(name) => Action::Resolve(*name),
            ValueKind::Sequence(seq) if origin == Origin::Direct => {
                if seq.is_empty() {
                    Action::Nothing
                } else {
                    Action::Open(seq.clone())
                }
            }
            ValueKind::Operator(id) => Action::Call(*id),
            ValueKind::String(string) => Action::ScanString(string.clone()),
            ValueKind::Stream(id) => Action::ScanStream(*id),
            ValueKind::Null => Action::Nothing,
            _ => Action::Push,
        }
    }
}

fn opens_frame(value: &Value) -> bool {
    value.is_executable() && matches!(value.kind(), ValueKind::Sequence(_))
}

impl Interpreter {
    /// Run `program` in a new interpreter level.
    ///
    /// On return the execution stack is back at its depth on entry.
    #[tracing::instrument(level = "debug", skip_all, fields(level = self.level))]
    pub fn interpret(&mut self, program: Value) -> Outcome {
        if std::thread::current().id() != self.owner {
            return Outcome::Propagate(ErrorCode::InvalidContext);
        }
        if self.level >= self.config.max_interpreter_level {
            tracing::debug!(
                level = self.level,
                remaining_stack = ?remaining_stack(),
                "interpreter level limit reached"
            );
            return Outcome::Propagate(ErrorCode::LimitCheck);
        }
        let entry_depth = self.exec.len();
        if let Err(code) = self.exec.push(ExecEntry::Exit) {
            return Outcome::Propagate(code);
        }
        let base = self.exec.len();
        if let Err(code) = self.exec.push(ExecEntry::Value(program)) {
            self.exec.truncate(entry_depth);
            return Outcome::Propagate(code);
        }

        self.level += 1;
        let outcome = ensure_sufficient_stack(|| self.run(base));
        self.level -= 1;
        self.errors.settle_signal(self.exec.len());

        debug_assert_eq!(
            self.exec.len(),
            entry_depth,
            "interpret left the execution stack unbalanced"
        );
        tracing::debug!(?outcome, "interpret returned");
        outcome
    }

    fn run(&mut self, base: usize) -> Outcome {
        loop {
            if let Some(outcome) = self.safe_point(base) {
                return outcome;
            }
            match self.step() {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => {}
                Err(fault) => {
                    if let Some(outcome) = self.handle_error(fault.code, fault.command, base) {
                        return outcome;
                    }
                    continue;
                }
            }
            if let Some(kind) = self.pending_exit.take() {
                self.unwind(base);
                tracing::debug!(?kind, "untrapped exit leaves interpreter level");
                return Outcome::TrappedExit(kind);
            }
        }
    }

    /// Asynchronous work between dispatches.
    fn safe_point(&mut self, base: usize) -> Option<Outcome> {
        self.errors.settle_signal(self.exec.len());
        let signal = self
            .supervisor
            .poll()
            .or_else(|| self.errors.swallowed_signal());
        if let Some(code) = signal {
            tracing::debug!(error = code.name(), "asynchronous signal at safe point");
            return self.handle_error(code, Value::null(), base);
        }

        if self.supervisor.take_low_memory() || self.memory.is_low_memory() {
            self.reclaim.signal();
        } else {
            self.reclaim.settle();
        }

        let gc = &self.config.gc;
        if self.safety_level == 0
            && gc.allow_gc
            && gc.opportunistic_gc
            && self.memory.gc_threshold_exceeded()
        {
            let freed = self.memory.collect(false);
            if let Some(counters) = &mut self.counters {
                counters.count_reclaim(1, 0);
            }
            tracing::info!(freed, "opportunistic collection");
        }
        None
    }

    /// Whether the procedure fast path must yield to the main loop.
    fn needs_safe_point(&self) -> bool {
        self.supervisor.handle().is_pending()
            || self.errors.swallowed_signal().is_some()
            || self.reclaim.is_signalled()
            || self.memory.is_low_memory()
            || (self.safety_level == 0 && self.memory.gc_threshold_exceeded())
    }

    fn count_dispatch(&mut self) {
        if let Some(counters) = &mut self.counters {
            counters.count_dispatch();
        }
    }

    /// Execute the top execution-stack entry.
    fn step(&mut self) -> Result<Option<Outcome>, Fault> {
        let entry = match self.exec.top_mut() {
            None => return Ok(Some(Outcome::Completed)),
            Some(ExecEntry::Sequence(_)) => return self.run_frame().map(|()| None),
            Some(ExecEntry::Repeat { remaining, proc }) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    let body = proc.clone();
                    self.schedule_body(body)?;
                } else {
                    self.truncate_exec(self.exec.len() - 1);
                }
                return Ok(None);
            }
            Some(ExecEntry::Loop { proc }) => {
                let body = proc.clone();
                self.schedule_body(body)?;
                return Ok(None);
            }
            Some(_) => match self.exec.pop() {
                Ok(entry) => entry,
                Err(_) => return Ok(Some(Outcome::Completed)),
            },
        };

        match entry {
            ExecEntry::Value(value) => {
                if !opens_frame(&value) {
                    self.count_dispatch();
                }
                self.execute(value, Origin::Direct)?;
                Ok(None)
            }
            ExecEntry::Source(frame) => self.run_source(frame).map(|()| None),
            ExecEntry::Stopped => {
                self.push_operand(Value::bool(false))?;
                Ok(None)
            }
            ExecEntry::Exit => Ok(Some(Outcome::Completed)),
            ExecEntry::Sequence(_) | ExecEntry::Repeat { .. } | ExecEntry::Loop { .. } => Ok(None),
        }
    }

    /// Push a loop body for one iteration.
    fn schedule_body(&mut self, body: Value) -> Result<(), Fault> {
        let entry = match body.as_procedure() {
            Some(seq) if seq.is_empty() => return Ok(()),
            Some(seq) => ExecEntry::Sequence(SeqFrame::new(seq.clone())),
            None => ExecEntry::Value(body.clone()),
        };
        self.exec.push(entry).map_err(|code| Fault {
            code,
            command: body,
        })
    }

    /// Run elements of the top procedure frame.
    ///
    /// Keeps going while elements leave the execution stack alone. The last
    /// element pops the frame before it is dispatched, so a procedure whose
    /// last element calls another procedure does not grow the stack.
    fn run_frame(&mut self) -> Result<(), Fault> {
        loop {
            let Some(ExecEntry::Sequence(frame)) = self.exec.top_mut() else {
                return Ok(());
            };
            let Some((element, last)) = frame.advance() else {
                self.truncate_exec(self.exec.len() - 1);
                return Ok(());
            };
            if last {
                self.exec.truncate(self.exec.len() - 1);
            }
            let marker = self.exec.changes();
            self.count_dispatch();
            self.execute(element, Origin::Element)?;
            if last
                || self.exec.changes() != marker
                || self.pending_exit.is_some()
                || self.needs_safe_point()
            {
                return Ok(());
            }
        }
    }

    /// Read and dispatch the next token of a string or stream.
    fn run_source(&mut self, mut frame: SourceFrame) -> Result<(), Fault> {
        let scanned = match &mut frame.cursor {
            SourceCursor::Bytes { string, position } => {
                let (scanner, names) = (&mut self.scanner, &mut self.names);
                string.with_bytes(|data| {
                    scanner.scan_next(ScanSource::Bytes { data, position }, names)
                })
            }
            SourceCursor::Stream(id) => self
                .scanner
                .scan_next(ScanSource::Stream(*id), &mut self.names),
        };
        match scanned {
            Ok(Some(token)) => {
                self.exec
                    .push(ExecEntry::Source(frame))
                    .map_err(|code| Fault {
                        code,
                        command: token.clone(),
                    })?;
                self.count_dispatch();
                self.execute(token, Origin::Element)
            }
            Ok(None) => {
                if let SourceCursor::Stream(id) = frame.cursor {
                    self.scanner.close(id);
                }
                Ok(())
            }
            Err(code) => {
                if let SourceCursor::Stream(id) = frame.cursor {
                    self.scanner.close(id);
                }
                Err(Fault {
                    code,
                    command: frame.origin,
                })
            }
        }
    }

    fn push_operand(&mut self, value: Value) -> Result<(), Fault> {
        if self.operands.is_full() {
            return Err(Fault {
                code: ErrorCode::StackOverflow,
                command: value,
            });
        }
        self.operands.push(value).map_err(|code| Fault {
            code,
            command: Value::null(),
        })
    }

    fn push_entry(&mut self, entry: ExecEntry, command: &Value) -> Result<(), Fault> {
        self.exec.push(entry).map_err(|code| Fault {
            code,
            command: command.clone(),
        })
    }

    fn execute(&mut self, value: Value, origin: Origin) -> Result<(), Fault> {
        match Action::of(&value, origin) {
            Action::Push => self.push_operand(value),
            Action::Nothing => Ok(()),
            Action::Resolve(name) => {
                let resolved = self.lookup(name).map_err(|code| Fault {
                    code,
                    command: value.clone(),
                })?;
                if resolved.is_executable() && matches!(resolved.kind(), ValueKind::Name(_)) {
                    // Name bound to a name: let the loop take it, so chains
                    // and cycles pass through safe points.
                    return self.push_entry(ExecEntry::Value(resolved), &value);
                }
                self.execute(resolved, Origin::Direct)
            }
            Action::Open(seq) => self.push_entry(ExecEntry::Sequence(SeqFrame::new(seq)), &value),
            Action::Call(id) => self.call_operator(id),
            Action::ScanString(string) => {
                let frame = SourceFrame {
                    origin: value.clone(),
                    cursor: SourceCursor::Bytes {
                        string,
                        position: 0,
                    },
                };
                self.push_entry(ExecEntry::Source(frame), &value)
            }
            Action::ScanStream(id) => {
                let frame = SourceFrame {
                    origin: value.clone(),
                    cursor: SourceCursor::Stream(id),
                };
                self.push_entry(ExecEntry::Source(frame), &value)
            }
        }
    }

    fn call_operator(&mut self, id: OpId) -> Result<(), Fault> {
        let command = Value::operator(id);
        let Some(entry) = self.operators.get(id) else {
            return Err(Fault {
                code: ErrorCode::Undefined,
                command,
            });
        };
        if self.reclaim.is_signalled() {
            if let Err(code) = self.resolve_low_memory() {
                return Err(Fault { code, command });
            }
        }
        if let Some(counters) = &mut self.counters {
            counters.count_operator_call();
        }
        tracing::trace!(op = self.names.lookup(entry.name).unwrap_or("?"), "operator");

        self.safety_level += 1;
        let result = (entry.func)(self);
        self.safety_level -= 1;

        result.map_err(|code| Fault { code, command })
    }

    /// Drop execution-stack entries above `len`, closing abandoned streams.
    pub(crate) fn truncate_exec(&mut self, len: usize) {
        let from = len.min(self.exec.len());
        for entry in &self.exec.as_slice()[from..] {
            if let ExecEntry::Source(SourceFrame {
                cursor: SourceCursor::Stream(id),
                ..
            }) = entry
            {
                self.scanner.close(*id);
            }
        }
        self.exec.truncate(len);
    }

    /// Remove everything this level pushed, its floor included.
    pub(crate) fn unwind(&mut self, base: usize) {
        self.truncate_exec(base - 1);
    }

    /// `stop`: return to the nearest `stopped` context in this level, pushing
    /// `true`, or leave the level with an untrapped stop.
    pub fn stop(&mut self) -> Result<(), ErrorCode> {
        let found = self
            .exec
            .position_from_top(|e| matches!(e, ExecEntry::Stopped | ExecEntry::Exit));
        let stopped_at = found.filter(|&n| matches!(self.exec.peek(n), Ok(ExecEntry::Stopped)));
        match stopped_at {
            Some(n) => {
                self.truncate_exec(self.exec.len() - n - 1);
                self.operands.push(Value::bool(true))
            }
            None => {
                self.pending_exit = Some(ExitKind::Stop);
                Ok(())
            }
        }
    }

    /// `exit`: leave the innermost loop of this level.
    pub fn exit(&mut self) -> Result<(), ErrorCode> {
        let found = self.exec.position_from_top(|e| {
            e.is_loop() || matches!(e, ExecEntry::Stopped | ExecEntry::Exit)
        });
        let Some(n) = found else {
            self.pending_exit = Some(ExitKind::Exit);
            return Ok(());
        };
        match self.exec.peek(n) {
            Ok(entry) if entry.is_loop() => {
                self.truncate_exec(self.exec.len() - n - 1);
                Ok(())
            }
            Ok(ExecEntry::Stopped) => Err(ErrorCode::InvalidExit),
            _ => {
                self.pending_exit = Some(ExitKind::Exit);
                Ok(())
            }
        }
    }

    /// Run `value` in a nested level on behalf of the calling operator.
    ///
    /// An untrapped `stop` or `exit` continues in the caller's level;
    /// `NotAnError` counts as success.
    pub fn execute_nested(&mut self, value: Value) -> Result<(), ErrorCode> {
        match self.interpret(value) {
            Outcome::Completed | Outcome::Propagate(ErrorCode::NotAnError) => Ok(()),
            Outcome::TrappedExit(ExitKind::Stop) => self.stop(),
            Outcome::TrappedExit(ExitKind::Exit) => self.exit(),
            Outcome::Propagate(code) => Err(code),
        }
    }

    /// Like [`execute_nested`](Self::execute_nested), but no error handler
    /// runs for failures inside `value` and the outer error state is left
    /// as it was. The failure is returned to the caller.
    pub fn try_nested(&mut self, value: Value) -> Result<(), ErrorCode> {
        self.errors.save();
        let result = self.execute_nested(value);
        match self.errors.restore() {
            Err(code) => Err(code),
            Ok(()) => result,
        }
    }
}
