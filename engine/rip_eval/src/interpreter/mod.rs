//! The interpreter state.
//!
//! All engine state lives in one [`Interpreter`] value: the three stacks,
//! the error context, the memory and interrupt coordinators and the job
//! state. There are no globals; operators receive `&mut Interpreter`.
//!
//! The loop itself is in `run`, error dispatch in `errors`, save levels and
//! allocation in `vm`, construction in `builder`.

mod builder;
mod errors;
mod run;
mod vm;

use std::thread::ThreadId;
use std::time::Instant;

use rip_value::{ErrorCode, Name, NameTable, ScopeId, Value};

use crate::config::EngineConfig;
use crate::diagnostics::EngineCounters;
use crate::dict_stack::{DictStack, PERMANENT_SCOPES};
use crate::error_context::{ErrorContext, ErrorRecord};
use crate::exec::{ExecEntry, ExitKind};
use crate::interrupt::{InterruptHandle, InterruptSupervisor};
use crate::job::{JobError, JobPhase, JobState, JobSummary};
use crate::memory::{LowMemoryCoordinator, MemoryManager};
use crate::operators::OperatorTable;
use crate::save_level::SaveLevels;
use crate::scanner::Scanner;
use crate::stack::Stack;

pub use builder::InterpreterBuilder;

/// How one `interpret` call ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The program ran to its end.
    Completed,
    /// A `stop` or `exit` found no matching context in this level.
    TrappedExit(ExitKind),
    /// An error was not handled in this level.
    Propagate(ErrorCode),
}

pub struct Interpreter {
    config: EngineConfig,
    names: NameTable,
    operands: Stack<Value>,
    exec: Stack<ExecEntry>,
    dicts: DictStack,
    operators: OperatorTable,
    errors: ErrorContext,
    error_table: ScopeId,
    memory: Box<dyn MemoryManager>,
    reclaim: LowMemoryCoordinator,
    supervisor: InterruptSupervisor,
    scanner: Box<dyn Scanner>,
    save_levels: SaveLevels,
    job: JobState,
    counters: Option<EngineCounters>,
    level: usize,
    safety_level: u32,
    pending_exit: Option<ExitKind>,
    owner: ThreadId,
}

impl Interpreter {
    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Operand stack

    pub fn push(&mut self, value: Value) -> Result<(), ErrorCode> {
        self.operands.push(value)
    }

    pub fn pop(&mut self) -> Result<Value, ErrorCode> {
        self.operands.pop()
    }

    /// Operand `n` from the top.
    pub fn peek(&self, n: usize) -> Result<&Value, ErrorCode> {
        self.operands.peek(n)
    }

    /// Fail with `StackUnderflow` unless `n` operands are present.
    pub fn require(&self, n: usize) -> Result<(), ErrorCode> {
        self.operands.require(n)
    }

    pub fn pop_int(&mut self) -> Result<i64, ErrorCode> {
        let value = self.operands.peek(0)?.as_int().ok_or(ErrorCode::TypeCheck)?;
        self.operands.pop()?;
        Ok(value)
    }

    pub fn pop_bool(&mut self) -> Result<bool, ErrorCode> {
        let value = self.operands.peek(0)?.as_bool().ok_or(ErrorCode::TypeCheck)?;
        self.operands.pop()?;
        Ok(value)
    }

    /// Pop an executable sequence.
    pub fn pop_procedure(&mut self) -> Result<Value, ErrorCode> {
        if self.operands.peek(0)?.as_procedure().is_none() {
            return Err(ErrorCode::TypeCheck);
        }
        self.operands.pop()
    }

    pub fn pop_scope(&mut self) -> Result<ScopeId, ErrorCode> {
        let id = self.operands.peek(0)?.as_scope().ok_or(ErrorCode::TypeCheck)?;
        self.operands.pop()?;
        Ok(id)
    }

    /// Operand stack, bottom to top.
    pub fn operands(&self) -> &[Value] {
        self.operands.as_slice()
    }

    pub fn clear_operands(&mut self) {
        self.operands.clear();
    }

    // Execution stack

    pub fn exec_depth(&self) -> usize {
        self.exec.len()
    }

    /// Schedule `value` for execution after the current operator returns.
    pub fn push_exec(&mut self, value: Value) -> Result<(), ErrorCode> {
        self.exec.push(ExecEntry::Value(value))
    }

    pub(crate) fn push_exec_entry(&mut self, entry: ExecEntry) -> Result<(), ErrorCode> {
        self.exec.push(entry)
    }

    /// Execution-stack entries, bottom to top.
    pub fn exec_entries(&self) -> &[ExecEntry] {
        self.exec.as_slice()
    }

    // Names and dictionaries

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    pub fn intern(&mut self, text: &str) -> Name {
        self.names.intern(text)
    }

    pub fn dicts(&self) -> &DictStack {
        &self.dicts
    }

    pub fn dicts_mut(&mut self) -> &mut DictStack {
        &mut self.dicts
    }

    /// Resolve `name` through the dictionary stack.
    pub fn lookup(&mut self, name: Name) -> Result<Value, ErrorCode> {
        let resolved = self.dicts.resolve_traced(name)?;
        if let Some(counters) = &mut self.counters {
            counters.count_lookup(resolved.cache_hit);
        }
        Ok(resolved.value)
    }

    /// Bind `name` in the current scope.
    pub fn define(&mut self, name: Name, value: Value) -> Result<(), ErrorCode> {
        self.dicts.define(name, value)
    }

    /// Allocate a dictionary at the current save level and VM mode.
    pub fn new_scope(&mut self) -> ScopeId {
        self.dicts
            .alloc_scope(self.save_levels.current(), self.save_levels.is_global())
    }

    pub fn error_table(&self) -> ScopeId {
        self.error_table
    }

    /// Install `handler` as the handler for `code`.
    pub fn define_error_handler(&mut self, code: ErrorCode, handler: Value) -> Result<(), ErrorCode> {
        let key = self.names.intern(code.name());
        self.dicts.define_in(self.error_table, key, handler)
    }

    // Errors and diagnostics

    pub fn errors(&self) -> &ErrorContext {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorContext {
        &mut self.errors
    }

    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.errors.last()
    }

    pub fn counters(&self) -> Option<&EngineCounters> {
        self.counters.as_ref()
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.supervisor.handle().clone()
    }

    /// Current `interpret` nesting depth; 0 outside the engine.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn safety_level(&self) -> u32 {
        self.safety_level
    }

    pub fn low_memory(&self) -> &LowMemoryCoordinator {
        &self.reclaim
    }

    // Jobs

    pub fn job_phase(&self) -> JobPhase {
        self.job.phase()
    }

    pub fn job(&self) -> &JobState {
        &self.job
    }

    pub fn configure_job(&mut self) -> Result<(), JobError> {
        self.job.configure()?;
        tracing::info!("job configuration started");
        Ok(())
    }

    pub fn begin_real_job(&mut self) -> Result<(), JobError> {
        self.job.begin_real()?;
        if let Some(timeout) = self.config.job_timeout {
            self.supervisor
                .handle()
                .set_deadline(Some(Instant::now() + timeout));
        }
        tracing::info!("job started");
        Ok(())
    }

    pub fn fail_job(&mut self, reason: &str) {
        tracing::info!(reason, "job failed");
        self.job.fail(reason);
    }

    /// Return the interpreter to a clean idle state.
    pub fn end_job(&mut self, aborted: bool) -> JobSummary {
        self.errors.reset();
        self.supervisor.reset();
        self.pending_exit = None;
        self.reclaim.reset();
        self.operands.clear();
        self.dicts.end_to(PERMANENT_SCOPES);
        if self.save_levels.current() > 0 && self.restore_vm(1).is_err() {
            tracing::warn!("job left unrestorable save levels");
        }
        self.save_levels.set_global(false);
        let summary = self.job.end(aborted);
        tracing::info!(
            failed = summary.failed,
            aborted = summary.aborted,
            "job ended"
        );
        summary
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("operands", &self.operands.len())
            .field("exec", &self.exec.len())
            .field("dicts", &self.dicts.depth())
            .field("level", &self.level)
            .field("job", &self.job.phase())
            .finish_non_exhaustive()
    }
}
