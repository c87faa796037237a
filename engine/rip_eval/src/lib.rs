//! Rip Eval - execution engine of a PostScript-language RIP.
//!
//! This crate runs tokenized programs: it owns the operand, execution and
//! dictionary stacks, resolves names through the dictionary stack, calls
//! native operators, and turns operator failures into error-handler calls.
//!
//! # Architecture
//!
//! - [`Interpreter`]: all engine state, with `interpret` as the entry point
//! - [`DictStack`]: dictionary stack with an epoch-validated name cache
//! - [`ErrorContext`]: error bookkeeping and saved error contexts
//! - [`LowMemoryCoordinator`]: escalating reclamation against a
//!   [`MemoryManager`]
//! - [`InterruptHandle`]: thread-safe interrupt, timeout and low-memory
//!   requests, consumed at safe points
//!
//! Tokenizing, graphics, fonts and devices are outside the engine. They plug
//! in through [`Scanner`], [`MemoryManager`] and operators registered on the
//! [`InterpreterBuilder`].
//!
//! # Threading
//!
//! An interpreter is `!Send`: values share storage through `Rc`. Only an
//! [`InterruptHandle`] may be moved to another thread.

mod config;
mod control;
mod diagnostics;
mod dict_stack;
mod error_context;
mod exec;
mod interpreter;
mod interrupt;
mod job;
mod memory;
mod name_cache;
mod operators;
mod patch;
mod save_level;
mod scanner;
mod scope;
mod stack;

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod test_helpers;
#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;

pub use config::{ConfigError, EngineConfig, GcPolicy};
pub use diagnostics::EngineCounters;
pub use dict_stack::{DictStack, Resolved, PERMANENT_SCOPES};
pub use error_context::{ErrorContext, ErrorRecord, ErrorState};
pub use exec::{ExecEntry, ExitKind, SeqFrame, SourceCursor, SourceFrame};
pub use interpreter::{Interpreter, InterpreterBuilder, Outcome};
pub use interrupt::{InterruptHandle, InterruptSupervisor};
pub use job::{JobError, JobPhase, JobState, JobSummary};
pub use memory::{
    LowMemoryCoordinator, LowMemoryState, MemoryManager, ReclaimCost, ReclaimReport,
    ReserveStatus, UnboundedMemory,
};
pub use name_cache::{CacheEntry, NameCache};
pub use operators::{OperatorEntry, OperatorFn, OperatorTable};
pub use patch::{OverrideHook, Patch, PatchError, PatchId, PatchSet, Rewrite, Rewrites, Trigger};
pub use save_level::SaveLevels;
pub use scanner::{NoScanner, ScanSource, Scanner};
pub use scope::{Insert, ScopeArena, ScopeData};
pub use stack::Stack;

pub use rip_value::{ErrorCode, Name, NameTable, Value, ValueKind};

static TRACING_INIT: std::sync::Once = std::sync::Once::new();

/// Initialize tracing from `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
