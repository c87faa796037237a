//! `InterpreterBuilder` for creating interpreters with a given policy and
//! collaborators.

use rip_value::{ErrorCode, NameTable, Value};

use super::Interpreter;
use crate::config::{ConfigError, EngineConfig};
use crate::control;
use crate::diagnostics::EngineCounters;
use crate::dict_stack::DictStack;
use crate::error_context::ErrorContext;
use crate::interrupt::InterruptSupervisor;
use crate::job::JobState;
use crate::memory::{LowMemoryCoordinator, MemoryManager, UnboundedMemory};
use crate::operators::{OperatorFn, OperatorTable};
use crate::patch::OverrideHook;
use crate::save_level::SaveLevels;
use crate::scanner::{NoScanner, Scanner};
use crate::stack::Stack;

/// Builder for [`Interpreter`].
///
/// Defaults: [`EngineConfig::default`], [`UnboundedMemory`], [`NoScanner`],
/// only the built-in control operators, no override hook, counters off.
pub struct InterpreterBuilder {
    config: EngineConfig,
    memory: Option<Box<dyn MemoryManager>>,
    scanner: Option<Box<dyn Scanner>>,
    operators: Vec<(String, OperatorFn)>,
    override_hook: Option<Box<dyn OverrideHook>>,
    counters: bool,
}

impl Default for InterpreterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        InterpreterBuilder {
            config: EngineConfig::default(),
            memory: None,
            scanner: None,
            operators: Vec::new(),
            override_hook: None,
            counters: false,
        }
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn memory(mut self, memory: impl MemoryManager + 'static) -> Self {
        self.memory = Some(Box::new(memory));
        self
    }

    #[must_use]
    pub fn scanner(mut self, scanner: impl Scanner + 'static) -> Self {
        self.scanner = Some(Box::new(scanner));
        self
    }

    /// Register a native operator, bound in `systemdict` under `name`.
    ///
    /// A name that matches a built-in replaces it.
    #[must_use]
    pub fn operator(mut self, name: impl Into<String>, func: OperatorFn) -> Self {
        self.operators.push((name.into(), func));
        self
    }

    /// Observe every definition. Installed after `systemdict` is populated,
    /// so the hook only sees program definitions.
    #[must_use]
    pub fn override_hook(mut self, hook: impl OverrideHook + 'static) -> Self {
        self.override_hook = Some(Box::new(hook));
        self
    }

    /// Enable [`EngineCounters`].
    #[must_use]
    pub fn with_counters(mut self) -> Self {
        self.counters = true;
        self
    }

    pub fn build(self) -> Result<Interpreter, ConfigError> {
        self.config.validate()?;
        let config = self.config;

        let mut names = NameTable::new();
        for code in ErrorCode::ALL {
            names.intern(code.name());
        }

        let mut dicts = DictStack::new(config.dict_stack_limit);
        let system = dicts.system();
        let error_table = dicts.alloc_scope(0, true);

        let mut operators = OperatorTable::new();
        let builtins = control::OPERATORS
            .iter()
            .map(|&(name, func)| (name, func));
        let extra = self.operators.iter().map(|(name, func)| (name.as_str(), *func));
        for (text, func) in builtins.chain(extra) {
            let name = names.intern(text);
            let id = operators.register(name, func);
            dicts.define_in(system, name, Value::operator(id))?;
        }

        for (text, id) in [
            ("systemdict", system),
            ("globaldict", dicts.global()),
            ("userdict", dicts.user()),
            ("errordict", error_table),
        ] {
            let name = names.intern(text);
            dicts.define_in(system, name, Value::scope(id).global(true))?;
        }

        if let Some(hook) = self.override_hook {
            dicts.set_override_hook(hook);
        }

        tracing::debug!(
            operators = operators.len(),
            names = names.len(),
            "interpreter built"
        );

        Ok(Interpreter {
            operands: Stack::new(
                config.operand_stack_limit,
                ErrorCode::StackOverflow,
                ErrorCode::StackUnderflow,
            ),
            exec: Stack::new(
                config.exec_stack_limit,
                ErrorCode::ExecStackOverflow,
                ErrorCode::StackUnderflow,
            ),
            names,
            dicts,
            operators,
            errors: ErrorContext::new(),
            error_table,
            memory: self.memory.unwrap_or_else(|| Box::new(UnboundedMemory)),
            reclaim: LowMemoryCoordinator::new(),
            supervisor: InterruptSupervisor::new(config.timeout_poll_interval),
            scanner: self.scanner.unwrap_or_else(|| Box::new(NoScanner)),
            save_levels: SaveLevels::new(config.max_save_level),
            job: JobState::default(),
            counters: self.counters.then(EngineCounters::default),
            level: 0,
            safety_level: 0,
            pending_exit: None,
            owner: std::thread::current().id(),
            config,
        })
    }
}
