//! Engine configuration.
//!
//! `EngineConfig` is the policy object handed to [`InterpreterBuilder`]:
//! stack limits, nesting limits, polling cadence and the garbage-collection
//! policy used by the low-memory coordinator. Every field has a working
//! default; `with_*` methods adjust single knobs.
//!
//! [`InterpreterBuilder`]: crate::InterpreterBuilder

use std::time::Duration;

/// Rejected configuration.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: usize,
        value: usize,
    },
    #[error("overflow headroom {headroom} must be smaller than the {stack} stack limit {limit}")]
    HeadroomTooLarge {
        stack: &'static str,
        headroom: usize,
        limit: usize,
    },
    #[error("job timeout must be non-zero")]
    ZeroTimeout,
    #[error("engine setup failed: {0}")]
    Setup(#[from] rip_value::ErrorCode),
}

/// When the coordinator may run the collector or a partial paint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GcPolicy {
    /// Permit reclamation-driven collection at all.
    pub allow_gc: bool,
    /// Collect at safe points when the memory manager reports its threshold.
    pub opportunistic_gc: bool,
    /// Permit flushing the display list to free memory.
    pub allow_partial_paint: bool,
    /// Upper bound on `regain_reserves` retries per low-memory episode.
    pub max_reclaim_retries: u32,
}

impl Default for GcPolicy {
    fn default() -> Self {
        GcPolicy {
            allow_gc: true,
            opportunistic_gc: true,
            allow_partial_paint: true,
            max_reclaim_retries: 8,
        }
    }
}

/// Limits and policy for one interpreter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub operand_stack_limit: usize,
    pub exec_stack_limit: usize,
    /// Includes the three permanent scopes.
    pub dict_stack_limit: usize,
    pub max_interpreter_level: usize,
    pub max_save_level: u32,
    /// Entries removed beyond the limit when a stack overflows, so the
    /// handler has room to run.
    pub overflow_headroom: usize,
    /// Loop iterations between deadline checks.
    pub timeout_poll_interval: u32,
    pub job_timeout: Option<Duration>,
    pub gc: GcPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            operand_stack_limit: 500,
            exec_stack_limit: 250,
            dict_stack_limit: 20,
            max_interpreter_level: 32,
            max_save_level: 15,
            overflow_headroom: 8,
            timeout_poll_interval: 1024,
            job_timeout: None,
            gc: GcPolicy::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_operand_stack_limit(mut self, limit: usize) -> Self {
        self.operand_stack_limit = limit;
        self
    }

    #[must_use]
    pub fn with_exec_stack_limit(mut self, limit: usize) -> Self {
        self.exec_stack_limit = limit;
        self
    }

    #[must_use]
    pub fn with_dict_stack_limit(mut self, limit: usize) -> Self {
        self.dict_stack_limit = limit;
        self
    }

    #[must_use]
    pub fn with_max_interpreter_level(mut self, level: usize) -> Self {
        self.max_interpreter_level = level;
        self
    }

    #[must_use]
    pub fn with_max_save_level(mut self, level: u32) -> Self {
        self.max_save_level = level;
        self
    }

    #[must_use]
    pub fn with_overflow_headroom(mut self, headroom: usize) -> Self {
        self.overflow_headroom = headroom;
        self
    }

    #[must_use]
    pub fn with_timeout_poll_interval(mut self, interval: u32) -> Self {
        self.timeout_poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_gc_policy(mut self, gc: GcPolicy) -> Self {
        self.gc = gc;
        self
    }

    /// Check the limits are usable together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_min("operand_stack_limit", 1, self.operand_stack_limit)?;
        check_min("exec_stack_limit", 2, self.exec_stack_limit)?;
        check_min("dict_stack_limit", 3, self.dict_stack_limit)?;
        check_min("max_interpreter_level", 1, self.max_interpreter_level)?;
        check_min(
            "timeout_poll_interval",
            1,
            self.timeout_poll_interval as usize,
        )?;
        for (stack, limit) in [
            ("operand", self.operand_stack_limit),
            ("execution", self.exec_stack_limit),
        ] {
            if self.overflow_headroom >= limit {
                return Err(ConfigError::HeadroomTooLarge {
                    stack,
                    headroom: self.overflow_headroom,
                    limit,
                });
            }
        }
        if self.job_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

fn check_min(field: &'static str, min: usize, value: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::TooSmall { field, min, value });
    }
    Ok(())
}
