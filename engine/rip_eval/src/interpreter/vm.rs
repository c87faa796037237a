//! Save levels, VM mode and allocation.

use rip_value::{ErrorCode, ScopeId, Value, ValueKind};
use smallvec::SmallVec;

use super::Interpreter;

impl Interpreter {
    /// `save`: open a save level.
    pub fn save_vm(&mut self) -> Result<Value, ErrorCode> {
        let level = self.save_levels.save()?;
        tracing::debug!(level, "save");
        Ok(Value::save_point(level))
    }

    /// `restore`: reclaim every local dictionary allocated since `level`
    /// was opened.
    ///
    /// Fails with `InvalidRestore`, changing nothing, if one of them is still
    /// on the dictionary stack or the operand stack.
    pub fn restore_vm(&mut self, level: u32) -> Result<(), ErrorCode> {
        self.save_levels.check_restore(level)?;
        let doomed: SmallVec<[ScopeId; 8]> = self
            .dicts
            .arena()
            .live_ids()
            .filter(|&id| {
                self.dicts
                    .scope(id)
                    .is_some_and(|s| !s.is_global() && s.save_level() >= level)
            })
            .collect();

        for &id in &doomed {
            let on_dict_stack = self.dicts.scope(id).is_some_and(|s| s.on_stack() > 0);
            let on_operand_stack = self
                .operands
                .iter_from_top()
                .any(|v| matches!(v.kind(), ValueKind::Scope(held) if *held == id));
            if on_dict_stack || on_operand_stack {
                tracing::debug!(level, scope = id.index(), "restore blocked by live scope");
                return Err(ErrorCode::InvalidRestore);
            }
        }
        for &id in &doomed {
            self.dicts.free_scope(id);
        }
        self.save_levels.unwind_to(level);
        tracing::debug!(level, reclaimed = doomed.len(), "restore");
        Ok(())
    }

    pub fn save_level(&self) -> u32 {
        self.save_levels.current()
    }

    /// `setglobal`: allocate new dictionaries in global VM.
    pub fn set_global(&mut self, global: bool) {
        self.save_levels.set_global(global);
    }

    pub fn is_global(&self) -> bool {
        self.save_levels.is_global()
    }

    /// Account for `bytes` with the memory manager. On `VmError` the
    /// low-memory coordinator runs once and the allocation is retried.
    pub fn allocate(&mut self, bytes: usize) -> Result<(), ErrorCode> {
        match self.memory.allocate(bytes) {
            Err(ErrorCode::VmError) => {
                self.reclaim.signal();
                self.resolve_low_memory()?;
                self.memory.allocate(bytes)
            }
            other => other,
        }
    }

    /// Run the low-memory coordinator now.
    pub(crate) fn resolve_low_memory(&mut self) -> Result<(), ErrorCode> {
        let safety = self.safety_level;
        self.safety_level += 1;
        let result = self
            .reclaim
            .resolve(self.memory.as_mut(), &self.config.gc, safety);
        self.safety_level -= 1;

        match result {
            Ok(report) => {
                if let Some(counters) = &mut self.counters {
                    counters.count_reclaim(report.collections, report.partial_paints);
                }
                if report.collections > 0 || report.partial_paints > 0 {
                    tracing::info!(
                        retries = report.retries,
                        collections = report.collections,
                        partial_paints = report.partial_paints,
                        freed = report.freed,
                        "memory reclaimed"
                    );
                }
                Ok(())
            }
            Err(code) => {
                let report = self.reclaim.last_report();
                if let Some(counters) = &mut self.counters {
                    counters.count_reclaim(report.collections, report.partial_paints);
                }
                tracing::warn!(retries = report.retries, "memory exhausted");
                self.job.fail("VMerror");
                Err(code)
            }
        }
    }
}
