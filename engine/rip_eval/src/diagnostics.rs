//! Optional performance counters.
//!
//! Stored as `Option<EngineCounters>` on the interpreter. When `None`, every
//! increment is skipped; enable with `InterpreterBuilder::with_counters`.

/// Counts of engine events since the counters were created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineCounters {
    pub dispatch_steps: u64,
    pub operator_calls: u64,
    pub name_lookups: u64,
    pub cache_hits: u64,
    pub errors_handled: u64,
    pub gc_collections: u64,
    pub partial_paints: u64,
    pub disk_vm_warnings: u64,
}

impl EngineCounters {
    #[inline]
    pub fn count_dispatch(&mut self) {
        self.dispatch_steps = self.dispatch_steps.wrapping_add(1);
    }

    #[inline]
    pub fn count_operator_call(&mut self) {
        self.operator_calls = self.operator_calls.wrapping_add(1);
    }

    #[inline]
    pub fn count_lookup(&mut self, cache_hit: bool) {
        self.name_lookups = self.name_lookups.wrapping_add(1);
        if cache_hit {
            self.cache_hits = self.cache_hits.wrapping_add(1);
        }
    }

    #[inline]
    pub fn count_error(&mut self) {
        self.errors_handled = self.errors_handled.wrapping_add(1);
    }

    pub fn count_reclaim(&mut self, collections: u32, partial_paints: u32) {
        self.gc_collections = self.gc_collections.wrapping_add(u64::from(collections));
        self.partial_paints = self.partial_paints.wrapping_add(u64::from(partial_paints));
    }

    #[inline]
    pub fn count_disk_vm_warning(&mut self) {
        self.disk_vm_warnings = self.disk_vm_warnings.wrapping_add(1);
    }

    /// Share of lookups answered by the name cache, in percent.
    #[allow(clippy::cast_precision_loss, reason = "display only")]
    pub fn cache_hit_rate(&self) -> f64 {
        if self.name_lookups == 0 {
            return 0.0;
        }
        self.cache_hits as f64 * 100.0 / self.name_lookups as f64
    }

    /// Format a summary report.
    pub fn report(&self) -> String {
        format!(
            "Engine profile:\n  \
             dispatch steps:    {}\n  \
             operator calls:    {}\n  \
             name lookups:      {} ({:.1}% cached)\n  \
             errors handled:    {}\n  \
             gc collections:    {}\n  \
             partial paints:    {}\n  \
             disk VM warnings:  {}",
            self.dispatch_steps,
            self.operator_calls,
            self.name_lookups,
            self.cache_hit_rate(),
            self.errors_handled,
            self.gc_collections,
            self.partial_paints,
            self.disk_vm_warnings,
        )
    }
}
