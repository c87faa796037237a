//! Low-memory coordination.
//!
//! The engine does not own memory; a [`MemoryManager`] does. When the
//! manager reports pressure the interpreter moves the [`LowMemoryCoordinator`]
//! to `LowMemorySignalled`, and before the next operator runs the coordinator
//! tries to win memory back, escalating one tier per failed attempt:
//!
//! | attempt | budget | action after a failed `regain_reserves` |
//! |---------|--------|-----------------------------------------|
//! | 0       | 1      | none                                    |
//! | 1       | 2      | incremental collection                  |
//! | 2       | 4      | full collection                         |
//! | 3+      | 2^a    | partial paint, else full collection     |
//!
//! Collections only run with the recursion-safety level at zero and when the
//! [`GcPolicy`] allows them. When the retry bound is exceeded, or no action is
//! left to try, the coordinator gives up with `VmError`.

use rip_value::ErrorCode;

use crate::config::GcPolicy;

/// How much the memory manager may spend regaining reserves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReclaimCost(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReserveStatus {
    Regained,
    Insufficient,
}

/// The external memory subsystem.
pub trait MemoryManager {
    /// Account for an allocation of `bytes`.
    fn allocate(&mut self, bytes: usize) -> Result<(), ErrorCode>;
    fn is_low_memory(&self) -> bool;
    fn regain_reserves(&mut self, budget: ReclaimCost) -> ReserveStatus;
    fn gc_threshold_exceeded(&self) -> bool;
    /// Run the collector; returns bytes freed.
    fn collect(&mut self, full: bool) -> usize;
    /// Render and discard the display list built so far. `false` when there
    /// is nothing to paint.
    fn partial_paint(&mut self) -> bool;
}

/// A memory manager that never runs out.
#[derive(Copy, Clone, Debug, Default)]
pub struct UnboundedMemory;

impl MemoryManager for UnboundedMemory {
    fn allocate(&mut self, _bytes: usize) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn is_low_memory(&self) -> bool {
        false
    }

    fn regain_reserves(&mut self, _budget: ReclaimCost) -> ReserveStatus {
        ReserveStatus::Regained
    }

    fn gc_threshold_exceeded(&self) -> bool {
        false
    }

    fn collect(&mut self, _full: bool) -> usize {
        0
    }

    fn partial_paint(&mut self) -> bool {
        false
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LowMemoryState {
    Normal,
    LowMemorySignalled,
    Reclaimed,
    PartialPainted,
    Exhausted,
}

/// What one resolution did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub retries: u32,
    pub collections: u32,
    pub partial_paints: u32,
    pub freed: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Escalation {
    Nothing,
    Collect { full: bool },
    PartialPaint,
    GiveUp,
}

#[derive(Debug)]
pub struct LowMemoryCoordinator {
    state: LowMemoryState,
    last: ReclaimReport,
}

impl Default for LowMemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LowMemoryCoordinator {
    pub fn new() -> Self {
        LowMemoryCoordinator {
            state: LowMemoryState::Normal,
            last: ReclaimReport::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> LowMemoryState {
        self.state
    }

    #[inline]
    pub fn is_signalled(&self) -> bool {
        self.state == LowMemoryState::LowMemorySignalled
    }

    /// Report of the most recent resolution.
    pub fn last_report(&self) -> ReclaimReport {
        self.last
    }

    /// Memory is low. After exhaustion the coordinator stays `Exhausted`
    /// until pressure goes away, so one failure is reported once.
    pub fn signal(&mut self) {
        if self.state != LowMemoryState::Exhausted {
            self.state = LowMemoryState::LowMemorySignalled;
        }
    }

    /// Return to `Normal` once pressure is gone.
    pub fn settle(&mut self) {
        if matches!(
            self.state,
            LowMemoryState::Reclaimed | LowMemoryState::PartialPainted | LowMemoryState::Exhausted
        ) {
            self.state = LowMemoryState::Normal;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn escalation(attempt: u32, policy: &GcPolicy, safety_level: u32) -> Escalation {
        let gc_ok = policy.allow_gc && safety_level == 0;
        match attempt.min(3) {
            0 => Escalation::Nothing,
            1 if gc_ok => Escalation::Collect { full: false },
            2 if gc_ok => Escalation::Collect { full: true },
            1 | 2 => Escalation::Nothing,
            _ if policy.allow_partial_paint => Escalation::PartialPaint,
            _ if gc_ok => Escalation::Collect { full: true },
            _ => Escalation::GiveUp,
        }
    }

    /// Try to regain memory. `Err(VmError)` when exhausted.
    pub fn resolve(
        &mut self,
        memory: &mut dyn MemoryManager,
        policy: &GcPolicy,
        safety_level: u32,
    ) -> Result<ReclaimReport, ErrorCode> {
        let mut report = ReclaimReport::default();
        let mut painted = false;
        let mut attempt = 0u32;
        loop {
            let budget = ReclaimCost(1u32 << attempt.min(31));
            if memory.regain_reserves(budget) == ReserveStatus::Regained {
                self.state = if painted {
                    LowMemoryState::PartialPainted
                } else {
                    LowMemoryState::Reclaimed
                };
                self.last = report;
                return Ok(report);
            }
            if attempt >= policy.max_reclaim_retries {
                break;
            }
            match Self::escalation(attempt, policy, safety_level) {
                Escalation::Nothing => {}
                Escalation::Collect { full } => {
                    report.freed += memory.collect(full);
                    report.collections += 1;
                }
                Escalation::PartialPaint => {
                    if memory.partial_paint() {
                        painted = true;
                        report.partial_paints += 1;
                    } else if policy.allow_gc && safety_level == 0 {
                        report.freed += memory.collect(true);
                        report.collections += 1;
                    } else {
                        break;
                    }
                }
                Escalation::GiveUp => break,
            }
            attempt += 1;
            report.retries = attempt;
        }
        self.state = LowMemoryState::Exhausted;
        self.last = report;
        Err(ErrorCode::VmError)
    }
}
