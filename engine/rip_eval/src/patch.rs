//! Conditional redefinition patches.
//!
//! Some prologues are known to define procedures that need replacing. A
//! [`Patch`] lists the definitions that identify such a prologue (key plus
//! the value it is expected to be given) and the value each key should be
//! rewritten to. Once every trigger of a patch has been seen, the rewrites
//! are emitted together, exactly once.
//!
//! The dictionary stack calls an [`OverrideHook`] after each definition;
//! [`PatchSet`] is the implementation the engine ships with.

use rip_value::{Name, ScopeId, Value};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Maximum triggers per patch (the armed set is a `u64`).
pub const MAX_TRIGGERS: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("patch has no triggers")]
    Empty,
    #[error("patch has {0} triggers, at most {MAX_TRIGGERS} are supported")]
    TooManyTriggers(usize),
}

/// A definition to write in place of the one the program made.
#[derive(Clone, Debug, PartialEq)]
pub struct Rewrite {
    pub scope: ScopeId,
    pub key: Name,
    pub value: Value,
}

pub type Rewrites = SmallVec<[Rewrite; 2]>;

/// Observer of dictionary definitions.
pub trait OverrideHook {
    /// Called after `key` was bound to `value` in `scope`. Returned rewrites
    /// are stored without calling the hook again.
    fn after_define(&mut self, scope: ScopeId, key: Name, value: &Value) -> Rewrites;
}

#[derive(Clone, Debug)]
pub struct Trigger {
    pub key: Name,
    pub expected_old: Value,
    pub new_value: Value,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PatchId(u32);

#[derive(Clone, Debug)]
pub struct Patch {
    triggers: SmallVec<[Trigger; 4]>,
    armed: u64,
    armed_in: SmallVec<[Option<ScopeId>; 4]>,
    applied: bool,
}

impl Patch {
    fn full_mask(&self) -> u64 {
        if self.triggers.len() == MAX_TRIGGERS {
            u64::MAX
        } else {
            (1u64 << self.triggers.len()) - 1
        }
    }

    #[inline]
    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Number of triggers currently armed.
    pub fn armed_count(&self) -> u32 {
        self.armed.count_ones()
    }
}

/// A set of patches indexed by trigger key.
#[derive(Debug, Default)]
pub struct PatchSet {
    patches: Vec<Patch>,
    by_key: FxHashMap<Name, SmallVec<[(usize, usize); 2]>>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patch.
    pub fn add(&mut self, triggers: impl IntoIterator<Item = Trigger>) -> Result<PatchId, PatchError> {
        let triggers: SmallVec<[Trigger; 4]> = triggers.into_iter().collect();
        if triggers.is_empty() {
            return Err(PatchError::Empty);
        }
        if triggers.len() > MAX_TRIGGERS {
            return Err(PatchError::TooManyTriggers(triggers.len()));
        }
        let patch_index = self.patches.len();
        for (trigger_index, trigger) in triggers.iter().enumerate() {
            self.by_key
                .entry(trigger.key)
                .or_default()
                .push((patch_index, trigger_index));
        }
        let armed_in = SmallVec::from_elem(None, triggers.len());
        self.patches.push(Patch {
            triggers,
            armed: 0,
            armed_in,
            applied: false,
        });
        #[allow(clippy::cast_possible_truncation, reason = "patch count is small")]
        Ok(PatchId(patch_index as u32))
    }

    pub fn get(&self, id: PatchId) -> Option<&Patch> {
        self.patches.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

impl OverrideHook for PatchSet {
    fn after_define(&mut self, scope: ScopeId, key: Name, value: &Value) -> Rewrites {
        let mut rewrites = Rewrites::new();
        let Some(hits) = self.by_key.get(&key) else {
            return rewrites;
        };
        for &(patch_index, trigger_index) in hits {
            let patch = &mut self.patches[patch_index];
            if patch.applied {
                continue;
            }
            let bit = 1u64 << trigger_index;
            if value.matches(&patch.triggers[trigger_index].expected_old) {
                patch.armed |= bit;
                patch.armed_in[trigger_index] = Some(scope);
            } else {
                patch.armed &= !bit;
                patch.armed_in[trigger_index] = None;
                continue;
            }
            if patch.armed != patch.full_mask() {
                continue;
            }
            tracing::debug!(patch = patch_index, "conditional patch applied");
            patch.applied = true;
            for (trigger, armed_in) in patch.triggers.iter().zip(&patch.armed_in) {
                if let Some(scope) = *armed_in {
                    rewrites.push(Rewrite {
                        scope,
                        key: trigger.key,
                        value: trigger.new_value.clone(),
                    });
                }
            }
        }
        rewrites
    }
}
