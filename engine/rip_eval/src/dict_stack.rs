//! The dictionary stack and name resolution.
//!
//! Three permanent scopes form the base: `systemdict`, `globaldict` and
//! `userdict`. Scopes pushed by `begin` sit above them. Resolution searches
//! from the top down and the first binding wins.
//!
//! # Cache
//!
//! Successful lookups are remembered per name in a [`NameCache`]. Entries are
//! validated lazily against three things: the scope id still resolves in the
//! arena, the scope is still on the stack, and the stack's epoch is unchanged.
//! The epoch moves whenever the answer to some lookup could have changed:
//! `begin`, `end`, trimming, and adding or removing a key in a scope that is
//! on the stack. Overwriting an existing binding leaves it alone, since the
//! cached slot then holds the new value. Neither `begin` nor `end` touches the
//! cache itself.

use rip_value::{Access, ErrorCode, Name, ScopeId, Value};

use crate::name_cache::{CacheEntry, NameCache};
use crate::patch::OverrideHook;
use crate::scope::{Insert, ScopeArena, ScopeData};

/// Depth of the permanent base.
pub const PERMANENT_SCOPES: usize = 3;

/// Result of a resolution, with whether the cache answered it.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub value: Value,
    pub cache_hit: bool,
}

pub struct DictStack {
    arena: ScopeArena,
    stack: Vec<ScopeId>,
    limit: usize,
    cache: NameCache,
    epoch: u64,
    hook: Option<Box<dyn OverrideHook>>,
}

impl DictStack {
    /// Create the stack with fresh permanent scopes.
    ///
    /// `limit` counts the permanent scopes and must be at least
    /// [`PERMANENT_SCOPES`]; the interpreter validates this up front.
    pub fn new(limit: usize) -> Self {
        let mut arena = ScopeArena::new();
        let system = arena.alloc(0, true);
        let global = arena.alloc(0, true);
        let user = arena.alloc(0, false);
        let stack = vec![system, global, user];
        for &id in &stack {
            if let Some(scope) = arena.get_mut(id) {
                scope.enter();
            }
        }
        DictStack {
            arena,
            stack,
            limit: limit.max(PERMANENT_SCOPES),
            cache: NameCache::new(),
            epoch: 0,
            hook: None,
        }
    }

    #[inline]
    pub fn system(&self) -> ScopeId {
        self.stack[0]
    }

    #[inline]
    pub fn global(&self) -> ScopeId {
        self.stack[1]
    }

    #[inline]
    pub fn user(&self) -> ScopeId {
        self.stack[2]
    }

    /// The scope `def` writes to.
    #[inline]
    pub fn current(&self) -> ScopeId {
        // The permanent base is never popped.
        self.stack[self.stack.len() - 1]
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Scopes bottom to top.
    pub fn scopes(&self) -> &[ScopeId] {
        &self.stack
    }

    pub fn arena(&self) -> &ScopeArena {
        &self.arena
    }

    pub fn scope(&self, id: ScopeId) -> Option<&ScopeData> {
        self.arena.get(id)
    }

    pub fn set_override_hook(&mut self, hook: Box<dyn OverrideHook>) {
        self.hook = Some(hook);
    }

    pub fn alloc_scope(&mut self, save_level: u32, global: bool) -> ScopeId {
        self.arena.alloc(save_level, global)
    }

    /// Release a scope that is not on the stack.
    pub(crate) fn free_scope(&mut self, id: ScopeId) -> bool {
        if self.arena.get(id).is_some_and(|s| s.on_stack() > 0) {
            return false;
        }
        self.arena.free(id)
    }

    pub fn set_access(&mut self, id: ScopeId, access: Access) -> Result<(), ErrorCode> {
        let scope = self.arena.get_mut(id).ok_or(ErrorCode::InvalidAccess)?;
        scope.set_access(access);
        Ok(())
    }

    fn bump(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        if self.epoch == 0 {
            // Wrapped: old entries could look current again.
            self.cache.clear();
        }
    }

    pub fn begin(&mut self, id: ScopeId) -> Result<(), ErrorCode> {
        if self.stack.len() >= self.limit {
            return Err(ErrorCode::DictStackOverflow);
        }
        let scope = self.arena.get_mut(id).ok_or(ErrorCode::InvalidAccess)?;
        scope.enter();
        self.stack.push(id);
        self.bump();
        Ok(())
    }

    pub fn end(&mut self) -> Result<ScopeId, ErrorCode> {
        if self.stack.len() <= PERMANENT_SCOPES {
            return Err(ErrorCode::DictStackUnderflow);
        }
        let id = self.current();
        self.stack.pop();
        if let Some(scope) = self.arena.get_mut(id) {
            scope.leave();
        }
        self.bump();
        Ok(id)
    }

    /// Pop scopes until `depth` remain (never below the permanent base).
    pub fn end_to(&mut self, depth: usize) {
        let depth = depth.max(PERMANENT_SCOPES);
        if self.stack.len() <= depth {
            return;
        }
        for id in self.stack.drain(depth..) {
            if let Some(scope) = self.arena.get_mut(id) {
                scope.leave();
            }
        }
        self.bump();
    }

    pub fn resolve(&mut self, name: Name) -> Result<Value, ErrorCode> {
        self.resolve_traced(name).map(|r| r.value)
    }

    /// Resolve `name`, reporting whether the cache answered.
    pub fn resolve_traced(&mut self, name: Name) -> Result<Resolved, ErrorCode> {
        if let Some(value) = self.cached(name) {
            return Ok(Resolved {
                value,
                cache_hit: true,
            });
        }
        for &id in self.stack.iter().rev() {
            let Some(scope) = self.arena.get(id) else {
                continue;
            };
            if let Some(slot) = scope.slot_of(name) {
                if let Some(value) = scope.value_at(slot) {
                    let value = value.clone();
                    self.cache.store(
                        name,
                        CacheEntry {
                            scope: id,
                            slot,
                            epoch: self.epoch,
                        },
                    );
                    return Ok(Resolved {
                        value,
                        cache_hit: false,
                    });
                }
            }
        }
        Err(ErrorCode::Undefined)
    }

    fn cached(&self, name: Name) -> Option<Value> {
        let entry = self.cache.get(name)?;
        if entry.epoch != self.epoch {
            return None;
        }
        let scope = self.arena.get(entry.scope)?;
        if scope.on_stack() == 0 {
            return None;
        }
        scope.value_at(entry.slot).cloned()
    }

    /// The topmost scope binding `name`.
    pub fn lookup_where(&self, name: Name) -> Option<ScopeId> {
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|&id| self.arena.get(id).is_some_and(|s| s.slot_of(name).is_some()))
    }

    /// Look up `name` in one scope only.
    pub fn lookup_in(&self, id: ScopeId, name: Name) -> Option<Value> {
        self.arena.get(id)?.get(name).cloned()
    }

    /// Bind `name` in the current scope.
    pub fn define(&mut self, name: Name, value: Value) -> Result<(), ErrorCode> {
        self.define_in(self.current(), name, value)
    }

    /// Bind `name` in a specific scope, then run the override hook.
    ///
    /// Rewrites aimed at a scope that has since been freed or made read-only
    /// are dropped; the definition itself has already succeeded.
    pub fn define_in(&mut self, id: ScopeId, name: Name, value: Value) -> Result<(), ErrorCode> {
        let notify = self.hook.is_some().then(|| value.clone());
        self.store(id, name, value)?;
        if let (Some(value), Some(mut hook)) = (notify, self.hook.take()) {
            let rewrites = hook.after_define(id, name, &value);
            self.hook = Some(hook);
            for rewrite in rewrites {
                let scope = rewrite.scope;
                if let Err(code) = self.store(scope, rewrite.key, rewrite.value) {
                    tracing::debug!(
                        scope = scope.index(),
                        error = code.name(),
                        "patch rewrite skipped"
                    );
                }
            }
        }
        Ok(())
    }

    fn store(&mut self, id: ScopeId, name: Name, value: Value) -> Result<(), ErrorCode> {
        let scope = self.arena.get_mut(id).ok_or(ErrorCode::InvalidAccess)?;
        if !scope.access().can_write() {
            return Err(ErrorCode::InvalidAccess);
        }
        let visible = scope.on_stack() > 0;
        if scope.insert(name, value) == Insert::NewKey && visible {
            self.bump();
        }
        Ok(())
    }

    /// Remove `name` from the current scope.
    pub fn undefine(&mut self, name: Name) -> Result<Value, ErrorCode> {
        self.undefine_in(self.current(), name)
    }

    pub fn undefine_in(&mut self, id: ScopeId, name: Name) -> Result<Value, ErrorCode> {
        let scope = self.arena.get_mut(id).ok_or(ErrorCode::InvalidAccess)?;
        if !scope.access().can_write() {
            return Err(ErrorCode::InvalidAccess);
        }
        let visible = scope.on_stack() > 0;
        let removed = scope.remove(name).ok_or(ErrorCode::Undefined)?;
        if visible {
            self.bump();
        }
        self.cache.forget(name);
        Ok(removed)
    }
}

impl std::fmt::Debug for DictStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictStack")
            .field("stack", &self.stack)
            .field("limit", &self.limit)
            .field("epoch", &self.epoch)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}
