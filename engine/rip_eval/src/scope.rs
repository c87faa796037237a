//! Dictionary storage.
//!
//! Every dictionary lives in the [`ScopeArena`] and is referred to by a
//! generation-checked [`ScopeId`]. Bindings sit in stable slots: removing a
//! key vacates its slot without moving the others, so a cached slot index
//! stays meaningful for as long as the key stays bound.

use rip_value::{Access, Name, ScopeId, Value};
use rustc_hash::FxHashMap;

/// Effect of an insertion on the key set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Insert {
    /// The key was already bound; only the value changed.
    Overwrote,
    /// The key was not bound before.
    NewKey,
}

/// One dictionary.
#[derive(Clone, Debug)]
pub struct ScopeData {
    slots: Vec<(Name, Option<Value>)>,
    index: FxHashMap<Name, usize>,
    bound: usize,
    on_stack: u32,
    save_level: u32,
    global: bool,
    access: Access,
}

impl ScopeData {
    fn new(save_level: u32, global: bool) -> Self {
        ScopeData {
            slots: Vec::new(),
            index: FxHashMap::default(),
            bound: 0,
            on_stack: 0,
            save_level,
            global,
            access: Access::Unlimited,
        }
    }

    pub fn get(&self, key: Name) -> Option<&Value> {
        let slot = *self.index.get(&key)?;
        self.value_at(slot)
    }

    /// Slot holding `key`, if bound.
    pub fn slot_of(&self, key: Name) -> Option<usize> {
        let slot = *self.index.get(&key)?;
        self.slots[slot].1.as_ref().map(|_| slot)
    }

    #[inline]
    pub fn value_at(&self, slot: usize) -> Option<&Value> {
        self.slots.get(slot).and_then(|(_, value)| value.as_ref())
    }

    /// Bind `key`. A vacated slot for the same key is reused.
    pub fn insert(&mut self, key: Name, value: Value) -> Insert {
        if let Some(&slot) = self.index.get(&key) {
            let previous = self.slots[slot].1.replace(value);
            if previous.is_some() {
                return Insert::Overwrote;
            }
        } else {
            self.index.insert(key, self.slots.len());
            self.slots.push((key, Some(value)));
        }
        self.bound += 1;
        Insert::NewKey
    }

    /// Unbind `key`, returning the old value.
    pub fn remove(&mut self, key: Name) -> Option<Value> {
        let slot = *self.index.get(&key)?;
        let previous = self.slots[slot].1.take();
        if previous.is_some() {
            self.bound -= 1;
        }
        previous
    }

    /// Number of bound keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.bound
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bound == 0
    }

    /// Bound entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Name, &Value)> {
        self.slots
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| (*key, v)))
    }

    /// How many times this scope is currently on the dictionary stack.
    #[inline]
    pub fn on_stack(&self) -> u32 {
        self.on_stack
    }

    #[inline]
    pub fn save_level(&self) -> u32 {
        self.save_level
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.global
    }

    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    pub fn set_access(&mut self, access: Access) {
        self.access = access;
    }

    pub(crate) fn enter(&mut self) {
        self.on_stack += 1;
    }

    pub(crate) fn leave(&mut self) {
        debug_assert!(self.on_stack > 0, "scope left more often than entered");
        self.on_stack = self.on_stack.saturating_sub(1);
    }
}

#[derive(Debug)]
struct ArenaEntry {
    generation: u32,
    data: Option<ScopeData>,
}

/// Owner of every dictionary.
#[derive(Debug, Default)]
pub struct ScopeArena {
    entries: Vec<ArenaEntry>,
    free: Vec<u32>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty scope.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` arena slots are ever in use.
    pub fn alloc(&mut self, save_level: u32, global: bool) -> ScopeId {
        let data = ScopeData::new(save_level, global);
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.data = Some(data);
            return ScopeId::new(index, entry.generation);
        }
        let index = u32::try_from(self.entries.len())
            .unwrap_or_else(|_| panic!("scope arena exceeded {} entries", u32::MAX));
        self.entries.push(ArenaEntry {
            generation: 0,
            data: Some(data),
        });
        ScopeId::new(index, 0)
    }

    /// Release a scope. Its id, and every copy of it, stops resolving.
    pub fn free(&mut self, id: ScopeId) -> bool {
        let Some(entry) = self.entries.get_mut(id.index()) else {
            return false;
        };
        if entry.generation != id.generation() || entry.data.is_none() {
            return false;
        }
        entry.data = None;
        entry.generation = entry.generation.wrapping_add(1);
        #[allow(clippy::cast_possible_truncation, reason = "index came from a u32")]
        self.free.push(id.index() as u32);
        true
    }

    pub fn get(&self, id: ScopeId) -> Option<&ScopeData> {
        let entry = self.entries.get(id.index())?;
        if entry.generation != id.generation() {
            return None;
        }
        entry.data.as_ref()
    }

    pub fn get_mut(&mut self, id: ScopeId) -> Option<&mut ScopeData> {
        let entry = self.entries.get_mut(id.index())?;
        if entry.generation != id.generation() {
            return None;
        }
        entry.data.as_mut()
    }

    #[inline]
    pub fn is_live(&self, id: ScopeId) -> bool {
        self.get(id).is_some()
    }

    /// Live scopes, in arena order.
    pub fn live_ids(&self) -> impl Iterator<Item = ScopeId> + '_ {
        self.entries.iter().enumerate().filter_map(|(index, entry)| {
            entry.data.as_ref()?;
            #[allow(clippy::cast_possible_truncation, reason = "arena length fits u32")]
            Some(ScopeId::new(index as u32, entry.generation))
        })
    }

    /// Number of live scopes.
    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
