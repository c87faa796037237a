//! Per-name resolution cache.
//!
//! Indexed directly by [`Name::index`]. An entry remembers where a name was
//! last found and the dictionary-stack epoch at that moment; the dictionary
//! stack decides whether it can still be trusted.

use rip_value::{Name, ScopeId};

/// Where a name was last resolved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub scope: ScopeId,
    pub slot: usize,
    pub epoch: u64,
}

#[derive(Debug, Default)]
pub struct NameCache {
    entries: Vec<Option<CacheEntry>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, name: Name) -> Option<CacheEntry> {
        self.entries.get(name.index()).copied().flatten()
    }

    pub fn store(&mut self, name: Name, entry: CacheEntry) {
        let index = name.index();
        if index >= self.entries.len() {
            self.entries.resize(index + 1, None);
        }
        self.entries[index] = Some(entry);
    }

    pub fn forget(&mut self, name: Name) {
        if let Some(slot) = self.entries.get_mut(name.index()) {
            *slot = None;
        }
    }

    /// Drop every entry. Only needed when epochs would otherwise repeat.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of names with an entry, stale or not.
    pub fn populated(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }
}
