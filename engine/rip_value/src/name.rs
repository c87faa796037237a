//! Interned names.
//!
//! PostScript names are compared by identity, so every name the scanner or
//! an operator produces is interned once per interpreter. A [`Name`] is a
//! dense index into the table, which also lets the interpreter keep
//! per-name side tables (the resolution cache) in plain vectors.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// Interned name identifier.
///
/// Dense: the first name interned in a table is index 0, the next 1, and so
/// on. Only meaningful together with the [`NameTable`] that produced it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Create from a raw table index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    /// Index into per-name side tables.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// Per-interpreter name interner.
///
/// Single-threaded: the table belongs to the interpreter thread and is
/// threaded through the scanner by `&mut`.
#[derive(Default)]
pub struct NameTable {
    map: FxHashMap<Rc<str>, Name>,
    strings: Vec<Rc<str>>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning the existing name if it was seen before.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` distinct names are interned.
    pub fn intern(&mut self, text: &str) -> Name {
        if let Some(&name) = self.map.get(text) {
            return name;
        }
        let raw = u32::try_from(self.strings.len())
            .unwrap_or_else(|_| panic!("name table exceeded {} entries", u32::MAX));
        let name = Name(raw);
        let shared: Rc<str> = Rc::from(text);
        self.strings.push(Rc::clone(&shared));
        self.map.insert(shared, name);
        name
    }

    /// Look up a name without interning it.
    pub fn get(&self, text: &str) -> Option<Name> {
        self.map.get(text).copied()
    }

    /// Text of an interned name.
    pub fn lookup(&self, name: Name) -> Option<&str> {
        self.strings.get(name.index()).map(AsRef::as_ref)
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl fmt::Debug for NameTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameTable")
            .field("len", &self.strings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_idempotent() {
        let mut names = NameTable::new();
        let a = names.intern("moveto");
        let b = names.intern("moveto");
        assert_eq!(a, b);
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_names_are_dense() {
        let mut names = NameTable::new();
        let a = names.intern("a");
        let b = names.intern("b");
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
    }

    #[test]
    fn test_lookup_round_trips_text() {
        let mut names = NameTable::new();
        let n = names.intern("rangecheck");
        assert_eq!(names.lookup(n), Some("rangecheck"));
        assert_eq!(names.get("rangecheck"), Some(n));
        assert_eq!(names.get("typecheck"), None);
    }

    #[test]
    fn test_foreign_name_has_no_text() {
        let names = NameTable::new();
        assert_eq!(names.lookup(Name::from_raw(7)), None);
    }
}
