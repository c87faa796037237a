//! Shared composite objects: sequences (arrays/procedures) and strings.
//!
//! Both follow PostScript sharing rules: copying the value copies the handle,
//! and a sub-interval shares storage with its parent. The interpreter never
//! mutates a sequence to iterate it; execution frames keep their own cursor.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::{ErrorCode, Value};

/// Handle to a shared array of values.
#[derive(Clone)]
pub struct Sequence {
    store: Rc<RefCell<Vec<Value>>>,
    start: usize,
    len: usize,
}

impl Sequence {
    /// Create a sequence owning `items`.
    pub fn new(items: Vec<Value>) -> Self {
        let len = items.len();
        Sequence {
            store: Rc::new(RefCell::new(items)),
            start: 0,
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element `index` of this interval.
    pub fn get(&self, index: usize) -> Option<Value> {
        if index >= self.len {
            return None;
        }
        self.store.borrow().get(self.start + index).cloned()
    }

    /// Overwrite element `index`; visible through every handle sharing storage.
    pub fn put(&self, index: usize, value: Value) -> Result<(), ErrorCode> {
        if index >= self.len {
            return Err(ErrorCode::RangeCheck);
        }
        let mut store = self.store.borrow_mut();
        let slot = store
            .get_mut(self.start + index)
            .ok_or(ErrorCode::RangeCheck)?;
        *slot = value;
        Ok(())
    }

    /// Sub-interval `[index, index + count)` sharing this sequence's storage.
    pub fn interval(&self, index: usize, count: usize) -> Result<Sequence, ErrorCode> {
        let end = index.checked_add(count).ok_or(ErrorCode::RangeCheck)?;
        if end > self.len {
            return Err(ErrorCode::RangeCheck);
        }
        Ok(Sequence {
            store: Rc::clone(&self.store),
            start: self.start + index,
            len: count,
        })
    }

    /// Snapshot of the elements of this interval.
    pub fn to_vec(&self) -> Vec<Value> {
        let store = self.store.borrow();
        store[self.start..self.start + self.len].to_vec()
    }
}

impl PartialEq for Sequence {
    /// Identity comparison, as PostScript `eq` does for arrays.
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.store, &other.store) && self.start == other.start && self.len == other.len
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

/// Handle to a shared byte string.
#[derive(Clone)]
pub struct PsString {
    store: Rc<RefCell<Vec<u8>>>,
    start: usize,
    len: usize,
}

impl PsString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len();
        PsString {
            store: Rc::new(RefCell::new(bytes)),
            start: 0,
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Run `f` over the bytes of this interval without copying them.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let store = self.store.borrow();
        f(&store[self.start..self.start + self.len])
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.with_bytes(<[u8]>::to_vec)
    }

    /// Sub-interval sharing storage.
    pub fn interval(&self, index: usize, count: usize) -> Result<PsString, ErrorCode> {
        let end = index.checked_add(count).ok_or(ErrorCode::RangeCheck)?;
        if end > self.len {
            return Err(ErrorCode::RangeCheck);
        }
        Ok(PsString {
            store: Rc::clone(&self.store),
            start: self.start + index,
            len: count,
        })
    }
}

impl PartialEq for PsString {
    /// Content comparison, as PostScript `eq` does for strings.
    fn eq(&self, other: &Self) -> bool {
        self.with_bytes(|a| other.with_bytes(|b| a == b))
    }
}

impl fmt::Debug for PsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_bytes(|bytes| write!(f, "({})", String::from_utf8_lossy(bytes)))
    }
}
