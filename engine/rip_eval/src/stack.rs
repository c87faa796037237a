//! Bounded LIFO stacks.
//!
//! One generic type backs the operand stack and the execution stack. Each
//! instance carries the error codes it reports, so callers can propagate
//! `push`/`pop` failures with `?` and get the right PostScript error.

use rip_value::ErrorCode;

/// A bounded stack with a change counter.
///
/// `changes()` increments on every push, pop and truncate. The interpreter's
/// procedure fast path compares it before and after a dispatch to detect that
/// an operator transferred control.
#[derive(Clone, Debug)]
pub struct Stack<T> {
    items: Vec<T>,
    limit: usize,
    overflow: ErrorCode,
    underflow: ErrorCode,
    changes: u64,
}

impl<T> Stack<T> {
    pub fn new(limit: usize, overflow: ErrorCode, underflow: ErrorCode) -> Self {
        Stack {
            items: Vec::with_capacity(limit.min(64)),
            limit,
            overflow,
            underflow,
            changes: 0,
        }
    }

    pub fn push(&mut self, item: T) -> Result<(), ErrorCode> {
        if self.items.len() >= self.limit {
            return Err(self.overflow);
        }
        self.items.push(item);
        self.changes = self.changes.wrapping_add(1);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<T, ErrorCode> {
        let item = self.items.pop().ok_or(self.underflow)?;
        self.changes = self.changes.wrapping_add(1);
        Ok(item)
    }

    /// Element `n` from the top (0 is the top).
    pub fn peek(&self, n: usize) -> Result<&T, ErrorCode> {
        let len = self.items.len();
        if n >= len {
            return Err(self.underflow);
        }
        Ok(&self.items[len - 1 - n])
    }

    #[inline]
    pub fn top(&self) -> Option<&T> {
        self.items.last()
    }

    /// Mutable top, for in-place frame updates. Does not count as a change.
    #[inline]
    pub fn top_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    /// Ensure at least `n` elements are present.
    pub fn require(&self, n: usize) -> Result<(), ErrorCode> {
        if self.items.len() < n {
            return Err(self.underflow);
        }
        Ok(())
    }

    /// Drop everything above depth `len`.
    pub fn truncate(&mut self, len: usize) {
        if len < self.items.len() {
            self.items.truncate(len);
            self.changes = self.changes.wrapping_add(1);
        }
    }

    pub fn clear(&mut self) {
        self.truncate(0);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    #[inline]
    pub fn changes(&self) -> u64 {
        self.changes
    }

    /// Iterate from the top down.
    pub fn iter_from_top(&self) -> impl Iterator<Item = &T> {
        self.items.iter().rev()
    }

    /// Distance from the top of the first element matching `pred`.
    pub fn position_from_top(&self, pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.iter().rev().position(pred)
    }

    /// Bottom-to-top view.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
