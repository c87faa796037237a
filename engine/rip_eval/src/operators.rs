//! Native operator table.
//!
//! Operators are plain function pointers over the interpreter. They pop
//! their operands, push their results and report failure by returning an
//! [`ErrorCode`]; the loop turns that into a handler call.

use rip_value::{ErrorCode, Name, OpId};

use crate::Interpreter;

/// A native operator.
pub type OperatorFn = fn(&mut Interpreter) -> Result<(), ErrorCode>;

#[derive(Copy, Clone, Debug)]
pub struct OperatorEntry {
    pub name: Name,
    pub func: OperatorFn,
}

/// Registry mapping [`OpId`]s to native functions.
#[derive(Clone, Debug, Default)]
pub struct OperatorTable {
    entries: Vec<OperatorEntry>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`. Registering the same name twice gives
    /// two distinct operators; the later binding wins in `systemdict`.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` operators are registered.
    pub fn register(&mut self, name: Name, func: OperatorFn) -> OpId {
        let id = u32::try_from(self.entries.len())
            .unwrap_or_else(|_| panic!("operator table exceeded {} entries", u32::MAX));
        self.entries.push(OperatorEntry { name, func });
        OpId(id)
    }

    #[inline]
    pub fn get(&self, id: OpId) -> Option<OperatorEntry> {
        self.entries.get(id.0 as usize).copied()
    }

    pub fn name_of(&self, id: OpId) -> Option<Name> {
        self.get(id).map(|entry| entry.name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every operator with its id, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (OpId, OperatorEntry)> + '_ {
        self.entries.iter().enumerate().map(|(index, entry)| {
            #[allow(clippy::cast_possible_truncation, reason = "checked in register")]
            (OpId(index as u32), *entry)
        })
    }
}
