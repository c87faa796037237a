//! Rip Value - object model for the RIP execution engine.
//!
//! Everything the interpreter moves between its stacks is a [`Value`]: a
//! tagged variant plus attribute flags. This crate owns the tag set, the
//! shared composite handles, interned [`Name`]s and the [`ErrorCode`]
//! taxonomy that operators return.
//!
//! # Ownership
//!
//! Composite values (`Sequence`, `PsString`) are reference counted and
//! single-threaded; dictionaries live in the interpreter's scope arena and
//! are referenced here only through [`ScopeId`]. The interpreter that owns
//! these values is therefore `!Send` by construction.

mod composite;
mod errors;
mod name;
mod value;

pub use composite::{PsString, Sequence};
pub use errors::{ErrorClass, ErrorCode};
pub use name::{Name, NameTable};
pub use value::{Access, Attrs, OpId, ScopeId, StreamId, Value, ValueKind};
