//! Tagged values.
//!
//! A [`Value`] is a [`ValueKind`] plus attributes. The attributes travel
//! with the value, not with the object it refers to: `cvx` on one copy of a
//! procedure leaves other copies literal.

use std::fmt;

use bitflags::bitflags;

use crate::{Name, PsString, Sequence};

bitflags! {
    /// Per-value attribute flags.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct Attrs: u8 {
        /// Reaching this value on the execution stack runs it.
        const EXECUTABLE = 1 << 0;
        /// The referenced object lives in global VM and survives `restore`.
        const GLOBAL = 1 << 1;
    }
}

/// Access rights carried by a value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Access {
    #[default]
    Unlimited,
    ReadOnly,
    ExecuteOnly,
    NoAccess,
}

impl Access {
    #[inline]
    pub fn can_read(self) -> bool {
        matches!(self, Access::Unlimited | Access::ReadOnly)
    }

    #[inline]
    pub fn can_write(self) -> bool {
        matches!(self, Access::Unlimited)
    }

    #[inline]
    pub fn can_execute(self) -> bool {
        !matches!(self, Access::NoAccess)
    }
}

/// Operator identity: index into the interpreter's operator table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u32);

/// Opaque stream handle owned by the file/filter layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamId(pub u32);

/// Dictionary identity: arena slot plus the slot's generation.
///
/// The generation changes whenever the slot is reclaimed, so an id kept past
/// the dictionary's lifetime no longer resolves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId {
    index: u32,
    generation: u32,
}

impl ScopeId {
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        ScopeId { index, generation }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// The tag of a value.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    String(PsString),
    Sequence(Sequence),
    Scope(ScopeId),
    Operator(OpId),
    Stream(StreamId),
    Mark,
    SavePoint(u32),
    IndirectRef { object: u32, generation: u16 },
}

/// A tagged value with attributes.
#[derive(Clone, PartialEq)]
pub struct Value {
    kind: ValueKind,
    attrs: Attrs,
    access: Access,
}

impl Value {
    #[inline]
    pub fn new(kind: ValueKind) -> Self {
        Value {
            kind,
            attrs: Attrs::empty(),
            access: Access::Unlimited,
        }
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(b: bool) -> Self {
        Self::new(ValueKind::Boolean(b))
    }

    pub fn int(i: i64) -> Self {
        Self::new(ValueKind::Integer(i))
    }

    pub fn real(r: f64) -> Self {
        Self::new(ValueKind::Real(r))
    }

    pub fn mark() -> Self {
        Self::new(ValueKind::Mark)
    }

    /// Literal name (`/name`).
    pub fn literal_name(name: Name) -> Self {
        Self::new(ValueKind::Name(name))
    }

    /// Executable name (`name`): looked up and run when executed.
    pub fn exec_name(name: Name) -> Self {
        Self::new(ValueKind::Name(name)).executable()
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(ValueKind::String(PsString::new(bytes)))
    }

    /// Literal array.
    pub fn array(items: Vec<Value>) -> Self {
        Self::new(ValueKind::Sequence(Sequence::new(items)))
    }

    /// Executable array (`{ ... }`).
    pub fn procedure(items: Vec<Value>) -> Self {
        Self::array(items).executable()
    }

    /// Operators are always executable.
    pub fn operator(id: OpId) -> Self {
        Self::new(ValueKind::Operator(id)).executable()
    }

    pub fn scope(id: ScopeId) -> Self {
        Self::new(ValueKind::Scope(id))
    }

    pub fn stream(id: StreamId) -> Self {
        Self::new(ValueKind::Stream(id))
    }

    pub fn save_point(level: u32) -> Self {
        Self::new(ValueKind::SavePoint(level))
    }

    #[inline]
    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    #[inline]
    pub fn attrs(&self) -> Attrs {
        self.attrs
    }

    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    #[inline]
    pub fn is_executable(&self) -> bool {
        self.attrs.contains(Attrs::EXECUTABLE)
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.attrs.contains(Attrs::GLOBAL)
    }

    /// `cvx`
    #[must_use]
    pub fn executable(mut self) -> Self {
        self.attrs.insert(Attrs::EXECUTABLE);
        self
    }

    /// `cvlit`
    #[must_use]
    pub fn literal(mut self) -> Self {
        self.attrs.remove(Attrs::EXECUTABLE);
        self
    }

    #[must_use]
    pub fn global(mut self, global: bool) -> Self {
        self.attrs.set(Attrs::GLOBAL, global);
        self
    }

    #[must_use]
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Compare objects ignoring attributes, like PostScript `eq`.
    ///
    /// Integers and reals compare numerically across the two types.
    #[allow(clippy::cast_precision_loss, reason = "PostScript eq semantics")]
    pub fn matches(&self, other: &Value) -> bool {
        match (&self.kind, &other.kind) {
            (ValueKind::Integer(i), ValueKind::Real(r))
            | (ValueKind::Real(r), ValueKind::Integer(i)) => *i as f64 == *r,
            (a, b) => a == b,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.kind {
            ValueKind::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            ValueKind::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<Name> {
        match self.kind {
            ValueKind::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_scope(&self) -> Option<ScopeId> {
        match self.kind {
            ValueKind::Scope(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match &self.kind {
            ValueKind::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Executable sequence, the only thing control operators accept as a body.
    pub fn as_procedure(&self) -> Option<&Sequence> {
        if self.is_executable() {
            self.as_sequence()
        } else {
            None
        }
    }

    /// PostScript type name (`type` operator).
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ValueKind::Null => "nulltype",
            ValueKind::Boolean(_) => "booleantype",
            ValueKind::Integer(_) => "integertype",
            ValueKind::Real(_) => "realtype",
            ValueKind::Name(_) => "nametype",
            ValueKind::String(_) => "stringtype",
            ValueKind::Sequence(_) => "arraytype",
            ValueKind::Scope(_) => "dicttype",
            ValueKind::Operator(_) => "operatortype",
            ValueKind::Stream(_) => "filetype",
            ValueKind::Mark => "marktype",
            ValueKind::SavePoint(_) => "savetype",
            ValueKind::IndirectRef { .. } => "indirecttype",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_executable() {
            write!(f, "x:")?;
        }
        match &self.kind {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Boolean(b) => write!(f, "{b}"),
            ValueKind::Integer(i) => write!(f, "{i}"),
            ValueKind::Real(r) => write!(f, "{r:?}"),
            ValueKind::Name(n) => write!(f, "{n:?}"),
            ValueKind::String(s) => write!(f, "{s:?}"),
            ValueKind::Sequence(seq) => write!(f, "{seq:?}"),
            ValueKind::Scope(id) => write!(f, "-dict:{}-", id.index()),
            ValueKind::Operator(id) => write!(f, "--op:{}--", id.0),
            ValueKind::Stream(id) => write!(f, "-file:{}-", id.0),
            ValueKind::Mark => write!(f, "-mark-"),
            ValueKind::SavePoint(level) => write!(f, "-save:{level}-"),
            ValueKind::IndirectRef { object, generation } => {
                write!(f, "{object} {generation} R")
            }
        }
    }
}
