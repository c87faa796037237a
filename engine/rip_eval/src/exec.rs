//! Execution-stack entries.
//!
//! The execution stack holds more than values: running procedures keep a
//! private cursor, loops keep their counters, and `stopped` and `interpret`
//! leave markers that `stop` and `exit` search for.

use rip_value::{PsString, Sequence, StreamId, Value};

/// A procedure being executed, with its own cursor.
///
/// The cursor belongs to the frame, never to the shared sequence, so the
/// same procedure can run at several depths at once.
#[derive(Clone, Debug)]
pub struct SeqFrame {
    seq: Sequence,
    next: usize,
}

impl SeqFrame {
    pub fn new(seq: Sequence) -> Self {
        SeqFrame { seq, next: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.seq.len() - self.next
    }

    /// Take the next element and whether it was the last one.
    pub fn advance(&mut self) -> Option<(Value, bool)> {
        let value = self.seq.get(self.next)?;
        self.next += 1;
        Some((value, self.next >= self.seq.len()))
    }
}

/// Where a source frame reads tokens from.
#[derive(Clone, Debug)]
pub enum SourceCursor {
    Bytes { string: PsString, position: usize },
    Stream(StreamId),
}

/// A string or stream being tokenized and executed.
#[derive(Clone, Debug)]
pub struct SourceFrame {
    /// The executed object, reported as the command on scanner errors.
    pub origin: Value,
    pub cursor: SourceCursor,
}

/// How an untrapped `stop` or `exit` left an interpreter level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExitKind {
    Stop,
    Exit,
}

#[derive(Clone, Debug)]
pub enum ExecEntry {
    /// A pending object, executed when reached.
    Value(Value),
    Sequence(SeqFrame),
    Source(SourceFrame),
    /// Installed by `stopped`; the target of `stop`.
    Stopped,
    Repeat { remaining: i64, proc: Value },
    Loop { proc: Value },
    /// Floor of one `interpret` level.
    Exit,
}

impl ExecEntry {
    /// Loop continuations, the targets of `exit`.
    #[inline]
    pub fn is_loop(&self) -> bool {
        matches!(self, ExecEntry::Repeat { .. } | ExecEntry::Loop { .. })
    }
}
