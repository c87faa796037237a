//! Boundary to the tokenizer.
//!
//! Executing a string or stream hands bytes to a [`Scanner`], which returns
//! one token per call. Tokenization itself lives outside the engine.

use rip_value::{ErrorCode, NameTable, StreamId, Value};

pub enum ScanSource<'a> {
    /// In-memory bytes; the scanner advances `position`.
    Bytes {
        data: &'a [u8],
        position: &'a mut usize,
    },
    Stream(StreamId),
}

pub trait Scanner {
    /// Next token, or `None` at end of source.
    fn scan_next(
        &mut self,
        source: ScanSource<'_>,
        names: &mut NameTable,
    ) -> Result<Option<Value>, ErrorCode>;

    /// Called once a stream source is exhausted.
    fn close(&mut self, _stream: StreamId) {}
}

/// Scanner for interpreters that never execute source text.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoScanner;

impl Scanner for NoScanner {
    fn scan_next(
        &mut self,
        _source: ScanSource<'_>,
        _names: &mut NameTable,
    ) -> Result<Option<Value>, ErrorCode> {
        Err(ErrorCode::IoError)
    }
}
