//! Shared fixtures for unit and scenario tests: a handful of arithmetic and
//! stack operators, a whitespace tokenizer and a scripted memory manager.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rip_value::{ErrorCode, Name, NameTable, StreamId, Value};
use rustc_hash::FxHashMap;

use crate::memory::{MemoryManager, ReclaimCost, ReserveStatus};
use crate::scanner::{ScanSource, Scanner};
use crate::{EngineConfig, Interpreter, InterpreterBuilder, Outcome};

// Operators

fn int_operands(interp: &Interpreter) -> Result<(i64, i64), ErrorCode> {
    interp.require(2)?;
    let b = interp.peek(0)?.as_int().ok_or(ErrorCode::TypeCheck)?;
    let a = interp.peek(1)?.as_int().ok_or(ErrorCode::TypeCheck)?;
    Ok((a, b))
}

fn op_add(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let (a, b) = int_operands(interp)?;
    let sum = a.checked_add(b).ok_or(ErrorCode::RangeCheck)?;
    interp.pop()?;
    interp.pop()?;
    interp.push(Value::int(sum))
}

fn op_sub(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let (a, b) = int_operands(interp)?;
    let diff = a.checked_sub(b).ok_or(ErrorCode::RangeCheck)?;
    interp.pop()?;
    interp.pop()?;
    interp.push(Value::int(diff))
}

fn op_gt(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let (a, b) = int_operands(interp)?;
    interp.pop()?;
    interp.pop()?;
    interp.push(Value::bool(a > b))
}

fn op_eq(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(2)?;
    let b = interp.pop()?;
    let a = interp.pop()?;
    interp.push(Value::bool(a.matches(&b)))
}

fn op_dup(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let top = interp.peek(0)?.clone();
    interp.push(top)
}

fn op_exch(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(2)?;
    let b = interp.pop()?;
    let a = interp.pop()?;
    interp.push(b)?;
    interp.push(a)
}

fn op_pop(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.pop().map(|_| ())
}

/// Always fails with `rangecheck`.
fn op_boom(_interp: &mut Interpreter) -> Result<(), ErrorCode> {
    Err(ErrorCode::RangeCheck)
}

fn op_diskfull(_interp: &mut Interpreter) -> Result<(), ErrorCode> {
    Err(ErrorCode::DiskVmError)
}

/// Unwind the current level cleanly.
fn op_unwind(_interp: &mut Interpreter) -> Result<(), ErrorCode> {
    Err(ErrorCode::NotAnError)
}

/// Request an interrupt as another thread would.
fn op_interrupt(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.interrupt_handle().request_interrupt();
    Ok(())
}

fn op_lowmem(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.interrupt_handle().signal_low_memory();
    Ok(())
}

/// `any nested -`: run in a nested level.
fn op_nested(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let value = interp.pop()?;
    interp.execute_nested(value)
}

/// `any swallow -`: run in a nested level and ignore how it ended.
fn op_swallow(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let value = interp.pop()?;
    let _ = interp.execute_nested(value);
    Ok(())
}

/// `any try true` or `any try /errorname false`.
fn op_try(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let value = interp.pop()?;
    match interp.try_nested(value) {
        Ok(()) => interp.push(Value::bool(true)),
        Err(code) => {
            let name = interp.intern(code.name());
            interp.push(Value::literal_name(name))?;
            interp.push(Value::bool(false))
        }
    }
}

/// `int alloc -`
fn op_alloc(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let bytes = interp.pop_int()?;
    interp.allocate(usize::try_from(bytes).map_err(|_| ErrorCode::RangeCheck)?)
}

/// `- dict dict`
fn op_dict(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let id = interp.new_scope();
    interp.push(Value::scope(id))
}

pub const TEST_OPERATORS: &[(&str, crate::OperatorFn)] = &[
    ("add", op_add),
    ("sub", op_sub),
    ("gt", op_gt),
    ("eq", op_eq),
    ("dup", op_dup),
    ("exch", op_exch),
    ("pop", op_pop),
    ("boom", op_boom),
    ("diskfull", op_diskfull),
    ("unwind", op_unwind),
    ("interrupt", op_interrupt),
    ("lowmem", op_lowmem),
    ("nested", op_nested),
    ("swallow", op_swallow),
    ("try", op_try),
    ("alloc", op_alloc),
    ("dict", op_dict),
];

// Tokenizer

fn is_delimiter(byte: u8) -> bool {
    byte.is_ascii_whitespace() || byte == b'{' || byte == b'}'
}

/// One token: integers, `true`/`false`, `/literal`, names and `{ ... }`.
pub fn scan_token(
    data: &[u8],
    position: &mut usize,
    intern: &mut impl FnMut(&str) -> Name,
) -> Result<Option<Value>, ErrorCode> {
    while data.get(*position).is_some_and(u8::is_ascii_whitespace) {
        *position += 1;
    }
    let Some(&first) = data.get(*position) else {
        return Ok(None);
    };
    match first {
        b'{' => {
            *position += 1;
            let mut items = Vec::new();
            loop {
                while data.get(*position).is_some_and(u8::is_ascii_whitespace) {
                    *position += 1;
                }
                match data.get(*position) {
                    None => return Err(ErrorCode::SyntaxError),
                    Some(b'}') => {
                        *position += 1;
                        return Ok(Some(Value::procedure(items)));
                    }
                    Some(_) => match scan_token(data, position, intern)? {
                        Some(item) => items.push(item),
                        None => return Err(ErrorCode::SyntaxError),
                    },
                }
            }
        }
        b'}' => Err(ErrorCode::SyntaxError),
        _ => {
            let start = *position;
            while data.get(*position).is_some_and(|&b| !is_delimiter(b)) {
                *position += 1;
            }
            let text = std::str::from_utf8(&data[start..*position]).map_err(|_| ErrorCode::SyntaxError)?;
            if let Some(literal) = text.strip_prefix('/') {
                return Ok(Some(Value::literal_name(intern(literal))));
            }
            if let Ok(int) = text.parse::<i64>() {
                return Ok(Some(Value::int(int)));
            }
            Ok(Some(match text {
                "true" => Value::bool(true),
                "false" => Value::bool(false),
                _ => Value::exec_name(intern(text)),
            }))
        }
    }
}

/// Every token of `source`.
pub fn parse(interp: &mut Interpreter, source: &str) -> Vec<Value> {
    let mut position = 0;
    let mut out = Vec::new();
    let mut intern = |text: &str| interp.intern(text);
    while let Some(value) = scan_token(source.as_bytes(), &mut position, &mut intern).unwrap() {
        out.push(value);
    }
    out
}

/// `source` as a procedure.
pub fn procedure(interp: &mut Interpreter, source: &str) -> Value {
    Value::procedure(parse(interp, source))
}

/// Tokenizes strings, and streams registered with [`TestScanner::stream`].
#[derive(Default)]
pub struct TestScanner {
    streams: FxHashMap<StreamId, (Vec<u8>, usize)>,
    closed: Rc<RefCell<Vec<StreamId>>>,
}

impl TestScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream(mut self, id: StreamId, source: &str) -> Self {
        self.streams.insert(id, (source.as_bytes().to_vec(), 0));
        self
    }

    /// Streams closed so far, shared with the scanner.
    pub fn closed(&self) -> Rc<RefCell<Vec<StreamId>>> {
        Rc::clone(&self.closed)
    }
}

impl Scanner for TestScanner {
    fn scan_next(
        &mut self,
        source: ScanSource<'_>,
        names: &mut NameTable,
    ) -> Result<Option<Value>, ErrorCode> {
        let mut intern = |text: &str| names.intern(text);
        match source {
            ScanSource::Bytes { data, position } => scan_token(data, position, &mut intern),
            ScanSource::Stream(id) => {
                let (data, position) = self.streams.get_mut(&id).ok_or(ErrorCode::IoError)?;
                scan_token(data, position, &mut intern)
            }
        }
    }

    fn close(&mut self, stream: StreamId) {
        self.streams.remove(&stream);
        self.closed.borrow_mut().push(stream);
    }
}

// Memory

/// Shared view of what a [`ScriptedMemory`] was asked to do.
#[derive(Clone, Debug, Default)]
pub struct MemoryTally {
    pub regain_calls: Rc<Cell<u32>>,
    pub incremental_collections: Rc<Cell<u32>>,
    pub full_collections: Rc<Cell<u32>>,
    pub partial_paints: Rc<Cell<u32>>,
    pub low: Rc<Cell<bool>>,
    pub alloc_failures: Rc<Cell<u32>>,
    pub gc_threshold: Rc<Cell<bool>>,
}

/// Memory manager whose `regain_reserves` fails a fixed number of times.
pub struct ScriptedMemory {
    failures_left: u32,
    tally: MemoryTally,
}

impl ScriptedMemory {
    pub fn failing(failures: u32) -> (Self, MemoryTally) {
        let tally = MemoryTally::default();
        let memory = ScriptedMemory {
            failures_left: failures,
            tally: tally.clone(),
        };
        (memory, tally)
    }
}

fn bump(cell: &Cell<u32>) {
    cell.set(cell.get() + 1);
}

impl MemoryManager for ScriptedMemory {
    fn allocate(&mut self, _bytes: usize) -> Result<(), ErrorCode> {
        let failures = self.tally.alloc_failures.get();
        if failures > 0 {
            self.tally.alloc_failures.set(failures - 1);
            return Err(ErrorCode::VmError);
        }
        Ok(())
    }

    fn is_low_memory(&self) -> bool {
        self.tally.low.get()
    }

    fn regain_reserves(&mut self, _budget: ReclaimCost) -> ReserveStatus {
        bump(&self.tally.regain_calls);
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return ReserveStatus::Insufficient;
        }
        self.tally.low.set(false);
        ReserveStatus::Regained
    }

    fn gc_threshold_exceeded(&self) -> bool {
        self.tally.gc_threshold.get()
    }

    fn collect(&mut self, full: bool) -> usize {
        if full {
            bump(&self.tally.full_collections);
        } else {
            bump(&self.tally.incremental_collections);
        }
        self.tally.gc_threshold.set(false);
        4096
    }

    fn partial_paint(&mut self) -> bool {
        bump(&self.tally.partial_paints);
        true
    }
}

// Interpreters

/// Builder with the test operators, the test scanner and counters.
pub fn builder() -> InterpreterBuilder {
    TEST_OPERATORS
        .iter()
        .fold(Interpreter::builder(), |b, &(name, func)| b.operator(name, func))
        .scanner(TestScanner::new())
        .with_counters()
}

pub fn interpreter() -> Interpreter {
    builder().build().unwrap()
}

pub fn interpreter_with(config: EngineConfig) -> Interpreter {
    builder().config(config).build().unwrap()
}

/// Parse `source` and run it as a procedure.
pub fn run(interp: &mut Interpreter, source: &str) -> Outcome {
    let program = procedure(interp, source);
    interp.interpret(program)
}

/// Operand stack as integers; panics on anything else.
pub fn ints(interp: &Interpreter) -> Vec<i64> {
    interp
        .operands()
        .iter()
        .map(|v| v.as_int().unwrap_or_else(|| panic!("not an integer: {v:?}")))
        .collect()
}

/// Bind `name` in `errordict` to the procedure `source`.
pub fn set_handler(interp: &mut Interpreter, code: ErrorCode, source: &str) {
    let handler = procedure(interp, source);
    interp.define_error_handler(code, handler).unwrap();
}
