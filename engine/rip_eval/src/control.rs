//! Control operators.
//!
//! These manipulate the execution or dictionary stacks directly, so they
//! live with the loop. Every other operator is registered from outside
//! through [`InterpreterBuilder::operator`].
//!
//! Operands are validated before any is popped: a failing operator leaves
//! the operand stack as it found it.
//!
//! [`InterpreterBuilder::operator`]: crate::InterpreterBuilder::operator

use rip_value::{ErrorCode, Value, ValueKind};

use crate::exec::ExecEntry;
use crate::operators::OperatorFn;
use crate::Interpreter;

/// Built-in operators bound into `systemdict` by the builder.
pub(crate) const OPERATORS: &[(&str, OperatorFn)] = &[
    ("exec", op_exec),
    ("if", op_if),
    ("ifelse", op_ifelse),
    ("repeat", op_repeat),
    ("loop", op_loop),
    ("exit", op_exit),
    ("stop", op_stop),
    ("stopped", op_stopped),
    ("countexecstack", op_countexecstack),
    ("begin", op_begin),
    ("end", op_end),
    ("def", op_def),
    ("load", op_load),
    ("save", op_save),
    ("restore", op_restore),
];

fn check_procedure(interp: &Interpreter, n: usize) -> Result<(), ErrorCode> {
    match interp.peek(n)?.as_procedure() {
        Some(_) => Ok(()),
        None => Err(ErrorCode::TypeCheck),
    }
}

fn check_exec_room(interp: &Interpreter, n: usize) -> Result<(), ErrorCode> {
    if interp.exec_depth() + n > interp.config().exec_stack_limit {
        return Err(ErrorCode::ExecStackOverflow);
    }
    Ok(())
}

fn check_bool(interp: &Interpreter, n: usize) -> Result<bool, ErrorCode> {
    interp.peek(n)?.as_bool().ok_or(ErrorCode::TypeCheck)
}

/// `any exec -`
fn op_exec(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(1)?;
    check_exec_room(interp, 1)?;
    let value = interp.pop()?;
    interp.push_exec(value)
}

/// `bool proc if -`
fn op_if(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(2)?;
    check_procedure(interp, 0)?;
    check_bool(interp, 1)?;
    check_exec_room(interp, 1)?;
    let proc = interp.pop_procedure()?;
    if interp.pop_bool()? {
        interp.push_exec(proc)?;
    }
    Ok(())
}

/// `bool proc1 proc2 ifelse -`
fn op_ifelse(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(3)?;
    check_procedure(interp, 0)?;
    check_procedure(interp, 1)?;
    check_bool(interp, 2)?;
    check_exec_room(interp, 1)?;
    let otherwise = interp.pop_procedure()?;
    let then = interp.pop_procedure()?;
    let chosen = if interp.pop_bool()? { then } else { otherwise };
    interp.push_exec(chosen)
}

/// `int proc repeat -`
fn op_repeat(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(2)?;
    check_procedure(interp, 0)?;
    let count = interp.peek(1)?.as_int().ok_or(ErrorCode::TypeCheck)?;
    if count < 0 {
        return Err(ErrorCode::RangeCheck);
    }
    check_exec_room(interp, 1)?;
    let proc = interp.pop_procedure()?;
    interp.pop()?;
    interp.push_exec_entry(ExecEntry::Repeat {
        remaining: count,
        proc,
    })
}

/// `proc loop -`
fn op_loop(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(1)?;
    check_exec_room(interp, 1)?;
    let proc = interp.pop_procedure()?;
    interp.push_exec_entry(ExecEntry::Loop { proc })
}

fn op_exit(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.exit()
}

fn op_stop(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.stop()
}

/// `any stopped bool`
fn op_stopped(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(1)?;
    check_exec_room(interp, 2)?;
    let value = interp.pop()?;
    interp.push_exec_entry(ExecEntry::Stopped)?;
    interp.push_exec(value)
}

/// `- countexecstack int`
fn op_countexecstack(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    let depth = i64::try_from(interp.exec_depth()).map_err(|_| ErrorCode::RangeCheck)?;
    interp.push(Value::int(depth))
}

/// `dict begin -`
fn op_begin(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(1)?;
    let id = interp.peek(0)?.as_scope().ok_or(ErrorCode::TypeCheck)?;
    interp.dicts_mut().begin(id)?;
    interp.pop()?;
    Ok(())
}

/// `- end -`
fn op_end(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.dicts_mut().end().map(|_| ())
}

/// `key value def -`
fn op_def(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(2)?;
    let key = interp.peek(1)?.as_name().ok_or(ErrorCode::TypeCheck)?;
    let value = interp.peek(0)?.clone();
    interp.define(key, value)?;
    interp.pop()?;
    interp.pop()?;
    Ok(())
}

/// `key load value`
fn op_load(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(1)?;
    let key = interp.peek(0)?.as_name().ok_or(ErrorCode::TypeCheck)?;
    let value = interp.lookup(key)?;
    interp.pop()?;
    interp.push(value)
}

/// `- save save`
fn op_save(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    if interp.operands().len() >= interp.config().operand_stack_limit {
        return Err(ErrorCode::StackOverflow);
    }
    let point = interp.save_vm()?;
    interp.push(point)
}

/// `save restore -`
fn op_restore(interp: &mut Interpreter) -> Result<(), ErrorCode> {
    interp.require(1)?;
    let ValueKind::SavePoint(level) = *interp.peek(0)?.kind() else {
        return Err(ErrorCode::TypeCheck);
    };
    interp.restore_vm(level)?;
    interp.pop()?;
    Ok(())
}
