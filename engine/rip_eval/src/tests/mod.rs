//! End-to-end engine scenarios.

use crate::patch::{PatchSet, Trigger};
use crate::test_helpers::{
    builder, interpreter, interpreter_with, ints, run, set_handler, ScriptedMemory,
};
use crate::{EngineConfig, ErrorCode, Outcome, Value, PERMANENT_SCOPES};
use pretty_assertions::assert_eq;

fn literal(interp: &mut crate::Interpreter, text: &str) -> Value {
    let name = interp.intern(text);
    Value::literal_name(name)
}

#[test]
fn test_add_program() {
    let mut interp = interpreter();
    assert_eq!(run(&mut interp, "1 2 add"), Outcome::Completed);
    assert_eq!(ints(&interp), vec![3]);
    assert_eq!(interp.exec_depth(), 0);
}

#[test]
fn test_dispatch_steps_exclude_frame_opening() {
    let mut interp = interpreter();
    assert_eq!(run(&mut interp, "1 2 3"), Outcome::Completed);
    let counters = interp.counters().unwrap();
    assert_eq!(counters.dispatch_steps, 3);
    assert_eq!(counters.operator_calls, 0);
}

#[test]
fn test_tail_recursion_runs_in_bounded_exec_stack() {
    let mut interp = interpreter_with(EngineConfig::default().with_exec_stack_limit(16));
    let outcome = run(
        &mut interp,
        "/count { dup 0 gt { 1 sub count } if } def 1000 count",
    );
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(ints(&interp), vec![0]);
}

#[test]
fn test_scope_shadowing_and_revert() {
    let mut interp = interpreter();
    let outcome = run(
        &mut interp,
        "/x 1 def dict begin /x 2 def /y 3 def x y end x",
    );
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(ints(&interp), vec![2, 3, 1]);

    assert_eq!(run(&mut interp, "y"), Outcome::Propagate(ErrorCode::Undefined));
    assert_eq!(interp.dicts().depth(), PERMANENT_SCOPES);
}

#[test]
fn test_definition_from_lookup_lands_in_pushed_scope() {
    let mut interp = interpreter();
    let x = interp.intern("x");
    let y = interp.intern("y");
    let scope = interp.new_scope();
    interp.dicts_mut().define_in(scope, x, Value::int(1)).unwrap();
    interp.dicts_mut().begin(scope).unwrap();

    assert_eq!(run(&mut interp, "/y x 1 add def"), Outcome::Completed);
    assert_eq!(interp.dicts().lookup_in(scope, y), Some(Value::int(2)));
    assert_eq!(interp.dicts().lookup_where(y), Some(scope));

    interp.dicts_mut().end().unwrap();
    assert_eq!(interp.lookup(x), Err(ErrorCode::Undefined));
    assert_eq!(interp.lookup(y), Err(ErrorCode::Undefined));
}

#[test]
fn test_cached_binding_shadowed_by_new_scope() {
    let mut interp = interpreter();
    // Warm the cache for `x`, then shadow it.
    let outcome = run(
        &mut interp,
        "/x 1 def x pop x pop dict begin /x 2 def x end x",
    );
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(ints(&interp), vec![2, 1]);
    assert!(interp.counters().unwrap().cache_hits > 0);
}

#[test]
fn test_handled_errors_are_idempotent() {
    let mut interp = interpreter();
    set_handler(&mut interp, ErrorCode::TypeCheck, "{ pop }");
    for round in 1..=2 {
        assert_eq!(run(&mut interp, "true 1 if"), Outcome::Completed);
        assert_eq!(interp.operands().len(), 2 * round);
        assert_eq!(interp.errors().new_error(), None);
        assert_eq!(interp.errors().old_error(), Some(ErrorCode::TypeCheck));
    }
    assert_eq!(interp.errors().orig_error(), Some(ErrorCode::TypeCheck));
    assert_eq!(interp.counters().unwrap().errors_handled, 2);
}

#[test]
fn test_rangecheck_handler_sees_operator_and_consistent_stacks() {
    let mut interp = interpreter();
    set_handler(&mut interp, ErrorCode::RangeCheck, "{ countexecstack }");
    assert_eq!(run(&mut interp, "1 2 boom"), Outcome::Completed);

    let boom = interp.intern("boom");
    let boom = interp.lookup(boom).unwrap();
    // Floor of the level plus nothing else: `boom` was the last element.
    assert_eq!(interp.operands(), &[Value::int(1), Value::int(2), boom, Value::int(1)]);
    assert_eq!(interp.exec_depth(), 0);
    assert_eq!(interp.dicts().depth(), PERMANENT_SCOPES);
}

#[test]
fn test_saved_region_distinguishes_not_an_error() {
    let mut interp = interpreter();
    assert_eq!(run(&mut interp, "{1 unwind} try"), Outcome::Completed);
    assert_eq!(interp.operands(), &[Value::int(1), Value::bool(true)]);

    interp.clear_operands();
    assert_eq!(run(&mut interp, "{boom} try"), Outcome::Completed);
    let rangecheck = literal(&mut interp, "rangecheck");
    assert_eq!(interp.operands(), &[rangecheck, Value::bool(false)]);
}

#[test]
fn test_interrupt_while_handling_unrelated_error() {
    let mut interp = interpreter();
    set_handler(&mut interp, ErrorCode::RangeCheck, "{ pop interrupt 1 }");
    set_handler(&mut interp, ErrorCode::Interrupt, "/int");
    assert_eq!(run(&mut interp, "boom 2"), Outcome::Completed);

    let int = literal(&mut interp, "int");
    assert_eq!(
        interp.operands(),
        &[Value::null(), int, Value::int(1), Value::int(2)]
    );
    assert_eq!(interp.errors().old_error(), Some(ErrorCode::Interrupt));
    assert!(!interp.errors().is_interrupting());
}

#[test]
fn test_reclaim_retries_match_failures() {
    for failures in 0..=5 {
        let (memory, tally) = ScriptedMemory::failing(failures);
        let mut interp = builder().memory(memory).build().unwrap();
        assert_eq!(run(&mut interp, "lowmem 1 pop"), Outcome::Completed);
        assert_eq!(interp.low_memory().last_report().retries, failures);
        assert_eq!(tally.regain_calls.get(), failures + 1);
    }
}

#[test]
fn test_patch_rewrites_prologue_definitions() {
    let mut interp = interpreter();
    let a = interp.intern("a");
    let b = interp.intern("b");
    let mut patches = PatchSet::new();
    patches
        .add([
            Trigger {
                key: a,
                expected_old: Value::int(1),
                new_value: Value::int(10),
            },
            Trigger {
                key: b,
                expected_old: Value::int(2),
                new_value: Value::int(20),
            },
        ])
        .unwrap();
    interp.dicts_mut().set_override_hook(Box::new(patches));

    assert_eq!(run(&mut interp, "/a 1 def a"), Outcome::Completed);
    assert_eq!(ints(&interp), vec![1]);
    assert_eq!(run(&mut interp, "/b 2 def a b"), Outcome::Completed);
    assert_eq!(ints(&interp), vec![1, 10, 20]);
}

#[test]
fn test_patch_disarmed_by_different_value() {
    let mut interp = interpreter();
    let a = interp.intern("a");
    let b = interp.intern("b");
    let mut patches = PatchSet::new();
    patches
        .add([
            Trigger {
                key: a,
                expected_old: Value::int(1),
                new_value: Value::int(10),
            },
            Trigger {
                key: b,
                expected_old: Value::int(2),
                new_value: Value::int(20),
            },
        ])
        .unwrap();
    interp.dicts_mut().set_override_hook(Box::new(patches));

    assert_eq!(run(&mut interp, "/a 1 def /a 5 def /b 2 def a b"), Outcome::Completed);
    assert_eq!(ints(&interp), vec![5, 2]);
}

#[test]
fn test_patch_rewrite_into_restored_scope_is_dropped() {
    let mut interp = interpreter();
    let a = interp.intern("a");
    let b = interp.intern("b");
    let mut patches = PatchSet::new();
    patches
        .add([
            Trigger {
                key: a,
                expected_old: Value::int(1),
                new_value: Value::int(10),
            },
            Trigger {
                key: b,
                expected_old: Value::int(2),
                new_value: Value::int(20),
            },
        ])
        .unwrap();
    interp.dicts_mut().set_override_hook(Box::new(patches));

    let outcome = run(
        &mut interp,
        "save dict begin /a 1 def end restore /b 2 def b",
    );
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(ints(&interp), vec![20]);
}

#[test]
fn test_job_boundary_resets_state() {
    let mut interp = interpreter();
    set_handler(&mut interp, ErrorCode::Interrupt, "/int");
    interp.begin_real_job().unwrap();
    assert_eq!(run(&mut interp, "dict begin interrupt 1"), Outcome::Completed);
    assert_eq!(interp.errors().old_error(), Some(ErrorCode::Interrupt));
    assert_eq!(interp.dicts().depth(), PERMANENT_SCOPES + 1);

    let summary = interp.end_job(true);
    assert!(summary.aborted);
    assert_eq!(interp.errors().old_error(), None);
    assert_eq!(interp.dicts().depth(), PERMANENT_SCOPES);
    assert!(interp.operands().is_empty());

    // The next job runs normally.
    interp.begin_real_job().unwrap();
    assert_eq!(run(&mut interp, "1 2 add"), Outcome::Completed);
    assert_eq!(ints(&interp), vec![3]);
}

#[test]
fn test_interrupt_handle_crosses_threads() {
    let mut interp = interpreter();
    let handle = interp.interrupt_handle();
    std::thread::spawn(move || handle.request_interrupt())
        .join()
        .unwrap();
    assert_eq!(
        run(&mut interp, "{} loop"),
        Outcome::Propagate(ErrorCode::Interrupt)
    );
}

mod proptest_engine {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn literal_program_counts_one_step_per_element(values in proptest::collection::vec(any::<i32>(), 0..200)) {
            let mut interp = interpreter();
            let program = Value::procedure(values.iter().map(|&v| Value::int(i64::from(v))).collect());
            prop_assert_eq!(interp.interpret(program), Outcome::Completed);
            prop_assert_eq!(interp.counters().unwrap().dispatch_steps, values.len() as u64);
            prop_assert_eq!(interp.exec_depth(), 0);
            let expected: Vec<i64> = values.iter().map(|&v| i64::from(v)).collect();
            prop_assert_eq!(ints(&interp), expected);
        }

        #[test]
        fn repeat_runs_body_count_times(count in 0i64..500) {
            let mut interp = interpreter();
            let program = format!("0 {count} {{1 add}} repeat");
            prop_assert_eq!(run(&mut interp, &program), Outcome::Completed);
            prop_assert_eq!(ints(&interp), vec![count]);
            prop_assert_eq!(interp.exec_depth(), 0);
        }

        #[test]
        fn innermost_binding_wins_at_every_depth(depth in 1usize..15) {
            let mut interp = interpreter();
            let x = interp.intern("x");
            interp.define(x, Value::int(0)).unwrap();
            for i in 1..=depth {
                let scope = interp.new_scope();
                interp.dicts_mut().begin(scope).unwrap();
                interp.define(x, Value::int(i as i64)).unwrap();
                prop_assert_eq!(interp.lookup(x), Ok(Value::int(i as i64)));
            }
            for i in (0..depth).rev() {
                interp.dicts_mut().end().unwrap();
                prop_assert_eq!(interp.lookup(x), Ok(Value::int(i as i64)));
            }
            prop_assert_eq!(interp.dicts().depth(), PERMANENT_SCOPES);
        }

        #[test]
        fn unhandled_error_restores_exec_depth(prefix in 0usize..20) {
            let mut interp = interpreter();
            let program = format!("{} boom", "1 ".repeat(prefix));
            prop_assert_eq!(run(&mut interp, &program), Outcome::Propagate(ErrorCode::RangeCheck));
            prop_assert_eq!(interp.exec_depth(), 0);
            prop_assert_eq!(interp.operands().len(), prefix);
        }
    }
}
