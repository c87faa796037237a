use super::*;

fn operand_stack(limit: usize) -> Stack<i32> {
    Stack::new(limit, ErrorCode::StackOverflow, ErrorCode::StackUnderflow)
}

#[test]
fn test_push_pop_lifo() {
    let mut stack = operand_stack(4);
    stack.push(1).unwrap();
    stack.push(2).unwrap();
    assert_eq!(stack.pop(), Ok(2));
    assert_eq!(stack.pop(), Ok(1));
    assert_eq!(stack.pop(), Err(ErrorCode::StackUnderflow));
}

#[test]
fn test_overflow_reports_configured_code() {
    let mut stack: Stack<i32> = Stack::new(1, ErrorCode::ExecStackOverflow, ErrorCode::StackUnderflow);
    stack.push(1).unwrap();
    assert_eq!(stack.push(2), Err(ErrorCode::ExecStackOverflow));
    assert_eq!(stack.len(), 1);
    assert!(stack.is_full());
}

#[test]
fn test_peek_from_top() {
    let mut stack = operand_stack(4);
    for i in 0..3 {
        stack.push(i).unwrap();
    }
    assert_eq!(stack.peek(0), Ok(&2));
    assert_eq!(stack.peek(2), Ok(&0));
    assert_eq!(stack.peek(3), Err(ErrorCode::StackUnderflow));
}

#[test]
fn test_changes_counter() {
    let mut stack = operand_stack(4);
    let start = stack.changes();
    stack.push(1).unwrap();
    stack.push(2).unwrap();
    *stack.top_mut().unwrap() = 5;
    assert_eq!(stack.changes(), start + 2);
    stack.truncate(1);
    assert_eq!(stack.changes(), start + 3);
    // No-op truncate is not a change.
    stack.truncate(5);
    assert_eq!(stack.changes(), start + 3);
}

#[test]
fn test_position_from_top() {
    let mut stack = operand_stack(8);
    for i in [7, 3, 7, 1] {
        stack.push(i).unwrap();
    }
    assert_eq!(stack.position_from_top(|&x| x == 7), Some(1));
    assert_eq!(stack.position_from_top(|&x| x == 9), None);
    assert_eq!(stack.iter_from_top().copied().collect::<Vec<_>>(), vec![1, 7, 3, 7]);
}

#[test]
fn test_require() {
    let mut stack = operand_stack(8);
    stack.push(1).unwrap();
    assert_eq!(stack.require(1), Ok(()));
    assert_eq!(stack.require(2), Err(ErrorCode::StackUnderflow));
}
