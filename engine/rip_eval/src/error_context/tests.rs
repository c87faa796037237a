use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_raise_and_acknowledge() {
    let mut errors = ErrorContext::new();
    assert_eq!(errors.state(), ErrorState::Clear);
    assert_eq!(errors.raise(ErrorCode::RangeCheck), ErrorCode::RangeCheck);
    assert_eq!(errors.state(), ErrorState::Signalled(ErrorCode::RangeCheck));
    errors.acknowledge();
    assert_eq!(errors.new_error(), None);
    assert_eq!(errors.old_error(), Some(ErrorCode::RangeCheck));
    assert_eq!(errors.orig_error(), Some(ErrorCode::RangeCheck));
}

#[test]
fn test_orig_error_is_first_since_reset() {
    let mut errors = ErrorContext::new();
    errors.raise(ErrorCode::TypeCheck);
    errors.acknowledge();
    errors.raise(ErrorCode::Undefined);
    assert_eq!(errors.orig_error(), Some(ErrorCode::TypeCheck));
    errors.reset();
    assert_eq!(errors.orig_error(), None);
}

#[test]
fn test_unclearable_not_overwritten() {
    let mut errors = ErrorContext::new();
    errors.raise(ErrorCode::Interrupt);
    assert_eq!(errors.raise(ErrorCode::TypeCheck), ErrorCode::Interrupt);
    assert_eq!(errors.pending_signal(), Some(ErrorCode::Interrupt));
}

#[test]
fn test_pending_signal_overrides_later_clearable() {
    let mut errors = ErrorContext::new();
    errors.raise(ErrorCode::Timeout);
    errors.clear();
    assert_eq!(errors.raise(ErrorCode::RangeCheck), ErrorCode::Timeout);
}

#[test]
fn test_save_restore_clean_region() {
    let mut errors = ErrorContext::new();
    errors.raise(ErrorCode::Undefined);
    errors.save();
    assert_eq!(errors.state(), ErrorState::Saved);
    assert!(errors.in_saved_region());
    assert_eq!(errors.restore(), Ok(()));
    assert_eq!(errors.new_error(), Some(ErrorCode::Undefined));
}

#[test]
fn test_restore_returns_inner_error() {
    let mut errors = ErrorContext::new();
    errors.save();
    errors.raise(ErrorCode::RangeCheck);
    assert_eq!(errors.restore(), Err(ErrorCode::RangeCheck));
    assert_eq!(errors.new_error(), None);
    assert_eq!(errors.orig_error(), None);
}

#[test]
fn test_restore_treats_not_an_error_as_success() {
    let mut errors = ErrorContext::new();
    errors.save();
    errors.raise(ErrorCode::NotAnError);
    assert_eq!(errors.restore(), Ok(()));
}

#[test]
fn test_restore_reports_pending_signal() {
    let mut errors = ErrorContext::new();
    errors.save();
    errors.raise(ErrorCode::Interrupt);
    errors.clear();
    assert_eq!(errors.restore(), Err(ErrorCode::Interrupt));
    assert_eq!(errors.swallowed_signal(), Some(ErrorCode::Interrupt));
}

#[test]
fn test_delivered_signal_is_not_swallowed() {
    let mut errors = ErrorContext::new();
    errors.raise(ErrorCode::Interrupt);
    errors.deliver_signal(3);
    errors.acknowledge();
    assert_eq!(errors.pending_signal(), None);
    assert_eq!(errors.swallowed_signal(), None);
    assert_eq!(errors.state(), ErrorState::Interrupting);
}

#[test]
fn test_signal_settles_when_handler_returns() {
    let mut errors = ErrorContext::new();
    errors.raise(ErrorCode::Interrupt);
    errors.deliver_signal(3);
    errors.acknowledge();

    errors.settle_signal(5);
    assert!(errors.is_interrupting());
    errors.settle_signal(3);
    assert!(!errors.is_interrupting());
    assert_eq!(errors.state(), ErrorState::Clear);

    // A second signal dropped by a nested level is caught again.
    errors.save();
    errors.raise(ErrorCode::Interrupt);
    errors.clear();
    assert_eq!(errors.restore(), Err(ErrorCode::Interrupt));
    assert_eq!(errors.swallowed_signal(), Some(ErrorCode::Interrupt));
}

#[test]
fn test_nested_signal_handler_keeps_outer_depth() {
    let mut errors = ErrorContext::new();
    errors.raise(ErrorCode::Interrupt);
    errors.deliver_signal(3);
    errors.acknowledge();
    errors.raise(ErrorCode::Timeout);
    errors.deliver_signal(6);
    errors.acknowledge();

    errors.settle_signal(6);
    assert!(errors.is_interrupting());
    errors.settle_signal(2);
    assert!(!errors.is_interrupting());
}

#[test]
fn test_nested_saves() {
    let mut errors = ErrorContext::new();
    errors.save();
    errors.save();
    errors.raise(ErrorCode::TypeCheck);
    assert_eq!(errors.restore(), Err(ErrorCode::TypeCheck));
    assert!(errors.in_saved_region());
    assert_eq!(errors.restore(), Ok(()));
    assert!(!errors.in_saved_region());
}
