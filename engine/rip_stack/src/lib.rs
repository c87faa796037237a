//! Native stack safety for nested interpreter invocations.
//!
//! Operators such as font resolution or `execute_nested` call back into the
//! interpreter loop while an outer loop is still active. Each nesting level
//! consumes native stack for the loop frame, the operator frame and whatever
//! the operator keeps alive. The interpreter bounds the number of levels with
//! `max_interpreter_level`; this crate makes sure the native stack can hold
//! that many levels on every platform.
//!
//! # Platform Support
//!
//! - **Native targets**: `stacker` grows the stack on demand.
//! - **WASM targets**: passthrough (the host manages the stack).

/// If less than this remains, grow before entering another loop level.
const RED_ZONE: usize = 128 * 1024;

/// Size of each additional stack segment.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f` with at least [`RED_ZONE`] bytes of native stack available.
///
/// Wrap every entry into the interpreter loop with this so that a chain of
/// operators re-entering `interpret()` cannot overflow the native stack
/// before the configured interpreter-level limit trips.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// WASM version: call directly.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Remaining native stack in bytes, when the platform can report it.
///
/// Used only for diagnostics when a nested level is rejected.
#[cfg(not(target_arch = "wasm32"))]
pub fn remaining_stack() -> Option<usize> {
    stacker::remaining_stack()
}

/// WASM version: unknown.
#[cfg(target_arch = "wasm32")]
pub fn remaining_stack() -> Option<usize> {
    None
}
