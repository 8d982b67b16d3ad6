//! Internal consistency checks
//!
//! An invariant violation means the engine, or the code producing
//! tranlocals, is broken. It is never recovered from: [`check_invariant!`]
//! panics with an `invariant violated` message.
//!
//! With the `fast` feature the check compiles to a `debug_assert!`, so
//! release builds skip the cost of evaluating the condition. The meaning
//! is unchanged: a violation is still a bug.

/// Panic if `cond` is false
///
/// ```should_panic
/// use mvstm_core::check_invariant;
/// check_invariant!(1 + 1 == 3, "arithmetic is broken");
/// ```
#[cfg(not(feature = "fast"))]
#[macro_export]
macro_rules! check_invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            panic!("invariant violated: {}", format_args!($($arg)+));
        }
    };
}

/// Panic if `cond` is false (debug builds only)
#[cfg(feature = "fast")]
#[macro_export]
macro_rules! check_invariant {
    ($cond:expr, $($arg:tt)+) => {
        debug_assert!($cond, "invariant violated: {}", format_args!($($arg)+))
    };
}
