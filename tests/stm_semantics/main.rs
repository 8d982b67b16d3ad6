//! Transaction Semantics Integration Tests
//!
//! End-to-end checks of the guarantees the engine makes to callers:
//! snapshot isolation, commit atomicity and lock hygiene, blocking retry,
//! object graphs and the retry-loop driver.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test stm_semantics
//! cargo test --test stm_semantics retry::
//! ```

#[path = "../common/mod.rs"]
mod common;

mod commit;
mod object_graphs;
mod snapshot_isolation;
mod template;
