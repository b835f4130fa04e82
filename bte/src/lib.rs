//! Behavior-tree execution engine.
//!
//! Loads a tree of control-flow and action nodes from an XML document and
//! ticks it from the root until it stops returning `Running`. Every tick is a
//! full depth-first walk; in-flight actions persist `id` and `_state_` on their
//! nodes so a re-walk resumes them instead of repeating their side effects.
//!
//! - **[`core`]**: Pure, deterministic logic (statuses, escapes, pattern matching).
//! - **[`io`]**: Side-effecting operations (document loading, config, processes,
//!   the session table).
//!
//! [`evaluate`] implements the control-flow semantics, [`actions`] the leaf
//! handlers, and [`engine`] the tick loop that drives them.

pub mod actions;
pub mod core;
pub mod engine;
pub mod evaluate;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
