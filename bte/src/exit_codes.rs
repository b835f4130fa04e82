//! Stable exit codes for the `bte` CLI.
//!
//! The process exits with the integer value of the tree's final status.

/// The tree finished with `Success`.
pub const SUCCESS: i32 = 0;
/// The tree finished with `Failure`.
pub const FAILURE: i32 = 1;
/// The tick limit was reached while the tree was still `Running`.
pub const RUNNING: i32 = 2;
/// The tree hit an `Error`, or the document/config could not be loaded.
pub const ERROR: i32 = 3;
