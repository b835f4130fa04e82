//! Shared deterministic types for tree evaluation.
//!
//! These types define stable contracts between the evaluator, the action
//! handlers and the CLI. Their integer and string encodings are part of the
//! external interface and must not change.

use std::fmt;

use crate::exit_codes;

/// Result of evaluating any node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The node finished successfully.
    Success,
    /// Expected negative outcome; drives sequence/select control flow.
    Failure,
    /// Work is still in flight; the tree is re-walked on the next tick.
    Running,
    /// Unrecoverable; aborts the whole tick at every level.
    Error,
}

impl Status {
    /// Process exit code for this status.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => exit_codes::SUCCESS,
            Self::Failure => exit_codes::FAILURE,
            Self::Running => exit_codes::RUNNING,
            Self::Error => exit_codes::ERROR,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Running
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Running => "running",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// Persisted `_state_` marker that makes re-walks resumable.
///
/// An absent attribute means the node has never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Success,
    /// Terminal failure for actions that released their session before failing.
    Failure,
}

impl RunState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}
