//! Action handlers for `action` leaves.
//!
//! The [`ActionRunner`] trait decouples tree evaluation from the external
//! world. [`SessionActions`] is the real implementation, backed by a
//! [`SessionTable`]; tests use scripted runners that return predetermined
//! statuses without spawning processes.
//!
//! Every handler shares the same prologue: make sure the node has an `id`,
//! resolve the required `stream_id`, then consult `_state_`. A node already
//! marked `success` (or `failure`) returns that outcome without touching any
//! session; `running` skips the start phase.

use std::io::Write;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::types::{RunState, Status};
use crate::io::config::EngineConfig;
use crate::io::session::SessionTable;
use crate::tree::{ActionCommand, ActionKind, NodeId, Tree};

mod close;
mod exec;
mod expect;
mod open;
mod write;

/// Abstraction over action execution backends.
pub trait ActionRunner {
    /// Run one tick of the action leaf `node`.
    fn run(&mut self, tree: &mut Tree, node: NodeId, command: &ActionCommand) -> Status;
}

/// State recovered from the action node before a handler runs.
#[derive(Debug)]
struct ActionContext<'a> {
    node: NodeId,
    /// Persistent node id; keys `exec` sessions.
    node_id: String,
    /// Required for every action except `exec`.
    stream_id: Option<&'a str>,
    state: Option<RunState>,
    text: &'a str,
}

impl<'a> ActionContext<'a> {
    fn prepare(tree: &mut Tree, node: NodeId, command: &'a ActionCommand) -> Result<Self> {
        let node_id = tree.ensure_id(node);
        let stream_id = command.stream_id.as_deref();
        if command.kind.uses_stream() && stream_id.is_none() {
            return Err(anyhow!(
                "<{}> on node '{}' requires a stream_id attribute",
                command.kind,
                node_id
            ));
        }
        let state = tree.run_state(node)?;
        Ok(Self {
            node,
            node_id,
            stream_id,
            state,
            text: &command.text,
        })
    }

    /// The session key for stream actions.
    fn stream(&self) -> Result<&'a str> {
        self.stream_id
            .ok_or_else(|| anyhow!("node '{}' has no stream_id", self.node_id))
    }

    fn persist(&self, tree: &mut Tree, state: RunState) {
        tree.set_run_state(self.node, state);
    }
}

/// Action runner backed by live processes and pseudo-terminals.
///
/// Owns the session table for the duration of one tree run.
pub struct SessionActions {
    sessions: SessionTable,
    config: EngineConfig,
    output: Box<dyn Write>,
}

impl SessionActions {
    /// Runner whose `exec` output goes to the process's stdout.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_output(config, Box::new(std::io::stdout()))
    }

    pub fn with_output(config: EngineConfig, output: Box<dyn Write>) -> Self {
        Self {
            sessions: SessionTable::new(),
            config,
            output,
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Close every session still open and return their keys.
    pub fn shutdown(&mut self) -> Vec<String> {
        self.sessions.close_all()
    }

    fn dispatch(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        command: &ActionCommand,
    ) -> Result<Status> {
        let ctx = ActionContext::prepare(tree, node, command)?;
        match ctx.state {
            Some(RunState::Success) => {
                debug!(node = %ctx.node_id, "already succeeded");
                return Ok(Status::Success);
            }
            Some(RunState::Failure) => {
                debug!(node = %ctx.node_id, "already failed");
                return Ok(Status::Failure);
            }
            Some(RunState::Running) | None => {}
        }
        match command.kind {
            ActionKind::Exec => self.exec(tree, &ctx),
            ActionKind::Open => self.open(tree, &ctx),
            ActionKind::Close => self.close(tree, &ctx),
            ActionKind::Expect => self.expect(tree, &ctx),
            ActionKind::Write => self.write(tree, &ctx),
        }
    }
}

impl ActionRunner for SessionActions {
    #[instrument(skip_all, fields(action = %command.kind, stream_id = ?command.stream_id))]
    fn run(&mut self, tree: &mut Tree, node: NodeId, command: &ActionCommand) -> Status {
        match self.dispatch(tree, node, command) {
            Ok(status) => {
                debug!(%status, "action finished tick");
                status
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "action error");
                Status::Error
            }
        }
    }
}

impl Drop for SessionActions {
    fn drop(&mut self) {
        self.shutdown();
    }
}
