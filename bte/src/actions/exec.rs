//! `exec`: run a shell command and stream its output, one line per tick.
//!
//! The session is keyed by the node id and is reaped automatically once the
//! command's output ends; trees never `close` it.

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, warn};

use super::{ActionContext, SessionActions};
use crate::core::command::shell_command;
use crate::core::types::{RunState, Status};
use crate::io::process::{open_pipe, spawn_shell};
use crate::io::session::{ReadOutcome, Session, SessionKind};
use crate::tree::Tree;

impl SessionActions {
    pub(super) fn exec(&mut self, tree: &mut Tree, ctx: &ActionContext<'_>) -> Result<Status> {
        let key = ctx.node_id.as_str();
        if ctx.state.is_none() {
            let command =
                shell_command(ctx.text).ok_or_else(|| anyhow!("exec command is empty"))?;
            if self.sessions.contains(key) {
                bail!("exec session '{key}' is already open");
            }
            let (reader, writer) = open_pipe()?;
            let child = match spawn_shell(&self.config.shell, command, writer) {
                Ok(child) => child,
                Err(err) => {
                    warn!(node = key, err = %format!("{err:#}"), "exec failed to start");
                    ctx.persist(tree, RunState::Failure);
                    return Ok(Status::Failure);
                }
            };
            info!(node = key, command, pid = child.id(), "exec started");
            self.sessions.insert(Session::new(
                key,
                SessionKind::Pipe,
                reader,
                child,
                self.config.close_grace(),
            ))?;
        }

        let timeout = self.config.poll_timeout();
        let chunk = self.config.read_chunk_size;
        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| anyhow!("exec session '{key}' is not open"))?;

        if let Some(line) = session.take_line() {
            emit(&mut self.output, &line)?;
            ctx.persist(tree, RunState::Running);
            return Ok(Status::Running);
        }

        if !session.at_eof() {
            if !session.poll_readable(timeout)? {
                ctx.persist(tree, RunState::Running);
                return Ok(Status::Running);
            }
            match session.read_chunk(chunk) {
                Ok(ReadOutcome::Eof) => debug!(node = key, "exec output ended"),
                Ok(ReadOutcome::Data(_) | ReadOutcome::WouldBlock) => {
                    if let Some(line) = session.take_line() {
                        emit(&mut self.output, &line)?;
                    }
                    ctx.persist(tree, RunState::Running);
                    return Ok(Status::Running);
                }
                Err(err) => {
                    warn!(node = key, err = %err, "exec read failed");
                    // Dropping the session kills the command.
                    self.sessions.remove(key);
                    ctx.persist(tree, RunState::Failure);
                    return Ok(Status::Failure);
                }
            }
        }

        let mut session = self
            .sessions
            .remove(key)
            .ok_or_else(|| anyhow!("exec session '{key}' is not open"))?;
        let rest = session.take_rest();
        if !rest.is_empty() {
            emit(&mut self.output, &rest)?;
        }
        let status = match session.close() {
            Ok(Some(exit)) if exit.success() => Status::Success,
            Ok(exit) => {
                info!(
                    node = key,
                    exit_code = ?exit.and_then(|e| e.code()),
                    "exec exited unsuccessfully"
                );
                Status::Failure
            }
            Err(err) => {
                warn!(node = key, err = %format!("{err:#}"), "exec cleanup failed");
                Status::Failure
            }
        };
        let state = if status == Status::Success {
            RunState::Success
        } else {
            RunState::Failure
        };
        ctx.persist(tree, state);
        Ok(status)
    }
}

fn emit(output: &mut dyn std::io::Write, bytes: &[u8]) -> Result<()> {
    output.write_all(bytes).context("write exec output")?;
    output.flush().context("flush exec output")
}
