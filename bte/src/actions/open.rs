//! `open`: spawn a command on a fresh pseudo-terminal and register it.

use anyhow::{Result, anyhow, bail};
use tracing::{info, warn};

use super::{ActionContext, SessionActions};
use crate::core::command::argv;
use crate::core::types::{RunState, Status};
use crate::io::process::{open_pty, spawn_on_pty};
use crate::io::session::{Session, SessionKind};
use crate::tree::Tree;

impl SessionActions {
    pub(super) fn open(&mut self, tree: &mut Tree, ctx: &ActionContext<'_>) -> Result<Status> {
        let key = ctx.stream()?;
        let args = argv(ctx.text).ok_or_else(|| anyhow!("open command is empty"))?;
        if self.sessions.contains(key) {
            bail!("stream '{key}' is already open");
        }

        let (master, slave) = open_pty()?;
        let child = match spawn_on_pty(&args, slave) {
            Ok(child) => child,
            Err(err) => {
                warn!(stream_id = key, err = %format!("{err:#}"), "open failed to spawn");
                return Ok(Status::Failure);
            }
        };
        info!(stream_id = key, argv = ?args, pid = child.id(), "stream opened");
        self.sessions.insert(Session::new(
            key,
            SessionKind::Pty,
            master,
            child,
            self.config.close_grace(),
        ))?;

        ctx.persist(tree, RunState::Success);
        Ok(Status::Success)
    }
}
