//! `close`: release a stream opened by `open`.

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use super::{ActionContext, SessionActions};
use crate::core::types::{RunState, Status};
use crate::tree::Tree;

impl SessionActions {
    pub(super) fn close(&mut self, tree: &mut Tree, ctx: &ActionContext<'_>) -> Result<Status> {
        let key = ctx.stream()?;
        let session = self
            .sessions
            .remove(key)
            .ok_or_else(|| anyhow!("no open stream '{key}' to close"))?;

        match session.close() {
            Ok(exit) => {
                info!(stream_id = key, exit_code = ?exit.and_then(|e| e.code()), "stream closed");
                ctx.persist(tree, RunState::Success);
                Ok(Status::Success)
            }
            Err(err) => {
                warn!(stream_id = key, err = %format!("{err:#}"), "stream close failed");
                ctx.persist(tree, RunState::Failure);
                Ok(Status::Failure)
            }
        }
    }
}
