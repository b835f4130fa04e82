//! `write`: deliver text to a stream in bounded, resumable chunks.
//!
//! Unlike the other actions, `write` persists its run state on every tick.

use anyhow::{Result, anyhow};
use tracing::{debug, warn};

use super::{ActionContext, SessionActions};
use crate::core::escape::translate_newlines;
use crate::core::types::{RunState, Status};
use crate::tree::Tree;

impl SessionActions {
    pub(super) fn write(&mut self, tree: &mut Tree, ctx: &ActionContext<'_>) -> Result<Status> {
        let key = ctx.stream()?;
        let timeout = self.config.poll_timeout();
        let chunk = self.config.write_chunk_size;
        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| anyhow!("no open stream '{key}' to write to"))?;

        if ctx.state.is_none() {
            session.load_write(translate_newlines(ctx.text));
        }

        let status = match session.poll_writable(timeout) {
            Ok(false) => Status::Running,
            Ok(true) => match session.write_chunk(chunk) {
                Ok(n) => {
                    debug!(
                        stream_id = key,
                        bytes = n,
                        offset = session.bytes_written(),
                        total = session.write_buffer().len(),
                        "write chunk"
                    );
                    if session.write_remaining() == 0 {
                        session.finish_write();
                        Status::Success
                    } else {
                        Status::Running
                    }
                }
                Err(err) => {
                    warn!(stream_id = key, err = %err, "write failed");
                    Status::Failure
                }
            },
            Err(err) => {
                warn!(stream_id = key, err = %format!("{err:#}"), "write poll failed");
                Status::Failure
            }
        };

        let state = match status {
            Status::Success => RunState::Success,
            Status::Failure => RunState::Failure,
            _ => RunState::Running,
        };
        ctx.persist(tree, state);
        Ok(status)
    }
}
