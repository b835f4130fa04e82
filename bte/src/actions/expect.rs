//! `expect`: wait for a glob pattern to appear on a stream.

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info, warn};

use super::{ActionContext, SessionActions};
use crate::core::matcher::ExpectPattern;
use crate::core::types::{RunState, Status};
use crate::io::session::{ReadOutcome, Session};
use crate::tree::Tree;

impl SessionActions {
    pub(super) fn expect(&mut self, tree: &mut Tree, ctx: &ActionContext<'_>) -> Result<Status> {
        let key = ctx.stream()?;
        let source = ctx.text.trim();
        if source.is_empty() {
            bail!("expect pattern is empty");
        }
        let pattern = match ExpectPattern::new(source) {
            Ok(pattern) => pattern,
            Err(err) => {
                warn!(stream_id = key, err = %format!("{err:#}"), "invalid expect pattern");
                return Ok(Status::Failure);
            }
        };
        let timeout = self.config.poll_timeout();
        let chunk = self.config.read_chunk_size;
        let limit = self.config.expect_buffer_limit;
        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| anyhow!("no open stream '{key}' to expect on"))?;

        // Output buffered by earlier reads may already satisfy the pattern.
        if consume_match(session, &pattern) {
            info!(stream_id = key, pattern = pattern.source(), "expect matched");
            ctx.persist(tree, RunState::Success);
            return Ok(Status::Success);
        }

        let ready = match session.poll_readable(timeout) {
            Ok(ready) => ready,
            Err(err) => {
                warn!(stream_id = key, err = %format!("{err:#}"), "expect poll failed");
                return Ok(Status::Failure);
            }
        };
        if !ready {
            ctx.persist(tree, RunState::Running);
            return Ok(Status::Running);
        }

        match session.read_chunk(chunk) {
            Ok(ReadOutcome::Data(n)) => {
                debug!(stream_id = key, bytes = n, "expect read");
                if consume_match(session, &pattern) {
                    info!(stream_id = key, pattern = pattern.source(), "expect matched");
                    ctx.persist(tree, RunState::Success);
                    return Ok(Status::Success);
                }
                let dropped = session.trim_read_buffer(limit);
                if dropped > 0 {
                    debug!(stream_id = key, bytes = dropped, "expect dropped old output");
                }
            }
            Ok(ReadOutcome::WouldBlock | ReadOutcome::Eof) => {}
            Err(err) => {
                warn!(stream_id = key, err = %err, "expect read failed");
                return Ok(Status::Failure);
            }
        }
        ctx.persist(tree, RunState::Running);
        Ok(Status::Running)
    }
}

/// Consume through the first match, or remember how far the buffer was searched.
fn consume_match(session: &mut Session, pattern: &ExpectPattern) -> bool {
    let scanned = session.scanned(pattern.source());
    match pattern.find_from(session.read_buffer(), scanned) {
        Some(end) => {
            session.consume(end);
            true
        }
        None => {
            session.record_scan(pattern.source());
            false
        }
    }
}
