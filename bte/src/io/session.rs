//! Live external I/O sessions and the table that owns them.
//!
//! A [`Session`] pairs a child process with the non-blocking channel the
//! engine talks to it through: the read end of a pipe for `exec`, or a pty
//! master for `open`. Sessions own their child; dropping one that was never
//! closed kills and reaps the process.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::AsFd;
use std::process::{Child, ExitStatus};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, warn};

use super::process::{close_channel, reap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Output pipe of an `exec` command.
    Pipe,
    /// Pseudo-terminal master of an `open` command.
    Pty,
}

/// Outcome of a single non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were appended to the read buffer.
    Data(usize),
    /// Nothing available right now.
    WouldBlock,
    /// The peer closed its end.
    Eof,
}

#[derive(Debug)]
pub struct Session {
    key: String,
    kind: SessionKind,
    channel: Option<File>,
    child: Option<Child>,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
    bytes_written: usize,
    /// Pattern last searched for by `expect` and how far the buffer was searched.
    expect_scan: Option<(String, usize)>,
    eof: bool,
    grace: Duration,
}

impl Session {
    pub fn new(
        key: impl Into<String>,
        kind: SessionKind,
        channel: File,
        child: Child,
        grace: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            kind,
            channel: Some(channel),
            child: Some(child),
            read_buffer: Vec::new(),
            write_buffer: Vec::new(),
            bytes_written: 0,
            expect_scan: None,
            eof: false,
            grace,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn read_buffer(&self) -> &[u8] {
        &self.read_buffer
    }

    pub fn write_buffer(&self) -> &[u8] {
        &self.write_buffer
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn at_eof(&self) -> bool {
        self.eof
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Wait up to `timeout` for the channel to become readable.
    ///
    /// Hang-up and error conditions count as readable so the next read can
    /// observe them.
    pub fn poll_readable(&self, timeout: Duration) -> Result<bool> {
        self.poll_channel(PollFlags::POLLIN, timeout)
    }

    /// Wait up to `timeout` for the channel to accept writes.
    pub fn poll_writable(&self, timeout: Duration) -> Result<bool> {
        self.poll_channel(PollFlags::POLLOUT, timeout)
    }

    fn poll_channel(&self, interest: PollFlags, timeout: Duration) -> Result<bool> {
        let channel = self.channel()?;
        let mut fds = [PollFd::new(channel.as_fd(), interest)];
        let timeout_ms = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        match poll(&mut fds, PollTimeout::from(timeout_ms)) {
            Ok(0) | Err(Errno::EINTR) => Ok(false),
            Ok(_) => {
                let ready = interest | PollFlags::POLLHUP | PollFlags::POLLERR;
                Ok(fds[0].revents().is_some_and(|events| events.intersects(ready)))
            }
            Err(errno) => Err(errno).with_context(|| format!("poll session '{}'", self.key)),
        }
    }

    /// Perform one non-blocking read of at most `chunk` bytes into the read buffer.
    ///
    /// A pty master reports `EIO` once the child side is gone; that is end of
    /// output, not a failure.
    pub fn read_chunk(&mut self, chunk: usize) -> io::Result<ReadOutcome> {
        let mut buf = vec![0u8; chunk];
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "session channel is closed"))?;
        loop {
            match channel.read(&mut buf) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(ReadOutcome::Eof);
                }
                Ok(n) => {
                    self.read_buffer.extend_from_slice(&buf[..n]);
                    return Ok(ReadOutcome::Data(n));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(ReadOutcome::WouldBlock),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e)
                    if self.kind == SessionKind::Pty
                        && e.raw_os_error() == Some(Errno::EIO as i32) =>
                {
                    self.eof = true;
                    return Ok(ReadOutcome::Eof);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Remove and return the first complete line (including its newline).
    pub fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.read_buffer.iter().position(|&b| b == b'\n')? + 1;
        Some(self.read_buffer.drain(..end).collect())
    }

    /// Remove and return everything buffered.
    pub fn take_rest(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.read_buffer)
    }

    /// Drop the first `len` buffered bytes.
    pub fn consume(&mut self, len: usize) {
        let len = len.min(self.read_buffer.len());
        self.read_buffer.drain(..len);
        self.expect_scan = None;
    }

    /// How much of the read buffer is already known not to match `pattern`.
    pub fn scanned(&self, pattern: &str) -> usize {
        match &self.expect_scan {
            Some((source, end)) if source == pattern => *end,
            _ => 0,
        }
    }

    /// Record that the whole read buffer was searched for `pattern`.
    pub fn record_scan(&mut self, pattern: &str) {
        self.expect_scan = Some((pattern.to_string(), self.read_buffer.len()));
    }

    /// Keep at most `limit` bytes, dropping the oldest. Returns the bytes dropped.
    ///
    /// Trimming the front never makes a searched prefix match, so the scan
    /// offset shifts with the buffer.
    pub fn trim_read_buffer(&mut self, limit: usize) -> usize {
        let excess = self.read_buffer.len().saturating_sub(limit);
        if excess > 0 {
            self.read_buffer.drain(..excess);
            if let Some((_, end)) = &mut self.expect_scan {
                *end = end.saturating_sub(excess);
            }
        }
        excess
    }

    /// Replace the pending write payload and rewind the write offset.
    pub fn load_write(&mut self, payload: Vec<u8>) {
        self.write_buffer = payload;
        self.bytes_written = 0;
    }

    pub fn write_remaining(&self) -> usize {
        self.write_buffer.len() - self.bytes_written
    }

    /// Write up to `chunk` bytes of the pending payload.
    ///
    /// A would-block write counts as zero bytes written.
    pub fn write_chunk(&mut self, chunk: usize) -> io::Result<usize> {
        let end = (self.bytes_written + chunk).min(self.write_buffer.len());
        if end == self.bytes_written {
            return Ok(0);
        }
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "session channel is closed"))?;
        loop {
            match channel.write(&self.write_buffer[self.bytes_written..end]) {
                Ok(n) => {
                    self.bytes_written += n;
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Clear the write payload once it has been fully delivered.
    pub fn finish_write(&mut self) {
        self.write_buffer.clear();
        self.bytes_written = 0;
    }

    /// Close the channel and reap the child.
    ///
    /// The child is reaped even when closing the channel fails; the close
    /// error is reported afterwards.
    pub fn close(mut self) -> Result<Option<ExitStatus>> {
        let closed = match self.channel.take() {
            Some(channel) => close_channel(channel),
            None => Ok(()),
        };
        let status = match self.child.take() {
            Some(mut child) => Some(reap(&mut child, self.grace)?),
            None => None,
        };
        closed.with_context(|| format!("close session '{}'", self.key))?;
        debug!(key = %self.key, exit_code = ?status.and_then(|s| s.code()), "session closed");
        Ok(status)
    }

    fn channel(&self) -> Result<&File> {
        self.channel
            .as_ref()
            .ok_or_else(|| anyhow!("session '{}' channel is closed", self.key))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.channel.take();
        if let Some(mut child) = self.child.take() {
            warn!(key = %self.key, pid = child.id(), "session dropped while open, killing child");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Sessions keyed by node id (`exec`) or `stream_id` (`open`).
///
/// At most one live session exists per key.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<String, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. A live session under the same key is never replaced.
    pub fn insert(&mut self, session: Session) -> Result<()> {
        if self.sessions.contains_key(session.key()) {
            bail!("session '{}' is already open", session.key());
        }
        debug!(
            key = %session.key(),
            kind = ?session.kind(),
            pid = ?session.pid(),
            "session registered"
        );
        self.sessions.insert(session.key().to_string(), session);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Session> {
        self.sessions.get_mut(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Session> {
        let removed = self.sessions.remove(key);
        if removed.is_some() {
            debug!(key, "session deregistered");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Keys of live sessions, sorted for stable reporting.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Close every remaining session and return their keys.
    pub fn close_all(&mut self) -> Vec<String> {
        let keys = self.keys();
        for key in &keys {
            if let Some(session) = self.sessions.remove(key)
                && let Err(err) = session.close()
            {
                warn!(key = %key, err = %format!("{err:#}"), "failed to close session at teardown");
            }
        }
        keys
    }
}
