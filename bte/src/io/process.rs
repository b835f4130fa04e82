//! Helpers for spawning child processes onto non-blocking channels.
//!
//! Channel setup (pipes, ptys, fd flags) and spawning are separate steps so
//! callers can tell a broken environment apart from a command that could not
//! be started.

use std::fs::File;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use nix::fcntl::{FcntlArg, FdFlag, OFlag, fcntl};
use pty_process::blocking::{Pts, Pty};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Create a pipe whose read end is non-blocking.
///
/// Returns `(reader, writer)`. Both ends are close-on-exec so only the child
/// the writer is handed to keeps it open.
pub fn open_pipe() -> Result<(File, OwnedFd)> {
    let (reader, writer) = nix::unistd::pipe().context("create pipe")?;
    set_cloexec(&reader)?;
    set_cloexec(&writer)?;
    set_nonblocking(&reader)?;
    Ok((File::from(reader), writer))
}

/// Allocate a pseudo-terminal and return `(master, slave)`.
///
/// The master is non-blocking; both ends are close-on-exec.
pub fn open_pty() -> Result<(File, Pts)> {
    let pty = Pty::new().context("open pty")?;
    let slave = pty.pts().context("open pty slave")?;
    let master = pty
        .as_fd()
        .try_clone_to_owned()
        .context("duplicate pty master")?;
    set_nonblocking(&master)?;
    Ok((File::from(master), slave))
}

/// Run `command` through `shell -c`, with stdout and stderr both sent to `output`.
#[instrument(skip(output))]
pub fn spawn_shell(shell: &str, command: &str, output: OwnedFd) -> Result<Child> {
    let stderr = output.try_clone().context("duplicate output fd")?;
    let mut cmd = Command::new(shell);
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::from(output))
        .stderr(Stdio::from(stderr));
    spawn(cmd)
}

/// Spawn `argv` in a new session with the pty slave as its controlling
/// terminal and as its stdin, stdout and stderr.
///
/// The slave is consumed; the parent keeps no handle to it, so the master
/// sees end of output once the child side closes.
#[instrument(skip(slave))]
pub fn spawn_on_pty(argv: &[String], slave: Pts) -> Result<Child> {
    let (program, args) = argv.split_first().context("empty argument vector")?;
    let mut cmd = pty_process::blocking::Command::new(program);
    cmd.args(args);
    debug!("spawning child process on pty");
    let spawned = cmd.spawn(&slave);
    drop(slave);
    spawned_child(spawned.map_err(anyhow::Error::from))
}

// Takes the command by value so the parent's copies of the child's fds are
// dropped as soon as the spawn returns.
fn spawn(mut cmd: Command) -> Result<Child> {
    debug!("spawning child process");
    spawned_child(cmd.spawn().map_err(anyhow::Error::from))
}

fn spawned_child(spawned: Result<Child>) -> Result<Child> {
    match spawned {
        Ok(child) => {
            debug!(pid = child.id(), "child process spawned");
            Ok(child)
        }
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            Err(e).context("spawn command")
        }
    }
}

/// Wait up to `grace` for the child to exit, then kill it.
pub fn reap(child: &mut Child, grace: Duration) -> Result<ExitStatus> {
    match child.wait_timeout(grace).context("wait for child")? {
        Some(status) => Ok(status),
        None => {
            warn!(
                pid = child.id(),
                grace_ms = grace.as_millis() as u64,
                "child did not exit, killing"
            );
            child.kill().context("kill child")?;
            child.wait().context("wait child after kill")
        }
    }
}

/// Close a channel, reporting the OS-level result of `close(2)`.
pub fn close_channel(channel: File) -> Result<()> {
    use std::os::fd::IntoRawFd;

    nix::unistd::close(channel.into_raw_fd()).context("close channel")
}

pub fn set_nonblocking(fd: &impl AsRawFd) -> Result<()> {
    let raw = fd.as_raw_fd();
    let flags = fcntl(raw, FcntlArg::F_GETFL).context("read fd status flags")?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(raw, FcntlArg::F_SETFL(flags)).context("set O_NONBLOCK")?;
    Ok(())
}

fn set_cloexec(fd: &impl AsRawFd) -> Result<()> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC)).context("set FD_CLOEXEC")?;
    Ok(())
}
