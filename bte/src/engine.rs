//! Tick loop: re-walk the tree from the root until it stops running.

use std::io::Write;
use std::thread;

use tracing::{debug, info, warn};

use crate::actions::{ActionRunner, SessionActions};
use crate::core::types::Status;
use crate::evaluate::evaluate;
use crate::io::config::EngineConfig;
use crate::io::session::SessionTable;
use crate::tree::Tree;

/// Loop limits for [`run_ticks`].
#[derive(Debug, Clone, Default)]
pub struct TickOptions {
    /// Sleep between ticks.
    pub delay: std::time::Duration,
    /// Stop with `Running` once this many ticks have run.
    pub max_ticks: Option<u64>,
}

impl TickOptions {
    pub fn from_config(config: &EngineConfig, debug: bool) -> Self {
        Self {
            delay: if debug {
                config.debug_tick_delay()
            } else {
                std::time::Duration::ZERO
            },
            max_ticks: config.max_ticks,
        }
    }
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: Status,
    pub ticks: u64,
    /// Sessions still open when the loop ended, closed during teardown.
    pub reaped_sessions: Vec<String>,
}

/// Evaluate the root once.
pub fn tick<A: ActionRunner>(tree: &mut Tree, actions: &mut A) -> Status {
    match tree.root() {
        Some(root) => evaluate(tree, root, actions),
        None => {
            warn!("tree has no root");
            Status::Error
        }
    }
}

/// Tick `tree` until a terminal status or the tick limit.
///
/// `on_tick` sees every tick's number (1-indexed) and status.
pub fn run_ticks<A: ActionRunner, F: FnMut(u64, Status)>(
    tree: &mut Tree,
    actions: &mut A,
    options: &TickOptions,
    mut on_tick: F,
) -> (Status, u64) {
    let mut ticks = 0u64;
    loop {
        ticks += 1;
        let status = tick(tree, actions);
        debug!(tick = ticks, %status, "tick finished");
        on_tick(ticks, status);
        if status.is_terminal() {
            return (status, ticks);
        }
        if options.max_ticks.is_some_and(|max| ticks >= max) {
            warn!(ticks, "tick limit reached while still running");
            return (status, ticks);
        }
        if !options.delay.is_zero() {
            thread::sleep(options.delay);
        }
    }
}

/// One tree run: owns the session table for its duration.
pub struct Engine {
    actions: SessionActions,
    options: TickOptions,
}

impl Engine {
    pub fn new(config: EngineConfig, debug: bool) -> Self {
        let options = TickOptions::from_config(&config, debug);
        Self {
            actions: SessionActions::new(config),
            options,
        }
    }

    /// Engine whose `exec` output goes to `output` instead of stdout.
    pub fn with_output(config: EngineConfig, output: Box<dyn Write>) -> Self {
        let options = TickOptions::from_config(&config, false);
        Self {
            actions: SessionActions::with_output(config, output),
            options,
        }
    }

    pub fn sessions(&self) -> &SessionTable {
        self.actions.sessions()
    }

    /// Run a single tick without tearing anything down.
    pub fn tick(&mut self, tree: &mut Tree) -> Status {
        tick(tree, &mut self.actions)
    }

    /// Tick until terminal, then close every session left open.
    pub fn run(&mut self, tree: &mut Tree) -> RunOutcome {
        info!(nodes = tree.len(), "run started");
        let (status, ticks) = run_ticks(tree, &mut self.actions, &self.options, |_, _| {});
        let reaped_sessions = self.shutdown();
        if !reaped_sessions.is_empty() {
            info!(sessions = ?reaped_sessions, "closed sessions left open by the tree");
        }
        info!(%status, ticks, "run finished");
        RunOutcome {
            status,
            ticks,
            reaped_sessions,
        }
    }

    /// Close all open sessions and return their keys.
    pub fn shutdown(&mut self) -> Vec<String> {
        self.actions.shutdown()
    }
}
