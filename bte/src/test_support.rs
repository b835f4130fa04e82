//! Test-only helpers: document builders, scripted action runners and output capture.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::actions::ActionRunner;
use crate::core::types::Status;
use crate::io::document::parse_document;
use crate::tree::{ActionCommand, ID_ATTR, NodeId, Tree};

/// Parse an inline document, panicking on malformed XML.
pub fn tree_from_xml(xml: &str) -> Tree {
    parse_document(xml).expect("parse test document")
}

/// Write `xml` to `tree.xml` inside a fresh temp dir.
///
/// Keep the returned `TempDir` alive for as long as the path is used.
pub fn temp_document(xml: &str) -> Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("tree.xml");
    fs::write(&path, xml).with_context(|| format!("write {}", path.display()))?;
    Ok((dir, path))
}

/// Action runner that returns scripted statuses keyed by node `id`.
///
/// Each node pops statuses from its queue; the last one repeats forever.
/// Unscripted nodes succeed. Every call is recorded in order.
#[derive(Debug, Default)]
pub struct ScriptedActions {
    scripts: HashMap<String, VecDeque<Status>>,
    calls: Vec<String>,
}

impl ScriptedActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, id: &str, statuses: impl IntoIterator<Item = Status>) -> Self {
        self.scripts
            .insert(id.to_string(), statuses.into_iter().collect());
        self
    }

    /// Node ids in call order.
    pub fn calls(&self) -> Vec<&str> {
        self.calls.iter().map(String::as_str).collect()
    }
}

impl ActionRunner for ScriptedActions {
    fn run(&mut self, tree: &mut Tree, node: NodeId, _command: &ActionCommand) -> Status {
        let id = tree.attr(node, ID_ATTR).unwrap_or_default().to_string();
        let status = match self.scripts.get_mut(&id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Status::Success),
            Some(queue) => queue.front().copied().unwrap_or(Status::Success),
            None => Status::Success,
        };
        self.calls.push(id);
        status
    }
}

/// Cloneable in-memory writer for capturing `exec` output.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
