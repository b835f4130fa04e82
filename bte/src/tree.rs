//! In-memory behavior tree with mutable per-node attributes.
//!
//! The tree is an arena of [`Node`]s addressed by [`NodeId`]. Node kinds are
//! resolved from tag names once, when the document is loaded, so evaluation
//! never re-parses tag strings. Attributes stay mutable for the whole run:
//! the engine writes `id` and `_state_` back onto nodes to make re-walks
//! resumable.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, anyhow};
use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::core::types::RunState;

/// Attribute holding the node identifier.
pub const ID_ATTR: &str = "id";
/// Attribute holding the persisted run state.
pub const STATE_ATTR: &str = "_state_";
/// Attribute naming the session an action operates on.
pub const STREAM_ID_ATTR: &str = "stream_id";
/// Attribute selecting the decorator kind.
pub const TYPE_ATTR: &str = "type";

const GENERATED_ID_LEN: usize = 12;

/// Index of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// The five external-world actions an `action` leaf can wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Exec,
    Open,
    Close,
    Expect,
    Write,
}

impl ActionKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "exec" => Some(Self::Exec),
            "open" => Some(Self::Open),
            "close" => Some(Self::Close),
            "expect" => Some(Self::Expect),
            "write" => Some(Self::Write),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exec => "exec",
            Self::Open => "open",
            Self::Close => "close",
            Self::Expect => "expect",
            Self::Write => "write",
        }
    }

    /// Whether the action addresses a session through `stream_id`.
    pub fn uses_stream(self) -> bool {
        !matches!(self, Self::Exec)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command element wrapped by an `action` leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCommand {
    pub kind: ActionKind,
    /// Raw text content of the command element.
    pub text: String,
    /// `stream_id` from the command element, falling back to the `action` element.
    pub stream_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorKind {
    Succeeder,
}

impl DecoratorKind {
    pub fn from_type(value: &str) -> Option<Self> {
        match value {
            "succeeder" => Some(Self::Succeeder),
            _ => None,
        }
    }
}

/// Node kind resolved at load time.
///
/// Malformed shapes are kept in the tree instead of rejected during loading:
/// they only turn into `Error` when the walk reaches them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The `bt` document root, evaluated as a sequence.
    Root,
    Sequence,
    Select,
    /// `None` when `type` is missing or not recognized.
    Decorator(Option<DecoratorKind>),
    /// `Err` carries the reason the leaf cannot be dispatched.
    Action(Result<ActionCommand, String>),
    Unsupported,
}

impl NodeKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "bt" => Self::Root,
            "sequence" => Self::Sequence,
            "select" => Self::Select,
            "decorator" => Self::Decorator(None),
            "action" => Self::Action(Err("action has no command element".to_string())),
            _ => Self::Unsupported,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub tag: String,
    pub kind: NodeKind,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<NodeId>,
}

/// Arena-backed behavior tree.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its id. The first node pushed is the root.
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
    }

    pub fn root(&self) -> Option<NodeId> {
        if self.is_empty() {
            None
        } else {
            Some(NodeId(0))
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn tag(&self, id: NodeId) -> &str {
        &self.nodes[id.0].tag
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Find the first node whose `id` attribute equals `value`.
    pub fn find_by_id(&self, value: &str) -> Option<NodeId> {
        self.node_ids().find(|&node| self.attr(node, ID_ATTR) == Some(value))
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.nodes[id.0].attrs.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: impl Into<String>) {
        self.nodes[id.0].attrs.insert(key.to_string(), value.into());
    }

    /// Return the node's `id`, generating and persisting a random one if absent.
    pub fn ensure_id(&mut self, id: NodeId) -> String {
        if let Some(existing) = self.attr(id, ID_ATTR) {
            return existing.to_string();
        }
        let generated: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_ID_LEN)
            .map(char::from)
            .collect();
        self.set_attr(id, ID_ATTR, generated.clone());
        generated
    }

    /// Read the persisted run state. Unknown values are an error.
    pub fn run_state(&self, id: NodeId) -> Result<Option<RunState>> {
        match self.attr(id, STATE_ATTR) {
            None => Ok(None),
            Some(raw) => RunState::parse(raw).map(Some).ok_or_else(|| {
                anyhow!(
                    "node <{}> has invalid {} value '{}'",
                    self.tag(id),
                    STATE_ATTR,
                    raw
                )
            }),
        }
    }

    pub fn set_run_state(&mut self, id: NodeId, state: RunState) {
        self.set_attr(id, STATE_ATTR, state.as_str());
    }

    /// One-line summary used by trace output.
    pub fn describe(&self, id: NodeId) -> String {
        let node = self.node(id);
        let attrs = node
            .attrs
            .iter()
            .map(|(key, value)| format!("{key}={value:?}"))
            .collect::<Vec<_>>()
            .join(" ");
        if attrs.is_empty() {
            format!("<{}> children={}", node.tag, node.children.len())
        } else {
            format!("<{} {}> children={}", node.tag, attrs, node.children.len())
        }
    }
}
