//! Recursive node evaluation: one depth-first walk of a subtree.
//!
//! Control-flow nodes combine their children's statuses; action leaves are
//! handed to an [`ActionRunner`]. Nothing here remembers where the previous
//! tick stopped. Resumption comes entirely from `_state_` attributes that the
//! action handlers persist on their nodes.

use tracing::{debug, trace, warn};

use crate::actions::ActionRunner;
use crate::core::types::Status;
use crate::tree::{DecoratorKind, NodeId, NodeKind, TYPE_ATTR, Tree};

/// Evaluate `node` and its subtree once.
pub fn evaluate<A: ActionRunner>(tree: &mut Tree, node: NodeId, actions: &mut A) -> Status {
    let id = tree.ensure_id(node);
    trace!(node = %tree.describe(node), "evaluate");

    let status = match tree.kind(node) {
        NodeKind::Root | NodeKind::Sequence => sequence(tree, node, actions),
        NodeKind::Select => select(tree, node, actions),
        NodeKind::Decorator(kind) => {
            let kind = *kind;
            decorate(tree, node, kind, actions)
        }
        NodeKind::Action(Ok(command)) => {
            let command = command.clone();
            actions.run(tree, node, &command)
        }
        NodeKind::Action(Err(reason)) => {
            warn!(node = %id, reason = %reason, "action leaf cannot be dispatched");
            Status::Error
        }
        NodeKind::Unsupported => {
            warn!(node = %id, tag = tree.tag(node), "node is not supported");
            Status::Error
        }
    };

    debug!(node = %id, tag = tree.tag(node), %status, "evaluated");
    status
}

/// Children left to right until one does not succeed. Empty succeeds.
fn sequence<A: ActionRunner>(tree: &mut Tree, node: NodeId, actions: &mut A) -> Status {
    for child in tree.children(node).to_vec() {
        let status = evaluate(tree, child, actions);
        if status != Status::Success {
            return status;
        }
    }
    Status::Success
}

/// Children left to right until one does not fail.
///
/// An empty select succeeds; otherwise the last child's failure is returned.
fn select<A: ActionRunner>(tree: &mut Tree, node: NodeId, actions: &mut A) -> Status {
    let mut status = Status::Success;
    for child in tree.children(node).to_vec() {
        status = evaluate(tree, child, actions);
        if status != Status::Failure {
            return status;
        }
    }
    status
}

fn decorate<A: ActionRunner>(
    tree: &mut Tree,
    node: NodeId,
    kind: Option<DecoratorKind>,
    actions: &mut A,
) -> Status {
    let Some(kind) = kind else {
        warn!(
            decorator_type = tree.attr(node, TYPE_ATTR),
            "decorator type missing or not recognized"
        );
        return Status::Error;
    };
    let child = match tree.children(node) {
        [child] => *child,
        children => {
            warn!(
                children = children.len(),
                "decorator requires exactly one child"
            );
            return Status::Error;
        }
    };
    match (kind, evaluate(tree, child, actions)) {
        (DecoratorKind::Succeeder, Status::Failure) => Status::Success,
        (DecoratorKind::Succeeder, other) => other,
    }
}
