//! Graph binding synchronization.
//!
//! Node bindings are denormalized copies, so every change to a variable table
//! has to be pushed into the graphical bodies explicitly. Three passes do it:
//!
//! - [`sync_nodes_with_variables`]: full resync of every node against the table
//! - [`relink_renamed`]: carry accepted renames over to nodes still showing the old name
//! - [`unlink_renamed`]: mark nodes of declined renames as broken
//!
//! [`sync_and_carry_renames`] chains the first pass with one of the other two
//! and yields a single update per node.
//!
//! The passes are pure. They read flows and variables and return the
//! [`NodeUpdate`]s for nodes whose binding actually changes, so running a
//! pass twice on unchanged input yields no updates the second time.
//! [`apply_updates`] hands the updates to a [`NodeSink`].

use serde::Serialize;
use tracing::debug;

use crate::flow::{Binding, BrokenReason, FlowGraph, Node, NodeLocation};
use crate::rename::RenamePair;
use crate::types::{find_variable, same_name, BaseType, Variable};

// ============================================================================
// Updates and Sinks
// ============================================================================

/// Replacement of one node inside a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    /// Owning POU of the flow.
    pub flow: String,
    /// Rung id for Ladder flows; `None` for FBD.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rung: Option<String>,
    pub node_id: String,
    /// The node with its new binding.
    pub node: Node,
}

impl NodeUpdate {
    fn new(location: NodeLocation, node: Node) -> Self {
        NodeUpdate {
            flow: location.flow,
            rung: location.rung,
            node_id: location.node_id,
            node,
        }
    }

    pub fn location(&self) -> NodeLocation {
        NodeLocation {
            flow: self.flow.clone(),
            rung: self.rung.clone(),
            node_id: self.node_id.clone(),
        }
    }
}

/// Receives node replacements, one call per mutated node.
pub trait NodeSink {
    fn update_node(&mut self, update: NodeUpdate);
}

impl NodeSink for Vec<NodeUpdate> {
    fn update_node(&mut self, update: NodeUpdate) {
        self.push(update);
    }
}

/// Feed every update to `sink`. Returns the number of updates applied.
pub fn apply_updates<S: NodeSink + ?Sized>(sink: &mut S, updates: Vec<NodeUpdate>) -> usize {
    let count = updates.len();
    for update in updates {
        sink.update_node(update);
    }
    count
}

// ============================================================================
// Full Resync
// ============================================================================

/// Binding a node should carry given the current variable table.
///
/// - unbound nodes stay unbound
/// - a name with no match becomes `Broken(missing)`; an already broken
///   binding is kept as is so its reason survives
/// - contacts and coils bound to a non-BOOL variable become
///   `Broken(type-mismatch)` carrying the resolved variable
/// - everything else binds to a fresh snapshot of the variable
pub fn resolve_binding(node: &Node, variables: &[Variable]) -> Binding {
    let (name, last_type) = match &node.binding {
        Binding::Unbound => return Binding::Unbound,
        Binding::Bound { variable } => (&variable.name, &variable.var_type),
        Binding::Broken { name, var_type, .. } => (name, var_type),
    };

    let Some(resolved) = find_variable(variables, name) else {
        if node.binding.is_broken() {
            return node.binding.clone();
        }
        return Binding::broken(name.clone(), last_type.clone(), BrokenReason::Missing);
    };

    if node.kind.requires_bool() && !resolved.var_type.is_base(BaseType::Bool) {
        return Binding::broken(
            resolved.name.clone(),
            resolved.var_type.clone(),
            BrokenReason::TypeMismatch {
                resolved: Box::new(resolved.clone()),
            },
        );
    }
    Binding::bound(resolved.clone())
}

/// Re-resolve every node of `flows` against `variables`.
pub fn sync_nodes_with_variables<'a>(
    variables: &[Variable],
    flows: impl IntoIterator<Item = &'a FlowGraph>,
) -> Vec<NodeUpdate> {
    let mut updates = Vec::new();
    for flow in flows {
        for (location, node) in flow.nodes() {
            let binding = resolve_binding(node, variables);
            if binding != node.binding {
                debug!(
                    flow = %location.flow,
                    node = %location.node_id,
                    from = ?node.binding.name(),
                    broken = binding.is_broken(),
                    "binding resynchronized"
                );
                updates.push(NodeUpdate::new(location, node.with_binding(binding)));
            }
        }
    }
    updates
}

// ============================================================================
// Relink / Unlink
// ============================================================================

fn pair_for<'p>(pairs: &'p [RenamePair], node: &Node) -> Option<&'p RenamePair> {
    pairs.iter().find(|p| node.binding.refers_to(&p.old_name))
}

/// Rebind nodes still showing a renamed variable's old name.
///
/// A node is rebound only when the new variable satisfies the node's
/// expected type; otherwise it is left untouched.
pub fn relink_renamed<'a>(
    pairs: &[RenamePair],
    variables: &[Variable],
    flows: impl IntoIterator<Item = &'a FlowGraph>,
) -> Vec<NodeUpdate> {
    let mut updates = Vec::new();
    if pairs.is_empty() {
        return updates;
    }
    for flow in flows {
        for (location, node) in flow.nodes() {
            let Some(pair) = pair_for(pairs, node) else {
                continue;
            };
            let Some(target) = find_variable(variables, &pair.new_name) else {
                continue;
            };
            let check = node.kind.expected_type().check(&target.var_type);
            if !check.is_compatible {
                debug!(
                    node = %location.node_id,
                    target = %target.name,
                    reason = ?check.message,
                    "rename target incompatible, node left as is"
                );
                continue;
            }
            let binding = Binding::bound(target.clone());
            if binding != node.binding {
                debug!(
                    node = %location.node_id,
                    old = %pair.old_name,
                    new = %target.name,
                    "relinked"
                );
                updates.push(NodeUpdate::new(location, node.with_binding(binding)));
            }
        }
    }
    updates
}

/// Mark every node showing a renamed variable's old name as unlinked.
pub fn unlink_renamed<'a>(
    pairs: &[RenamePair],
    flows: impl IntoIterator<Item = &'a FlowGraph>,
) -> Vec<NodeUpdate> {
    let mut updates = Vec::new();
    for flow in flows {
        for (location, node) in flow.nodes() {
            let Some(pair) = pair_for(pairs, node) else {
                continue;
            };
            let name = node.binding.name().unwrap_or(&pair.old_name).to_string();
            let var_type = node
                .binding
                .var_type()
                .cloned()
                .unwrap_or_else(|| pair.var_type.clone());
            let binding = Binding::broken(name, var_type, BrokenReason::Unlinked);
            if binding != node.binding {
                debug!(node = %location.node_id, old = %pair.old_name, "unlinked");
                updates.push(NodeUpdate::new(location, node.with_binding(binding)));
            }
        }
    }
    updates
}

// ============================================================================
// Combined Pass
// ============================================================================

/// Full resync followed by relink (`propagate`) or unlink of `pairs`, folded
/// into at most one update per node.
///
/// The second pass sees the bindings the first one produced, so a renamed
/// node goes straight from its old binding to its final one.
pub fn sync_and_carry_renames<'a>(
    variables: &[Variable],
    pairs: &[RenamePair],
    propagate: bool,
    flows: impl IntoIterator<Item = &'a FlowGraph>,
) -> Vec<NodeUpdate> {
    let originals: Vec<&FlowGraph> = flows.into_iter().collect();
    let mut working: Vec<FlowGraph> = originals.iter().map(|f| (*f).clone()).collect();

    let resynced = sync_nodes_with_variables(variables, &working);
    patch_flows(&mut working, resynced);
    let carried = if propagate {
        relink_renamed(pairs, variables, &working)
    } else {
        unlink_renamed(pairs, &working)
    };
    patch_flows(&mut working, carried);

    let mut updates = Vec::new();
    for (before, after) in originals.iter().zip(&working) {
        for ((_, old), (location, new)) in before.nodes().into_iter().zip(after.nodes()) {
            if old != new {
                updates.push(NodeUpdate::new(location, new.clone()));
            }
        }
    }
    updates
}

fn patch_flows(flows: &mut [FlowGraph], updates: Vec<NodeUpdate>) {
    for update in updates {
        let slot = flows
            .iter_mut()
            .filter(|f| f.pou == update.flow)
            .find_map(|f| f.node_mut(update.rung.as_deref(), &update.node_id));
        if let Some(slot) = slot {
            *slot = update.node;
        }
    }
}

/// Whether any node in `flows` references one of `names`.
pub fn any_node_references<'a>(
    names: &[&str],
    flows: impl IntoIterator<Item = &'a FlowGraph>,
) -> bool {
    flows.into_iter().any(|flow| {
        flow.nodes().iter().any(|(_, node)| {
            node.binding
                .name()
                .is_some_and(|n| names.iter().any(|name| same_name(n, name)))
        })
    })
}
