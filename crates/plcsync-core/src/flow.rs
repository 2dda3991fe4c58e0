//! Graphical flow graphs and node bindings.
//!
//! A [`FlowGraph`] holds the graphical body of one POU: Ladder Diagram as an
//! ordered list of rungs, FBD as a single rung. Every [`Node`] carries its own
//! denormalized [`Binding`]: a *copy* of the variable it was bound to, or the
//! last known name and type when the binding is broken. Nodes never point into
//! a variable table; the synchronizer is the only way bindings stay current.

use serde::{Deserialize, Serialize};

use crate::compat::ExpectedType;
use crate::types::{same_name, Variable, VariableType};

// ============================================================================
// Binding
// ============================================================================

/// Why a binding is broken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BrokenReason {
    /// No variable with the name exists in the scope.
    Missing,
    /// A variable exists but violates the node's type constraint.
    TypeMismatch { resolved: Box<Variable> },
    /// The user declined to carry a rename over to this node.
    Unlinked,
}

/// Association between a node and a declared variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Binding {
    /// The node never names a variable (function calls, power rails); every
    /// pass leaves it alone.
    Unbound,
    /// Snapshot of the variable the node is bound to.
    Bound { variable: Variable },
    /// Last known name and type of a reference that no longer resolves.
    Broken {
        name: String,
        #[serde(rename = "type")]
        var_type: VariableType,
        reason: BrokenReason,
    },
}

impl Binding {
    pub fn bound(variable: Variable) -> Self {
        Binding::Bound { variable }
    }

    pub fn broken(name: impl Into<String>, var_type: VariableType, reason: BrokenReason) -> Self {
        Binding::Broken {
            name: name.into(),
            var_type,
            reason,
        }
    }

    /// Name currently displayed by the node, if it references anything.
    pub fn name(&self) -> Option<&str> {
        match self {
            Binding::Unbound => None,
            Binding::Bound { variable } => Some(&variable.name),
            Binding::Broken { name, .. } => Some(name),
        }
    }

    /// Last known type of the referenced variable.
    pub fn var_type(&self) -> Option<&VariableType> {
        match self {
            Binding::Unbound => None,
            Binding::Bound { variable } => Some(&variable.var_type),
            Binding::Broken { var_type, .. } => Some(var_type),
        }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, Binding::Broken { .. })
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound { .. })
    }

    /// Whether the binding references `name` (case-insensitive).
    pub fn refers_to(&self, name: &str) -> bool {
        self.name().is_some_and(|n| same_name(n, name))
    }
}

// ============================================================================
// Node Kinds
// ============================================================================

/// Whether a block is a stateless function or a function-block instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Function,
    FunctionBlock,
}

/// Direction of a block pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PinDirection {
    Input,
    Output,
    InOut,
}

/// A pin declared by a block variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    pub name: String,
    pub direction: PinDirection,
    /// Declared pin type; may be generic (`ANY_NUM`).
    #[serde(rename = "type")]
    pub pin_type: String,
}

/// Definition of the block a node instantiates (`TON`, `ADD`, a user FB, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVariant {
    pub name: String,
    pub kind: BlockKind,
    #[serde(default)]
    pub pins: Vec<Pin>,
}

impl BlockVariant {
    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| same_name(&p.name, name))
    }
}

/// The pin a variable node is wired to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRef {
    /// Id of the block node owning the pin.
    pub block_id: String,
    /// Pin name on the block's variant.
    pub pin: String,
    /// Declared type of the pin, copied from the variant.
    #[serde(rename = "type")]
    pub pin_type: String,
}

/// Semantic role of a graphical node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeKind {
    Contact,
    Coil,
    /// Block call; the binding is the instance variable of function blocks.
    Block { variant: BlockVariant },
    /// Variable element, optionally wired to a block pin.
    Variable {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pin: Option<PinRef>,
    },
    /// Anything else (power rails, comments, connectors).
    Other { name: String },
}

impl NodeKind {
    /// Short name used in reports.
    pub fn label(&self) -> &str {
        match self {
            NodeKind::Contact => "contact",
            NodeKind::Coil => "coil",
            NodeKind::Block { .. } => "block",
            NodeKind::Variable { .. } => "variable",
            NodeKind::Other { name } => name,
        }
    }

    /// Contacts and coils only ever accept BOOL.
    pub fn requires_bool(&self) -> bool {
        matches!(self, NodeKind::Contact | NodeKind::Coil)
    }

    /// Type the bound variable must satisfy, derived from the node's role.
    ///
    /// - contact / coil: `BOOL`
    /// - function-block block: the variant name (the instance type)
    /// - variable wired to a pin: the pin's declared type
    /// - everything else: unconstrained
    pub fn expected_type(&self) -> ExpectedType {
        match self {
            NodeKind::Contact | NodeKind::Coil => ExpectedType::bool(),
            NodeKind::Block { variant } => match variant.kind {
                BlockKind::FunctionBlock => {
                    ExpectedType::Exact(variant.name.trim().to_ascii_uppercase())
                }
                BlockKind::Function => ExpectedType::Unconstrained,
            },
            NodeKind::Variable { pin: Some(pin) } => ExpectedType::parse(&pin.pin_type),
            NodeKind::Variable { pin: None } | NodeKind::Other { .. } => {
                ExpectedType::Unconstrained
            }
        }
    }
}

// ============================================================================
// Nodes and Graphs
// ============================================================================

/// A graphical element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default = "unbound")]
    pub binding: Binding,
}

fn unbound() -> Binding {
    Binding::Unbound
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, binding: Binding) -> Self {
        Node {
            id: id.into(),
            kind,
            binding,
        }
    }

    pub fn contact(id: impl Into<String>, variable: Variable) -> Self {
        Node::new(id, NodeKind::Contact, Binding::bound(variable))
    }

    pub fn coil(id: impl Into<String>, variable: Variable) -> Self {
        Node::new(id, NodeKind::Coil, Binding::bound(variable))
    }

    /// Copy of this node carrying a different binding.
    pub fn with_binding(&self, binding: Binding) -> Self {
        Node {
            id: self.id.clone(),
            kind: self.kind.clone(),
            binding,
        }
    }
}

/// Signal edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// One rung: nodes plus the edges connecting them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rung {
    pub id: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Rung {
    pub fn new(id: impl Into<String>, nodes: Vec<Node>) -> Self {
        Rung {
            id: id.into(),
            nodes,
            edges: Vec::new(),
        }
    }
}

/// Graphical language of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowLanguage {
    Ladder,
    Fbd,
}

impl FlowLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowLanguage::Ladder => "ladder",
            FlowLanguage::Fbd => "fbd",
        }
    }
}

/// Body shape of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "language", rename_all = "lowercase")]
pub enum FlowBody {
    Ladder { rungs: Vec<Rung> },
    Fbd { rung: Rung },
}

/// Graphical body of one POU, associated by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowGraph {
    /// Owning POU name.
    pub pou: String,
    #[serde(flatten)]
    pub body: FlowBody,
}

/// Where a node lives: owning flow plus, for Ladder, the rung.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLocation {
    pub flow: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rung: Option<String>,
    pub node_id: String,
}

impl FlowGraph {
    pub fn ladder(pou: impl Into<String>, rungs: Vec<Rung>) -> Self {
        FlowGraph {
            pou: pou.into(),
            body: FlowBody::Ladder { rungs },
        }
    }

    pub fn fbd(pou: impl Into<String>, rung: Rung) -> Self {
        FlowGraph {
            pou: pou.into(),
            body: FlowBody::Fbd { rung },
        }
    }

    pub fn language(&self) -> FlowLanguage {
        match self.body {
            FlowBody::Ladder { .. } => FlowLanguage::Ladder,
            FlowBody::Fbd { .. } => FlowLanguage::Fbd,
        }
    }

    /// Every node in order, with its location.
    ///
    /// FBD nodes carry no rung id in their location, matching the node sink
    /// signature `update_node(flow, rung?, node)`.
    pub fn nodes(&self) -> Vec<(NodeLocation, &Node)> {
        match &self.body {
            FlowBody::Ladder { rungs } => rungs
                .iter()
                .flat_map(|rung| {
                    rung.nodes.iter().map(move |node| {
                        (
                            NodeLocation {
                                flow: self.pou.clone(),
                                rung: Some(rung.id.clone()),
                                node_id: node.id.clone(),
                            },
                            node,
                        )
                    })
                })
                .collect(),
            FlowBody::Fbd { rung } => rung
                .nodes
                .iter()
                .map(|node| {
                    (
                        NodeLocation {
                            flow: self.pou.clone(),
                            rung: None,
                            node_id: node.id.clone(),
                        },
                        node,
                    )
                })
                .collect(),
        }
    }

    /// Mutable access to a node by rung and id.
    pub fn node_mut(&mut self, rung: Option<&str>, node_id: &str) -> Option<&mut Node> {
        match &mut self.body {
            FlowBody::Ladder { rungs } => {
                let rung_id = rung?;
                rungs
                    .iter_mut()
                    .find(|r| r.id == rung_id)?
                    .nodes
                    .iter_mut()
                    .find(|n| n.id == node_id)
            }
            FlowBody::Fbd { rung } => rung.nodes.iter_mut().find(|n| n.id == node_id),
        }
    }

    /// Find a node by id anywhere in the flow.
    pub fn find_node(&self, node_id: &str) -> Option<(NodeLocation, &Node)> {
        self.nodes().into_iter().find(|(_, n)| n.id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BaseType;

    fn start() -> Variable {
        Variable::local("Start", BaseType::Bool)
    }

    mod binding {
        use super::*;

        #[test]
        fn name_and_type_of_each_state() {
            assert_eq!(Binding::Unbound.name(), None);

            let bound = Binding::bound(start());
            assert_eq!(bound.name(), Some("Start"));
            assert!(bound.var_type().unwrap().is_base(BaseType::Bool));

            let broken = Binding::broken(
                "Old",
                VariableType::base(BaseType::Int),
                BrokenReason::Missing,
            );
            assert_eq!(broken.name(), Some("Old"));
            assert!(broken.is_broken());
            assert!(broken.refers_to("OLD"));
        }

        #[test]
        fn json_is_tagged_by_state() {
            let json = serde_json::to_value(Binding::broken(
                "A",
                VariableType::base(BaseType::Bool),
                BrokenReason::Unlinked,
            ))
            .unwrap();
            assert_eq!(json["state"], "broken");
            assert_eq!(json["name"], "A");
            assert_eq!(json["reason"]["kind"], "unlinked");
        }
    }

    mod node_kind {
        use super::*;

        #[test]
        fn contacts_and_coils_expect_bool() {
            assert_eq!(NodeKind::Contact.expected_type(), ExpectedType::bool());
            assert!(NodeKind::Coil.requires_bool());
            assert!(!NodeKind::Other { name: "comment".into() }.requires_bool());
        }

        #[test]
        fn function_block_expects_variant_name() {
            let kind = NodeKind::Block {
                variant: BlockVariant {
                    name: "ton".into(),
                    kind: BlockKind::FunctionBlock,
                    pins: vec![],
                },
            };
            assert_eq!(kind.expected_type(), ExpectedType::Exact("TON".into()));
        }

        #[test]
        fn pin_variable_expects_pin_type() {
            let kind = NodeKind::Variable {
                pin: Some(PinRef {
                    block_id: "b1".into(),
                    pin: "IN1".into(),
                    pin_type: "ANY_NUM".into(),
                }),
            };
            assert_eq!(kind.expected_type().label(), "ANY_NUM");
            assert_eq!(
                NodeKind::Variable { pin: None }.expected_type(),
                ExpectedType::Unconstrained
            );
        }
    }

    mod graph {
        use super::*;

        #[test]
        fn ladder_nodes_carry_rung_ids() {
            let flow = FlowGraph::ladder(
                "Main",
                vec![
                    Rung::new("r1", vec![Node::contact("n1", start())]),
                    Rung::new("r2", vec![Node::coil("n2", start())]),
                ],
            );
            let nodes = flow.nodes();
            assert_eq!(nodes.len(), 2);
            assert_eq!(nodes[1].0.rung.as_deref(), Some("r2"));
            assert_eq!(flow.language(), FlowLanguage::Ladder);
        }

        #[test]
        fn fbd_nodes_have_no_rung() {
            let rung = Rung::new("fbd", vec![Node::contact("n1", start())]);
            let mut flow = FlowGraph::fbd("Main", rung);
            assert_eq!(flow.nodes()[0].0.rung, None);
            assert!(flow.node_mut(None, "n1").is_some());
            assert!(flow.node_mut(None, "nope").is_none());
        }

        #[test]
        fn node_json_round_trips_with_flattened_kind() {
            let node = Node::coil("c1", start());
            let json = serde_json::to_value(&node).unwrap();
            assert_eq!(json["type"], "coil");
            let back: Node = serde_json::from_value(json).unwrap();
            assert_eq!(back, node);
        }
    }
}
