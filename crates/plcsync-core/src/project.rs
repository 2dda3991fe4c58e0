//! Project context: POUs, data types, libraries, globals and flows.
//!
//! [`Project`] is the explicit context object threaded through the engine.
//! The pure components (rename detection, sync, validation, tree building)
//! only read from it; mutation happens through the [`CommitSink`] and
//! [`NodeSink`] implementations at the bottom of this module.
//!
//! [`CommitSink`]: crate::commit::CommitSink
//! [`NodeSink`]: crate::sync::NodeSink

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::commit::{CommitResponse, CommitSink, ProjectStore};
use crate::flow::FlowGraph;
use crate::sync::{NodeSink, NodeUpdate};
use crate::types::{same_name, Variable, VariableClass, VariableType};
use crate::validation::validate_variables;

// ============================================================================
// POUs
// ============================================================================

/// Kind of program organization unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PouKind {
    Program,
    Function,
    FunctionBlock,
}

/// Body language of a POU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyLanguage {
    Il,
    St,
    Ld,
    Sfc,
    Fbd,
    Python,
    Cpp,
}

impl BodyLanguage {
    /// Whether the body is source text (as opposed to a flow graph).
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            BodyLanguage::Il | BodyLanguage::St | BodyLanguage::Python | BodyLanguage::Cpp
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyLanguage::Il => "il",
            BodyLanguage::St => "st",
            BodyLanguage::Ld => "ld",
            BodyLanguage::Sfc => "sfc",
            BodyLanguage::Fbd => "fbd",
            BodyLanguage::Python => "python",
            BodyLanguage::Cpp => "cpp",
        }
    }
}

/// POU body. Graphical bodies live in [`Project::flows`]; only textual
/// languages carry `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PouBody {
    pub language: BodyLanguage,
    #[serde(default)]
    pub source: String,
}

/// Program organization unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pou {
    pub name: String,
    pub kind: PouKind,
    #[serde(default)]
    pub variables: Vec<Variable>,
    pub body: PouBody,
    #[serde(default)]
    pub documentation: String,
}

impl Pou {
    pub fn new(name: impl Into<String>, kind: PouKind, language: BodyLanguage) -> Self {
        Pou {
            name: name.into(),
            kind,
            variables: Vec::new(),
            body: PouBody {
                language,
                source: String::new(),
            },
            documentation: String::new(),
        }
    }

    pub fn with_variables(mut self, variables: Vec<Variable>) -> Self {
        self.variables = variables;
        self
    }

    /// Whether the POU declares `name` as an `external` variable.
    pub fn has_external(&self, name: &str) -> bool {
        self.variables
            .iter()
            .any(|v| v.class == VariableClass::External && same_name(&v.name, name))
    }
}

// ============================================================================
// Data Types
// ============================================================================

/// Field of a structure data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,
}

impl StructField {
    pub fn new(name: impl Into<String>, field_type: VariableType) -> Self {
        StructField {
            name: name.into(),
            field_type,
            initial_value: None,
        }
    }
}

/// How a user data type is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Derivation {
    Structure {
        fields: Vec<StructField>,
    },
    #[serde(rename_all = "camelCase")]
    Array {
        element_type: String,
        dimensions: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Enumerated {
        values: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_value: Option<String>,
    },
}

/// User data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataType {
    pub name: String,
    pub derivation: Derivation,
}

impl DataType {
    pub fn structure(name: impl Into<String>, fields: Vec<StructField>) -> Self {
        DataType {
            name: name.into(),
            derivation: Derivation::Structure { fields },
        }
    }
}

/// A block library (standard or vendor) made of POU declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub pous: Vec<Pou>,
}

// ============================================================================
// Scope
// ============================================================================

/// Variable table a commit or query addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "pou", rename_all = "lowercase")]
pub enum Scope {
    /// The variable table of one POU.
    Pou(String),
    /// The resource's global variable list.
    Global,
}

impl Scope {
    pub fn pou(name: impl Into<String>) -> Self {
        Scope::Pou(name.into())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Pou(name) => write!(f, "pou '{}'", name),
            Scope::Global => f.write_str("global variables"),
        }
    }
}

// ============================================================================
// Project
// ============================================================================

/// The explicit context object: every variable table and flow graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pous: Vec<Pou>,
    #[serde(default)]
    pub data_types: Vec<DataType>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default)]
    pub global_variables: Vec<Variable>,
    #[serde(default)]
    pub flows: Vec<FlowGraph>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Project {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Find a POU by exact name.
    pub fn pou(&self, name: &str) -> Option<&Pou> {
        self.pous.iter().find(|p| p.name == name)
    }

    fn pou_mut(&mut self, name: &str) -> Option<&mut Pou> {
        self.pous.iter_mut().find(|p| p.name == name)
    }

    /// Variable table of a scope, or `None` for an unknown POU.
    pub fn variables(&self, scope: &Scope) -> Option<&[Variable]> {
        match scope {
            Scope::Pou(name) => self.pou(name).map(|p| p.variables.as_slice()),
            Scope::Global => Some(&self.global_variables),
        }
    }

    /// Table a POU's nodes resolve against: its own variables, minus external
    /// declarations with no matching global.
    pub fn resolvable_variables(&self, pou: &str) -> Option<Vec<Variable>> {
        let target = self.pou(pou)?;
        Some(
            target
                .variables
                .iter()
                .filter(|v| {
                    v.class != VariableClass::External
                        || self.global_variables.iter().any(|g| same_name(&g.name, &v.name))
                })
                .cloned()
                .collect(),
        )
    }

    /// Flows owned by a POU.
    pub fn flows_for<'a>(&'a self, pou: &'a str) -> impl Iterator<Item = &'a FlowGraph> + 'a {
        self.flows.iter().filter(move |f| f.pou == pou)
    }

    /// POUs that declare `name` as an external variable, in project order.
    pub fn pous_with_external(&self, name: &str) -> Vec<&Pou> {
        self.pous.iter().filter(|p| p.has_external(name)).collect()
    }

    /// Structure or other user data type, by case-insensitive name.
    pub fn data_type(&self, name: &str) -> Option<&DataType> {
        self.data_types.iter().find(|d| same_name(&d.name, name))
    }

    /// Function-block declaration from the project or any library.
    pub fn function_block(&self, name: &str) -> Option<&Pou> {
        self.pous
            .iter()
            .chain(self.libraries.iter().flat_map(|l| l.pous.iter()))
            .find(|p| p.kind == PouKind::FunctionBlock && same_name(&p.name, name))
    }
}

// ============================================================================
// Sinks
// ============================================================================

impl CommitSink for Project {
    fn set_pou_variables(&mut self, pou: &str, variables: Vec<Variable>) -> CommitResponse {
        if let Err(rejection) = validate_variables(&variables) {
            warn!(pou, title = %rejection.title, "rejected variable table");
            return rejection.into();
        }
        match self.pou_mut(pou) {
            Some(target) => {
                debug!(pou, count = variables.len(), "replaced variable table");
                target.variables = variables;
                CommitResponse::ok()
            }
            None => CommitResponse::rejected(
                "POU not found",
                Some(format!("No POU named \"{}\" exists in the project.", pou)),
            ),
        }
    }

    fn set_global_variables(&mut self, variables: Vec<Variable>) -> CommitResponse {
        if let Err(rejection) = validate_variables(&variables) {
            warn!(title = %rejection.title, "rejected global variable table");
            return rejection.into();
        }
        debug!(count = variables.len(), "replaced global variable table");
        self.global_variables = variables;
        CommitResponse::ok()
    }

    fn set_pou_body(&mut self, pou: &str, source: String) -> CommitResponse {
        match self.pou_mut(pou) {
            Some(target) if target.body.language.is_textual() => {
                target.body.source = source;
                CommitResponse::ok()
            }
            Some(_) => CommitResponse::rejected(
                "Body is not textual",
                Some(format!("POU \"{}\" has a graphical body.", pou)),
            ),
            None => CommitResponse::rejected(
                "POU not found",
                Some(format!("No POU named \"{}\" exists in the project.", pou)),
            ),
        }
    }
}

impl NodeSink for Project {
    fn update_node(&mut self, update: NodeUpdate) {
        let NodeUpdate {
            flow,
            rung,
            node_id,
            node,
        } = update;
        let target = self
            .flows
            .iter_mut()
            .filter(|f| f.pou == flow)
            .find_map(|f| f.node_mut(rung.as_deref(), &node_id));
        match target {
            Some(slot) => *slot = node,
            None => warn!(flow = %flow, node_id = %node_id, "node update for unknown node dropped"),
        }
    }
}

impl ProjectStore for Project {
    fn project(&self) -> &Project {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Binding, Node, Rung};
    use crate::types::BaseType;

    fn sample() -> Project {
        let mut project = Project::new("demo");
        project.pous.push(
            Pou::new("Main", PouKind::Program, BodyLanguage::Ld).with_variables(vec![
                Variable::local("Start", BaseType::Bool),
                Variable::new(
                    "G",
                    VariableType::base(BaseType::Bool),
                    VariableClass::External,
                ),
            ]),
        );
        project.pous.push(Pou::new("Blinker", PouKind::FunctionBlock, BodyLanguage::St));
        project.flows.push(FlowGraph::ladder(
            "Main",
            vec![Rung::new(
                "r1",
                vec![Node::contact("n1", Variable::local("Start", BaseType::Bool))],
            )],
        ));
        project
    }

    #[test]
    fn scope_lookup() {
        let project = sample();
        assert_eq!(project.variables(&Scope::pou("Main")).unwrap().len(), 2);
        assert!(project.variables(&Scope::pou("Nope")).is_none());
        assert!(project.variables(&Scope::Global).unwrap().is_empty());
    }

    #[test]
    fn dangling_externals_do_not_resolve() {
        let mut project = sample();
        let names = |p: &Project| -> Vec<String> {
            p.resolvable_variables("Main")
                .unwrap()
                .into_iter()
                .map(|v| v.name)
                .collect()
        };
        assert_eq!(names(&project), vec!["Start"]);

        project.global_variables.push(Variable::new(
            "g",
            VariableType::base(BaseType::Bool),
            VariableClass::Global,
        ));
        assert_eq!(names(&project), vec!["Start", "G"]);
        assert!(project.resolvable_variables("Nope").is_none());
    }

    #[test]
    fn external_and_function_block_lookup() {
        let project = sample();
        assert_eq!(project.pous_with_external("g").len(), 1);
        assert!(project.function_block("BLINKER").is_some());
        assert!(project.function_block("Main").is_none());
    }

    #[test]
    fn commit_sink_rejects_duplicates_without_mutating() {
        let mut project = sample();
        let before = project.clone();
        let response = project.set_pou_variables(
            "Main",
            vec![
                Variable::local("A", BaseType::Bool),
                Variable::local("a", BaseType::Int),
            ],
        );
        assert!(!response.ok);
        assert_eq!(response.title.as_deref(), Some("Variable already exists"));
        assert_eq!(project, before);
    }

    #[test]
    fn node_sink_replaces_node() {
        let mut project = sample();
        let node = project.flows[0].nodes()[0].1.with_binding(Binding::Unbound);
        project.update_node(NodeUpdate {
            flow: "Main".into(),
            rung: Some("r1".into()),
            node_id: "n1".into(),
            node,
        });
        assert_eq!(project.flows[0].nodes()[0].1.binding, Binding::Unbound);
    }

    #[test]
    fn body_updates_only_for_textual_pous() {
        let mut project = sample();
        assert!(project.set_pou_body("Blinker", "Q := TRUE;".into()).ok);
        assert!(!project.set_pou_body("Main", "x".into()).ok);
        assert!(!project.set_pou_body("Missing", "x".into()).ok);
    }

    #[test]
    fn scope_json_shape() {
        let json = serde_json::to_value(Scope::pou("Main")).unwrap();
        assert_eq!(json, serde_json::json!({"scope": "pou", "pou": "Main"}));
        let global: Scope = serde_json::from_value(serde_json::json!({"scope": "global"})).unwrap();
        assert_eq!(global, Scope::Global);
    }
}
