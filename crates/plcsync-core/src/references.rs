//! Where a variable is used: graphical nodes and textual bodies.

use std::collections::BTreeMap;

use regex::{NoExpand, Regex, RegexBuilder};
use serde::Serialize;

use crate::flow::{FlowLanguage, NodeKind};
use crate::project::{BodyLanguage, Pou, Project, Scope};

/// Editor a reference lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorKind {
    Ladder,
    Fbd,
    St,
    Il,
    Python,
    Cpp,
}

impl EditorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorKind::Ladder => "ladder",
            EditorKind::Fbd => "fbd",
            EditorKind::St => "st",
            EditorKind::Il => "il",
            EditorKind::Python => "python",
            EditorKind::Cpp => "cpp",
        }
    }

    fn textual(language: BodyLanguage) -> Option<Self> {
        match language {
            BodyLanguage::St => Some(EditorKind::St),
            BodyLanguage::Il => Some(EditorKind::Il),
            BodyLanguage::Python => Some(EditorKind::Python),
            BodyLanguage::Cpp => Some(EditorKind::Cpp),
            BodyLanguage::Ld | BodyLanguage::Sfc | BodyLanguage::Fbd => None,
        }
    }
}

impl From<FlowLanguage> for EditorKind {
    fn from(language: FlowLanguage) -> Self {
        match language {
            FlowLanguage::Ladder => EditorKind::Ladder,
            FlowLanguage::Fbd => EditorKind::Fbd,
        }
    }
}

/// Graphical element holding a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceElement {
    Contact,
    Coil,
    BlockInstance,
    Variable,
}

impl ReferenceElement {
    fn of(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Contact => Some(ReferenceElement::Contact),
            NodeKind::Coil => Some(ReferenceElement::Coil),
            NodeKind::Block { .. } => Some(ReferenceElement::BlockInstance),
            NodeKind::Variable { .. } => Some(ReferenceElement::Variable),
            NodeKind::Other { .. } => None,
        }
    }
}

/// One use of a variable. Graphical references carry node ids, textual ones
/// a 1-based line and 0-based byte columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceLocation {
    pub pou_name: String,
    pub editor: EditorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rung_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<ReferenceElement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_end: Option<usize>,
}

/// Summary of every reference to one variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceImpact {
    pub total_references: usize,
    pub by_pou: BTreeMap<String, usize>,
    pub by_editor: BTreeMap<String, usize>,
    pub references: Vec<ReferenceLocation>,
}

impl ReferenceImpact {
    fn from_references(references: Vec<ReferenceLocation>) -> Self {
        let mut by_pou = BTreeMap::new();
        let mut by_editor = BTreeMap::new();
        for r in &references {
            *by_pou.entry(r.pou_name.clone()).or_insert(0) += 1;
            *by_editor.entry(r.editor.as_str().to_string()).or_insert(0) += 1;
        }
        ReferenceImpact {
            total_references: references.len(),
            by_pou,
            by_editor,
            references,
        }
    }
}

/// Case-insensitive whole-word matcher for an identifier.
fn word_pattern(name: &str) -> Option<Regex> {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(name)))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Find every reference to `name` reachable from `scope`.
///
/// A POU scope searches that POU; the global scope searches every POU that
/// declares `name` as an external variable. An unknown POU yields no
/// references.
pub fn find_references(project: &Project, scope: &Scope, name: &str) -> ReferenceImpact {
    let pous: Vec<&Pou> = match scope {
        Scope::Pou(pou) => project.pou(pou).into_iter().collect(),
        Scope::Global => project.pous_with_external(name),
    };

    let mut references = Vec::new();
    for pou in pous {
        search_pou(project, pou, name, &mut references);
    }
    ReferenceImpact::from_references(references)
}

fn search_pou(project: &Project, pou: &Pou, name: &str, references: &mut Vec<ReferenceLocation>) {
    for flow in project.flows_for(&pou.name) {
        let editor = EditorKind::from(flow.language());
        for (location, node) in flow.nodes() {
            if !node.binding.refers_to(name) {
                continue;
            }
            references.push(ReferenceLocation {
                pou_name: pou.name.clone(),
                editor,
                node_id: Some(location.node_id),
                rung_id: location.rung,
                element: ReferenceElement::of(&node.kind),
                line: None,
                column_start: None,
                column_end: None,
            });
        }
    }

    let Some(editor) = EditorKind::textual(pou.body.language) else {
        return;
    };
    let Some(pattern) = word_pattern(name) else {
        return;
    };
    for (index, line) in pou.body.source.lines().enumerate() {
        for m in pattern.find_iter(line) {
            references.push(ReferenceLocation {
                pou_name: pou.name.clone(),
                editor,
                node_id: None,
                rung_id: None,
                element: None,
                line: Some(index + 1),
                column_start: Some(m.start()),
                column_end: Some(m.end()),
            });
        }
    }
}

/// Replace whole-word, case-insensitive occurrences of `old` with `new`.
///
/// Returns `None` when the source does not mention `old`.
pub fn rename_in_source(source: &str, old: &str, new: &str) -> Option<String> {
    let pattern = word_pattern(old)?;
    if !pattern.is_match(source) {
        return None;
    }
    Some(pattern.replace_all(source, NoExpand(new)).into_owned())
}
