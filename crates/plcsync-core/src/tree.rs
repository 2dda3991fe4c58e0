//! Variable tree for address-space configuration surfaces.
//!
//! Expands each program's variables (and the global list) into a forest of
//! selectable nodes. Structures and function-block instances are expanded
//! recursively; arrays stay a single selectable node.
//!
//! Node ids are `${pouName}-${dotted.path}`, roots are `pou-${name}` and
//! `global-variables`. Ids are unique within one build. Root ids are claimed
//! first; any later node whose id was already emitted (duplicate
//! declarations, or a variable id that spells a root id) is skipped and
//! reported in [`VariableForest::skipped_ids`].
//!
//! Recursion is guarded twice. Each branch carries the stack of structure and
//! function-block type names it is currently expanding, and a type that
//! reappears on its own ancestor chain yields a non-selectable node flagged
//! [`TreeFlag::Cycle`]. A depth limit backstops anything the stack misses.

use std::collections::HashSet;

use serde::Serialize;
use tracing::warn;

use crate::config::DEFAULT_TREE_MAX_DEPTH;
use crate::project::{Derivation, Pou, PouKind, Project};
use crate::types::{parse_dimension, same_name, BaseType, Variable, VariableClass, VariableType};

/// Scope name used in the ids of global variables.
pub const GLOBAL_SCOPE_NAME: &str = "GVL";
/// Fallback scope name when a program is itself called `GVL`.
const GLOBAL_SCOPE_FALLBACK: &str = "GVL.global";
pub const GLOBAL_ROOT_ID: &str = "global-variables";

// ============================================================================
// Tree Nodes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNodeKind {
    Program,
    Global,
    Variable,
    Structure,
    Array,
    FunctionBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayInfo {
    pub dimensions: Vec<String>,
    pub element_type: String,
    pub total_length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureInfo {
    pub struct_type_name: String,
    pub field_count: usize,
}

/// Why a branch was truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TreeFlag {
    /// The type contains itself, directly or transitively.
    #[serde(rename_all = "camelCase")]
    Cycle { type_name: String },
    /// Nesting exceeded the configured maximum depth.
    DepthLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableTreeNode {
    pub id: String,
    pub name: String,
    pub kind: TreeNodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
    pub pou_name: String,
    pub variable_path: String,
    pub is_selectable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_class: Option<VariableClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_info: Option<ArrayInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_info: Option<StructureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag: Option<TreeFlag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VariableTreeNode>,
}

/// A built forest and the ids dropped because another node already had them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableForest {
    pub roots: Vec<VariableTreeNode>,
    pub skipped_ids: Vec<String>,
}

/// Selection state of a node relative to its selectable descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionState {
    None,
    Some,
    All,
}

impl VariableTreeNode {
    fn leaf(id: String, name: &str, kind: TreeNodeKind, pou_name: &str, path: String) -> Self {
        VariableTreeNode {
            id,
            name: name.to_string(),
            kind,
            variable_type: None,
            pou_name: pou_name.to_string(),
            variable_path: path,
            is_selectable: true,
            variable_class: None,
            initial_value: None,
            array_info: None,
            structure_info: None,
            flag: None,
            children: Vec::new(),
        }
    }

    /// Structures, arrays and function-block instances.
    pub fn is_complex(&self) -> bool {
        matches!(
            self.kind,
            TreeNodeKind::Structure | TreeNodeKind::Array | TreeNodeKind::FunctionBlock
        )
    }

    /// This node (if selectable) and all selectable descendants.
    pub fn all_child_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        collect_selectable(self, &mut ids);
        ids
    }

    /// Selectable descendants, excluding the node itself.
    pub fn selectable_descendant_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for child in &self.children {
            collect_selectable(child, &mut ids);
        }
        ids
    }

    pub fn is_node_or_children_selected(&self, selected: &HashSet<String>) -> bool {
        selected.contains(&self.id)
            || self
                .children
                .iter()
                .any(|c| c.is_node_or_children_selected(selected))
    }

    /// Whether every selectable descendant is selected. False without descendants.
    pub fn are_all_children_selected(&self, selected: &HashSet<String>) -> bool {
        let ids = self.selectable_descendant_ids();
        !ids.is_empty() && ids.iter().all(|id| selected.contains(id))
    }

    pub fn are_any_children_selected(&self, selected: &HashSet<String>) -> bool {
        self.selectable_descendant_ids()
            .iter()
            .any(|id| selected.contains(id))
    }

    pub fn selection_state(&self, selected: &HashSet<String>) -> SelectionState {
        if selected.contains(&self.id) {
            return SelectionState::All;
        }
        let ids = self.selectable_descendant_ids();
        let count = ids.iter().filter(|id| selected.contains(*id)).count();
        match count {
            0 => SelectionState::None,
            n if n == ids.len() => SelectionState::All,
            _ => SelectionState::Some,
        }
    }
}

fn collect_selectable(node: &VariableTreeNode, ids: &mut Vec<String>) {
    if node.is_selectable {
        ids.push(node.id.clone());
    }
    for child in &node.children {
        collect_selectable(child, ids);
    }
}

/// Depth-first search by id.
pub fn find_by_id<'a>(nodes: &'a [VariableTreeNode], id: &str) -> Option<&'a VariableTreeNode> {
    nodes.iter().find_map(|node| {
        if node.id == id {
            Some(node)
        } else {
            find_by_id(&node.children, id)
        }
    })
}

/// Every selectable id in the forest, depth-first.
pub fn all_selectable_ids(nodes: &[VariableTreeNode]) -> Vec<String> {
    let mut ids = Vec::new();
    for node in nodes {
        collect_selectable(node, &mut ids);
    }
    ids
}

// ============================================================================
// Builder
// ============================================================================

/// Builds variable trees from a project. Cheap to create; build fresh per read.
#[derive(Debug, Clone, Copy)]
pub struct VariableTreeBuilder<'a> {
    project: &'a Project,
    max_depth: usize,
}

/// Per-build state: ids emitted so far, ids skipped, and the type names
/// being expanded.
struct Walk {
    ids: HashSet<String>,
    skipped: Vec<String>,
    stack: Vec<String>,
}

impl Walk {
    fn new() -> Self {
        Walk {
            ids: HashSet::new(),
            skipped: Vec::new(),
            stack: Vec::new(),
        }
    }

    fn claim(&mut self, id: &str) -> bool {
        if self.ids.insert(id.to_string()) {
            true
        } else {
            warn!(id, "duplicate tree node id skipped");
            self.skipped.push(id.to_string());
            false
        }
    }

    fn finish(self, roots: Vec<VariableTreeNode>) -> VariableForest {
        VariableForest {
            roots,
            skipped_ids: self.skipped,
        }
    }

    fn on_stack(&self, type_name: &str) -> bool {
        self.stack.iter().any(|t| same_name(t, type_name))
    }
}

/// A variable or field about to become a tree node.
struct Entry<'v> {
    name: &'v str,
    var_type: &'v VariableType,
    class: Option<VariableClass>,
    initial_value: Option<&'v str>,
}

impl<'v> From<&'v Variable> for Entry<'v> {
    fn from(v: &'v Variable) -> Self {
        Entry {
            name: &v.name,
            var_type: &v.var_type,
            class: Some(v.class),
            initial_value: v.initial_value.as_deref(),
        }
    }
}

impl<'a> VariableTreeBuilder<'a> {
    pub fn new(project: &'a Project) -> Self {
        VariableTreeBuilder {
            project,
            max_depth: DEFAULT_TREE_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Scope name used for the ids of global variables in this project.
    pub fn global_scope_name(&self) -> &'static str {
        let clash = self
            .project
            .pous
            .iter()
            .any(|p| p.kind == PouKind::Program && same_name(&p.name, GLOBAL_SCOPE_NAME));
        if clash {
            GLOBAL_SCOPE_FALLBACK
        } else {
            GLOBAL_SCOPE_NAME
        }
    }

    /// One root per program POU, then the global root when globals exist.
    pub fn build_project(&self) -> Vec<VariableTreeNode> {
        self.build_project_forest().roots
    }

    /// [`build_project`](Self::build_project), also reporting skipped ids.
    pub fn build_project_forest(&self) -> VariableForest {
        let mut walk = Walk::new();
        let mut roots = Vec::new();

        let programs: Vec<&Pou> = self
            .project
            .pous
            .iter()
            .filter(|p| p.kind == PouKind::Program)
            .filter(|p| walk.claim(&program_root_id(&p.name)))
            .collect();
        let has_globals =
            !self.project.global_variables.is_empty() && walk.claim(GLOBAL_ROOT_ID);

        for pou in programs {
            let mut root = VariableTreeNode::leaf(
                program_root_id(&pou.name),
                &pou.name,
                TreeNodeKind::Program,
                &pou.name,
                String::new(),
            );
            root.is_selectable = false;
            let entries = pou.variables.iter().map(Entry::from);
            root.children = self.build_list(&mut walk, &pou.name, "", entries, 1);
            roots.push(root);
        }

        if has_globals {
            let scope = self.global_scope_name();
            let mut root = VariableTreeNode::leaf(
                GLOBAL_ROOT_ID.to_string(),
                "GVL (Global Variables)",
                TreeNodeKind::Global,
                scope,
                String::new(),
            );
            root.is_selectable = false;
            let entries = self.project.global_variables.iter().map(|v| Entry {
                class: Some(VariableClass::Global),
                ..Entry::from(v)
            });
            root.children = self.build_list(&mut walk, scope, "", entries, 1);
            roots.push(root);
        }
        walk.finish(roots)
    }

    /// A bare forest for one variable list, with ids prefixed by `scope_name`.
    pub fn build_scope(&self, scope_name: &str, variables: &[Variable]) -> Vec<VariableTreeNode> {
        self.build_scope_forest(scope_name, variables).roots
    }

    /// [`build_scope`](Self::build_scope), also reporting skipped ids.
    pub fn build_scope_forest(&self, scope_name: &str, variables: &[Variable]) -> VariableForest {
        let mut walk = Walk::new();
        let entries = variables.iter().map(Entry::from);
        let roots = self.build_list(&mut walk, scope_name, "", entries, 1);
        walk.finish(roots)
    }

    fn build_list<'v>(
        &self,
        walk: &mut Walk,
        pou_name: &str,
        parent_path: &str,
        entries: impl Iterator<Item = Entry<'v>>,
        depth: usize,
    ) -> Vec<VariableTreeNode> {
        entries
            .filter_map(|entry| self.build_entry(walk, pou_name, parent_path, entry, depth))
            .collect()
    }

    fn build_entry(
        &self,
        walk: &mut Walk,
        pou_name: &str,
        parent_path: &str,
        entry: Entry<'_>,
        depth: usize,
    ) -> Option<VariableTreeNode> {
        let path = if parent_path.is_empty() {
            entry.name.to_string()
        } else {
            format!("{}.{}", parent_path, entry.name)
        };
        let id = format!("{}-{}", pou_name, path);
        if !walk.claim(&id) {
            return None;
        }

        let mut node =
            VariableTreeNode::leaf(id, entry.name, TreeNodeKind::Variable, pou_name, path);
        node.variable_class = entry.class;
        node.initial_value = entry.initial_value.map(str::to_string);
        node.variable_type = Some(entry.var_type.value());

        if let VariableType::Array {
            element_type,
            dimensions,
        } = entry.var_type
        {
            node.kind = TreeNodeKind::Array;
            node.array_info = Some(array_info(element_type, dimensions));
            return Some(node);
        }

        let Some(type_name) = entry.var_type.type_name() else {
            return Some(node);
        };

        if let Some(data_type) = self.project.data_type(type_name) {
            match &data_type.derivation {
                Derivation::Array {
                    element_type,
                    dimensions,
                } => {
                    node.kind = TreeNodeKind::Array;
                    node.array_info = Some(array_info(element_type, dimensions));
                }
                Derivation::Structure { fields } => {
                    node.kind = TreeNodeKind::Structure;
                    node.variable_type = Some(data_type.name.clone());
                    let entries = fields.iter().map(|f| Entry {
                        name: &f.name,
                        var_type: &f.field_type,
                        class: None,
                        initial_value: f.initial_value.as_deref(),
                    });
                    if self.expand(walk, &mut node, &data_type.name, entries, depth) {
                        node.structure_info = Some(StructureInfo {
                            struct_type_name: data_type.name.clone(),
                            field_count: node.children.len(),
                        });
                    }
                }
                Derivation::Enumerated { .. } => {}
            }
            return Some(node);
        }

        if let Some(fb) = self.project.function_block(type_name) {
            node.kind = TreeNodeKind::FunctionBlock;
            node.variable_type = Some(fb.name.clone());
            self.expand(walk, &mut node, &fb.name, fb.variables.iter().map(Entry::from), depth);
        }
        Some(node)
    }

    /// Expand a structure or function-block node, unless that would recurse
    /// into its own type or past the depth limit. Returns whether the node was
    /// expanded.
    fn expand<'v>(
        &self,
        walk: &mut Walk,
        node: &mut VariableTreeNode,
        type_name: &str,
        entries: impl Iterator<Item = Entry<'v>>,
        depth: usize,
    ) -> bool {
        if walk.on_stack(type_name) {
            warn!(id = %node.id, type_name, "recursive type, branch truncated");
            node.is_selectable = false;
            node.flag = Some(TreeFlag::Cycle {
                type_name: type_name.to_string(),
            });
            return false;
        }
        if depth >= self.max_depth {
            warn!(id = %node.id, depth, "maximum tree depth reached, branch truncated");
            node.is_selectable = false;
            node.flag = Some(TreeFlag::DepthLimit);
            return false;
        }

        walk.stack.push(type_name.to_string());
        let pou_name = node.pou_name.clone();
        let path = node.variable_path.clone();
        node.children = self.build_list(walk, &pou_name, &path, entries, depth + 1);
        walk.stack.pop();
        true
    }
}

fn program_root_id(pou_name: &str) -> String {
    format!("pou-{}", pou_name)
}

/// Element count of one `lower..upper` range, saturating at `u64::MAX`.
fn dimension_length(lower: i64, upper: i64) -> u64 {
    let span = i128::from(upper) - i128::from(lower) + 1;
    u64::try_from(span.max(0)).unwrap_or(u64::MAX)
}

fn array_info(element_type: &str, dimensions: &[String]) -> ArrayInfo {
    let total_length = dimensions
        .iter()
        .map(|d| parse_dimension(d).map_or(0, |(lower, upper)| dimension_length(lower, upper)))
        .fold(1u64, u64::saturating_mul);
    let element_type = BaseType::parse(element_type)
        .map(|b| b.as_str().to_string())
        .unwrap_or_else(|| element_type.to_string());
    ArrayInfo {
        dimensions: dimensions.to_vec(),
        element_type,
        total_length,
    }
}
