//! Direct type edits on a single variable.
//!
//! [`validate_type_change`] is a pure dry run: it lists every node that
//! references the variable and whether it stays compatible with the new
//! type. [`apply_type_change`] performs the edit afterwards. It commits the
//! retyped table, then breaks incompatible nodes and refreshes the snapshot
//! of compatible ones. Nodes are never deleted.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commit::ProjectStore;
use crate::error::SyncError;
use crate::flow::{Binding, BrokenReason, NodeLocation};
use crate::project::{Project, Scope};
use crate::sync::{apply_updates, NodeUpdate};
use crate::types::{find_variable, same_name, Variable, VariableClass, VariableType};
use crate::validation::retype_variable;

/// One node that references the retyped variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUsage {
    pub pou_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rung_id: Option<String>,
    pub node_id: String,
    pub node_kind: String,
    /// Expected type label; empty when the node is unconstrained.
    pub expected_type: String,
    pub is_compatible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of [`validate_type_change`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeChangeReport {
    /// Always true: incompatibilities are reported, never refused.
    pub can_change: bool,
    pub affected_nodes: Vec<NodeUsage>,
    pub warnings: Vec<String>,
    pub compatible_count: usize,
    pub incompatible_count: usize,
}

/// POUs whose flows can reference a variable of `scope`.
fn pous_in_reach(project: &Project, scope: &Scope, variable_name: &str) -> Vec<String> {
    match scope {
        Scope::Pou(name) => vec![name.clone()],
        Scope::Global => project
            .pous_with_external(variable_name)
            .into_iter()
            .map(|p| p.name.clone())
            .collect(),
    }
}

/// Classify every node referencing `variable_name` against `new_type`.
pub fn validate_type_change(
    project: &Project,
    scope: &Scope,
    variable_name: &str,
    old_type: &VariableType,
    new_type: &VariableType,
) -> TypeChangeReport {
    let mut warnings = Vec::new();

    if scope.is_global() {
        for pou in project.pous_with_external(variable_name) {
            let count = pou
                .variables
                .iter()
                .filter(|v| v.class == VariableClass::External && same_name(&v.name, variable_name))
                .count();
            warnings.push(format!(
                "POU \"{}\" has {} external variable(s) referencing this global variable. Their types will be updated automatically.",
                pou.name, count
            ));
        }
    }

    let mut affected_nodes = Vec::new();
    for pou in pous_in_reach(project, scope, variable_name) {
        for flow in project.flows_for(&pou) {
            for (location, node) in flow.nodes() {
                if !node.binding.refers_to(variable_name) {
                    continue;
                }
                let expected = node.kind.expected_type();
                let check = expected.check(new_type);
                affected_nodes.push(NodeUsage {
                    pou_name: location.flow,
                    rung_id: location.rung,
                    node_id: location.node_id,
                    node_kind: node.kind.label().to_string(),
                    expected_type: expected.label(),
                    is_compatible: check.is_compatible,
                    message: check.message,
                });
            }
        }
    }

    let compatible_count = affected_nodes.iter().filter(|n| n.is_compatible).count();
    let incompatible_count = affected_nodes.len() - compatible_count;

    if incompatible_count > 0 {
        warnings.push(format!(
            "{} node(s) will become incompatible with the new type \"{}\".",
            incompatible_count,
            new_type.value()
        ));
    }
    if matches!(old_type, VariableType::BaseType { .. }) && new_type.is_derived() {
        warnings.push("Changing to a derived type will clear the location field.".to_string());
    }

    TypeChangeReport {
        can_change: true,
        affected_nodes,
        warnings,
        compatible_count,
        incompatible_count,
    }
}

/// Result of [`apply_type_change`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeChangeOutcome {
    /// The variable as committed.
    pub variable: Variable,
    pub report: TypeChangeReport,
    pub nodes_updated: usize,
    pub broken_nodes: Vec<NodeLocation>,
    /// External declarations that could not be updated.
    pub warnings: Vec<String>,
}

/// Retype `variable_name` in `scope` and bring the referencing nodes in line.
///
/// The retyped table is committed first. A rejection aborts before any node
/// or external declaration is touched.
pub fn apply_type_change<S: ProjectStore + ?Sized>(
    store: &mut S,
    scope: &Scope,
    variable_name: &str,
    new_type: VariableType,
) -> Result<TypeChangeOutcome, SyncError> {
    let project = store.project();
    let previous = match scope {
        Scope::Pou(name) => project
            .variables(scope)
            .ok_or_else(|| SyncError::pou_not_found(name))?,
        Scope::Global => project.global_variables.as_slice(),
    };
    let current = find_variable(previous, variable_name)
        .ok_or_else(|| SyncError::variable_not_found(scope, variable_name))?;
    let report = validate_type_change(project, scope, variable_name, &current.var_type, &new_type);

    let updated = retype_variable(current, new_type.clone());
    let table: Vec<Variable> = previous
        .iter()
        .map(|v| {
            if same_name(&v.name, variable_name) {
                updated.clone()
            } else {
                v.clone()
            }
        })
        .collect();
    let reach = pous_in_reach(project, scope, variable_name);

    let response = match scope {
        Scope::Pou(name) => store.set_pou_variables(name, table),
        Scope::Global => store.set_global_variables(table),
    };
    if !response.ok {
        return Err(response.into_error());
    }
    debug!(variable = variable_name, new_type = %new_type, %scope, "committed type change");

    let mut warnings = Vec::new();
    if scope.is_global() {
        for pou in &reach {
            if let Some(message) = retype_external(store, pou, variable_name, &new_type) {
                warn!(pou = %pou, "external declaration not updated");
                warnings.push(message);
            }
        }
    }

    let mut updates = Vec::new();
    let project = store.project();
    for pou in &reach {
        let Some(variables) = project.variables(&Scope::pou(pou.as_str())) else {
            continue;
        };
        let Some(resolved) = find_variable(variables, variable_name) else {
            continue;
        };
        for flow in project.flows_for(pou) {
            for (location, node) in flow.nodes() {
                if !node.binding.refers_to(variable_name) {
                    continue;
                }
                let binding = if node.kind.expected_type().check(&resolved.var_type).is_compatible {
                    Binding::bound(resolved.clone())
                } else {
                    Binding::broken(
                        resolved.name.clone(),
                        resolved.var_type.clone(),
                        BrokenReason::TypeMismatch {
                            resolved: Box::new(resolved.clone()),
                        },
                    )
                };
                if binding != node.binding {
                    updates.push(NodeUpdate {
                        flow: location.flow,
                        rung: location.rung,
                        node_id: location.node_id,
                        node: node.with_binding(binding),
                    });
                }
            }
        }
    }

    let broken_nodes: Vec<NodeLocation> = updates
        .iter()
        .filter(|u| u.node.binding.is_broken())
        .map(NodeUpdate::location)
        .collect();
    let nodes_updated = apply_updates(store, updates);

    info!(
        variable = variable_name,
        new_type = %new_type,
        nodes_updated,
        broken = broken_nodes.len(),
        "type change applied"
    );

    Ok(TypeChangeOutcome {
        variable: updated,
        report,
        nodes_updated,
        broken_nodes,
        warnings,
    })
}

/// Push the new type into a POU's external declaration. Returns a warning
/// when the POU's table rejects it.
fn retype_external<S: ProjectStore + ?Sized>(
    store: &mut S,
    pou: &str,
    variable_name: &str,
    new_type: &VariableType,
) -> Option<String> {
    let variables = store.project().pou(pou)?.variables.clone();
    let table: Vec<Variable> = variables
        .into_iter()
        .map(|mut v| {
            if v.class == VariableClass::External && same_name(&v.name, variable_name) {
                v = retype_variable(&v, new_type.clone());
                v.class = VariableClass::External;
            }
            v
        })
        .collect();
    let response = store.set_pou_variables(pou, table);
    if response.ok {
        None
    } else {
        Some(format!(
            "External variable \"{}\" in POU \"{}\" was not updated: {}",
            variable_name,
            pou,
            response.title.unwrap_or_default()
        ))
    }
}
