//! CLI front door.
//!
//! Each `run_*` function takes an already loaded [`Project`] and returns the
//! JSON response for one command. Loading, saving and argument parsing live
//! in `main.rs`; these functions never touch the file system except through
//! [`load_project`] and [`save_project`].
//!
//! ## Error Handling
//!
//! All functions return `Result<T, SyncError>`. The error's
//! [`OutputErrorCode`](plcsync_core::error::OutputErrorCode) becomes the
//! process exit code.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use plcsync_core::commit::CommitProtocol;
use plcsync_core::config::ResolvedConfig;
use plcsync_core::error::SyncError;
use plcsync_core::flow::NodeLocation;
use plcsync_core::interaction::InteractionAdapter;
use plcsync_core::output::{
    CommitResultResponse, ReferencesResponse, SyncResponse, TreeResponse, TypeChangeResponse,
    TypeCheckResponse,
};
use plcsync_core::project::{Project, Scope};
use plcsync_core::references::find_references;
use plcsync_core::sync::{apply_updates, sync_nodes_with_variables};
use plcsync_core::tree::VariableTreeBuilder;
use plcsync_core::type_change::{apply_type_change, validate_type_change};
use plcsync_core::types::{find_variable, VariableType};

use crate::parser::JsonDeclarationParser;

// ============================================================================
// Project Files
// ============================================================================

/// Read a project from its JSON file.
pub fn load_project(path: &Path) -> Result<Project, SyncError> {
    let content = fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
    let project: Project = serde_json::from_str(&content).map_err(|e| {
        SyncError::invalid_args_with_details(
            format!("project file is not valid: {}", e),
            serde_json::json!({ "path": path.display().to_string(), "line": e.line() }),
        )
    })?;
    debug!(path = %path.display(), pous = project.pous.len(), "project loaded");
    Ok(project)
}

/// Write a project back to its JSON file.
pub fn save_project(path: &Path, project: &Project) -> Result<(), SyncError> {
    let json = serde_json::to_string_pretty(project)
        .map_err(|e| SyncError::internal(format!("failed to serialize project: {}", e)))?;
    fs::write(path, json + "\n").map_err(|e| SyncError::io(path, e))?;
    debug!(path = %path.display(), "project saved");
    Ok(())
}

/// Scope from `--pou NAME` / `--global`.
pub fn scope_from_args(pou: Option<&str>, global: bool) -> Result<Scope, SyncError> {
    match (pou, global) {
        (Some(name), false) => Ok(Scope::pou(name)),
        (None, true) => Ok(Scope::Global),
        (Some(_), true) => Err(SyncError::invalid_args("--pou and --global are exclusive")),
        (None, false) => Err(SyncError::invalid_args("one of --pou or --global is required")),
    }
}

// ============================================================================
// Commands
// ============================================================================

/// `tree`: the variable tree of one POU, or of the whole project.
pub fn run_tree(
    project: &Project,
    config: &ResolvedConfig,
    pou: Option<&str>,
) -> Result<TreeResponse, SyncError> {
    let max_depth = config.tree_max_depth.value;
    let builder = VariableTreeBuilder::new(project).with_max_depth(max_depth);
    let forest = match pou {
        Some(name) => {
            let target = project.pou(name).ok_or_else(|| SyncError::pou_not_found(name))?;
            builder.build_scope_forest(&target.name, &target.variables)
        }
        None => builder.build_project_forest(),
    };
    Ok(TreeResponse::new(max_depth, forest))
}

/// `sync`: re-resolve every node against its POU's variable table.
pub fn run_sync(
    project: &mut Project,
    pou: Option<&str>,
    dry_run: bool,
) -> Result<SyncResponse, SyncError> {
    let names: Vec<String> = match pou {
        Some(name) => {
            let target = project.pou(name).ok_or_else(|| SyncError::pou_not_found(name))?;
            vec![target.name.clone()]
        }
        None => project.pous.iter().map(|p| p.name.clone()).collect(),
    };

    let mut nodes_updated = 0;
    for name in &names {
        let Some(table) = project.resolvable_variables(name) else {
            continue;
        };
        let updates = sync_nodes_with_variables(&table, project.flows_for(name));
        nodes_updated += apply_updates(project, updates);
    }

    let project: &Project = project;
    let broken_nodes: Vec<NodeLocation> = names
        .iter()
        .flat_map(|name| project.flows_for(name))
        .flat_map(|flow| flow.nodes())
        .filter(|(_, node)| node.binding.is_broken())
        .map(|(location, _)| location)
        .collect();

    info!(pous = names.len(), nodes_updated, broken = broken_nodes.len(), "sync complete");
    Ok(SyncResponse::new(nodes_updated, broken_nodes, dry_run))
}

/// `commit`: replace a scope's variable table with declaration text.
pub fn run_commit(
    project: &mut Project,
    config: &ResolvedConfig,
    interaction: &dyn InteractionAdapter,
    scope: &Scope,
    text: &str,
    dry_run: bool,
) -> Result<CommitResultResponse, SyncError> {
    let parser = JsonDeclarationParser;
    let outcome = CommitProtocol::new(&parser, interaction)
        .with_config(config)
        .commit(project, scope, text)?;
    Ok(CommitResultResponse::new(outcome, dry_run))
}

/// `rename`: rename one variable in place.
pub fn run_rename(
    project: &mut Project,
    config: &ResolvedConfig,
    interaction: &dyn InteractionAdapter,
    scope: &Scope,
    from: &str,
    to: &str,
    dry_run: bool,
) -> Result<CommitResultResponse, SyncError> {
    let parser = JsonDeclarationParser;
    let outcome = CommitProtocol::new(&parser, interaction)
        .with_config(config)
        .rename_variable(project, scope, from, to)?;
    Ok(CommitResultResponse::new(outcome, dry_run))
}

/// `check-type`: classify the nodes a type change would affect.
pub fn run_check_type(
    project: &Project,
    scope: &Scope,
    variable: &str,
    new_type: &str,
) -> Result<TypeCheckResponse, SyncError> {
    let new_type: VariableType = new_type.parse()?;
    let table = project.variables(scope).ok_or_else(|| match scope {
        Scope::Pou(name) => SyncError::pou_not_found(name),
        Scope::Global => SyncError::internal("global scope without table"),
    })?;
    let current = find_variable(table, variable)
        .ok_or_else(|| SyncError::variable_not_found(scope, variable))?;
    let report = validate_type_change(project, scope, &current.name, &current.var_type, &new_type);
    Ok(TypeCheckResponse::new(
        scope.clone(),
        current.name.clone(),
        current.var_type.to_string(),
        new_type.to_string(),
        report,
    ))
}

/// `set-type`: retype a variable and rebind or break its nodes.
pub fn run_set_type(
    project: &mut Project,
    scope: &Scope,
    variable: &str,
    new_type: &str,
    dry_run: bool,
) -> Result<TypeChangeResponse, SyncError> {
    let new_type: VariableType = new_type.parse()?;
    let outcome = apply_type_change(project, scope, variable, new_type)?;
    Ok(TypeChangeResponse::new(scope.clone(), outcome, dry_run))
}

/// `refs`: every graphical and textual use of a variable.
pub fn run_refs(
    project: &Project,
    scope: &Scope,
    variable: &str,
) -> Result<ReferencesResponse, SyncError> {
    if let Scope::Pou(name) = scope {
        if project.pou(name).is_none() {
            return Err(SyncError::pou_not_found(name));
        }
    }
    let impact = find_references(project, scope, variable);
    Ok(ReferencesResponse::new(scope.clone(), variable, impact))
}
