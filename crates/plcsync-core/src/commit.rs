//! Commit protocol for textual variable edits.
//!
//! A textual edit replaces a scope's whole variable table. [`CommitProtocol`]
//! turns that into a consistent project:
//!
//! 1. read the previous table
//! 2. parse the new text (a parse failure mutates nothing)
//! 3. detect renames
//! 4. if a renamed variable is used by a graphical node, ask whether to carry
//!    the rename over
//! 5. commit the new table (a rejection aborts before any node is touched)
//! 6. when propagating, rename external declarations and textual bodies
//! 7. resync the affected flows, then relink or unlink renamed references
//!
//! Everything up to step 4 is pure. The confirmation in step 4 is the only
//! suspension point, and a dismissed prompt still completes the commit as
//! "do not propagate".

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;
use crate::error::SyncError;
use crate::flow::NodeLocation;
use crate::interaction::{rename_prompt, InteractionAdapter, InteractionError};
use crate::project::{DataType, Library, Pou, Project, Scope};
use crate::references::rename_in_source;
use crate::rename::{detect_renames_with, FirstSameType, RenameMatcher, RenamePair};
use crate::sync::{any_node_references, apply_updates, sync_and_carry_renames, NodeSink};
use crate::types::{find_variable, same_name, Variable, VariableClass};

// ============================================================================
// Collaborator Interfaces
// ============================================================================

/// Declarations a parser may resolve names against.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub pous: &'a [Pou],
    pub data_types: &'a [DataType],
    pub libraries: &'a [Library],
}

impl<'a> ParseContext<'a> {
    pub fn from_project(project: &'a Project) -> Self {
        ParseContext {
            pous: &project.pous,
            data_types: &project.data_types,
            libraries: &project.libraries,
        }
    }
}

/// Declaration text that failed to parse. The message is shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub line: Option<u32>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(line: u32, message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            line: Some(line),
        }
    }
}

/// Parses a declaration block into a variable table.
pub trait DeclarationParser {
    fn parse(&self, text: &str, context: &ParseContext<'_>) -> Result<Vec<Variable>, ParseError>;
}

/// Answer of a commit sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommitResponse {
    pub fn ok() -> Self {
        CommitResponse {
            ok: true,
            title: None,
            message: None,
        }
    }

    pub fn rejected(title: impl Into<String>, message: Option<String>) -> Self {
        CommitResponse {
            ok: false,
            title: Some(title.into()),
            message,
        }
    }

    /// Error for a rejected response.
    pub fn into_error(self) -> SyncError {
        SyncError::CommitRejected {
            title: self.title.unwrap_or_else(|| "Commit rejected".to_string()),
            message: self.message,
        }
    }
}

/// Receives whole variable tables and textual bodies.
pub trait CommitSink {
    fn set_pou_variables(&mut self, pou: &str, variables: Vec<Variable>) -> CommitResponse;
    fn set_global_variables(&mut self, variables: Vec<Variable>) -> CommitResponse;
    fn set_pou_body(&mut self, pou: &str, source: String) -> CommitResponse;
}

/// A readable project that accepts table commits and node updates.
pub trait ProjectStore: CommitSink + NodeSink {
    fn project(&self) -> &Project;
}

// ============================================================================
// Outcome
// ============================================================================

/// What a commit did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub scope: Scope,
    pub renames: Vec<RenamePair>,
    /// Whether the user was asked.
    pub prompted: bool,
    /// Whether renames were carried over to references.
    pub propagated: bool,
    pub variable_count: usize,
    pub nodes_updated: usize,
    /// Nodes of the affected flows that are broken after the commit.
    pub broken_nodes: Vec<NodeLocation>,
    /// POUs whose textual body was rewritten.
    pub bodies_rewritten: Vec<String>,
    pub warnings: Vec<String>,
}

// ============================================================================
// Protocol
// ============================================================================

/// Orchestrates parse, diff, confirmation, commit and node synchronization.
pub struct CommitProtocol<'a> {
    parser: &'a dyn DeclarationParser,
    interaction: &'a dyn InteractionAdapter,
    matcher: &'a dyn RenameMatcher,
    propagate_when_non_interactive: bool,
}

impl<'a> CommitProtocol<'a> {
    pub fn new(parser: &'a dyn DeclarationParser, interaction: &'a dyn InteractionAdapter) -> Self {
        CommitProtocol {
            parser,
            interaction,
            matcher: &FirstSameType,
            propagate_when_non_interactive: true,
        }
    }

    /// Take the matcher and non-interactive default from resolved config.
    pub fn with_config(mut self, config: &ResolvedConfig) -> Self {
        self.matcher = config.rename_matcher.value.matcher();
        self.propagate_when_non_interactive = config.propagate_when_non_interactive.value;
        self
    }

    pub fn with_matcher(mut self, matcher: &'a dyn RenameMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_non_interactive_default(mut self, propagate: bool) -> Self {
        self.propagate_when_non_interactive = propagate;
        self
    }

    /// Commit declaration `text` as the new table of `scope`.
    pub fn commit<S: ProjectStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &Scope,
        text: &str,
    ) -> Result<CommitOutcome, SyncError> {
        let previous = current_table(store.project(), scope)?;
        let next = self
            .parser
            .parse(text, &ParseContext::from_project(store.project()))?;
        let renames = detect_renames_with(self.matcher, &previous, &next);
        self.apply_table(store, scope, next, renames)
    }

    /// Rename one variable in place, with the same confirmation and
    /// relink/unlink semantics as a textual commit.
    pub fn rename_variable<S: ProjectStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &Scope,
        old_name: &str,
        new_name: &str,
    ) -> Result<CommitOutcome, SyncError> {
        let previous = current_table(store.project(), scope)?;
        let target = find_variable(&previous, old_name)
            .ok_or_else(|| SyncError::variable_not_found(scope, old_name))?;
        let pair = RenamePair {
            old_name: target.name.clone(),
            new_name: new_name.to_string(),
            var_type: target.var_type.clone(),
        };
        let next: Vec<Variable> = previous
            .iter()
            .map(|v| {
                if same_name(&v.name, old_name) {
                    Variable {
                        name: new_name.to_string(),
                        ..v.clone()
                    }
                } else {
                    v.clone()
                }
            })
            .collect();
        let renames = if pair.old_name == pair.new_name {
            Vec::new()
        } else {
            vec![pair]
        };
        self.apply_table(store, scope, next, renames)
    }

    fn apply_table<S: ProjectStore + ?Sized>(
        &self,
        store: &mut S,
        scope: &Scope,
        next: Vec<Variable>,
        renames: Vec<RenamePair>,
    ) -> Result<CommitOutcome, SyncError> {
        let affected = affected_pous(store.project(), scope, &renames);

        // Case-only renames resolve through the resync on their own.
        let real: Vec<RenamePair> = renames
            .iter()
            .filter(|p| !same_name(&p.old_name, &p.new_name))
            .cloned()
            .collect();
        let old_names: Vec<&str> = real.iter().map(|p| p.old_name.as_str()).collect();
        let referenced = !real.is_empty()
            && affected.iter().any(|pou| {
                any_node_references(&old_names, store.project().flows_for(pou))
            });

        let (prompted, propagated) = if referenced {
            self.ask_propagation(&real)
        } else {
            (false, !real.is_empty())
        };

        let variable_count = next.len();
        let response = match scope {
            Scope::Pou(name) => store.set_pou_variables(name, next),
            Scope::Global => store.set_global_variables(next),
        };
        if !response.ok {
            warn!(%scope, title = ?response.title, "commit rejected");
            return Err(response.into_error());
        }
        debug!(%scope, variable_count, renames = renames.len(), "variable table committed");

        let mut warnings = Vec::new();
        let mut bodies_rewritten = Vec::new();
        if propagated && !real.is_empty() {
            if scope.is_global() {
                for pou in &affected {
                    if let Some(w) = rename_externals(store, pou, &real) {
                        warnings.push(w);
                    }
                }
            }
            for pou in &affected {
                match rewrite_body(store, pou, &real) {
                    Ok(true) => bodies_rewritten.push(pou.clone()),
                    Ok(false) => {}
                    Err(w) => warnings.push(w),
                }
            }
        }

        let mut nodes_updated = 0;
        for pou in &affected {
            let table = store
                .project()
                .resolvable_variables(pou)
                .ok_or_else(|| SyncError::pou_not_found(pou))?;
            let updates =
                sync_and_carry_renames(&table, &real, propagated, store.project().flows_for(pou));
            nodes_updated += apply_updates(store, updates);
        }

        let project = store.project();
        let broken_nodes: Vec<NodeLocation> = affected
            .iter()
            .flat_map(|pou| project.flows_for(pou))
            .flat_map(|flow| flow.nodes())
            .filter(|(_, node)| node.binding.is_broken())
            .map(|(location, _)| location)
            .collect();

        info!(
            %scope,
            renames = renames.len(),
            prompted,
            propagated,
            nodes_updated,
            broken = broken_nodes.len(),
            "commit complete"
        );

        Ok(CommitOutcome {
            scope: scope.clone(),
            renames,
            prompted,
            propagated,
            variable_count,
            nodes_updated,
            broken_nodes,
            bodies_rewritten,
            warnings,
        })
    }

    /// Ask whether to carry `renames` over. Returns `(prompted, propagate)`;
    /// without a terminal nothing is shown and the configured default applies.
    fn ask_propagation(&self, renames: &[RenamePair]) -> (bool, bool) {
        match self.interaction.ask_confirm(&rename_prompt(renames), true) {
            Ok(answer) => (true, answer),
            Err(InteractionError::NonTty) => {
                debug!(
                    propagate = self.propagate_when_non_interactive,
                    "no interactive input, using configured default"
                );
                (false, self.propagate_when_non_interactive)
            }
            Err(err) => {
                warn!(error = %err, "rename prompt dismissed, references will not be updated");
                self.interaction
                    .print_warning("Renamed variables were not propagated to graphical editors.");
                (true, false)
            }
        }
    }
}

/// Copy of the current table of `scope`.
fn current_table(project: &Project, scope: &Scope) -> Result<Vec<Variable>, SyncError> {
    match scope {
        Scope::Pou(name) => project
            .variables(scope)
            .map(<[Variable]>::to_vec)
            .ok_or_else(|| SyncError::pou_not_found(name)),
        Scope::Global => Ok(project.global_variables.clone()),
    }
}

/// POUs whose flows a commit of `scope` can affect.
///
/// For the global scope these are the POUs declaring a renamed variable as
/// external.
fn affected_pous(project: &Project, scope: &Scope, renames: &[RenamePair]) -> Vec<String> {
    match scope {
        Scope::Pou(name) => vec![name.clone()],
        Scope::Global => project
            .pous
            .iter()
            .filter(|pou| renames.iter().any(|r| pou.has_external(&r.old_name)))
            .map(|pou| pou.name.clone())
            .collect(),
    }
}

/// Rename matching external declarations of one POU. Returns a warning when
/// the POU's table rejects the change.
fn rename_externals<S: ProjectStore + ?Sized>(
    store: &mut S,
    pou: &str,
    renames: &[RenamePair],
) -> Option<String> {
    let variables = store.project().pou(pou)?.variables.clone();
    let mut changed = false;
    let table: Vec<Variable> = variables
        .into_iter()
        .map(|mut v| {
            if v.class == VariableClass::External {
                if let Some(pair) = renames.iter().find(|r| same_name(&r.old_name, &v.name)) {
                    v.name = pair.new_name.clone();
                    changed = true;
                }
            }
            v
        })
        .collect();
    if !changed {
        return None;
    }
    let response = store.set_pou_variables(pou, table);
    if response.ok {
        debug!(pou, "external declarations renamed");
        None
    } else {
        warn!(pou, title = ?response.title, "external declarations not renamed");
        Some(format!(
            "External variables in POU \"{}\" were not renamed: {}",
            pou,
            response.title.unwrap_or_default()
        ))
    }
}

/// Apply every rename to a textual body. `Ok(true)` when rewritten.
fn rewrite_body<S: ProjectStore + ?Sized>(
    store: &mut S,
    pou: &str,
    renames: &[RenamePair],
) -> Result<bool, String> {
    let Some(target) = store.project().pou(pou) else {
        return Ok(false);
    };
    if !target.body.language.is_textual() {
        return Ok(false);
    }
    let mut source = target.body.source.clone();
    let mut changed = false;
    for pair in renames {
        if let Some(updated) = rename_in_source(&source, &pair.old_name, &pair.new_name) {
            source = updated;
            changed = true;
        }
    }
    if !changed {
        return Ok(false);
    }
    let response = store.set_pou_body(pou, source);
    if response.ok {
        Ok(true)
    } else {
        Err(format!(
            "Body of POU \"{}\" was not updated: {}",
            pou,
            response.title.unwrap_or_default()
        ))
    }
}
