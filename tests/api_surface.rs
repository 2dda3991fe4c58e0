//! Compile-only test to verify public API surface.
//!
//! If this file fails to compile, the public API has regressed.

// Allow unused imports - this test is about compile-time verification, not runtime usage
#![allow(unused_imports)]

// ============================================================================
// Core Engine
// ============================================================================

use plcsync::commit::{
    CommitOutcome, CommitProtocol, CommitResponse, CommitSink, DeclarationParser, ParseContext,
    ParseError, ProjectStore,
};
use plcsync::compat::{Compatibility, ExpectedType, GenericType};
use plcsync::flow::{
    BlockKind, BlockVariant, Binding, BrokenReason, Edge, FlowBody, FlowGraph, FlowLanguage, Node,
    NodeKind, NodeLocation, Pin, PinDirection, PinRef, Rung,
};
use plcsync::project::{
    BodyLanguage, DataType, Derivation, Library, Pou, PouBody, PouKind, Project, Scope,
    StructField,
};
use plcsync::references::{
    find_references, rename_in_source, EditorKind, ReferenceElement, ReferenceImpact,
    ReferenceLocation,
};
use plcsync::rename::{
    detect_renames, detect_renames_with, FirstSameType, MatcherKind, NoRenames, RenameMatcher,
    RenamePair, UniqueSameType,
};
use plcsync::sync::{
    any_node_references, apply_updates, relink_renamed, resolve_binding, sync_and_carry_renames,
    sync_nodes_with_variables, unlink_renamed, NodeSink, NodeUpdate,
};
use plcsync::tree::{
    all_selectable_ids, find_by_id, ArrayInfo, SelectionState, StructureInfo, TreeFlag,
    TreeNodeKind, VariableForest, VariableTreeBuilder, VariableTreeNode, GLOBAL_ROOT_ID,
    GLOBAL_SCOPE_NAME,
};
use plcsync::type_change::{
    apply_type_change, validate_type_change, NodeUsage, TypeChangeOutcome, TypeChangeReport,
};
use plcsync::types::{
    find_variable, parse_dimension, same_name, BaseType, TypeSpecError, Variable, VariableClass,
    VariableType,
};
use plcsync::validation::{
    is_valid_identifier, location_fits, retype_variable, validate_variables, TableRejection,
};

// ============================================================================
// Ambient Stack
// ============================================================================

use plcsync::config::{
    CliOverrides, ConfigSource, ConfigValue, ProjectConfig, ResolvedConfig, CONFIG_FILE_NAME,
    DEFAULT_TREE_MAX_DEPTH,
};
use plcsync::error::{OutputErrorCode, SyncError};
use plcsync::interaction::{
    rename_prompt, FixedAnswer, InteractionAdapter, InteractionError, InteractionResult,
    NonInteractiveAdapter,
};
use plcsync::output::{
    emit_response, emit_response_compact, CommitResultResponse, ErrorInfo, ErrorResponse,
    ReferencesResponse, SyncResponse, TreeResponse, TypeChangeResponse, TypeCheckResponse,
    SCHEMA_VERSION,
};

// ============================================================================
// Front Door
// ============================================================================

use plcsync::cli::{
    load_project, run_check_type, run_commit, run_refs, run_rename, run_set_type, run_sync,
    run_tree, save_project, scope_from_args,
};
use plcsync::parser::JsonDeclarationParser;
use plcsync::terminal::{PromptAdapter, StdioAdapter};

#[test]
fn api_surface_compiles() {
    // Object safety of the collaborator seams.
    fn _parser(_: &dyn DeclarationParser) {}
    fn _adapter(_: &dyn InteractionAdapter) {}
    fn _matcher(_: &dyn RenameMatcher) {}
    fn _store(_: &mut dyn ProjectStore) {}
}
