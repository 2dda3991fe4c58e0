//! End-to-end consistency scenarios across rename detection, binding sync,
//! type changes and the variable tree.

use std::collections::HashSet;

use plcsync_core::commit::{CommitProtocol, DeclarationParser, ParseContext, ParseError};
use plcsync_core::flow::{Binding, BrokenReason, FlowGraph, Node, NodeKind, Rung};
use plcsync_core::interaction::FixedAnswer;
use plcsync_core::project::{BodyLanguage, DataType, Pou, PouKind, Project, Scope, StructField};
use plcsync_core::rename::detect_renames;
use plcsync_core::sync::{apply_updates, sync_nodes_with_variables};
use plcsync_core::tree::{all_selectable_ids, find_by_id, TreeNodeKind, VariableTreeBuilder};
use plcsync_core::type_change::{apply_type_change, validate_type_change};
use plcsync_core::types::{BaseType, Variable, VariableClass, VariableType};

// ============================================================================
// Fixtures
// ============================================================================

/// Hands back a prepared table regardless of the text.
struct Prepared(Vec<Variable>);

impl DeclarationParser for Prepared {
    fn parse(&self, _text: &str, _context: &ParseContext<'_>) -> Result<Vec<Variable>, ParseError> {
        Ok(self.0.clone())
    }
}

fn a() -> Variable {
    Variable::local("A", BaseType::Bool)
}

fn b() -> Variable {
    Variable::local("B", BaseType::Int)
}

/// POU `Main` with `[A:BOOL, B:INT]`, contact N1 on `A` and a variable node
/// N2 on `B`.
fn main_project() -> Project {
    let mut project = Project::new("plant");
    project.pous.push(
        Pou::new("Main", PouKind::Program, BodyLanguage::Ld).with_variables(vec![a(), b()]),
    );
    project.flows.push(FlowGraph::ladder(
        "Main",
        vec![Rung::new(
            "r1",
            vec![
                Node::contact("N1", a()),
                Node::new("N2", NodeKind::Variable { pin: None }, Binding::bound(b())),
            ],
        )],
    ));
    project
}

fn binding<'a>(project: &'a Project, id: &str) -> &'a Binding {
    &project
        .flows
        .iter()
        .find_map(|f| f.find_node(id))
        .map(|(_, node)| node)
        .unwrap()
        .binding
}

fn rename_a_to_x() -> Prepared {
    Prepared(vec![Variable::local("X", BaseType::Bool), b()])
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn rename_with_propagation_rebinds_contact() {
    let mut project = main_project();
    let parser = rename_a_to_x();
    let answer = FixedAnswer(true);
    let outcome = CommitProtocol::new(&parser, &answer)
        .commit(&mut project, &Scope::pou("Main"), "")
        .unwrap();

    assert_eq!(outcome.renames.len(), 1);
    assert!(outcome.propagated);
    match binding(&project, "N1") {
        Binding::Bound { variable } => assert_eq!(variable.name, "X"),
        other => panic!("expected bound, got {other:?}"),
    }
}

#[test]
fn rename_without_propagation_keeps_old_name_broken() {
    let mut project = main_project();
    let parser = rename_a_to_x();
    let answer = FixedAnswer(false);
    CommitProtocol::new(&parser, &answer)
        .commit(&mut project, &Scope::pou("Main"), "")
        .unwrap();

    let n1 = binding(&project, "N1");
    assert!(n1.is_broken());
    assert_eq!(n1.name(), Some("A"));
}

#[test]
fn deleting_a_variable_breaks_its_nodes() {
    let mut project = main_project();
    let parser = Prepared(vec![a()]);
    let answer = FixedAnswer(true);
    let outcome = CommitProtocol::new(&parser, &answer)
        .commit(&mut project, &Scope::pou("Main"), "")
        .unwrap();

    assert!(outcome.renames.is_empty());
    assert!(!outcome.prompted);
    assert!(matches!(
        binding(&project, "N2"),
        Binding::Broken { name, reason: BrokenReason::Missing, .. } if name == "B"
    ));
    assert!(binding(&project, "N1").is_bound());
}

#[test]
fn structure_variable_tree_ids() {
    let mut project = Project::new("plant");
    project.data_types.push(DataType::structure(
        "Motor",
        vec![
            StructField::new("speed", VariableType::base(BaseType::Real)),
            StructField::new("running", VariableType::base(BaseType::Bool)),
        ],
    ));
    project.pous.push(
        Pou::new("Main", PouKind::Program, BodyLanguage::Ld).with_variables(vec![Variable::new(
            "M",
            VariableType::derived("Motor"),
            VariableClass::Local,
        )]),
    );

    let roots = VariableTreeBuilder::new(&project).build_project();
    let m = find_by_id(&roots, "Main-M").unwrap();
    assert_eq!(m.kind, TreeNodeKind::Structure);
    let ids: Vec<&str> = m.children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["Main-M.speed", "Main-M.running"]);
    assert_eq!(m.children[1].variable_path, "M.running");
}

#[test]
fn global_retype_breaks_coil_but_keeps_it() {
    let g = Variable::new("G", VariableType::base(BaseType::Bool), VariableClass::Global);
    let external = Variable::new("G", VariableType::base(BaseType::Bool), VariableClass::External);
    let mut project = Project::new("plant");
    project.global_variables.push(g);
    project.pous.push(
        Pou::new("Main", PouKind::Program, BodyLanguage::Ld).with_variables(vec![external.clone()]),
    );
    project.flows.push(FlowGraph::ladder(
        "Main",
        vec![Rung::new("r1", vec![Node::coil("C1", external)])],
    ));

    let dint = VariableType::base(BaseType::Dint);
    let report = validate_type_change(
        &project,
        &Scope::Global,
        "G",
        &VariableType::base(BaseType::Bool),
        &dint,
    );
    assert!(report.incompatible_count >= 1);

    let outcome = apply_type_change(&mut project, &Scope::Global, "G", dint.clone()).unwrap();
    assert_eq!(outcome.broken_nodes.len(), 1);
    assert_eq!(project.global_variables[0].var_type, dint);
    assert_eq!(project.pous[0].variables[0].var_type, dint);

    let c1 = binding(&project, "C1");
    assert!(matches!(
        c1,
        Binding::Broken { reason: BrokenReason::TypeMismatch { .. }, .. }
    ));
    assert_eq!(project.flows[0].nodes().len(), 1);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn resync_is_idempotent() {
    let mut project = main_project();
    project.pous[0].variables = vec![Variable::local("A", BaseType::Int)];

    let first = sync_nodes_with_variables(&project.pous[0].variables.clone(), &project.flows);
    assert_eq!(first.len(), 2);
    apply_updates(&mut project, first);

    let second = sync_nodes_with_variables(&project.pous[0].variables, &project.flows);
    assert!(second.is_empty());
}

#[test]
fn bound_nodes_always_match_their_table() {
    let mut project = main_project();
    project.pous[0].variables = vec![
        Variable::local("a", BaseType::Bool),
        Variable::local("B", BaseType::Dint),
    ];
    let updates = sync_nodes_with_variables(&project.pous[0].variables.clone(), &project.flows);
    apply_updates(&mut project, updates);

    for (_, node) in project.flows[0].nodes() {
        if let Binding::Bound { variable } = &node.binding {
            assert!(project.pous[0].variables.contains(variable));
            if node.kind.requires_bool() {
                assert!(variable.var_type.is_base(BaseType::Bool));
            }
        }
    }
    match binding(&project, "N2") {
        Binding::Bound { variable } => assert!(variable.var_type.is_base(BaseType::Dint)),
        other => panic!("expected bound, got {other:?}"),
    }
}

#[test]
fn rename_pairs_form_a_bijection() {
    let previous = vec![
        Variable::local("A", BaseType::Bool),
        Variable::local("B", BaseType::Bool),
        Variable::local("C", BaseType::Int),
    ];
    let next = vec![
        Variable::local("X", BaseType::Bool),
        Variable::local("Y", BaseType::Int),
        Variable::local("Z", BaseType::Int),
    ];
    let pairs = detect_renames(&previous, &next);

    let olds: HashSet<&str> = pairs.iter().map(|p| p.old_name.as_str()).collect();
    let news: HashSet<&str> = pairs.iter().map(|p| p.new_name.as_str()).collect();
    assert_eq!(olds.len(), pairs.len());
    assert_eq!(news.len(), pairs.len());
    for pair in &pairs {
        let old = previous.iter().find(|v| v.name == pair.old_name).unwrap();
        let new = next.iter().find(|v| v.name == pair.new_name).unwrap();
        assert_eq!(old.var_type, new.var_type);
    }
    assert_eq!(pairs.len(), 2);
}

#[test]
fn project_tree_ids_are_unique() {
    let mut project = main_project();
    project.pous.push(
        Pou::new("Aux", PouKind::Program, BodyLanguage::St).with_variables(vec![a(), b()]),
    );
    project.global_variables.push(Variable::new(
        "Shared",
        VariableType::array("INT", &["1..3"]),
        VariableClass::Global,
    ));

    let roots = VariableTreeBuilder::new(&project).build_project();
    let ids = all_selectable_ids(&roots);
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    assert!(ids.contains(&"Main-A".to_string()));
    assert!(ids.contains(&"Aux-A".to_string()));
}

#[test]
fn contacts_never_bind_non_bool() {
    let mut project = main_project();
    let parser = Prepared(vec![Variable::local("A", BaseType::Int), b()]);
    let answer = FixedAnswer(true);
    CommitProtocol::new(&parser, &answer)
        .commit(&mut project, &Scope::pou("Main"), "")
        .unwrap();

    assert!(matches!(
        binding(&project, "N1"),
        Binding::Broken { reason: BrokenReason::TypeMismatch { .. }, .. }
    ));
}
