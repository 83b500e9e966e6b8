//! Semantic action tests.
//!
//! Each test drives the actions the way the grammar driver would, one
//! production at a time, and inspects the typed nodes and the symbol table.

use equelle_sema::{CollectionQualifier, ScopeId, SemanticActions, SymbolTable};
use equelle_types::ast::{BinaryOp, CompareOp, Node, RelationOp};
use equelle_types::{BasicKind, Domain, EntitySetId, ErrorCode, ValueType};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn num(a: &mut SemanticActions, text: &str) -> Node {
    a.number(text).expect("number")
}

fn call(a: &mut SemanticActions, name: &str, args: Vec<Node>) -> Node {
    a.function_call(name, args)
        .unwrap_or_else(|e| panic!("call {name}: {e}"))
}

fn var(a: &mut SemanticActions, name: &str) -> Node {
    a.identifier(name)
        .unwrap_or_else(|e| panic!("identifier {name}: {e}"))
}

/// `Collection Of <kind> On <set>()` or `Subset Of <set>()`.
fn collection_type(
    a: &mut SemanticActions,
    kind: BasicKind,
    qualifier: CollectionQualifier,
    set: &str,
) -> Node {
    let base = a.basic_type(kind);
    let domain = call(a, set, vec![]);
    a.collection_type(base, Some((qualifier, domain)))
        .expect("collection type")
}

/// `name : Collection Of Scalar On <set>()` followed by an assignment from
/// a user-specified collection.
fn scalar_field(a: &mut SemanticActions, name: &str, set: &str) {
    let ty = collection_type(a, BasicKind::Scalar, CollectionQualifier::On, set);
    let entities = call(a, set, vec![]);
    let value = call(a, "UserSpecifiedCollectionOfScalar", vec![entities]);
    a.declaration_with_assignment(name, ty, value)
        .unwrap_or_else(|e| panic!("field {name}: {e}"));
}

fn assert_code<T: std::fmt::Debug>(result: Result<T, equelle_sema::SemanticError>, code: ErrorCode) {
    match result {
        Ok(value) => panic!("expected {code}, got {value:?}"),
        Err(err) => assert_eq!(err.code, code, "unexpected error: {err}"),
    }
}

fn scalar() -> ValueType {
    ValueType::single(BasicKind::Scalar)
}

// ══════════════════════════════════════════════════════════════════════════════
// Declarations and assignment
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_redeclaration_in_same_scope_fails() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let ty = a.basic_type(BasicKind::Scalar);
    a.declaration("x", ty).expect("first declaration");
    let ty = a.basic_type(BasicKind::Scalar);
    assert_code(a.declaration("x", ty), ErrorCode::VARIABLE_ALREADY_DECLARED);
}

#[test]
fn test_same_name_in_two_scopes_is_allowed() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let ty = a.basic_type(BasicKind::Scalar);
    a.declaration("x", ty).expect("declaration in Main");

    let name = a.string("timesteps");
    let steps = call(&mut a, "InputSequenceOfScalar", vec![name]);
    a.assignment("steps", steps).expect("steps");
    let header = a.loop_start("dt", "steps").expect("loop");

    let ty = a.basic_type(BasicKind::Scalar);
    a.declaration("x", ty).expect("declaration in the loop scope");
    let body = a.program(vec![]);
    a.loop_end(header, body).expect("loop end");
}

#[test]
fn test_single_assignment_rejects_second_assignment() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let one = num(&mut a, "1");
    let node = a.assignment("x", one).expect("first assignment");
    assert!(matches!(
        node,
        Node::VarAssign {
            form: equelle_types::ast::AssignForm::Define,
            ..
        }
    ));
    let two = num(&mut a, "2");
    assert_code(a.assignment("x", two), ErrorCode::VARIABLE_ALREADY_ASSIGNED);
}

#[test]
fn test_mutable_variable_may_be_reassigned() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let base = a.basic_type(BasicKind::Scalar);
    let ty = a.mutable_type(base).expect("mutable type");
    a.declaration("m", ty).expect("declaration");
    for text in ["1", "2", "3"] {
        let value = num(&mut a, text);
        a.assignment("m", value).expect("reassignment");
    }
    let ty = a.symbols().variable_type("m").expect("m");
    assert!(ty.mutable);
    assert_eq!(ty.basic, BasicKind::Scalar);
}

#[test]
fn test_assignment_type_must_match_declaration() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let ty = a.basic_type(BasicKind::Scalar);
    a.declaration("x", ty).expect("declaration");
    let s = a.string("text");
    assert_code(a.assignment("x", s), ErrorCode::TYPE_MISMATCH);
}

#[test]
fn test_assignment_names_anonymous_set() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let faces = call(&mut a, "BoundaryFaces", vec![]);
    let cells = call(&mut a, "FirstCell", vec![faces]);
    let Node::FuncCall { new_domain, .. } = &cells else {
        panic!("expected a call");
    };
    assert_eq!(*new_domain, None);

    let name = a.string("dirichlet");
    let all = call(&mut a, "AllCells", vec![]);
    let subset = call(&mut a, "InputDomainSubsetOf", vec![name, all]);
    a.assignment("dirichlet_cells", subset).expect("assignment");

    let ty = a.symbols().variable_type("dirichlet_cells").expect("var");
    let id = ty.domain.bound().expect("bound domain");
    assert_eq!(id, EntitySetId::FIRST_RUNTIME);
    assert_eq!(a.symbols().entity_set_name(id), Some("dirichlet_cells"));
    assert!(a.symbols().is_subset(id, EntitySetId::ALL_CELLS));
}

#[test]
fn test_canonical_sets_keep_their_names() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let all = call(&mut a, "AllCells", vec![]);
    a.assignment("cells", all).expect("assignment");
    assert_eq!(
        a.symbols().entity_set_name(EntitySetId::ALL_CELLS),
        Some("AllCells()")
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Pending domains
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_subset_of_concretizes_on_assignment() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let ty = collection_type(
        &mut a,
        BasicKind::Cell,
        CollectionQualifier::SubsetOf,
        "AllCells",
    );
    a.declaration("b", ty).expect("declaration");
    assert_eq!(
        a.symbols().variable_type("b").expect("b").domain,
        Domain::PendingSubsetOf(EntitySetId::ALL_CELLS)
    );

    let name = a.string("b");
    let all = call(&mut a, "AllCells", vec![]);
    let value = call(&mut a, "InputDomainSubsetOf", vec![name, all]);
    a.assignment("b", value).expect("assignment");

    let ty = a.symbols().variable_type("b").expect("b");
    assert_eq!(ty.domain, Domain::Bound(EntitySetId::FIRST_RUNTIME));
}

#[test]
fn test_subset_of_rejects_unrelated_set() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let ty = collection_type(
        &mut a,
        BasicKind::Cell,
        CollectionQualifier::SubsetOf,
        "BoundaryCells",
    );
    a.declaration("c", ty).expect("declaration");
    let interior = call(&mut a, "InteriorCells", vec![]);
    assert_code(a.assignment("c", interior), ErrorCode::NOT_A_SUBSET);
}

/// `v : Collection Of Scalar Subset Of AllCells()`, then
/// `v = InputCollectionOfScalar("v", <set>())`.
fn assign_scalar_subset_of_all_cells(
    a: &mut SemanticActions,
    set: &str,
) -> Result<Node, equelle_sema::SemanticError> {
    let ty = collection_type(
        a,
        BasicKind::Scalar,
        CollectionQualifier::SubsetOf,
        "AllCells",
    );
    a.declaration("v", ty).expect("declaration");
    let name = a.string("v");
    let entities = call(a, set, vec![]);
    let value = call(a, "InputCollectionOfScalar", vec![name, entities]);
    a.assignment("v", value)
}

#[test]
fn test_scalar_subset_of_concretizes_from_call() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    assign_scalar_subset_of_all_cells(&mut a, "InteriorCells").expect("assignment");
    let ty = a.symbols().variable_type("v").expect("v");
    assert_eq!(ty.basic, BasicKind::Scalar);
    assert!(ty.is_collection());
    assert_eq!(ty.domain, Domain::Bound(EntitySetId::INTERIOR_CELLS));
}

#[test]
fn test_scalar_subset_of_rejects_domain_outside_bound() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    assert_code(
        assign_scalar_subset_of_all_cells(&mut a, "AllFaces"),
        ErrorCode::NOT_A_SUBSET,
    );
}

#[test]
fn test_subset_of_rejects_other_entity_kind() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let ty = collection_type(
        &mut a,
        BasicKind::Cell,
        CollectionQualifier::SubsetOf,
        "AllCells",
    );
    a.declaration("c", ty).expect("declaration");
    let faces = call(&mut a, "BoundaryFaces", vec![]);
    assert_code(a.assignment("c", faces), ErrorCode::TYPE_MISMATCH);
}

#[test]
fn test_collection_type_needs_a_domain() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let base = a.basic_type(BasicKind::Scalar);
    let not_a_domain = num(&mut a, "3");
    assert_code(
        a.collection_type(base, Some((CollectionQualifier::On, not_a_domain))),
        ErrorCode::NOT_A_DOMAIN,
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// On / Extend
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_on_restricts_to_subset() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");
    let u = var(&mut a, "u");
    let boundary = call(&mut a, "BoundaryCells", vec![]);
    let node = a.relation(RelationOp::On, u, boundary).expect("On");
    assert_eq!(
        node.ty(),
        ValueType::collection(BasicKind::Scalar, Domain::Bound(EntitySetId::BOUNDARY_CELLS))
    );
}

#[test]
fn test_on_rejects_set_outside_domain() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");
    let u = var(&mut a, "u");
    let faces = call(&mut a, "BoundaryFaces", vec![]);
    assert_code(a.relation(RelationOp::On, u, faces), ErrorCode::NOT_A_SUBSET);
}

#[test]
fn test_on_with_cells_drawn_from_faces() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");
    let faces = call(&mut a, "InteriorFaces", vec![]);
    let first = call(&mut a, "FirstCell", vec![faces]);
    let u = var(&mut a, "u");
    let node = a.relation(RelationOp::On, u, first).expect("On");
    assert_eq!(
        node.ty().domain,
        Domain::Bound(EntitySetId::INTERIOR_FACES)
    );
}

#[test]
fn test_on_rejects_non_entity_right_side() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");
    let u = var(&mut a, "u");
    let v = var(&mut a, "u");
    assert_code(
        a.relation(RelationOp::On, u, v),
        ErrorCode::NOT_ENTITY_COLLECTION,
    );
}

#[test]
fn test_extend_scalar_to_domain() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let zero = num(&mut a, "0");
    let all = call(&mut a, "AllFaces", vec![]);
    let node = a.relation(RelationOp::Extend, zero, all).expect("Extend");
    assert_eq!(
        node.ty(),
        ValueType::collection(BasicKind::Scalar, Domain::Bound(EntitySetId::ALL_FACES))
    );
}

#[test]
fn test_extend_collection_to_superset() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "flux", "BoundaryFaces");
    let flux = var(&mut a, "flux");
    let all = call(&mut a, "AllFaces", vec![]);
    a.relation(RelationOp::Extend, flux, all)
        .expect("BoundaryFaces extends to AllFaces");

    let flux = var(&mut a, "flux");
    let interior = call(&mut a, "InteriorFaces", vec![]);
    assert_code(
        a.relation(RelationOp::Extend, flux, interior),
        ErrorCode::NOT_A_SUBSET,
    );
}

#[test]
fn test_extend_needs_domain_on_right() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");
    let zero = num(&mut a, "0");
    let u = var(&mut a, "u");
    assert_code(
        a.relation(RelationOp::Extend, zero, u),
        ErrorCode::NOT_A_DOMAIN,
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Arithmetic
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_add_on_equal_domains() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");
    scalar_field(&mut a, "v", "AllCells");
    let u = var(&mut a, "u");
    let v = var(&mut a, "v");
    let sum = a.binary(BinaryOp::Add, u, v).expect("u + v");
    assert_eq!(
        sum.ty(),
        ValueType::collection(BasicKind::Scalar, Domain::Bound(EntitySetId::ALL_CELLS))
    );
}

#[test]
fn test_add_on_unequal_domains_fails() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");
    scalar_field(&mut a, "f", "AllFaces");
    let u = var(&mut a, "u");
    let f = var(&mut a, "f");
    assert_code(a.binary(BinaryOp::Add, u, f), ErrorCode::DOMAIN_MISMATCH);
}

#[test]
fn test_scalar_times_collection_broadcasts() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");
    let k = num(&mut a, "0.3");
    let u = var(&mut a, "u");
    let product = a.binary(BinaryOp::Multiply, k, u).expect("k * u");
    assert_eq!(product.ty().domain, Domain::Bound(EntitySetId::ALL_CELLS));
    assert!(product.ty().is_collection());
}

#[test]
fn test_vector_products_are_restricted() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let cells = call(&mut a, "AllCells", vec![]);
    let c1 = call(&mut a, "Centroid", vec![cells]);
    let cells = call(&mut a, "AllCells", vec![]);
    let c2 = call(&mut a, "Centroid", vec![cells]);
    assert_code(
        a.binary(BinaryOp::Multiply, c1.clone(), c2.clone()),
        ErrorCode::INVALID_OPERAND,
    );
    assert_code(a.binary(BinaryOp::Divide, c1, c2), ErrorCode::INVALID_OPERAND);
}

#[test]
fn test_array_operands_are_rejected() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let elements = vec![num(&mut a, "1"), num(&mut a, "2")];
    let array = a.array_literal(elements).expect("array");
    let one = num(&mut a, "1");
    assert_code(a.binary(BinaryOp::Add, array, one), ErrorCode::ARRAY_OPERAND);
}

#[test]
fn test_string_operands_are_rejected() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let s = a.string("a");
    let one = num(&mut a, "1");
    assert_code(a.binary(BinaryOp::Add, s, one), ErrorCode::NOT_NUMERIC);
    let s = a.string("a");
    assert_code(a.negate(s), ErrorCode::NOT_NUMERIC);
}

#[test]
fn test_comparison_norm_and_trinary() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");

    let u = var(&mut a, "u");
    let zero = num(&mut a, "0");
    let positive = a
        .comparison(CompareOp::Greater, u, zero)
        .expect("u > 0");
    assert_eq!(positive.ty().basic, BasicKind::Bool);
    assert_eq!(positive.ty().domain, Domain::Bound(EntitySetId::ALL_CELLS));

    let u = var(&mut a, "u");
    let magnitude = a.norm(u).expect("|u|");
    let u = var(&mut a, "u");
    let chosen = a
        .trinary(positive.clone(), u, magnitude)
        .expect("u > 0 ? u : |u|");
    assert_eq!(chosen.ty().domain, Domain::Bound(EntitySetId::ALL_CELLS));

    let one = num(&mut a, "1");
    let two = num(&mut a, "2");
    assert_code(a.trinary(positive, one, two), ErrorCode::DOMAIN_MISMATCH);
}

#[test]
fn test_trinary_needs_boolean_predicate() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let p = num(&mut a, "1");
    let x = num(&mut a, "2");
    let y = num(&mut a, "3");
    assert_code(a.trinary(p, x, y), ErrorCode::NOT_BOOLEAN);
}

#[test]
fn test_norm_of_entities_is_scalar() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let faces = call(&mut a, "AllFaces", vec![]);
    let areas = a.norm(faces).expect("|AllFaces()|");
    assert_eq!(
        areas.ty(),
        ValueType::collection(BasicKind::Scalar, Domain::Bound(EntitySetId::ALL_FACES))
    );
    let s = a.string("x");
    assert_code(a.norm(s), ErrorCode::INVALID_OPERAND);
}

#[test]
fn test_ty_is_pure() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    scalar_field(&mut a, "u", "AllCells");
    let u = var(&mut a, "u");
    let v = var(&mut a, "u");
    let sum = a.binary(BinaryOp::Subtract, u, v).expect("u - u");
    assert!(a.symbols().entity_set(EntitySetId::FIRST_RUNTIME).is_none());
    let first = sum.ty();
    let second = sum.ty();
    assert_eq!(first, second);
    assert!(a.symbols().entity_set(EntitySetId::FIRST_RUNTIME).is_none());
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

/// Declare `name : Function(a : Scalar) -> Scalar` from Main.
fn declare_unary(a: &mut SemanticActions, name: &str) {
    let pending = a.begin_function_type();
    let param_ty = a.basic_type(BasicKind::Scalar);
    let param = a.declaration("a", param_ty).expect("parameter");
    let ret = a.basic_type(BasicKind::Scalar);
    let ftype = a.function_type(vec![param], ret).expect("function type");
    a.function_declaration(name, pending, ftype)
        .expect("function declaration");
}

#[test]
fn test_function_declare_define_call() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    declare_unary(&mut a, "twice");
    assert_eq!(a.symbols().current_scope(), ScopeId::MAIN);
    assert!(!a.symbols().is_variable_declared("a"));

    let start = a.function_start("twice", &["a".to_string()]).expect("start");
    assert_eq!(a.symbols().current_function().name(), "twice");
    let x = var(&mut a, "a");
    let y = var(&mut a, "a");
    let sum = a.binary(BinaryOp::Add, x, y).expect("a + a");
    let ret = a.return_statement(sum).expect("return");
    let body = a.program(vec![ret]);
    a.function_definition(start, body).expect("definition");
    assert_eq!(a.symbols().current_scope(), ScopeId::MAIN);

    let two = num(&mut a, "2");
    let result = call(&mut a, "twice", vec![two]);
    assert_eq!(result.ty(), scalar());
    assert!(a.symbols().is_user_function("twice"));
    assert!(!a.symbols().is_user_function("Gradient"));
}

#[test]
fn test_function_body_reads_main_variables() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let k = num(&mut a, "0.3");
    a.assignment("k", k).expect("k");
    declare_unary(&mut a, "scale");
    let start = a.function_start("scale", &["a".to_string()]).expect("start");
    let k = var(&mut a, "k");
    let x = var(&mut a, "a");
    let product = a.binary(BinaryOp::Multiply, k, x).expect("k * a");
    a.return_statement(product).expect("return");
    let body = a.program(vec![]);
    a.function_definition(start, body).expect("definition");
}

#[test]
fn test_function_definition_errors() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    assert_code(
        a.function_start("missing", &[]),
        ErrorCode::UNKNOWN_FUNCTION,
    );

    declare_unary(&mut a, "f");
    assert_code(
        a.function_start("f", &["b".to_string()]),
        ErrorCode::PARAMETER_MISMATCH,
    );

    let start = a.function_start("f", &["a".to_string()]).expect("start");
    let body = a.program(vec![]);
    a.function_definition(start, body).expect("definition");
    assert_code(
        a.function_start("f", &["a".to_string()]),
        ErrorCode::FUNCTION_ALREADY_DEFINED,
    );
}

#[test]
fn test_nested_function_declaration_fails() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    declare_unary(&mut a, "outer");
    let _start = a.function_start("outer", &["a".to_string()]).expect("start");

    let pending = a.begin_function_type();
    let ret = a.basic_type(BasicKind::Scalar);
    let ftype = a.function_type(vec![], ret).expect("function type");
    assert_code(
        a.function_declaration("inner", pending, ftype),
        ErrorCode::NESTED_FUNCTION,
    );
    assert_eq!(a.symbols().current_function().name(), "outer");
}

#[test]
fn test_array_return_type_is_rejected() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let pending = a.begin_function_type();
    let base = a.basic_type(BasicKind::Scalar);
    let ret = a.array_type("2", base).expect("array type");
    assert_code(
        a.function_type(vec![], ret),
        ErrorCode::INVALID_TYPE_EXPRESSION,
    );
    a.abandon_function_type(pending).expect("abandon");
    assert_eq!(a.symbols().current_scope(), ScopeId::MAIN);
}

#[test]
fn test_return_checks() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let one = num(&mut a, "1");
    assert_code(a.return_statement(one), ErrorCode::RETURN_OUTSIDE_FUNCTION);

    declare_unary(&mut a, "f");
    let _start = a.function_start("f", &["a".to_string()]).expect("start");
    let s = a.string("wrong");
    assert_code(a.return_statement(s), ErrorCode::RETURN_TYPE_MISMATCH);
}

#[test]
fn test_call_checks() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    assert_code(a.function_call("Nope", vec![]), ErrorCode::UNKNOWN_FUNCTION);
    let one = num(&mut a, "1");
    assert_code(
        a.function_call("AllCells", vec![one]),
        ErrorCode::WRONG_ARG_COUNT,
    );
    assert_code(a.identifier("nobody"), ErrorCode::UNKNOWN_VARIABLE);
}

#[test]
fn test_function_name_is_a_reference() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    declare_unary(&mut a, "residual");
    assert_eq!(
        a.identifier("residual").expect("reference"),
        Node::FuncRef {
            name: "residual".into()
        }
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Loops
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_loop_over_sequence() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let name = a.string("timesteps");
    let steps = call(&mut a, "InputSequenceOfScalar", vec![name]);
    a.assignment("timesteps", steps).expect("timesteps");

    let header = a.loop_start("dt", "timesteps").expect("loop");
    assert_eq!(header.scope, "ForLoopWithIndex0");
    assert_eq!(a.symbols().current_function().name(), "ForLoopWithIndex0");
    assert_eq!(a.symbols().variable_type("dt").expect("dt"), scalar());
    assert!(a.symbols().is_variable_assigned("dt").expect("dt"));

    let body = a.program(vec![]);
    let node = a.loop_end(header, body).expect("loop end");
    assert!(matches!(node, Node::Loop { .. }));
    assert_eq!(a.symbols().current_scope(), ScopeId::MAIN);
    assert!(!a.symbols().is_variable_declared("dt"));
}

#[test]
fn test_loop_over_non_sequence_fails() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let one = num(&mut a, "1");
    a.assignment("x", one).expect("x");
    assert_code(a.loop_start("v", "x"), ErrorCode::NOT_A_SEQUENCE);
    assert_code(a.loop_start("v", "missing"), ErrorCode::UNKNOWN_VARIABLE);
    assert_eq!(a.symbols().current_scope(), ScopeId::MAIN);
}

// ══════════════════════════════════════════════════════════════════════════════
// Arrays and stencils
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_array_literal_and_access() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let elements = vec![num(&mut a, "1"), num(&mut a, "2"), num(&mut a, "3")];
    let array = a.array_literal(elements).expect("array");
    assert_eq!(array.ty(), scalar().with_array_size(3));

    let item = a.random_access(array.clone(), 2).expect("a[2]");
    assert_eq!(item.ty(), scalar());
    assert_code(a.random_access(array, 3), ErrorCode::INDEX_OUT_OF_RANGE);
}

#[test]
fn test_array_literal_errors() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    assert_code(a.array_literal(vec![]), ErrorCode::EMPTY_ARRAY);
    let one = num(&mut a, "1");
    let s = a.string("x");
    assert_code(a.array_literal(vec![one, s]), ErrorCode::TYPE_MISMATCH);
}

#[test]
fn test_vector_component_access() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let cells = call(&mut a, "AllCells", vec![]);
    let centroids = call(&mut a, "Centroid", vec![cells]);
    let x = a.random_access(centroids.clone(), 0).expect("c[0]");
    assert_eq!(
        x.ty(),
        ValueType::collection(BasicKind::Scalar, Domain::Bound(EntitySetId::ALL_CELLS))
    );
    assert_code(a.random_access(centroids, 3), ErrorCode::INDEX_OUT_OF_RANGE);
    let one = num(&mut a, "1");
    assert_code(a.random_access(one, 0), ErrorCode::INVALID_OPERAND);
}

#[test]
fn test_stencil_assignment_declares_grid() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let i = a.stencil_index("i").expect("i");
    let one = num(&mut a, "1");
    let shifted = a.binary(BinaryOp::Add, i, one).expect("i + 1");
    assert_eq!(shifted.ty().basic, BasicKind::StencilI);
    let j = a.stencil_index("j").expect("j");
    let value = num(&mut a, "0.5");
    let node = a
        .stencil_assignment("w", vec![shifted, j], value)
        .expect("w[i+1, j] = 0.5");
    assert!(matches!(node, Node::StencilAssign { declares: true, .. }));

    let ty = a.symbols().variable_type("w").expect("w");
    assert!(ty.mutable);
    assert_eq!(ty.domain, Domain::Bound(EntitySetId::ALL_CELLS));

    let i = a.stencil_index("i").expect("i");
    let j = a.stencil_index("j").expect("j");
    let read = a.stencil_access("w", vec![i, j]).expect("w[i, j]");
    assert_eq!(read.ty(), scalar());
}

#[test]
fn test_stencil_indices_must_be_in_order() {
    let mut table = SymbolTable::new();
    let mut a = SemanticActions::new(&mut table);
    let j = a.stencil_index("j").expect("j");
    let i = a.stencil_index("i").expect("i");
    let value = num(&mut a, "1");
    assert_code(
        a.stencil_assignment("w", vec![j, i], value),
        ErrorCode::TYPE_MISMATCH,
    );
    assert_code(a.stencil_index("q"), ErrorCode::UNKNOWN_VARIABLE);
}
