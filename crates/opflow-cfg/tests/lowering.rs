// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! End-to-end lowering tests: bound bodies in, finished graphs out.

use opflow_bound::{
    BinaryOp, BoundBody, BoundCaseLabel, BoundCatch, BoundExpr, BoundPattern, BoundPropertySubpattern, BoundStmt,
    BoundSwitchArm, BoundSwitchSection, BoundUsingResource, ConstValue, LogicalOp, MethodSymbol, ParameterSymbol,
    SymbolFactory, Type, TypeDefKind, TypeId, TypeTable, UserDefinedLogical, WellKnownType,
};
use opflow_cfg::{
    build_graph, BasicBlockKind, BranchSemantics, ConditionKind, ControlFlowGraph, RegionId, RegionKind,
};
use opflow_ops::{BinaryOperatorKind, CaptureId, Operation, OperationKind, UnaryOperatorKind};
use pretty_assertions::assert_eq;

// ── Helpers ─────────────────────────────────────────────────────────

fn method_body(statements: Vec<BoundStmt>) -> BoundBody {
    BoundBody::method(BoundStmt::block(Vec::new(), statements))
}

fn param(ordinal: u32, name: &str, ty: Type) -> ParameterSymbol {
    ParameterSymbol::new(ordinal, name, ty)
}

fn void_method(name: &str, parameters: Vec<ParameterSymbol>) -> MethodSymbol {
    MethodSymbol::new(Type::Object, name, parameters, Type::Void)
}

fn call_statement(method: &MethodSymbol, arguments: Vec<BoundExpr>) -> BoundStmt {
    BoundStmt::expression(BoundExpr::call(None, method, arguments))
}

fn fall_through(graph: &ControlFlowGraph, ordinal: usize) -> Option<usize> {
    graph.blocks[ordinal].fall_through_successor.as_ref().and_then(|b| b.destination)
}

fn conditional(graph: &ControlFlowGraph, ordinal: usize) -> Option<usize> {
    graph.blocks[ordinal].conditional_successor.as_ref().and_then(|b| b.destination)
}

fn count_kind(graph: &ControlFlowGraph, pred: impl Fn(&Operation) -> bool) -> usize {
    graph
        .operations()
        .flat_map(|(_, op)| op.descendants())
        .filter(|op| pred(op))
        .count()
}

fn calls_to(op: &Operation, name: &str) -> bool {
    matches!(&op.kind, OperationKind::Invocation { method, .. } if method.name == name)
}

/// The block holding an expression statement that calls `name`.
fn block_calling(graph: &ControlFlowGraph, name: &str) -> usize {
    graph
        .blocks
        .iter()
        .find(|b| b.operations.iter().any(|op| op.descendants().any(|d| calls_to(d, name))))
        .map(|b| b.ordinal)
        .unwrap_or_else(|| panic!("no block calls {}", name))
}

/// The region a block sits in directly.
fn region_of(graph: &ControlFlowGraph, ordinal: usize) -> &opflow_cfg::Region {
    &graph.regions[graph.blocks[ordinal].region.index()]
}

/// A class implementing `IDisposable`.
fn disposable_class(types: &mut TypeTable, name: &str) -> TypeId {
    let id = types.define(name, TypeDefKind::Class);
    types.set_base(id, types.well_known(WellKnownType::IDisposable));
    id
}

// ── Expressions ─────────────────────────────────────────────────────

#[test]
fn conditional_argument_spills_earlier_arguments() {
    let types = TypeTable::new();
    let (a, b, c, d) = (
        param(0, "a", Type::Int32),
        param(1, "b", Type::Bool),
        param(2, "c", Type::Int32),
        param(3, "d", Type::Int32),
    );
    let m = void_method("M", vec![param(0, "x", Type::Int32), param(1, "y", Type::Int32)]);
    let choice = BoundExpr::conditional(
        BoundExpr::parameter(&b),
        BoundExpr::parameter(&c),
        BoundExpr::parameter(&d),
        Type::Int32,
    );
    let body = method_body(vec![call_statement(&m, vec![BoundExpr::parameter(&a), choice])]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 6);
    assert_eq!(graph.blocks[1].condition_kind, Some(ConditionKind::WhenFalse));
    assert_eq!(conditional(&graph, 1), Some(3));
    assert_eq!(fall_through(&graph, 1), Some(2));
    assert_eq!(graph.blocks[4].predecessors, vec![2, 3]);

    // `a` is captured before the test on `b`.
    let first = &graph.blocks[1].operations[0];
    assert_eq!(first.capture_id(), Some(CaptureId(0)));
    assert!(matches!(first.children[0].kind, OperationKind::ParameterReference { .. }));

    let region = &graph.regions[1];
    assert_eq!(region.kind, RegionKind::Locals);
    assert_eq!(region.captures, vec![CaptureId(0), CaptureId(1)]);
    assert_eq!((region.first_block, region.last_block), (1, 4));

    let statement = &graph.blocks[4].operations[0];
    assert!(matches!(statement.kind, OperationKind::ExpressionStatement));
    let references: Vec<CaptureId> = statement
        .descendants()
        .filter(|op| matches!(op.kind, OperationKind::FlowCaptureReference { .. }))
        .filter_map(Operation::capture_id)
        .collect();
    assert_eq!(references, vec![CaptureId(0), CaptureId(1)]);

    let entering = &graph.entry().fall_through_successor.as_ref().expect("entry branch").entering_regions;
    assert_eq!(entering, &vec![RegionId(1)]);
}

#[test]
fn coalesce_tests_the_left_operand_once() {
    let types = TypeTable::new();
    let x = param(0, "x", Type::nullable(Type::Int32));
    let y = param(1, "y", Type::Int32);
    let value = BoundExpr::coalesce(BoundExpr::parameter(&x), BoundExpr::parameter(&y), Type::Int32);
    let body = method_body(vec![BoundStmt::return_stmt(Some(value))]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 6);
    assert_eq!(count_kind(&graph, |op| matches!(op.kind, OperationKind::IsNull)), 1);
    assert_eq!(count_kind(&graph, |op| calls_to(op, "GetValueOrDefault")), 1);

    assert_eq!(graph.blocks[1].condition_kind, Some(ConditionKind::WhenTrue));
    assert_eq!(conditional(&graph, 1), Some(3));

    let result = graph.blocks[4].fall_through_successor.as_ref().expect("return branch");
    assert_eq!(result.semantics, BranchSemantics::Return);
    assert_eq!(result.destination, Some(5));
    let value = graph.blocks[4].branch_value.as_ref().expect("returned value");
    assert_eq!(value.capture_id(), Some(CaptureId(1)));

    let operand_region = &graph.regions[2];
    assert_eq!(operand_region.parent, Some(RegionId(1)));
    assert_eq!(operand_region.captures, vec![CaptureId(0)]);
    assert_eq!(graph.regions[1].captures, vec![CaptureId(1)]);
}

#[test]
fn short_circuit_and_stores_false_on_the_short_path() {
    let types = TypeTable::new();
    let a = param(0, "a", Type::Bool);
    let b = param(1, "b", Type::Bool);
    let value = BoundExpr::and(BoundExpr::parameter(&a), BoundExpr::parameter(&b));
    let body = method_body(vec![BoundStmt::return_stmt(Some(value))]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 6);
    assert_eq!(conditional(&graph, 1), Some(3));
    let short = &graph.blocks[3].operations[0];
    assert_eq!(short.capture_id(), Some(CaptureId(0)));
    let known = &short.children[0];
    assert_eq!(known.constant, Some(ConstValue::Bool(false)));
    assert!(known.is_implicit());
    assert_eq!(known.syntax.text, "a");
}

#[test]
fn constant_logical_operands_fold_without_branches() {
    let types = TypeTable::new();
    let value = BoundExpr::or(BoundExpr::bool(false), BoundExpr::bool(true));
    let body = method_body(vec![BoundStmt::return_stmt(Some(value))]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 3);
    let returned = graph.blocks[1].branch_value.as_ref().expect("returned value");
    assert_eq!(returned.constant_bool(), Some(true));
}

#[test]
fn lifted_addition_checks_both_operands() {
    let types = TypeTable::new();
    let int_opt = Type::nullable(Type::Int32);
    let x = param(0, "x", int_opt.clone());
    let y = param(1, "y", int_opt.clone());
    let sum = BoundExpr::binary(
        BinaryOp::Add,
        BoundExpr::parameter(&x),
        BoundExpr::parameter(&y),
        int_opt,
    );
    let body = method_body(vec![BoundStmt::return_stmt(Some(sum))]);

    let graph = build_graph(&body, &types);
    let null_tests: Vec<usize> = graph
        .blocks
        .iter()
        .filter(|b| b.branch_value.as_ref().is_some_and(|v| matches!(v.kind, OperationKind::IsNull)))
        .filter_map(|b| b.conditional_successor.as_ref().and_then(|s| s.destination))
        .collect();
    assert_eq!(null_tests.len(), 2);
    assert_eq!(null_tests[0], null_tests[1]);

    let returned = graph
        .blocks
        .iter()
        .find(|b| b.fall_through_successor.as_ref().is_some_and(|s| s.semantics == BranchSemantics::Return))
        .and_then(|b| b.branch_value.as_ref())
        .expect("returned value");
    assert!(returned.is_lifted());
}

#[test]
fn chained_conditional_access_shares_one_null_path() {
    let mut types = TypeTable::new();
    let node_id = types.define("Node", TypeDefKind::Class);
    let node = types.named(node_id);
    let next = types.add_property(node_id, "Next", node.clone());
    let value = types.add_property(node_id, "Value", Type::Int32);
    let int_opt = Type::nullable(Type::Int32);
    let a = param(0, "a", node.clone());

    let rest = BoundExpr::conditional_access(
        BoundExpr::property(Some(BoundExpr::conditional_receiver(node.clone())), &next),
        BoundExpr::property(Some(BoundExpr::conditional_receiver(node)), &value),
        int_opt.clone(),
    );
    let chain = BoundExpr::conditional_access(BoundExpr::parameter(&a), rest, int_opt);
    assert_eq!(chain.syntax.text, "a?.Next?.Value");
    let body = method_body(vec![BoundStmt::return_stmt(Some(chain))]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 7);
    assert_eq!(conditional(&graph, 1), Some(4));
    assert_eq!(conditional(&graph, 2), Some(4));
    assert_eq!(graph.blocks[4].predecessors, vec![1, 2]);
    assert_eq!(count_kind(&graph, |op| matches!(op.kind, OperationKind::IsNull)), 2);

    // `.Next` reads the captured `a`; `.Value` reads the captured `.Next`.
    let next_capture = &graph.blocks[2].operations[0];
    assert_eq!(next_capture.capture_id(), Some(CaptureId(1)));
    assert_eq!(next_capture.children[0].children[0].capture_id(), Some(CaptureId(0)));

    let when_null = &graph.blocks[4].operations[0];
    assert_eq!(when_null.capture_id(), Some(CaptureId(2)));
    assert!(matches!(when_null.children[0].kind, OperationKind::DefaultValue));
    assert_eq!(when_null.children[0].constant, Some(ConstValue::Null));

    assert_eq!(graph.regions[1].captures, vec![CaptureId(2)]);
    assert_eq!(graph.regions[2].captures, vec![CaptureId(0), CaptureId(1)]);
    let returned = graph.blocks[5].branch_value.as_ref().expect("returned value");
    assert_eq!(returned.capture_id(), Some(CaptureId(2)));
}

#[test]
fn conditional_access_statement_skips_the_call() {
    let mut types = TypeTable::new();
    let node_id = types.define("Node", TypeDefKind::Class);
    let node = types.named(node_id);
    let m = types.add_method(node_id, "M", Vec::new(), Type::Void);
    let a = param(0, "a", node.clone());
    let access = BoundExpr::call(Some(BoundExpr::conditional_receiver(node)), &m, Vec::new());
    let call = BoundExpr::conditional_access(BoundExpr::parameter(&a), access, Type::Void);
    let body = method_body(vec![BoundStmt::expression(call)]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 4);
    assert_eq!(graph.blocks[1].condition_kind, Some(ConditionKind::WhenTrue));
    assert_eq!(conditional(&graph, 1), Some(3));
    assert_eq!(block_calling(&graph, "M"), 2);
    assert!(matches!(graph.blocks[2].operations[0].kind, OperationKind::ExpressionStatement));
    // Only the receiver is captured; there is no result to store.
    assert_eq!(count_kind(&graph, |op| matches!(op.kind, OperationKind::FlowCapture { .. })), 1);
    assert_eq!(graph.regions[1].captures, vec![CaptureId(0)]);
}

#[test]
fn user_defined_and_tests_the_left_operand_with_operator_false() {
    let mut types = TypeTable::new();
    let flag_id = types.define("Flag", TypeDefKind::Class);
    let flag = types.named(flag_id);
    let op_false = types.add_operator(flag_id, "op_False", vec![param(0, "f", flag.clone())], Type::Bool);
    let op_and = types.add_operator(
        flag_id,
        "op_BitwiseAnd",
        vec![param(0, "l", flag.clone()), param(1, "r", flag.clone())],
        flag.clone(),
    );
    let a = param(0, "a", flag.clone());
    let b = param(1, "b", flag);
    let value = BoundExpr::user_defined_logical(
        LogicalOp::And,
        BoundExpr::parameter(&a),
        BoundExpr::parameter(&b),
        UserDefinedLogical { operator: op_and.clone(), short_circuit_test: op_false.clone() },
    );
    let body = method_body(vec![BoundStmt::return_stmt(Some(value))]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 6);
    assert_eq!(graph.blocks[1].condition_kind, Some(ConditionKind::WhenTrue));
    assert_eq!(conditional(&graph, 1), Some(3));
    let test = graph.blocks[1].branch_value.as_ref().expect("operator false test");
    assert_eq!(test.kind, OperationKind::Unary { op: UnaryOperatorKind::False, method: Some(op_false) });
    assert_eq!(test.children[0].capture_id(), Some(CaptureId(0)));

    // Both paths store into the same result.
    let combined = &graph.blocks[2].operations[0];
    assert_eq!(combined.capture_id(), Some(CaptureId(1)));
    assert_eq!(combined.children[0].kind, OperationKind::Binary { op: BinaryOperatorKind::And, method: Some(op_and) });
    let short = &graph.blocks[3].operations[0];
    assert_eq!(short.capture_id(), Some(CaptureId(1)));
    assert_eq!(short.children[0].capture_id(), Some(CaptureId(0)));

    assert_eq!(graph.regions[1].captures, vec![CaptureId(1)]);
    assert_eq!(graph.regions[2].captures, vec![CaptureId(0)]);
    assert_eq!(graph.blocks[4].predecessors, vec![2, 3]);
}

#[test]
fn lifted_equality_compares_nullness_on_the_null_path() {
    let types = TypeTable::new();
    let int_opt = Type::nullable(Type::Int32);
    let x = param(0, "x", int_opt.clone());
    let y = param(1, "y", int_opt);

    let equals = BoundExpr::binary(BinaryOp::Equals, BoundExpr::parameter(&x), BoundExpr::parameter(&y), Type::Bool);
    let graph = build_graph(&method_body(vec![BoundStmt::return_stmt(Some(equals))]), &types);
    assert_eq!(graph.blocks.len(), 7);
    assert_eq!(conditional(&graph, 1), Some(4));
    assert_eq!(conditional(&graph, 2), Some(4));
    let unlifted = &graph.blocks[3].operations[0].children[0];
    assert_eq!(unlifted.kind, OperationKind::Binary { op: BinaryOperatorKind::Equals, method: None });
    assert!(unlifted.children.iter().all(|c| calls_to(c, "GetValueOrDefault")));
    let when_null = &graph.blocks[4].operations[0].children[0];
    assert_eq!(when_null.kind, OperationKind::Binary { op: BinaryOperatorKind::Equals, method: None });
    let tested: Vec<Option<CaptureId>> = when_null
        .children
        .iter()
        .map(|c| {
            assert!(matches!(c.kind, OperationKind::IsNull));
            c.children[0].capture_id()
        })
        .collect();
    assert_eq!(tested, vec![Some(CaptureId(0)), Some(CaptureId(1))]);

    // Against a non-nullable operand, `!=` is known to hold once `x` is null.
    let differs = BoundExpr::binary(BinaryOp::NotEquals, BoundExpr::parameter(&x), BoundExpr::int(1), Type::Bool);
    let graph = build_graph(&method_body(vec![BoundStmt::return_stmt(Some(differs))]), &types);
    assert_eq!(graph.blocks.len(), 6);
    assert_eq!(count_kind(&graph, |op| matches!(op.kind, OperationKind::IsNull)), 1);
    assert_eq!(conditional(&graph, 1), Some(3));
    let when_null = &graph.blocks[3].operations[0].children[0];
    assert_eq!(when_null.constant, Some(ConstValue::Bool(true)));
    assert!(when_null.is_implicit());
}

// ── Patterns ────────────────────────────────────────────────────────

#[test]
fn pattern_locals_share_one_region() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let pair = Type::tuple([Type::Int32, Type::Int32]);
    let t = param(0, "t", pair.clone());
    let z = symbols.local("z", Type::Int32);
    let p = symbols.local("p", pair);
    let pattern = BoundPattern::recursive(
        None,
        Some(vec![BoundPattern::constant(BoundExpr::int(1)), BoundPattern::discard()]),
        vec![BoundPropertySubpattern::new("Item1", BoundPattern::var(&z))],
        Some(&p),
    );
    let test = BoundExpr::is_pattern(BoundExpr::parameter(&t), pattern);
    let body = method_body(vec![BoundStmt::return_stmt(Some(test))]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 3);
    let region = &graph.regions[graph.blocks[1].region.index()];
    assert_eq!(region.kind, RegionKind::Locals);
    assert_eq!(region.locals, vec![p, z]);
}

#[test]
fn pattern_local_in_if_condition_is_scoped_to_the_statement() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let o = param(0, "o", Type::Object);
    let x = symbols.local("x", Type::Int32);
    let m = void_method("M", vec![param(0, "value", Type::Int32)]);
    let test = BoundExpr::is_pattern(BoundExpr::parameter(&o), BoundPattern::declaration(Type::Int32, &x));
    let body = method_body(vec![BoundStmt::if_then(test, call_statement(&m, vec![BoundExpr::local(&x)]), None)]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 4);
    assert_eq!(graph.blocks[1].condition_kind, Some(ConditionKind::WhenFalse));
    assert_eq!(conditional(&graph, 1), Some(3));
    assert_eq!(block_calling(&graph, "M"), 2);

    // The test and the call that reads `x` share the region declaring it.
    let region = region_of(&graph, 1);
    assert_eq!(region.kind, RegionKind::Locals);
    assert_eq!(region.locals, vec![x.clone()]);
    assert_eq!((region.first_block, region.last_block), (1, 2));
    assert_eq!(graph.blocks[2].region, region.id);
    let declared = graph.regions.iter().filter(|r| r.locals.contains(&x)).count();
    assert_eq!(declared, 1);
}

// ── Statements ──────────────────────────────────────────────────────

#[test]
fn while_loop_with_break() {
    let types = TypeTable::new();
    let c = param(0, "c", Type::Bool);
    let d = param(1, "d", Type::Bool);
    let m = void_method("M", Vec::new());
    let body_stmt = BoundStmt::block(
        Vec::new(),
        vec![
            BoundStmt::if_then(BoundExpr::parameter(&d), BoundStmt::break_stmt(), None),
            call_statement(&m, Vec::new()),
        ],
    );
    let body = method_body(vec![BoundStmt::while_loop(BoundExpr::parameter(&c), body_stmt)]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 5);
    assert_eq!(graph.blocks[1].predecessors, vec![0, 3]);
    assert_eq!(fall_through(&graph, 3), Some(1));
    assert_eq!(block_calling(&graph, "M"), 3);
    assert_eq!(graph.exit().predecessors, vec![1, 2]);
}

#[test]
fn constant_if_leaves_else_unreachable() {
    let types = TypeTable::new();
    let m = void_method("M", Vec::new());
    let n = void_method("N", Vec::new());
    let body = method_body(vec![BoundStmt::if_then(
        BoundExpr::bool(true),
        call_statement(&m, Vec::new()),
        Some(call_statement(&n, Vec::new())),
    )]);

    let graph = build_graph(&body, &types);
    assert!(graph.blocks[block_calling(&graph, "M")].is_reachable);
    let otherwise = block_calling(&graph, "N");
    assert!(!graph.blocks[otherwise].is_reachable);
    assert!(graph.to_string().contains(&format!("Block[B{}] - Block [UnReachable]", otherwise)));
}

#[test]
fn goto_case_jumps_to_the_case_body() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let x = param(0, "x", Type::Int32);
    let m = void_method("M", Vec::new());
    let n = void_method("N", Vec::new());
    let sections = vec![
        BoundSwitchSection::new(
            vec![BoundCaseLabel::value(symbols.label("case 1"), BoundExpr::int(1))],
            vec![call_statement(&m, Vec::new()), BoundStmt::goto_case(BoundExpr::int(3))],
        ),
        BoundSwitchSection::new(
            vec![BoundCaseLabel::value(symbols.label("case 3"), BoundExpr::int(3))],
            vec![call_statement(&n, Vec::new()), BoundStmt::break_stmt()],
        ),
    ];
    let body = method_body(vec![BoundStmt::switch(BoundExpr::parameter(&x), Vec::new(), sections)]);

    let graph = build_graph(&body, &types);
    let first = block_calling(&graph, "M");
    let second = block_calling(&graph, "N");
    assert_eq!(fall_through(&graph, first), Some(second));
    assert_eq!(count_kind(&graph, |op| op.is_invalid()), 0);
    assert_eq!(
        count_kind(&graph, |op| matches!(op.kind, OperationKind::Binary { op: BinaryOperatorKind::Equals, .. })),
        2
    );
}

#[test]
fn unresolved_goto_case_is_invalid() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let x = param(0, "x", Type::Int32);
    let sections = vec![BoundSwitchSection::new(
        vec![BoundCaseLabel::value(symbols.label("case 1"), BoundExpr::int(1))],
        vec![BoundStmt::goto_case(BoundExpr::int(7))],
    )];
    let body = method_body(vec![BoundStmt::switch(BoundExpr::parameter(&x), Vec::new(), sections)]);

    let graph = build_graph(&body, &types);
    assert_eq!(
        count_kind(&graph, |op| matches!(op.kind, OperationKind::Invalid) && op.syntax.text == "goto case 7;"),
        1
    );
}

#[test]
fn duplicate_case_label_builds_an_unreachable_section() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let x = param(0, "x", Type::Int32);
    let m = void_method("M", Vec::new());
    let n = void_method("N", Vec::new());
    let sections = vec![
        BoundSwitchSection::new(
            vec![BoundCaseLabel::value(symbols.label("case 1"), BoundExpr::int(1))],
            vec![call_statement(&m, Vec::new()), BoundStmt::break_stmt()],
        ),
        BoundSwitchSection::new(
            vec![BoundCaseLabel::value(symbols.label("case 1"), BoundExpr::int(1))],
            vec![call_statement(&n, Vec::new()), BoundStmt::break_stmt()],
        ),
    ];
    let body = method_body(vec![BoundStmt::switch(BoundExpr::parameter(&x), Vec::new(), sections)]);

    let graph = build_graph(&body, &types);
    assert!(graph.blocks[block_calling(&graph, "M")].is_reachable);
    let duplicate = block_calling(&graph, "N");
    assert!(!graph.blocks[duplicate].is_reachable);
    assert!(graph.blocks[duplicate].predecessors.is_empty());
    assert_eq!(
        count_kind(&graph, |op| matches!(op.kind, OperationKind::Binary { op: BinaryOperatorKind::Equals, .. })),
        1
    );
}

#[test]
fn switch_expression_throws_when_nothing_matches() {
    let types = TypeTable::new();
    let x = param(0, "x", Type::Int32);
    let arms = vec![
        BoundSwitchArm::new(Vec::new(), BoundPattern::constant(BoundExpr::int(1)), None, BoundExpr::int(10)),
        BoundSwitchArm::new(Vec::new(), BoundPattern::discard(), None, BoundExpr::int(20)),
    ];
    let value = BoundExpr::switch(BoundExpr::parameter(&x), arms, Type::Int32);
    let body = method_body(vec![BoundStmt::return_stmt(Some(value))]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 8);
    let throwing: Vec<&Operation> = graph
        .blocks
        .iter()
        .filter(|b| b.fall_through_successor.as_ref().is_some_and(|s| s.semantics == BranchSemantics::Throw))
        .filter_map(|b| b.branch_value.as_ref())
        .collect();
    assert_eq!(throwing.len(), 1);
    assert!(matches!(throwing[0].kind, OperationKind::ObjectCreation { constructor: Some(_) }));
    assert!(throwing[0].is_implicit());

    let stores = count_kind(&graph, |op| matches!(op.kind, OperationKind::FlowCapture { id } if id == CaptureId(0)));
    assert_eq!(stores, 2);
}

#[test]
fn do_while_continue_jumps_to_the_condition() {
    let types = TypeTable::new();
    let c = param(0, "c", Type::Bool);
    let d = param(1, "d", Type::Bool);
    let m = void_method("M", Vec::new());
    let body_stmt = BoundStmt::block(
        Vec::new(),
        vec![
            BoundStmt::if_then(BoundExpr::parameter(&c), BoundStmt::continue_stmt(), None),
            call_statement(&m, Vec::new()),
        ],
    );
    let body = method_body(vec![BoundStmt::do_while(body_stmt, BoundExpr::parameter(&d))]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 5);
    assert_eq!(graph.blocks[1].condition_kind, Some(ConditionKind::WhenFalse));
    assert_eq!(conditional(&graph, 1), Some(2));
    assert_eq!(fall_through(&graph, 1), Some(3));
    assert_eq!(block_calling(&graph, "M"), 2);
    assert_eq!(graph.blocks[3].condition_kind, Some(ConditionKind::WhenTrue));
    assert_eq!(conditional(&graph, 3), Some(1));
    assert_eq!(graph.blocks[1].predecessors, vec![0, 3]);
    assert_eq!(graph.blocks[3].predecessors, vec![1, 2]);
}

#[test]
fn for_continue_runs_the_increment() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let i = symbols.local("i", Type::Int32);
    let n = param(0, "n", Type::Int32);
    let c = param(1, "c", Type::Bool);
    let m = void_method("M", Vec::new());
    let body_stmt = BoundStmt::block(
        Vec::new(),
        vec![
            BoundStmt::if_then(BoundExpr::parameter(&c), BoundStmt::continue_stmt(), None),
            call_statement(&m, Vec::new()),
        ],
    );
    let for_loop = BoundStmt::for_loop(
        vec![i.clone()],
        vec![BoundStmt::declare(&i, Some(BoundExpr::int(0)))],
        Some(BoundExpr::binary(BinaryOp::LessThan, BoundExpr::local(&i), BoundExpr::parameter(&n), Type::Bool)),
        vec![BoundExpr::compound_assign(BinaryOp::Add, BoundExpr::local(&i), BoundExpr::int(1))],
        body_stmt,
    );
    let body = method_body(vec![for_loop]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 7);
    assert!(matches!(graph.blocks[1].operations[0].kind, OperationKind::SimpleAssignment));
    assert_eq!(conditional(&graph, 2), Some(6));
    assert_eq!(conditional(&graph, 3), Some(4));
    assert_eq!(fall_through(&graph, 3), Some(5));
    assert_eq!(block_calling(&graph, "M"), 4);
    assert!(graph.blocks[5].operations[0].is_implicit());
    assert_eq!(fall_through(&graph, 5), Some(2));
    assert_eq!(graph.blocks[2].predecessors, vec![1, 5]);
    assert_eq!(graph.blocks[5].predecessors, vec![3, 4]);

    let region = &graph.regions[1];
    assert_eq!(region.locals, vec![i]);
    assert_eq!((region.first_block, region.last_block), (1, 5));
}

#[test]
fn goto_skips_to_its_label() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let label = symbols.label("L");
    let m = void_method("M", Vec::new());
    let n = void_method("N", Vec::new());
    let body = method_body(vec![
        BoundStmt::goto(&label),
        call_statement(&m, Vec::new()),
        BoundStmt::labeled(&label, call_statement(&n, Vec::new())),
    ]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 4);
    assert_eq!(fall_through(&graph, 0), Some(2));
    assert_eq!(block_calling(&graph, "M"), 1);
    assert_eq!(block_calling(&graph, "N"), 2);
    assert!(!graph.blocks[1].is_reachable);
    assert!(graph.blocks[1].predecessors.is_empty());
    assert_eq!(graph.blocks[2].predecessors, vec![0, 1]);
}

#[test]
fn unresolved_goto_is_invalid_and_falls_through() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let missing = symbols.label("Missing");
    let m = void_method("M", Vec::new());
    let body = method_body(vec![BoundStmt::goto(&missing), call_statement(&m, Vec::new())]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 3);
    let block = &graph.blocks[1];
    assert!(matches!(block.operations[0].kind, OperationKind::Invalid));
    assert_eq!(block.operations[0].syntax.text, "goto Missing;");
    assert!(block.operations[1].descendants().any(|op| calls_to(op, "M")));
    assert!(block.is_reachable);
}

#[test]
fn goto_default_jumps_to_the_default_section() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let x = param(0, "x", Type::Int32);
    let m = void_method("M", Vec::new());
    let n = void_method("N", Vec::new());
    let sections = vec![
        BoundSwitchSection::new(
            vec![BoundCaseLabel::value(symbols.label("case 1"), BoundExpr::int(1))],
            vec![call_statement(&m, Vec::new()), BoundStmt::goto_default()],
        ),
        BoundSwitchSection::new(
            vec![BoundCaseLabel::default(symbols.label("default"))],
            vec![call_statement(&n, Vec::new()), BoundStmt::break_stmt()],
        ),
    ];
    let body = method_body(vec![BoundStmt::switch(BoundExpr::parameter(&x), Vec::new(), sections)]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 5);
    assert_eq!(graph.blocks[1].condition_kind, Some(ConditionKind::WhenFalse));
    assert_eq!(conditional(&graph, 1), Some(3));
    assert_eq!(block_calling(&graph, "M"), 2);
    assert_eq!(block_calling(&graph, "N"), 3);
    assert_eq!(fall_through(&graph, 2), Some(3));
    assert_eq!(graph.blocks[3].predecessors, vec![1, 2]);
    assert_eq!(count_kind(&graph, |op| op.is_invalid()), 0);
}

#[test]
fn pattern_case_label_with_guard_tests_both() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let o = param(0, "o", Type::Object);
    let n = symbols.local("n", Type::Int32);
    let m = void_method("M", vec![param(0, "value", Type::Int32)]);
    let other = void_method("N", Vec::new());
    let guard = BoundExpr::binary(BinaryOp::GreaterThan, BoundExpr::local(&n), BoundExpr::int(0), Type::Bool);
    let sections = vec![
        BoundSwitchSection::new(
            vec![BoundCaseLabel::pattern(
                symbols.label("case int n when n > 0"),
                BoundPattern::declaration(Type::Int32, &n),
                Some(guard),
            )],
            vec![call_statement(&m, vec![BoundExpr::local(&n)]), BoundStmt::break_stmt()],
        ),
        BoundSwitchSection::new(
            vec![BoundCaseLabel::default(symbols.label("default"))],
            vec![call_statement(&other, Vec::new()), BoundStmt::break_stmt()],
        ),
    ];
    let body = method_body(vec![BoundStmt::switch(BoundExpr::parameter(&o), vec![n.clone()], sections)]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 7);
    assert!(matches!(graph.blocks[1].operations[0].kind, OperationKind::FlowCapture { .. }));

    let pattern = graph.blocks[2].branch_value.as_ref().expect("pattern test");
    assert!(matches!(pattern.kind, OperationKind::IsPattern));
    assert_eq!(pattern.children[0].capture_id(), Some(CaptureId(0)));
    let guard = graph.blocks[3].branch_value.as_ref().expect("guard");
    assert_eq!(guard.kind, OperationKind::Binary { op: BinaryOperatorKind::GreaterThan, method: None });

    // Either failing test goes to the default section.
    assert_eq!(conditional(&graph, 2), Some(5));
    assert_eq!(conditional(&graph, 3), Some(5));
    assert_eq!(fall_through(&graph, 2), Some(3));
    assert_eq!(fall_through(&graph, 3), Some(4));
    assert_eq!(block_calling(&graph, "M"), 4);
    assert_eq!(block_calling(&graph, "N"), 5);
    assert_eq!(graph.blocks[5].predecessors, vec![2, 3]);
    assert_eq!(region_of(&graph, 2).locals, vec![n]);
    assert_eq!(graph.regions[1].captures, vec![CaptureId(0)]);
}

#[test]
fn break_in_a_switch_leaves_only_the_switch() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let c = param(0, "c", Type::Bool);
    let x = param(1, "x", Type::Int32);
    let m = void_method("M", Vec::new());
    let sections = vec![
        BoundSwitchSection::new(
            vec![BoundCaseLabel::value(symbols.label("case 1"), BoundExpr::int(1))],
            vec![BoundStmt::break_stmt()],
        ),
        BoundSwitchSection::new(
            vec![BoundCaseLabel::value(symbols.label("case 2"), BoundExpr::int(2))],
            vec![BoundStmt::continue_stmt()],
        ),
    ];
    let loop_body = BoundStmt::block(
        Vec::new(),
        vec![
            BoundStmt::switch(BoundExpr::parameter(&x), Vec::new(), sections),
            call_statement(&m, Vec::new()),
        ],
    );
    let body = method_body(vec![BoundStmt::while_loop(BoundExpr::parameter(&c), loop_body)]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 6);
    assert_eq!(conditional(&graph, 1), Some(5));
    assert_eq!(block_calling(&graph, "M"), 4);
    // `break` lands after the switch, `continue` back on the loop test.
    assert_eq!(fall_through(&graph, 2), Some(4));
    assert_eq!(fall_through(&graph, 3), Some(1));
    assert_eq!(conditional(&graph, 3), Some(4));
    assert_eq!(fall_through(&graph, 4), Some(1));
    assert_eq!(graph.blocks[1].predecessors, vec![0, 3, 4]);
    assert_eq!(graph.blocks[4].predecessors, vec![2, 3]);
    let leave = graph.blocks[2].fall_through_successor.as_ref().expect("break");
    assert_eq!(leave.leaving_regions, vec![RegionId(1)]);
}

#[test]
fn static_local_initializer_runs_under_a_semaphore() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let s = symbols.static_local("s", Type::Int32);
    let m = void_method("M", Vec::new());
    let body = BoundBody::method(BoundStmt::block(
        vec![s.clone()],
        vec![BoundStmt::declare(&s, Some(BoundExpr::int(1))), call_statement(&m, Vec::new())],
    ));

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 5);
    let semaphore = graph.blocks[1].branch_value.as_ref().expect("semaphore");
    assert_eq!(semaphore.kind, OperationKind::StaticLocalInitializationSemaphore { local: s.clone() });
    assert_eq!(graph.blocks[1].condition_kind, Some(ConditionKind::WhenFalse));
    assert_eq!(conditional(&graph, 1), Some(3));
    assert!(matches!(graph.blocks[2].operations[0].kind, OperationKind::SimpleAssignment));
    assert_eq!(block_calling(&graph, "M"), 3);

    let region = &graph.regions[2];
    assert_eq!(region.kind, RegionKind::StaticLocalInitializer);
    assert_eq!(region.parent, Some(RegionId(1)));
    assert_eq!((region.first_block, region.last_block), (1, 2));
    let leave = graph.blocks[2].fall_through_successor.as_ref().expect("end of initializer");
    assert_eq!(leave.leaving_regions, vec![RegionId(2)]);
    assert_eq!(graph.regions[1].locals, vec![s]);
}

#[test]
fn try_finally_reports_finalizing_regions() {
    let types = TypeTable::new();
    let m = void_method("M", Vec::new());
    let n = void_method("N", Vec::new());
    let body = method_body(vec![BoundStmt::try_stmt(
        BoundStmt::block(Vec::new(), vec![call_statement(&m, Vec::new())]),
        Vec::new(),
        Some(BoundStmt::block(Vec::new(), vec![call_statement(&n, Vec::new())])),
    )]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 4);
    assert_eq!(graph.regions[1].kind, RegionKind::TryAndFinally);
    assert_eq!(graph.regions[2].kind, RegionKind::Try);
    assert_eq!(graph.regions[3].kind, RegionKind::Finally);

    let leave = graph.blocks[1].fall_through_successor.as_ref().expect("branch out of try");
    assert_eq!(leave.destination, Some(3));
    assert_eq!(leave.leaving_regions, vec![RegionId(2), RegionId(1)]);
    assert_eq!(leave.finally_regions, vec![RegionId(3)]);

    let finally = &graph.blocks[2];
    assert!(finally.is_reachable);
    assert!(finally.predecessors.is_empty());
    let end = finally.fall_through_successor.as_ref().expect("end of finally");
    assert_eq!(end.semantics, BranchSemantics::StructuredExceptionHandling);
    assert_eq!(end.destination, None);
}

#[test]
fn filtered_catch_nests_filter_and_handler() {
    let mut symbols = SymbolFactory::new();
    let types = TypeTable::new();
    let exception = types.well_known(WellKnownType::Exception);
    let f = param(0, "f", Type::Bool);
    let e = symbols.local("e", exception.clone());
    let m = void_method("M", Vec::new());
    let n = void_method("N", Vec::new());
    let catch = BoundCatch::new(
        exception.clone(),
        Some(e.clone()),
        Some(BoundExpr::parameter(&f)),
        BoundStmt::block(Vec::new(), vec![call_statement(&n, Vec::new())]),
    );
    let body = method_body(vec![BoundStmt::try_stmt(
        BoundStmt::block(Vec::new(), vec![call_statement(&m, Vec::new())]),
        vec![catch],
        None,
    )]);

    let graph = build_graph(&body, &types);
    let kinds: Vec<RegionKind> = graph.regions.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RegionKind::Root,
            RegionKind::TryAndCatch,
            RegionKind::Try,
            RegionKind::FilterAndHandler,
            RegionKind::Filter,
            RegionKind::Catch,
        ]
    );
    assert_eq!(graph.regions[3].locals, vec![e]);
    assert_eq!(graph.regions[3].exception_type, Some(exception));

    let filter = &graph.blocks[2];
    assert!(filter.is_reachable);
    assert!(matches!(filter.operations[0].kind, OperationKind::SimpleAssignment));
    assert!(matches!(filter.operations[0].children[1].kind, OperationKind::CaughtException));
    assert_eq!(filter.condition_kind, Some(ConditionKind::WhenTrue));
    assert_eq!(conditional(&graph, 2), Some(3));
    let end = filter.fall_through_successor.as_ref().expect("end of filter");
    assert_eq!(end.semantics, BranchSemantics::StructuredExceptionHandling);
    assert_eq!(block_calling(&graph, "N"), 3);

    let text = graph.to_string();
    assert!(text.contains(".filter {R4}"));
    assert!(text.contains(".handler {R5}"));
}

#[test]
fn using_disposes_the_resource_in_a_finally() {
    let mut types = TypeTable::new();
    let resource_class = disposable_class(&mut types, "Resource");
    let resource = types.named(resource_class);
    let r = param(0, "r", resource);
    let m = void_method("M", Vec::new());
    let body = method_body(vec![BoundStmt::using(
        BoundUsingResource::Expression(BoundExpr::parameter(&r)),
        BoundStmt::block(Vec::new(), vec![call_statement(&m, Vec::new())]),
    )]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 7);
    let kinds: Vec<RegionKind> = graph.regions.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![RegionKind::Root, RegionKind::Locals, RegionKind::TryAndFinally, RegionKind::Try, RegionKind::Finally]
    );
    assert_eq!(graph.regions[1].captures, vec![CaptureId(0)]);
    assert_eq!(graph.regions[2].parent, Some(RegionId(1)));

    assert_eq!(block_calling(&graph, "M"), 2);
    let leave = graph.blocks[2].fall_through_successor.as_ref().expect("branch out of the body");
    assert_eq!(leave.destination, Some(6));
    assert_eq!(leave.leaving_regions, vec![RegionId(3), RegionId(2), RegionId(1)]);
    assert_eq!(leave.finally_regions, vec![RegionId(4)]);

    // A null resource skips the call.
    let check = &graph.blocks[3];
    assert!(check.is_reachable);
    assert_eq!(check.condition_kind, Some(ConditionKind::WhenTrue));
    assert!(matches!(check.branch_value.as_ref().map(|v| &v.kind), Some(OperationKind::IsNull)));
    assert_eq!(conditional(&graph, 3), Some(5));
    assert_eq!(block_calling(&graph, "Dispose"), 4);
    let dispose = graph.blocks[4].operations[0].children[0].clone();
    assert!(dispose.is_implicit());
    let instance = &dispose.children[0];
    assert!(matches!(instance.kind, OperationKind::Conversion));
    assert_eq!(instance.ty, Some(types.well_known(WellKnownType::IDisposable)));
    assert_eq!(instance.children[0].capture_id(), Some(CaptureId(0)));

    let end = graph.blocks[5].fall_through_successor.as_ref().expect("end of finally");
    assert_eq!(end.semantics, BranchSemantics::StructuredExceptionHandling);
    assert_eq!(graph.verify(), Ok(()));
}

#[test]
fn using_declaration_disposes_the_declared_local() {
    let mut types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let resource_class = disposable_class(&mut types, "Resource");
    let resource = types.named(resource_class);
    let source = param(0, "source", resource.clone());
    let r = symbols.local("r", resource);
    let body = method_body(vec![BoundStmt::using(
        BoundUsingResource::Declaration { local: r.clone(), initializer: BoundExpr::parameter(&source) },
        BoundStmt::empty(),
    )]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.regions[1].kind, RegionKind::Locals);
    assert_eq!(graph.regions[1].locals, vec![r.clone()]);
    assert!(graph.regions[1].captures.is_empty());

    let store = &graph.blocks[1].operations[0];
    assert!(matches!(store.kind, OperationKind::SimpleAssignment));
    assert_eq!(store.syntax.text, "Resource r = source");
    let call = graph.blocks[block_calling(&graph, "Dispose")].operations[0].children[0].clone();
    assert_eq!(
        call.children[0].children[0].kind,
        OperationKind::LocalReference { local: r, is_declaration: false }
    );
}

#[test]
fn lock_enters_in_the_try_and_exits_when_taken() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let o = param(0, "o", Type::Object);
    let taken = symbols.local("lockTaken", Type::Bool);
    let m = void_method("M", Vec::new());
    let body = method_body(vec![BoundStmt::lock(
        BoundExpr::parameter(&o),
        &taken,
        BoundStmt::block(Vec::new(), vec![call_statement(&m, Vec::new())]),
    )]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 7);
    assert_eq!(graph.regions[1].locals, vec![taken.clone()]);
    assert_eq!(graph.regions[1].captures, vec![CaptureId(0)]);
    assert_eq!(graph.regions[3].kind, RegionKind::Try);
    assert_eq!(graph.regions[4].kind, RegionKind::Finally);

    // Enter comes first in the try, ahead of the body.
    let protected = &graph.blocks[2];
    assert_eq!(protected.region, RegionId(3));
    assert_eq!(protected.operations.len(), 2);
    assert_eq!(block_calling(&graph, "Enter"), 2);
    assert_eq!(block_calling(&graph, "M"), 2);
    let enter = &protected.operations[0].children[0];
    let arguments: Vec<&Operation> = enter.children.iter().map(|a| &a.children[0]).collect();
    assert_eq!(arguments[0].capture_id(), Some(CaptureId(0)));
    assert_eq!(
        arguments[1].kind,
        OperationKind::LocalReference { local: taken.clone(), is_declaration: true }
    );
    let by_ref = matches!(&enter.children[1].kind, OperationKind::Argument { parameter: Some(p) } if p.is_ref);
    assert!(by_ref);

    let check = &graph.blocks[3];
    assert_eq!(check.condition_kind, Some(ConditionKind::WhenFalse));
    assert_eq!(
        check.branch_value.as_ref().map(|v| v.kind.clone()),
        Some(OperationKind::LocalReference { local: taken, is_declaration: false })
    );
    assert_eq!(conditional(&graph, 3), Some(5));
    assert_eq!(block_calling(&graph, "Exit"), 4);
    let exit_arg = &graph.blocks[4].operations[0].children[0].children[0].children[0];
    assert_eq!(exit_arg.capture_id(), Some(CaptureId(0)));
}

#[test]
fn foreach_disposes_its_enumerator() {
    let mut types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let enumerator_id = disposable_class(&mut types, "Enumerator");
    types.add_method(enumerator_id, "MoveNext", Vec::new(), Type::Bool);
    types.add_property(enumerator_id, "Current", Type::Int32);
    let list_id = types.define("List", TypeDefKind::Class);
    let enumerator_ty = types.named(enumerator_id);
    types.add_method(list_id, "GetEnumerator", Vec::new(), enumerator_ty);
    let list = types.named(list_id);
    let enumerator = types.foreach_enumerator(&list).expect("enumerable");

    let items = param(0, "items", list);
    let x = symbols.local("x", Type::Int32);
    let m = void_method("M", vec![param(0, "value", Type::Int32)]);
    let body = method_body(vec![BoundStmt::for_each(
        &x,
        BoundExpr::parameter(&items),
        enumerator,
        BoundStmt::block(Vec::new(), vec![call_statement(&m, vec![BoundExpr::local(&x)])]),
    )]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 8);
    let kinds: Vec<RegionKind> = graph.regions.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            RegionKind::Root,
            RegionKind::Locals,
            RegionKind::TryAndFinally,
            RegionKind::Try,
            RegionKind::Locals,
            RegionKind::Finally,
        ]
    );
    assert_eq!(graph.regions[1].captures, vec![CaptureId(0)]);
    assert!(graph.blocks[1].operations[0].descendants().any(|op| calls_to(op, "GetEnumerator")));

    // MoveNext ends the loop by leaving through the finally.
    let next = &graph.blocks[2];
    assert_eq!(next.region, RegionId(3));
    assert!(next.branch_value.as_ref().is_some_and(|v| calls_to(v, "MoveNext")));
    assert_eq!(next.condition_kind, Some(ConditionKind::WhenFalse));
    let done = next.conditional_successor.as_ref().expect("loop exit");
    assert_eq!(done.destination, Some(7));
    assert_eq!(done.leaving_regions, vec![RegionId(3), RegionId(2), RegionId(1)]);
    assert_eq!(done.finally_regions, vec![RegionId(5)]);

    // Each iteration assigns `Current` to `x` in a region of its own.
    let iteration = &graph.blocks[3];
    assert_eq!(iteration.region, RegionId(4));
    assert_eq!(graph.regions[4].locals, vec![x]);
    let assignment = &iteration.operations[0];
    assert!(matches!(assignment.kind, OperationKind::SimpleAssignment));
    assert!(matches!(assignment.children[1].kind, OperationKind::PropertyReference { .. }));
    assert_eq!(block_calling(&graph, "M"), 3);
    assert_eq!(fall_through(&graph, 3), Some(2));
    assert_eq!(graph.blocks[2].predecessors, vec![1, 3]);

    assert_eq!(block_calling(&graph, "Dispose"), 5);
    assert_eq!(region_of(&graph, 4).kind, RegionKind::Finally);
    assert_eq!(graph.verify(), Ok(()));
}

#[test]
fn foreach_over_an_array_has_no_finally() {
    let types = TypeTable::new();
    let mut symbols = SymbolFactory::new();
    let ints = Type::array(Type::Int32);
    let enumerator = types.foreach_enumerator(&ints).expect("arrays enumerate");
    let a = param(0, "a", ints);
    let x = symbols.local("x", Type::Int32);
    let m = void_method("M", vec![param(0, "value", Type::Int32)]);
    let body = method_body(vec![BoundStmt::for_each(
        &x,
        BoundExpr::parameter(&a),
        enumerator,
        BoundStmt::block(Vec::new(), vec![call_statement(&m, vec![BoundExpr::local(&x)])]),
    )]);

    let graph = build_graph(&body, &types);
    assert_eq!(graph.blocks.len(), 5);
    let kinds: Vec<RegionKind> = graph.regions.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RegionKind::Root, RegionKind::Locals, RegionKind::Locals]);
    assert_eq!(count_kind(&graph, |op| calls_to(op, "Dispose")), 0);

    // The array goes through IEnumerable; `Current` is an object.
    let get = graph.blocks[1].operations[0].children[0].clone();
    assert!(calls_to(&get, "GetEnumerator"));
    assert!(matches!(get.children[0].kind, OperationKind::Conversion));
    let assignment = &graph.blocks[3].operations[0];
    assert!(matches!(assignment.children[1].kind, OperationKind::Conversion));
    assert_eq!(assignment.children[1].ty, Some(Type::Int32));

    assert_eq!(conditional(&graph, 2), Some(4));
    assert_eq!(fall_through(&graph, 3), Some(2));
    assert_eq!(graph.regions[2].locals, vec![x]);
}

// ── Whole graphs ────────────────────────────────────────────────────

#[test]
fn building_twice_gives_identical_graphs() {
    let types = TypeTable::new();
    let b = param(0, "b", Type::Bool);
    let n = param(1, "n", Type::nullable(Type::Bool));
    let value = BoundExpr::or(
        BoundExpr::coalesce(BoundExpr::parameter(&n), BoundExpr::parameter(&b), Type::Bool),
        BoundExpr::not(BoundExpr::parameter(&b)),
    );
    let body = method_body(vec![BoundStmt::return_stmt(Some(value))]);

    let first = build_graph(&body, &types);
    let second = build_graph(&body, &types);
    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.verify(), Ok(()));
}

#[test]
fn entry_and_exit_bracket_every_graph() {
    let types = TypeTable::new();
    let graph = build_graph(&method_body(Vec::new()), &types);
    assert_eq!(graph.blocks.len(), 2);
    assert_eq!(graph.entry().kind, BasicBlockKind::Entry);
    assert_eq!(graph.exit().kind, BasicBlockKind::Exit);
    assert_eq!(graph.exit().predecessors, vec![0]);
    assert_eq!(graph.root().kind, RegionKind::Root);
}
