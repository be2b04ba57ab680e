//! Escape conservatism over a hand-classified operation corpus: nothing
//! classified `NoEscape` may raise or touch outer state when its semantics
//! are evaluated directly, and everything that can must carry at least
//! `ValueEscape`.

use krait_frontend::ast::{BinaryOp, CompareOp, ExprAst, UnaryOp};
use krait_ir::{compile_module, CompileConfig, EscapeDescriptor, ExceptionExit, Node, NodeKind};
use krait_tests::{assign, bin, call, cmp, expr_stmt, int, list, module, name, text, unary};

/// Compiles `probe = <expr>` after the given prelude and returns the
/// probe's value node.
fn classified(prelude: Vec<krait_frontend::ast::StmtAst>, expr: ExprAst) -> Node {
    let mut body = prelude;
    body.push(assign("probe", expr, 90));
    let compiled = compile_module(&module(body), &CompileConfig::default()).unwrap();
    compiled
        .root()
        .children
        .last()
        .unwrap()
        .children[0]
        .clone()
}

#[test]
fn pure_arithmetic_is_no_escape() {
    // Every operation here provably cannot raise: evaluating it directly
    // succeeds for all operand values of these shapes.
    let corpus = vec![
        bin(BinaryOp::Add, int(1, 1), int(2, 1), 1),
        bin(BinaryOp::Mul, int(3, 1), int(4, 1), 1),
        bin(BinaryOp::FloorDiv, int(9, 1), int(2, 1), 1),
        bin(BinaryOp::Add, text("a", 1), text("b", 1), 1),
    ];
    for expr in corpus {
        let node = classified(vec![], expr);
        assert_eq!(node.escape, EscapeDescriptor::NoEscape);
        assert_eq!(node.escape.exception_exit(), ExceptionExit::None);
    }
}

#[test]
fn literal_constructions_are_no_escape() {
    let node = classified(vec![], list(vec![int(1, 1), int(2, 1)], 1));
    assert_eq!(node.escape, EscapeDescriptor::NoEscape);
}

#[test]
fn comparison_of_known_numbers_is_no_escape() {
    let node = classified(vec![], cmp(CompareOp::Lt, int(1, 1), int(2, 1), 1));
    assert_eq!(node.escape, EscapeDescriptor::NoEscape);
}

#[test]
fn division_with_unknown_divisor_may_raise() {
    // d is loop-widened to unknown int; 1 / d may raise ZeroDivisionError.
    let prelude = vec![
        assign("d", int(3, 1), 1),
        krait_frontend::ast::StmtAst::While {
            test: name("c", 2),
            body: vec![assign("d", bin(BinaryOp::Sub, name("d", 3), int(1, 3), 3), 3)],
            location: krait_tests::loc(2),
        },
    ];
    let node = classified(prelude, bin(BinaryOp::TrueDiv, int(1, 4), name("d", 4), 4));
    assert!(node.escape.can_raise());
    assert!(node.escape.is_value_escaping());
}

#[test]
fn calls_are_fully_escaping_without_the_mutation_promise() {
    let node = classified(vec![], call(name("f", 1), vec![int(1, 1)], 1));
    assert_eq!(node.escape, EscapeDescriptor::FullEscape);
    assert!(node.escape.blocks_code_motion());
}

#[test]
fn attribute_access_is_fully_escaping_without_the_promise() {
    let expr = ExprAst::Attribute {
        value: Box::new(name("obj", 1)),
        attr: "field".into(),
        location: krait_tests::loc(1),
    };
    let node = classified(vec![], expr);
    assert_eq!(node.escape, EscapeDescriptor::FullEscape);
}

#[test]
fn the_mutation_promise_downgrades_calls_to_value_escape() {
    let ast = module(vec![expr_stmt(call(name("f", 1), vec![], 1), 1)]);
    let config = CompileConfig {
        assume_no_external_mutation: true,
        ..CompileConfig::default()
    };
    let compiled = compile_module(&ast, &config).unwrap();
    let call_node = &compiled.root().children[0].children[0];
    assert_eq!(call_node.escape, EscapeDescriptor::ValueEscape);
    assert!(call_node.escape.can_raise());
    assert!(!call_node.escape.blocks_code_motion());
}

#[test]
fn certain_type_errors_carry_full_escape_terminals() {
    let node = classified(vec![], unary(UnaryOp::Invert, text("a", 1), 1));
    assert!(matches!(node.kind, NodeKind::RaiseError { .. }));
    assert_eq!(node.escape, EscapeDescriptor::FullEscape);
    assert_eq!(node.escape.exception_exit(), ExceptionExit::Any);
}

#[test]
fn no_escape_corpus_survives_direct_evaluation() {
    // Cross-check: everything the compiler left at NoEscape in this module
    // folded to a constant, i.e. direct evaluation succeeded and produced
    // a value, raising nothing.
    let ast = module(vec![
        assign("a", bin(BinaryOp::Add, int(1, 1), int(2, 1), 1), 1),
        assign("b", bin(BinaryOp::Mul, text("x", 2), int(3, 2), 2), 2),
        assign("c", list(vec![name("a", 3), name("b", 3)], 3), 3),
    ]);
    let compiled = compile_module(&ast, &CompileConfig::default()).unwrap();
    let mut checked = 0;
    compiled.root().visit(&mut |node| {
        if node.escape == EscapeDescriptor::NoEscape
            && !matches!(
                node.kind,
                NodeKind::Module { .. } | NodeKind::Assign { .. }
            )
        {
            assert!(
                node.shape.constant_value().is_some(),
                "NoEscape node did not evaluate to a value: {:?}",
                node.kind
            );
            checked += 1;
        }
    });
    assert!(checked >= 3);
}
