//! Code-spec selection: container specialization determinism and the
//! specialized-versus-generic operation split.

use krait_frontend::ast::{BinaryOp, DisplayItem, ExprAst};
use krait_ir::{compile_module, CodeSpec, CompileConfig, Node, NodeKind};
use krait_tests::{assign, bin, int, loc, module, name};

fn compile_single_assign(value: ExprAst) -> krait_ir::CompiledModule {
    compile_module(&module(vec![assign("x", value, 1)]), &CompileConfig::default()).unwrap()
}

/// The node holding `x`'s assigned value.
fn value_node(compiled: &krait_ir::CompiledModule) -> &Node {
    &compiled.root().children[0].children[0]
}

#[test]
fn list_construction_selects_fixed_arity_for_each_element_count() {
    for n in 0..=20usize {
        let elements = (0..n).map(|i| int(i as i64, 1)).collect();
        let compiled = compile_single_assign(krait_tests::list(elements, 1));
        let spec = compiled.spec_for(value_node(&compiled));
        assert_eq!(
            spec,
            CodeSpec::BuildListFixed { arity: n },
            "element count {}",
            n
        );
    }
}

#[test]
fn specialization_is_stable_across_repeated_compilations() {
    let build = || {
        krait_tests::list(
            vec![int(1, 1), name("u", 1), int(3, 1)],
            1,
        )
    };
    let mut specs = Vec::new();
    for _ in 0..5 {
        let compiled = compile_single_assign(build());
        specs.push(compiled.spec_for(value_node(&compiled)));
    }
    assert!(specs.iter().all(|s| *s == CodeSpec::BuildListFixed { arity: 3 }));
}

#[test]
fn starred_elements_force_the_generic_construction_family() {
    let expr = ExprAst::List {
        elements: vec![
            DisplayItem::Plain(int(1, 1)),
            DisplayItem::Starred(name("rest", 1)),
        ],
        location: loc(1),
    };
    let compiled = compile_single_assign(expr);
    assert_eq!(
        compiled.spec_for(value_node(&compiled)),
        CodeSpec::BuildListAny
    );
}

#[test]
fn dict_specialization_counts_entries_not_children() {
    let expr = ExprAst::Dict {
        entries: vec![
            (krait_tests::text("a", 1), name("u", 1)),
            (krait_tests::text("b", 1), name("v", 1)),
        ],
        location: loc(1),
    };
    let compiled = compile_single_assign(expr);
    assert_eq!(
        compiled.spec_for(value_node(&compiled)),
        CodeSpec::BuildDictFixed { arity: 2 }
    );
}

#[test]
fn known_int_operands_select_the_native_int_template() {
    // u is unknown, so u + u is generic; x + 1 over a known int is native.
    let ast = module(vec![
        assign("x", int(5, 1), 1),
        assign("a", bin(BinaryOp::Add, name("u", 2), name("u", 2), 2), 2),
        assign("b", bin(BinaryOp::Sub, name("x", 3), int(1, 3), 3), 3),
    ]);
    let compiled = compile_module(&ast, &CompileConfig::default()).unwrap();

    let generic = &compiled.root().children[1].children[0];
    assert_eq!(
        compiled.spec_for(generic),
        CodeSpec::BinaryGenericOp { op: krait_ir::BinaryOpIR::Add }
    );

    // b = x - 1 folded outright; the folded constant loads directly.
    let folded = &compiled.root().children[2].children[0];
    assert_eq!(compiled.spec_for(folded), CodeSpec::LoadConstant);
}

#[test]
fn constant_mutable_containers_still_build_fresh_objects() {
    let compiled = compile_single_assign(krait_tests::list(vec![int(1, 1), int(2, 1)], 1));
    let node = value_node(&compiled);
    // Folded to a constant list value, yet the template is a construction,
    // not a shared-constant load.
    assert!(matches!(node.kind, NodeKind::Constant(_)));
    assert_eq!(
        compiled.spec_for(node),
        CodeSpec::BuildListFixed { arity: 2 }
    );
}

#[test]
fn statement_nodes_have_statement_templates() {
    let ast = module(vec![
        assign("x", int(1, 1), 1),
        krait_frontend::ast::StmtAst::Pass { location: loc(2) },
        krait_frontend::ast::StmtAst::Return {
            value: None,
            location: loc(3),
        },
    ]);
    let compiled = compile_module(&ast, &CompileConfig::default()).unwrap();
    let root = compiled.root();
    assert_eq!(compiled.spec_for(root), CodeSpec::Sequence);
    assert_eq!(compiled.spec_for(&root.children[0]), CodeSpec::StoreName);
    assert_eq!(compiled.spec_for(&root.children[1]), CodeSpec::NoOp);
    assert_eq!(compiled.spec_for(&root.children[2]), CodeSpec::ReturnNone);
}
