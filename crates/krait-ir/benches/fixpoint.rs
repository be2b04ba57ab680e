//! Fixpoint driver benchmarks: deep constant chains and wide constructions.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use krait_frontend::ast::{BinaryOp, DisplayItem, ExprAst, ModuleAst, StmtAst};
use krait_frontend::SourceLocation;
use krait_ir::{compile_module, CompileConfig};
use num_bigint::BigInt;

fn loc(line: u32) -> SourceLocation {
    SourceLocation::new(line, 1)
}

fn int(v: i64, line: u32) -> ExprAst {
    ExprAst::Int {
        value: BigInt::from(v),
        location: loc(line),
    }
}

/// `((...(1 + 1) + 1) + 1)`, `depth` levels deep.
fn deep_addition(depth: usize) -> ModuleAst {
    let mut expr = int(1, 1);
    for _ in 0..depth {
        expr = ExprAst::Binary {
            op: BinaryOp::Add,
            left: Box::new(expr),
            right: Box::new(int(1, 1)),
            location: loc(1),
        };
    }
    ModuleAst {
        name: "bench".into(),
        body: vec![StmtAst::Assign {
            target: "x".into(),
            value: expr,
            location: loc(1),
        }],
    }
}

/// `xs = [0, 1, ..., width - 1]`
fn wide_list(width: usize) -> ModuleAst {
    ModuleAst {
        name: "bench".into(),
        body: vec![StmtAst::Assign {
            target: "xs".into(),
            value: ExprAst::List {
                elements: (0..width)
                    .map(|i| DisplayItem::Plain(int(i as i64, 1)))
                    .collect(),
                location: loc(1),
            },
            location: loc(1),
        }],
    }
}

fn bench_fixpoint(c: &mut Criterion) {
    let config = CompileConfig::default();

    let deep = deep_addition(512);
    c.bench_function("fold_deep_addition_512", |b| {
        b.iter(|| compile_module(black_box(&deep), &config).unwrap())
    });

    let wide = wide_list(1024);
    c.bench_function("fold_wide_list_1024", |b| {
        b.iter(|| compile_module(black_box(&wide), &config).unwrap())
    });
}

criterion_group!(benches, bench_fixpoint);
criterion_main!(benches);
