//! Benchmarks for the compiler pipeline stages.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use psc_lang::codegen::{generate, optimize, translate};
use psc_lang::executor::Executor;
use psc_lang::parser::{parse, tokenize};
use psc_lang::{semantic, CompilationContext, Compiler, Diagnostics};

const PROGRAM: &str = r#"
inicio
    entero n = 50;
    entero suma = 0;
    entero basura = 0;
    para i desde 1 hasta n hacer
        si ((i % 3) == 0) entonces
            suma = suma + i * 2;
        sino
            basura = basura + i;
        fin_si
    fin_para
    mientras (suma > 100) hacer
        suma = suma - 7;
    fin_mientras
    mostrar("suma", suma);
fin
"#;

fn benchmark_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize program", |b| {
        b.iter(|| {
            let mut diagnostics = Diagnostics::new();
            black_box(tokenize(black_box(PROGRAM), &mut diagnostics))
        });
    });
}

fn benchmark_front_end(c: &mut Criterion) {
    c.bench_function("parse + analyze", |b| {
        b.iter(|| {
            let mut ctx = CompilationContext::new();
            let program = parse(black_box(PROGRAM), &mut ctx);
            semantic::analyze(&program, &mut ctx);
            black_box(ctx.diagnostics.len())
        });
    });
}

fn benchmark_back_end(c: &mut Criterion) {
    c.bench_function("generate + optimize + translate", |b| {
        b.iter(|| {
            let mut ctx = CompilationContext::new();
            let program = parse(PROGRAM, &mut ctx);
            semantic::analyze(&program, &mut ctx);
            let ir = generate(&program, &mut ctx).unwrap();
            black_box(translate(&optimize(ir)).unwrap())
        });
    });
}

fn benchmark_execute(c: &mut Criterion) {
    let translation = Compiler::default().compile(PROGRAM).translation.unwrap();
    let executor = Executor::default();
    c.bench_function("execute translated script", |b| {
        b.iter(|| black_box(executor.run(black_box(&translation.source))));
    });
}

fn benchmark_compile_and_run(c: &mut Criterion) {
    let compiler = Compiler::default();
    c.bench_function("compile_and_run end to end", |b| {
        b.iter(|| black_box(compiler.compile_and_run(black_box(PROGRAM))));
    });
}

criterion_group!(
    benches,
    benchmark_tokenize,
    benchmark_front_end,
    benchmark_back_end,
    benchmark_execute,
    benchmark_compile_and_run
);
criterion_main!(benches);
