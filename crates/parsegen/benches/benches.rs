use std::{env, fs, path::PathBuf};

use criterion::{criterion_group, criterion_main, Criterion};
use parsegen::{
    codegen::{Codegen, Config},
    sets::{self, Mode},
    syntax,
};

criterion_main!(benches);
criterion_group!(benches, bench_sets, bench_codegen);

fn bench_sets(c: &mut Criterion) {
    bench_compute(c, "expansions");
    bench_compute(c, "calc");
    bench_compute(c, "module");
}

fn bench_codegen(c: &mut Criterion) {
    let source = grammar_source("calc");
    let grammar = parsegen::Grammar::from_str(&source).unwrap();
    c.bench_function("codegen/calc", |b| {
        b.iter(|| {
            Codegen::new(&grammar, &Config::new())
                .unwrap()
                .to_string()
        });
    });
}

fn grammar_source(grammar_name: &str) -> String {
    let project_root = env::var_os("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .expect("missing environment variable: `CARGO_MANIFEST_DIR'");
    fs::read_to_string(project_root.join(format!("tests/{}.pg", grammar_name))).unwrap()
}

fn bench_compute(c: &mut Criterion, grammar_name: &str) {
    let source = grammar_source(grammar_name);

    let mut group = c.benchmark_group(grammar_name);
    group.bench_function("Legacy", |b| {
        b.iter(|| {
            let mut grammar = syntax::parse(&source).unwrap();
            sets::compute(&mut grammar, Mode::Legacy).unwrap();
            grammar
        });
    });
    group.bench_function("Follow", |b| {
        b.iter(|| {
            let mut grammar = syntax::parse(&source).unwrap();
            sets::compute(&mut grammar, Mode::Follow).unwrap();
            grammar
        });
    });
    group.finish();
}
