use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rxweave_syntax::{parse_source, Lexer};

fn model_source(properties: usize) -> String {
    let mut source = String::from("namespace Bench;\npublic partial class Model : IReactiveObject {\n");
    for i in 0..properties {
        source.push_str(&format!("    [Reactive] public int P{i} {{ get; set; }} = {i};\n"));
        source.push_str(&format!(
            "    [Derived(\"P{i}\")] public int D{i} => P{i} * 2 + (P{i} > 10 ? 1 : 0);\n"
        ));
    }
    source.push_str("}\n");
    source
}

fn bench_lexer(c: &mut Criterion) {
    let source = model_source(100);
    c.bench_function("lex_model_100", |b| {
        b.iter(|| Lexer::new(black_box(&source)).tokenize().unwrap());
    });
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_model");
    for size in [10, 100, 1000] {
        let source = model_source(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| parse_source(black_box(source)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lexer, bench_parser);
criterion_main!(benches);
