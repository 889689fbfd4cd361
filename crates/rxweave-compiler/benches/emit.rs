use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rxweave_checker::Analyzer;
use rxweave_compiler::{compile_patch, compile_source};
use rxweave_syntax::DeclarationSet;

fn model_source(properties: usize) -> String {
    let mut source = String::from("namespace Bench;\npublic partial class Model : ReactiveObjectBase {\n");
    for i in 0..properties {
        source.push_str(&format!("    [Reactive] public int P{i} {{ get; set; }} = {i};\n"));
        source.push_str(&format!("    [Derived(\"P{i}\")] public int D{i} => P{i} * 2;\n"));
        source.push_str(&format!(
            "    [Derived(CacheMode.Disabled, \"P{i}\", \"D{i}\")] public bool Big{i} => D{i} > P{i} + 10;\n"
        ));
    }
    source.push_str("}\n");
    source
}

fn bench_emit(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");
    for size in [10, 100] {
        let set = DeclarationSet::parse("bench.rxd", &model_source(size)).unwrap();
        let analysis = Analyzer::new().analyze(&set);
        let model = &analysis.models[0];
        group.bench_with_input(BenchmarkId::new("source", size), model, |b, model| {
            b.iter(|| compile_source(black_box(model)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("patch", size), model, |b, model| {
            b.iter(|| compile_patch(black_box(model)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_emit);
criterion_main!(benches);
