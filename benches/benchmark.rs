use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynaview::config::EngineConfig;
use dynaview::eval::{Context, ExpressionEvaluator};
use serde_json::json;

fn bench_evaluate(c: &mut Criterion) {
    let evaluator = ExpressionEvaluator::new(&EngineConfig::default());
    let ctx = Context::from(json!({
        "user": {"name": "ada", "score": 0.4567},
        "items": [1, 2, 3, 4, 5],
        "price": 1234.5
    }));

    c.bench_function("evaluate arithmetic (cached)", |b| {
        b.iter(|| evaluator.evaluate(black_box("price * items.length + 2"), &ctx))
    });
    c.bench_function("evaluate pipe chain (cached)", |b| {
        b.iter(|| evaluator.evaluate(black_box("user.name | upper | truncate:3"), &ctx))
    });
    c.bench_function("interpolate mixed template", |b| {
        b.iter(|| {
            evaluator.interpolate_string(
                black_box("{{ user.name | capitalize }} scored {{ user.score | percent:1 }}"),
                &ctx,
            )
        })
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
