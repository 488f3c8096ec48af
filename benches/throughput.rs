use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rulewright::parse::parse_expression;
use rulewright::{
    Clause, ClauseCombination, ExpressionBuilder, Filter, Resource, Selector, SetOp, Token,
};

struct Shared {
    selector: Selector,
    filters: Vec<Filter>,
    resources: Vec<Resource>,
}

fn build_shared() -> Arc<Shared> {
    let resources = (0..2_000_u32)
        .map(|i| {
            Resource::new(if i % 2 == 0 { "session" } else { "room" }, i % 4 + 1)
                .label("campus", if i % 3 == 0 { "north" } else { "south" })
        })
        .collect();
    let filters = vec![
        Filter::new().resource_type("session").with_id(1),
        Filter::new().label("campus", "north").with_id(2),
        Filter::new().ranks([1, 2]).with_id(3),
    ];
    let selector = Selector::new(
        "shared",
        vec![
            Clause::new(vec![
                Token::Filter(1),
                Token::Op(SetOp::Intersection),
                Token::Filter(2),
                Token::Op(SetOp::Difference),
                Token::Filter(3),
            ]),
            Clause::new(vec![Token::Filter(3), Token::Op(SetOp::Union), Token::Filter(2)]),
        ],
    );
    Arc::new(Shared {
        selector,
        filters,
        resources,
    })
}

fn bench_throughput(c: &mut Criterion) {
    let thread_counts = [1, 2, 4, 8];

    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(5));

    for &threads in &thread_counts {
        let shared = build_shared();

        group.bench_function(&format!("{threads}_threads"), |b| {
            b.iter_custom(|iters| {
                let per_thread = iters / threads as u64;
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let shared = Arc::clone(&shared);
                        thread::spawn(move || {
                            let start = Instant::now();
                            for _ in 0..per_thread {
                                let _ = shared.selector.evaluate(
                                    &shared.filters,
                                    &shared.resources,
                                    ClauseCombination::Union,
                                );
                            }
                            start.elapsed()
                        })
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|h| h.join().unwrap())
                    .max()
                    .unwrap_or(Duration::ZERO)
            });
        });
    }

    group.finish();
}

fn bench_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("text");
    for &lines in &[1, 10, 100] {
        let text: String = (0..lines)
            .map(|i| {
                format!(
                    "session[campus:north]{{{}}} & room[building:B]{{*}} - @{i}\n",
                    i % 5 + 1
                )
            })
            .collect();
        group.bench_function(&format!("parse_{lines}_clauses"), |b| {
            b.iter(|| parse_expression(black_box(&text)));
        });
    }
    group.finish();
}

fn bench_wire(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire");
    let filters: Vec<Filter> = (1..=32)
        .map(|id| Filter::new().resource_type("session").with_id(id))
        .collect();

    let mut builder = ExpressionBuilder::new();
    for (i, filter) in filters.iter().enumerate() {
        let clause = i / 8;
        if i % 8 > 0 {
            builder.push_operator(clause, SetOp::Intersection).unwrap();
        }
        builder.push_filter(clause, filter.clone()).unwrap();
    }

    group.bench_function("operations_for_backend", |b| {
        b.iter(|| black_box(&builder).operations_for_backend());
    });

    let operations = builder.operations_for_backend();
    let json = serde_json::to_string(&operations).unwrap();
    group.bench_function("serialize", |b| {
        b.iter(|| serde_json::to_string(black_box(&operations)));
    });
    group.bench_function("deserialize", |b| {
        b.iter(|| serde_json::from_str::<Vec<Clause>>(black_box(&json)));
    });
    group.bench_function("set_operations", |b| {
        b.iter(|| {
            let mut fresh = ExpressionBuilder::new();
            fresh.set_operations(black_box(&operations), &filters);
            fresh
        });
    });

    group.finish();
}

criterion_group!(benches, bench_throughput, bench_text, bench_wire);
criterion_main!(benches);
