use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rulewright::{Clause, ClauseCombination, Filter, Resource, Selector, SetOp, Token};

const TYPES: [&str; 4] = ["session", "room", "lecturer", "lab"];
const CAMPUSES: [&str; 3] = ["north", "south", "east"];

/// `n` resources spread over every type and campus, ranked 1 through 5.
fn build_universe(n: u32) -> Vec<Resource> {
    (0..n)
        .map(|i| {
            Resource::new(TYPES[i as usize % TYPES.len()], i % 5 + 1)
                .label("campus", CAMPUSES[i as usize % CAMPUSES.len()])
                .label("group", format!("g{}", i % 16))
        })
        .collect()
}

/// One filter per type/campus pair, ids starting at 1.
fn build_filters() -> Vec<Filter> {
    let mut filters = Vec::new();
    for resource_type in TYPES {
        for campus in CAMPUSES {
            let id = filters.len() as u64 + 1;
            filters.push(
                Filter::new()
                    .resource_type(resource_type)
                    .label("campus", campus)
                    .with_id(id),
            );
        }
    }
    filters
}

/// A selector with `clauses` clauses, each chaining every filter with rotating operators.
fn build_selector(filters: &[Filter], clauses: usize) -> Selector {
    let ops = [SetOp::Union, SetOp::Intersection, SetOp::Difference];
    let operation = (0..clauses)
        .map(|c| {
            let mut tokens = Vec::new();
            for (i, filter) in filters.iter().enumerate() {
                if i > 0 {
                    tokens.push(Token::Op(ops[(i + c) % ops.len()]));
                }
                tokens.push(Token::Filter(filter.id.unwrap_or_default()));
            }
            Clause::new(tokens)
        })
        .collect();
    Selector::new("bench", operation)
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector_eval");
    let filters = build_filters();

    for &n in &[100, 1_000, 10_000] {
        let resources = build_universe(n);
        for &clauses in &[1, 4] {
            let selector = build_selector(&filters, clauses);
            group.bench_function(&format!("{n}_resources_{clauses}_clauses_union"), |b| {
                b.iter(|| {
                    selector.evaluate(
                        black_box(&filters),
                        black_box(&resources),
                        ClauseCombination::Union,
                    )
                });
            });
            group.bench_function(
                &format!("{n}_resources_{clauses}_clauses_intersection"),
                |b| {
                    b.iter(|| {
                        selector.evaluate(
                            black_box(&filters),
                            black_box(&resources),
                            ClauseCombination::Intersection,
                        )
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_filter_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_select");
    let filter = Filter::new()
        .resource_type("session")
        .label("campus", "north")
        .ranks([1, 3, 5]);

    for &n in &[100, 1_000, 10_000] {
        let resources = build_universe(n);
        group.bench_function(&format!("{n}_resources"), |b| {
            b.iter(|| filter.select(black_box(&resources)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_filter_match);
criterion_main!(benches);
