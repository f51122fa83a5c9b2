use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use liveframe::*;

fn float_column(size: usize, backend: &str) -> ScalarColumn {
    let values: Vec<f64> = (0..size).map(|i| ((i * 7919) % 1000) as f64 / 3.0).collect();
    ScalarColumn::new(values, Some(backend)).unwrap()
}

fn scores(size: usize, backend: &str) -> DataFrame {
    let ids: Vec<i64> = (0..size as i64).collect();
    let scores: Vec<i64> = (0..size as i64).map(|i| i % 100).collect();
    DataFrame::from_columns(vec![
        ("id", ScalarColumn::new(ids, Some(backend)).unwrap()),
        ("score", ScalarColumn::new(scores, Some(backend)).unwrap()),
    ])
    .unwrap()
}

fn bench_column_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("column_arithmetic");

    for backend in ["pandas", "arrow"] {
        let a = float_column(10000, backend);
        let b = float_column(10000, backend);
        group.bench_with_input(BenchmarkId::from_parameter(backend), &(a, b), |bench, (a, b)| {
            bench.iter(|| black_box((a * b).unwrap()));
        });
    }
    group.finish();
}

fn bench_median(c: &mut Criterion) {
    let mut group = c.benchmark_group("median");

    for backend in ["pandas", "arrow"] {
        for size in [100, 1000, 10000].iter() {
            let column = float_column(*size, backend);
            group.bench_with_input(BenchmarkId::new(backend, size), &column, |b, column| {
                b.iter(|| black_box(column.median().unwrap()));
            });
        }
    }
    group.finish();
}

fn bench_remove_front_row(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_front_row");

    for backend in ["pandas", "arrow"] {
        for size in [1000, 10000].iter() {
            group.bench_with_input(BenchmarkId::new(backend, size), size, |b, &size| {
                b.iter_batched(
                    || scores(size, backend),
                    |mut df| {
                        for _ in 0..100 {
                            let _ = df.remove_row(black_box(0)).unwrap();
                        }
                        df
                    },
                    criterion::BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

fn bench_edit_and_trigger(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_and_trigger");

    for size in [1000, 10000].iter() {
        let mut session = Session::new();
        let id = session.workspace.insert_frame(scores(*size, "pandas"));
        let total = session.workspace.insert_store(Store::new(serde_json::Value::Null));
        session
            .graph
            .register(
                Reaction::new("total", move |ws: &mut Workspace| {
                    let sum = ws.frame(id)?.column("score")?.sum()?;
                    Ok(ws.store_mut(total)?.set(sum.to_json()).into_iter().map(Modification::from).collect())
                })
                .reads(Input::columns(id, ["score"]))
                .writes(Output::Store(total)),
            )
            .unwrap();

        let mut next = 0i64;
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                next += 1;
                let edit = session
                    .workspace
                    .frame_mut(id)
                    .unwrap()
                    .edit(Value::Int(next), "score", &Value::Int(5), "id")
                    .unwrap();
                session.queue.push(edit);
                black_box(session.trigger().unwrap())
            });
        });
    }
    group.finish();
}

fn bench_row_lookup_by_key(c: &mut Criterion) {
    let df = scores(10000, "arrow").with_primary_key("id").unwrap();
    let keys: Vec<Value> = (0..100).map(|i| Value::Int(i * 97)).collect();

    c.bench_function("loc_100_keys", |b| {
        b.iter(|| black_box(df.loc(&keys).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_column_arithmetic,
    bench_median,
    bench_remove_front_row,
    bench_edit_and_trigger,
    bench_row_lookup_by_key
);
criterion_main!(benches);
