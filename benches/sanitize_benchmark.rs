use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Value as JsonValue, json};
use sql_conduit::prelude::*;
use tokio::runtime::Runtime;

// Deterministic payloads so runs stay comparable
fn generate_values(count: usize) -> Vec<RowValues> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    (0..count)
        .map(|i| match i % 4 {
            0 => {
                let len = rng.random_range(4..40);
                let text: String = (0..len)
                    .map(|_| match rng.random_range(0..20) {
                        0 => '\'',
                        1 => '\\',
                        2 => '\n',
                        3 => '\u{1a}',
                        _ => char::from(rng.random_range(b'a'..=b'z')),
                    })
                    .collect();
                RowValues::Text(text)
            }
            1 => RowValues::Float(rng.random_range(-1.0e-9..1.0e9)),
            2 => RowValues::Int(rng.random_range(-1_000_000..1_000_000)),
            _ => RowValues::Bool(rng.random_bool(0.5)),
        })
        .collect()
}

fn generate_rows(count: usize) -> JsonValue {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let rows: Vec<JsonValue> = (0..count)
        .map(|i| {
            json!({
                "drinkid": format!("D{i:06}"),
                "price": rng.random_range(0.0..100.0),
                "label": format!("label-{}", rng.random_range(1..1000)),
            })
        })
        .collect();
    JsonValue::Array(rows)
}

fn benchmark_sanitize(c: &mut Criterion) {
    let values = generate_values(1_000);
    let mut group = c.benchmark_group("sql_string");
    for kind in [
        BackendKind::Postgres,
        BackendKind::Mssql,
        BackendKind::Mysql,
        BackendKind::Sqlite,
    ] {
        let sanitizer = Sanitizer::new(kind);
        group.bench_with_input(BenchmarkId::from_parameter(kind), &values, |b, values| {
            b.iter(|| {
                values
                    .iter()
                    .map(|v| sanitizer.sql_string(v, false).len())
                    .sum::<usize>()
            });
        });
    }
    group.finish();

    let sanitizer = Sanitizer::new(BackendKind::Postgres);
    c.bench_function("sql_double", |b| {
        b.iter(|| values.iter().map(|v| sanitizer.sql_double(v).len()).sum::<usize>());
    });
}

fn benchmark_sqlite_insert(c: &mut Criterion) {
    let Ok(rt) = Runtime::new() else {
        return;
    };
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let path = dir.path().join("bench.db").to_string_lossy().into_owned();
    let schema = TableSchema::new("drinks", &["drinkid"])
        .property("drinkid", ColumnSpec::new(InternalType::Varchar).max_length(16))
        .property("price", ColumnSpec::new(InternalType::Float64))
        .property("label", ColumnSpec::new(InternalType::Varchar).max_length(32));

    let db = rt.block_on(async {
        let mut db = SqlConnector::new(ConnectionConfig::sqlite(&path));
        db.try_open().await?;
        create_table(&db, &schema, None).await?;
        Ok::<_, SqlConduitError>(db)
    });
    let Ok(db) = db else {
        return;
    };

    let mut group = c.benchmark_group("records_insert_sqlite");
    for count in [10, 100, 500] {
        let rows = generate_rows(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &rows, |b, rows| {
            b.to_async(&rt).iter(|| async {
                // roll back so every iteration inserts into an empty table
                let Ok(mut tx) = db.trans_begin(None).await else {
                    return;
                };
                let _ = records_insert((&db, &mut tx), rows, &schema, None, None).await;
                db.trans_rollback(tx, None).await;
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_sanitize, benchmark_sqlite_insert);
criterion_main!(benches);
