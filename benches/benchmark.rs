use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use sqlforge::criteria::{Criteria, FieldCriteria};
use sqlforge::hydrate::{CoercionEngine, FieldCache, Hydrate, Hydrator, MemberMap};
use sqlforge::statement::StatementBuilder;
use sqlforge::value::Value;

#[derive(Default)]
struct Order {
    id: i64,
    customer: String,
    total: f64,
    shipped: Option<chrono::NaiveDateTime>,
    express: bool,
}

impl Hydrate for Order {
    fn describe(map: &mut MemberMap<Self>) {
        map.field("Id", |o: &mut Order, v| o.id = v)
            .field("Customer", |o: &mut Order, v| o.customer = v)
            .field("Total", |o: &mut Order, v| o.total = v)
            .field("Shipped", |o: &mut Order, v| o.shipped = v)
            .field("Express", |o: &mut Order, v| o.express = v);
    }
}

fn criteria(fields: usize) -> Criteria {
    let mut criteria = Criteria::new();
    criteria.begin_group();
    criteria.add_fields_match_all(
        (0..fields)
            .map(|i| FieldCriteria::new(&format!("Column{}", i)).greater_than(i as i64)),
    );
    criteria
        .end_group()
        .or()
        .like("Customer", "acme widgets", true);
    criteria
}

pub fn criterion_benchmark(c: &mut Criterion) {
    for fields in [1, 10, 100] {
        let criteria = criteria(fields);
        c.bench_function(&format!("compile {} fields", fields), |b| {
            b.iter(|| {
                let mut target = StatementBuilder::new();
                criteria.compile(&mut target);
                black_box(target.build())
            })
        });
    }

    let hydrator = Hydrator::new(Arc::new(FieldCache::new()), CoercionEngine::standard());
    let columns: Vec<String> = ["ID", "customer", "Total", "Shipped", "Express", "Unmapped"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let row = vec![
        Value::Int(7),
        Value::from("Acme"),
        Value::from("199.95"),
        Value::from("2024-03-01 08:30:00"),
        Value::from("yes"),
        Value::Null,
    ];
    c.bench_function("fill one", |b| {
        b.iter(|| black_box(hydrator.fill_one::<Order>(black_box(&columns), black_box(&row))))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
