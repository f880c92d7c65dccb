use std::sync::Arc;

use bus::InMemoryEventBus;
use common::{ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CreateOrder, Money, NewProduct, OrderLine, Product};
use store::{InMemoryStore, OrderStore};
use workflow::{ExpirySweeper, OrderService, Shutdown};

fn bench_service() -> (tokio::runtime::Runtime, Arc<OrderService<InMemoryStore, InMemoryEventBus>>, ProductId) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::with_sample_data();
    let product = rt.block_on(async {
        store
            .insert_product(NewProduct::new(
                "Bench Product",
                Money::from_cents(1250),
                Product::MAX_STOCK,
            ))
            .await
            .unwrap()
    });
    let service = Arc::new(OrderService::new(store, InMemoryEventBus::new()));
    (rt, service, product.id)
}

fn bench_create_order_single_line(c: &mut Criterion) {
    let (rt, service, product_id) = bench_service();

    c.bench_function("workflow/create_order_single_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .create_order(CreateOrder::new(
                        UserId::new(1),
                        vec![OrderLine::new(product_id, 1)],
                    ))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_create_order_ten_lines(c: &mut Criterion) {
    let (rt, service, product_id) = bench_service();
    let lines: Vec<OrderLine> = (0..10).map(|_| OrderLine::new(product_id, 1)).collect();

    c.bench_function("workflow/create_order_ten_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .create_order(CreateOrder::new(UserId::new(1), lines.clone()))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_sweep_100_stale_orders(c: &mut Criterion) {
    c.bench_function("workflow/sweep_100_stale_orders", |b| {
        let (rt, service, product_id) = bench_service();
        b.iter(|| {
            rt.block_on(async {
                for _ in 0..100 {
                    service
                        .create_order(CreateOrder::new(
                            UserId::new(1),
                            vec![OrderLine::new(product_id, 1)],
                        ))
                        .await
                        .unwrap();
                }
                let sweeper = ExpirySweeper::new(
                    Arc::clone(&service),
                    0,
                    std::time::Duration::from_secs(60),
                );
                sweeper.sweep_once(&Shutdown::new()).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_order_single_line,
    bench_create_order_ten_lines,
    bench_sweep_100_stale_orders,
);
criterion_main!(benches);
