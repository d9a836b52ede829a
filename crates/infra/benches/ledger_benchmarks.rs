use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use stockbook_core::{ActorContext, Document, PartyId, ProductId, UserId, ZoneId};
use stockbook_infra::engine::{
    CreateSale, CreateSupply, DocumentEngine, RegisterParty, UpdateSale, UpdateSupply,
};
use stockbook_infra::reference::ReferenceGenerator;
use stockbook_infra::store::{InMemoryLedgerStore, LedgerStore};
use stockbook_ledger::PartyKind;
use stockbook_purchasing::{SupplyLineInput, SupplyStatus};
use stockbook_sales::{SaleLineInput, SaleStatus};

struct Fixture {
    engine: DocumentEngine,
    actor: ActorContext,
    client: PartyId,
    zone: ZoneId,
    products: Vec<ProductId>,
}

/// Engine over a fresh in-memory store with `products` stocked deep enough
/// for every iteration.
async fn fixture(products: usize) -> Fixture {
    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
    let engine = DocumentEngine::new(store, ReferenceGenerator::default());
    let actor = ActorContext::now(UserId::new());
    let zone = ZoneId::new();
    let products: Vec<ProductId> = (0..products).map(|_| ProductId::new()).collect();

    let register = |kind, name: &str| RegisterParty {
        kind,
        name: name.to_string(),
        currency: "EUR".to_string(),
    };
    let (client, _) = engine
        .register_party(register(PartyKind::Client, "Bench client"), &actor)
        .await
        .expect("register client");
    let (supplier, _) = engine
        .register_party(register(PartyKind::Supplier, "Bench supplier"), &actor)
        .await
        .expect("register supplier");

    let supply = engine
        .create_supply(
            CreateSupply {
                reference: None,
                supplier_id: supplier.id,
                zone_id: zone,
                items: products
                    .iter()
                    .map(|&product_id| SupplyLineInput {
                        id: None,
                        product_id,
                        quantity: dec!(1000000000),
                        received_quantity: None,
                        unit_price: dec!(1),
                    })
                    .collect(),
                planned_payment: None,
                payment_account: None,
                notes: None,
            },
            &actor,
        )
        .await
        .expect("create supply")
        .document;
    engine
        .update_supply(
            supply.id(),
            UpdateSupply {
                status: Some(SupplyStatus::Received),
                ..Default::default()
            },
            &actor,
        )
        .await
        .expect("receive supply");

    Fixture {
        engine,
        actor,
        client: client.id,
        zone,
        products,
    }
}

fn sale_command(fixture: &Fixture) -> CreateSale {
    CreateSale {
        reference: None,
        client_id: fixture.client,
        zone_id: fixture.zone,
        status: None,
        items: fixture
            .products
            .iter()
            .map(|&product_id| SaleLineInput {
                id: None,
                product_id,
                quantity: Decimal::ONE,
                unit_price: dec!(9.99),
            })
            .collect(),
        notes: None,
    }
}

fn bench_sale_create(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("sale_create");

    for lines in [1usize, 10, 50] {
        let fixture = runtime.block_on(fixture(lines));
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, _| {
            b.to_async(&runtime).iter(|| async {
                let sale = fixture
                    .engine
                    .create_sale(sale_command(&fixture), &fixture.actor)
                    .await
                    .expect("create sale");
                black_box(sale);
            });
        });
    }
    group.finish();
}

fn bench_sale_create_then_cancel(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("sale_create_cancel");

    for lines in [1usize, 10] {
        let fixture = runtime.block_on(fixture(lines));
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, _| {
            b.to_async(&runtime).iter(|| async {
                let sale = fixture
                    .engine
                    .create_sale(sale_command(&fixture), &fixture.actor)
                    .await
                    .expect("create sale")
                    .document;
                let cancelled = fixture
                    .engine
                    .update_sale(
                        sale.id(),
                        UpdateSale {
                            status: Some(SaleStatus::Cancelled),
                            ..Default::default()
                        },
                        &fixture.actor,
                    )
                    .await
                    .expect("cancel sale");
                black_box(cancelled);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sale_create, bench_sale_create_then_cancel);
criterion_main!(benches);
