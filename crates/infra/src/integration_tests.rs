//! Integration tests for the full document pipeline.
//!
//! Tests: Engine → Mutator → UnitOfWork → Balance + Ledger stores → Reports
//!
//! Verifies:
//! - Stock levels always equal the sum of their stock card
//! - Every money posting nets to zero across its two legs
//! - Trigger transitions apply their effects exactly once
//! - Any failure leaves both stores exactly as they were

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use stockbook_core::{
        AccountId, ActorContext, Document, DomainError, PartyId, PaymentStatus, ProductId, UserId,
        ZoneId,
    };
    use stockbook_inventory::{CountLineInput, CountStatus, TransferLineInput, TransferStatus};
    use stockbook_ledger::{AccountType, PartyKind, StockMovementType};
    use stockbook_purchasing::{SupplyLineInput, SupplyStatus};
    use stockbook_sales::{SaleLineInput, SaleStatus};
    use stockbook_treasury::{CashOperationKind, CashStatus};

    use crate::engine::{
        CreateCashOperation, CreateInventory, CreateSale, CreateSupply, CreateTransfer,
        DocumentEngine, EngineError, OpenAccount, RecordSalePayment, RecordSupplyPayment,
        RegisterParty, UpdateCashOperation, UpdateInventory, UpdateSale, UpdateSupply,
        UpdateTransfer,
    };
    use crate::reference::ReferenceGenerator;
    use crate::reporting::Reports;
    use crate::store::{
        AccountMovementFilter, InMemoryLedgerStore, LedgerStore, Pagination, StockLevelFilter,
        StockMovementFilter,
    };

    struct Harness {
        store: Arc<dyn LedgerStore>,
        engine: DocumentEngine,
        reports: Reports,
        actor: ActorContext,
        cash: AccountId,
    }

    async fn setup() -> Harness {
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        let engine = DocumentEngine::new(store.clone(), ReferenceGenerator::default());
        let reports = Reports::new(store.clone(), dec!(5));
        let actor = ActorContext::now(UserId::new());
        let cash = engine
            .open_account(
                OpenAccount {
                    name: "Till".into(),
                    account_type: AccountType::Cash,
                    currency: "EUR".into(),
                },
                &actor,
            )
            .await
            .unwrap()
            .id;
        Harness {
            store,
            engine,
            reports,
            actor,
            cash,
        }
    }

    impl Harness {
        async fn party(&self, kind: PartyKind, name: &str) -> (PartyId, AccountId) {
            let (party, account) = self
                .engine
                .register_party(
                    RegisterParty {
                        kind,
                        name: name.into(),
                        currency: "EUR".into(),
                    },
                    &self.actor,
                )
                .await
                .unwrap();
            (party.id, account.id)
        }

        /// Put `quantity` of `product` into `zone` through a received supply.
        async fn receive(&self, product: ProductId, zone: ZoneId, quantity: Decimal) {
            let (supplier, _) = self.party(PartyKind::Supplier, "Seed supplier").await;
            let supply = self
                .engine
                .create_supply(
                    CreateSupply {
                        reference: None,
                        supplier_id: supplier,
                        zone_id: zone,
                        items: vec![supply_line(product, quantity, dec!(1))],
                        planned_payment: None,
                        payment_account: None,
                        notes: None,
                    },
                    &self.actor,
                )
                .await
                .unwrap()
                .document;
            self.engine
                .update_supply(
                    supply.id(),
                    UpdateSupply {
                        status: Some(SupplyStatus::Received),
                        ..Default::default()
                    },
                    &self.actor,
                )
                .await
                .unwrap();
        }

        async fn stock(&self, product: ProductId, zone: ZoneId) -> Decimal {
            let filter = StockLevelFilter {
                product_id: Some(product),
                zone_id: Some(zone),
            };
            self.store
                .stock_levels(&filter)
                .await
                .unwrap()
                .first()
                .map(|level| level.quantity)
                .unwrap_or_default()
        }

        async fn balance(&self, account: AccountId) -> Decimal {
            self.store.account(account).await.unwrap().unwrap().current_balance
        }

        async fn stock_card_len(&self) -> u64 {
            self.store
                .stock_movements(&StockMovementFilter::default(), Pagination::all())
                .await
                .unwrap()
                .total
        }

        async fn statement_len(&self) -> u64 {
            self.store
                .account_movements(&AccountMovementFilter::default(), Pagination::all())
                .await
                .unwrap()
                .total
        }

        async fn assert_reconciled(&self) {
            let report = self.reports.reconcile().await.unwrap();
            assert!(report.is_consistent(), "violations: {:?}", report.violations);
        }
    }

    fn sale_line(product: ProductId, quantity: Decimal, unit_price: Decimal) -> SaleLineInput {
        SaleLineInput {
            id: None,
            product_id: product,
            quantity,
            unit_price,
        }
    }

    fn supply_line(product: ProductId, quantity: Decimal, unit_price: Decimal) -> SupplyLineInput {
        SupplyLineInput {
            id: None,
            product_id: product,
            quantity,
            received_quantity: None,
            unit_price,
        }
    }

    fn new_sale(client: PartyId, zone: ZoneId, items: Vec<SaleLineInput>) -> CreateSale {
        CreateSale {
            reference: None,
            client_id: client,
            zone_id: zone,
            status: None,
            items,
            notes: None,
        }
    }

    fn domain(err: EngineError) -> DomainError {
        match err {
            EngineError::Domain(err) => err,
            other => panic!("expected a domain error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn sale_payment_and_cancellation_round_trip_the_ledger() {
        let h = setup().await;
        let (product, zone) = (ProductId::new(), ZoneId::new());
        h.receive(product, zone, dec!(50)).await;
        let (client, client_account) = h.party(PartyKind::Client, "Ada").await;

        let created = h
            .engine
            .create_sale(new_sale(client, zone, vec![sale_line(product, dec!(10), dec!(10))]), &h.actor)
            .await
            .unwrap();
        assert_eq!(h.stock(product, zone).await, dec!(40));
        assert_eq!(created.effects.stock_movements.len(), 1);
        assert_eq!(created.effects.stock_movements[0].quantity_out, dec!(10));
        assert_eq!(created.effects.stock_movements[0].balance_after, dec!(40));
        let sale_id = created.document.id();

        let paid = h
            .engine
            .record_sale_payment(
                sale_id,
                RecordSalePayment {
                    amount: dec!(100),
                    source_account: None,
                    target_account: h.cash,
                },
                &h.actor,
            )
            .await
            .unwrap();
        assert_eq!(paid.document.payment().payment_status(), PaymentStatus::Paid);
        assert_eq!(paid.document.status(), SaleStatus::Paid);
        assert_eq!(
            paid.effects.account_movements.iter().map(|m| m.signed()).sum::<Decimal>(),
            Decimal::ZERO
        );
        assert_eq!(h.balance(client_account).await, dec!(-100));
        assert_eq!(h.balance(h.cash).await, dec!(100));

        let stock_rows = h.stock_card_len().await;
        let money_rows = h.statement_len().await;
        let cancelled = h
            .engine
            .update_sale(
                sale_id,
                UpdateSale {
                    status: Some(SaleStatus::Cancelled),
                    ..Default::default()
                },
                &h.actor,
            )
            .await
            .unwrap();

        assert_eq!(h.stock(product, zone).await, dec!(50));
        assert_eq!(h.stock_card_len().await, stock_rows + 1);
        assert_eq!(cancelled.effects.stock_movements[0].quantity_in, dec!(10));
        assert_eq!(
            cancelled.effects.stock_movements[0].transaction_type,
            StockMovementType::Return
        );
        assert_eq!(h.statement_len().await, money_rows + 2);
        assert_eq!(h.balance(client_account).await, Decimal::ZERO);
        assert_eq!(h.balance(h.cash).await, Decimal::ZERO);
        assert_eq!(cancelled.document.payment().paid_amount(), Decimal::ZERO);
        assert_eq!(cancelled.document.payment().remaining_amount(), dec!(100));
        h.assert_reconciled().await;
    }

    #[tokio::test]
    async fn failed_sale_leaves_both_stores_untouched() {
        let h = setup().await;
        let (product, zone) = (ProductId::new(), ZoneId::new());
        h.receive(product, zone, dec!(50)).await;
        let (client, _) = h.party(PartyKind::Client, "Ada").await;
        let stock_rows = h.stock_card_len().await;

        let err = h
            .engine
            .create_sale(
                new_sale(
                    client,
                    zone,
                    vec![
                        sale_line(product, dec!(30), dec!(1)),
                        sale_line(product, dec!(30), dec!(1)),
                    ],
                ),
                &h.actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            domain(err),
            DomainError::InsufficientStock { available, requested, .. }
                if available == dec!(50) && requested == dec!(60)
        ));
        assert_eq!(h.stock(product, zone).await, dec!(50));
        assert_eq!(h.stock_card_len().await, stock_rows);

        // The reference counter rolled back with everything else.
        let sale = h
            .engine
            .create_sale(new_sale(client, zone, vec![sale_line(product, dec!(5), dec!(1))]), &h.actor)
            .await
            .unwrap()
            .document;
        assert!(sale.reference().starts_with("SL-"));
        assert!(sale.reference().ends_with("-0001"));
    }

    #[tokio::test]
    async fn sale_deducts_on_creation_while_supply_adds_only_on_receipt() {
        let h = setup().await;
        let (product, zone) = (ProductId::new(), ZoneId::new());
        let (supplier, _) = h.party(PartyKind::Supplier, "Acme").await;
        let (client, _) = h.party(PartyKind::Client, "Ada").await;

        let supply = h
            .engine
            .create_supply(
                CreateSupply {
                    reference: None,
                    supplier_id: supplier,
                    zone_id: zone,
                    items: vec![supply_line(product, dec!(8), dec!(2))],
                    planned_payment: None,
                    payment_account: None,
                    notes: None,
                },
                &h.actor,
            )
            .await
            .unwrap();
        assert!(supply.effects.is_empty());
        assert_eq!(h.stock(product, zone).await, Decimal::ZERO);

        h.engine
            .update_supply(
                supply.document.id(),
                UpdateSupply {
                    status: Some(SupplyStatus::Received),
                    ..Default::default()
                },
                &h.actor,
            )
            .await
            .unwrap();
        assert_eq!(h.stock(product, zone).await, dec!(8));

        let sale = h
            .engine
            .create_sale(new_sale(client, zone, vec![sale_line(product, dec!(3), dec!(5))]), &h.actor)
            .await
            .unwrap();
        assert_eq!(sale.document.status(), SaleStatus::Pending);
        assert_eq!(sale.effects.stock_movements.len(), 1);
        assert_eq!(h.stock(product, zone).await, dec!(5));
    }

    #[tokio::test]
    async fn supply_receipt_applies_exactly_once() {
        let h = setup().await;
        let zone = ZoneId::new();
        let (a, b) = (ProductId::new(), ProductId::new());
        let (supplier, supplier_account) = h.party(PartyKind::Supplier, "Acme").await;

        let supply = h
            .engine
            .create_supply(
                CreateSupply {
                    reference: None,
                    supplier_id: supplier,
                    zone_id: zone,
                    items: vec![supply_line(a, dec!(10), dec!(3)), supply_line(b, dec!(4), dec!(5))],
                    planned_payment: Some(dec!(20)),
                    payment_account: Some(h.cash),
                    notes: None,
                },
                &h.actor,
            )
            .await
            .unwrap()
            .document;
        assert_eq!(supply.payment().total_amount(), dec!(50));

        let received = UpdateSupply {
            status: Some(SupplyStatus::Received),
            ..Default::default()
        };
        let first = h
            .engine
            .update_supply(supply.id(), received.clone(), &h.actor)
            .await
            .unwrap();
        assert_eq!(first.effects.stock_movements.len(), 2);
        assert_eq!(first.effects.account_movements.len(), 2);
        assert_eq!(first.document.payment().paid_amount(), dec!(20));
        assert_eq!(
            first.document.payment().payment_status(),
            PaymentStatus::PartiallyPaid
        );
        assert_eq!(h.balance(supplier_account).await, dec!(20));
        assert_eq!(h.balance(h.cash).await, dec!(-20));

        let stock_rows = h.stock_card_len().await;
        let money_rows = h.statement_len().await;
        let again = h
            .engine
            .update_supply(supply.id(), received, &h.actor)
            .await
            .unwrap();
        assert!(again.effects.is_empty());
        assert_eq!(h.stock_card_len().await, stock_rows);
        assert_eq!(h.statement_len().await, money_rows);
        assert_eq!(h.stock(a, zone).await, dec!(10));
        assert_eq!(h.stock(b, zone).await, dec!(4));

        let overpaid = h
            .engine
            .record_supply_payment(
                supply.id(),
                RecordSupplyPayment {
                    amount: dec!(40),
                    source_account: h.cash,
                },
                &h.actor,
            )
            .await
            .unwrap();
        assert_eq!(overpaid.document.payment().payment_status(), PaymentStatus::Overpaid);
        assert_eq!(overpaid.document.payment().remaining_amount(), dec!(-10));
        h.assert_reconciled().await;
    }

    #[tokio::test]
    async fn inventory_count_overwrites_the_level() {
        let h = setup().await;
        let (product, zone) = (ProductId::new(), ZoneId::new());
        h.receive(product, zone, dec!(20)).await;

        let count = h
            .engine
            .create_inventory(
                CreateInventory {
                    reference: None,
                    zone_id: zone,
                    items: vec![CountLineInput {
                        id: None,
                        product_id: product,
                        expected_quantity: None,
                        actual_quantity: dec!(15),
                    }],
                    notes: None,
                },
                &h.actor,
            )
            .await
            .unwrap()
            .document;
        assert_eq!(count.items()[0].expected_quantity, dec!(20));
        assert_eq!(count.items()[0].difference, dec!(-5));
        assert!(count.reference().starts_with("INV-"));

        for status in [CountStatus::InProgress, CountStatus::Completed] {
            h.engine
                .update_inventory(
                    count.id(),
                    UpdateInventory {
                        status: Some(status),
                        ..Default::default()
                    },
                    &h.actor,
                )
                .await
                .unwrap();
        }

        assert_eq!(h.stock(product, zone).await, dec!(15));
        let card = h
            .store
            .stock_movements(
                &StockMovementFilter {
                    transaction_type: Some(StockMovementType::InventoryAdjustment),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(card.items.len(), 1);
        assert_eq!(card.items[0].quantity_out, dec!(5));
        assert_eq!(card.items[0].balance_after, dec!(15));
        h.assert_reconciled().await;
    }

    #[tokio::test]
    async fn transfer_moves_goods_only_when_the_source_holds_them() {
        let h = setup().await;
        let product = ProductId::new();
        let (from, to) = (ZoneId::new(), ZoneId::new());
        h.receive(product, from, dec!(6)).await;

        let transfer = h
            .engine
            .create_transfer(
                CreateTransfer {
                    reference: None,
                    from_zone: from,
                    to_zone: to,
                    items: vec![
                        TransferLineInput {
                            id: None,
                            product_id: product,
                            quantity: dec!(4),
                        },
                        TransferLineInput {
                            id: None,
                            product_id: product,
                            quantity: dec!(4),
                        },
                    ],
                    notes: None,
                },
                &h.actor,
            )
            .await
            .unwrap()
            .document;

        let complete = UpdateTransfer {
            status: Some(TransferStatus::Completed),
            ..Default::default()
        };
        let err = h
            .engine
            .update_transfer(transfer.id(), complete.clone(), &h.actor)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::InsufficientStock { .. }));
        assert_eq!(h.stock(product, from).await, dec!(6));
        assert_eq!(h.stock(product, to).await, Decimal::ZERO);

        h.receive(product, from, dec!(2)).await;
        let done = h
            .engine
            .update_transfer(transfer.id(), complete, &h.actor)
            .await
            .unwrap();
        assert_eq!(done.effects.stock_movements.len(), 4);
        assert_eq!(h.stock(product, from).await, Decimal::ZERO);
        assert_eq!(h.stock(product, to).await, dec!(8));
        h.assert_reconciled().await;
    }

    #[tokio::test]
    async fn sale_item_edits_move_only_the_difference() {
        let h = setup().await;
        let (product, zone) = (ProductId::new(), ZoneId::new());
        h.receive(product, zone, dec!(10)).await;
        let (client, _) = h.party(PartyKind::Client, "Ada").await;

        let sale = h
            .engine
            .create_sale(new_sale(client, zone, vec![sale_line(product, dec!(4), dec!(2))]), &h.actor)
            .await
            .unwrap()
            .document;
        let line = sale.items()[0].id;

        let edited = h
            .engine
            .update_sale(
                sale.id(),
                UpdateSale {
                    expected_version: Some(sale.version()),
                    items: Some(vec![SaleLineInput {
                        id: Some(line),
                        ..sale_line(product, dec!(7), dec!(2))
                    }]),
                    ..Default::default()
                },
                &h.actor,
            )
            .await
            .unwrap();
        assert_eq!(h.stock(product, zone).await, dec!(3));
        assert_eq!(edited.effects.stock_movements[0].quantity_out, dec!(3));
        assert_eq!(edited.document.payment().total_amount(), dec!(14));

        let stale = h
            .engine
            .update_sale(
                sale.id(),
                UpdateSale {
                    expected_version: Some(sale.version()),
                    status: Some(SaleStatus::Confirmed),
                    ..Default::default()
                },
                &h.actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(domain(stale), DomainError::Conflict(_)));
        h.assert_reconciled().await;
    }

    #[tokio::test]
    async fn sales_reject_overpayment_and_guard_deletion() {
        let h = setup().await;
        let (product, zone) = (ProductId::new(), ZoneId::new());
        h.receive(product, zone, dec!(10)).await;
        let (client, _) = h.party(PartyKind::Client, "Ada").await;

        let sale = h
            .engine
            .create_sale(new_sale(client, zone, vec![sale_line(product, dec!(2), dec!(25))]), &h.actor)
            .await
            .unwrap()
            .document;

        let over = h
            .engine
            .record_sale_payment(
                sale.id(),
                RecordSalePayment {
                    amount: dec!(60),
                    source_account: None,
                    target_account: h.cash,
                },
                &h.actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(domain(over), DomainError::Validation(_)));

        h.engine
            .update_sale(
                sale.id(),
                UpdateSale {
                    status: Some(SaleStatus::Confirmed),
                    ..Default::default()
                },
                &h.actor,
            )
            .await
            .unwrap();
        let err = h.engine.delete_sale(sale.id(), &h.actor).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::InvalidStateTransition { .. }));
        assert_eq!(h.stock(product, zone).await, dec!(8));

        let pending = h
            .engine
            .create_sale(new_sale(client, zone, vec![sale_line(product, dec!(3), dec!(1))]), &h.actor)
            .await
            .unwrap()
            .document;
        assert_eq!(h.stock(product, zone).await, dec!(5));
        let reversed = h.engine.delete_sale(pending.id(), &h.actor).await.unwrap();
        assert_eq!(reversed.stock_movements.len(), 1);
        assert_eq!(h.stock(product, zone).await, dec!(8));
        let missing = h
            .engine
            .get::<stockbook_sales::Sale>(pending.id())
            .await
            .unwrap_err();
        assert!(matches!(domain(missing), DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleted_sale_reference_with_payments_stays_taken() {
        let h = setup().await;
        let (product, zone) = (ProductId::new(), ZoneId::new());
        h.receive(product, zone, dec!(10)).await;
        let (client, client_account) = h.party(PartyKind::Client, "Ada").await;

        let mut command = new_sale(client, zone, vec![sale_line(product, dec!(1), dec!(20))]);
        command.reference = Some("WALK-IN-1".into());
        let sale = h.engine.create_sale(command.clone(), &h.actor).await.unwrap().document;
        h.engine
            .record_sale_payment(
                sale.id(),
                RecordSalePayment {
                    amount: dec!(20),
                    source_account: None,
                    target_account: h.cash,
                },
                &h.actor,
            )
            .await
            .unwrap();
        h.engine
            .update_sale(
                sale.id(),
                UpdateSale {
                    status: Some(SaleStatus::Cancelled),
                    ..Default::default()
                },
                &h.actor,
            )
            .await
            .unwrap();
        h.engine.delete_sale(sale.id(), &h.actor).await.unwrap();

        let err = h.engine.create_sale(command, &h.actor).await.unwrap_err();
        assert!(matches!(domain(err), DomainError::Conflict(_)));
        assert_eq!(h.stock(product, zone).await, dec!(10));
        assert_eq!(h.balance(client_account).await, dec!(0));
        assert_eq!(h.balance(h.cash).await, dec!(0));
    }

    #[tokio::test]
    async fn payments_need_existing_accounts() {
        let h = setup().await;
        let (product, zone) = (ProductId::new(), ZoneId::new());
        h.receive(product, zone, dec!(10)).await;
        let (client, _) = h.party(PartyKind::Client, "Ada").await;
        let sale = h
            .engine
            .create_sale(new_sale(client, zone, vec![sale_line(product, dec!(1), dec!(5))]), &h.actor)
            .await
            .unwrap()
            .document;

        let err = h
            .engine
            .record_sale_payment(
                sale.id(),
                RecordSalePayment {
                    amount: dec!(5),
                    source_account: None,
                    target_account: AccountId::new(),
                },
                &h.actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::AccountNotFound(_)));

        let (supplier, _) = h.party(PartyKind::Supplier, "Acme").await;
        let wrong_kind = h
            .engine
            .create_sale(new_sale(supplier, zone, vec![sale_line(product, dec!(1), dec!(5))]), &h.actor)
            .await
            .unwrap_err();
        assert!(matches!(domain(wrong_kind), DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn cash_operations_post_on_confirm_and_mirror_on_cancel() {
        let h = setup().await;
        let bank = h
            .engine
            .open_account(
                OpenAccount {
                    name: "Bank".into(),
                    account_type: AccountType::Bank,
                    currency: "EUR".into(),
                },
                &h.actor,
            )
            .await
            .unwrap()
            .id;

        let operation = h
            .engine
            .create_cash_operation(
                CreateCashOperation {
                    reference: None,
                    kind: CashOperationKind::Transfer,
                    amount: dec!(75),
                    source_account: h.cash,
                    target_account: bank,
                    notes: Some("float".into()),
                },
                &h.actor,
            )
            .await
            .unwrap()
            .document;
        assert!(operation.reference().starts_with("ATR-"));
        assert_eq!(h.statement_len().await, 0);

        let confirm = |status| UpdateCashOperation {
            expected_version: None,
            status,
        };
        h.engine
            .update_cash_operation(operation.id(), confirm(CashStatus::Confirmed), &h.actor)
            .await
            .unwrap();
        assert_eq!(h.balance(h.cash).await, dec!(-75));
        assert_eq!(h.balance(bank).await, dec!(75));

        h.engine
            .update_cash_operation(operation.id(), confirm(CashStatus::Cancelled), &h.actor)
            .await
            .unwrap();
        assert_eq!(h.balance(h.cash).await, Decimal::ZERO);
        assert_eq!(h.balance(bank).await, Decimal::ZERO);
        assert_eq!(h.statement_len().await, 4);

        let (_, client_account) = h.party(PartyKind::Client, "Ada").await;
        let err = h
            .engine
            .create_cash_operation(
                CreateCashOperation {
                    reference: None,
                    kind: CashOperationKind::Expense,
                    amount: dec!(5),
                    source_account: h.cash,
                    target_account: client_account,
                    notes: None,
                },
                &h.actor,
            )
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::Validation(_)));
        h.assert_reconciled().await;
    }

    #[tokio::test]
    async fn reports_summarise_sales_and_stock() {
        let h = setup().await;
        let (a, b, zone) = (ProductId::new(), ProductId::new(), ZoneId::new());
        h.receive(a, zone, dec!(20)).await;
        h.receive(b, zone, dec!(4)).await;
        let (client, _) = h.party(PartyKind::Client, "Ada").await;

        h.engine
            .create_sale(
                new_sale(
                    client,
                    zone,
                    vec![sale_line(a, dec!(6), dec!(10)), sale_line(b, dec!(1), dec!(10))],
                ),
                &h.actor,
            )
            .await
            .unwrap();

        let now = chrono::Utc::now();
        let period = crate::reporting::Period::Day;
        let top = h.reports.top_products(period, 10, now).await.unwrap();
        assert_eq!(top[0].product_id, a);
        assert_eq!(top[0].quantity_sold, dec!(6));

        let dashboard = h.reports.dashboard(period, now).await.unwrap();
        assert_eq!(dashboard.sales_count, 1);
        assert_eq!(dashboard.revenue, dec!(70));
        assert_eq!(dashboard.receivables, dec!(70));

        let low = h.reports.low_stock(None, Some(zone)).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id, b);

        let trend = h.reports.revenue_trend(period, now).await.unwrap();
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].revenue, dec!(70));

        let outstanding = h.reports.outstanding_balances().await.unwrap();
        let ada = outstanding.parties.iter().find(|p| p.party_id == client).unwrap();
        assert_eq!(ada.open_amount, dec!(70));
    }
}
