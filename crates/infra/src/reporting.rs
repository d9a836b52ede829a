//! Query and reporting layer.
//!
//! Read-only aggregations over the balance and ledger stores. Nothing here
//! opens a unit of work or mutates a row.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{info, instrument, warn};

use stockbook_core::{
    AccountId, ActorContext, Document, DocumentId, DomainError, DomainResult, EntryId, PartyId,
    PaymentSummary, ProductId, UserId, ZoneId,
};
use stockbook_ledger::{
    AccountMovement, PartyKind, StockLevel, StockMovementType,
    consistency::{verify_account_statement, verify_entries_balanced, verify_stock_card},
};
use stockbook_purchasing::{Supply, SupplyStatus};
use stockbook_sales::{Sale, SaleStatus};

use crate::engine::EngineResult;
use crate::store::{
    AccountMovementFilter, LedgerStore, Pagination, StockLevelFilter, StockMovementFilter,
};

/// Reporting window selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "period", rename_all = "snake_case")]
pub enum Period {
    Day,
    Week,
    #[default]
    Month,
    Year,
    Custom {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl Period {
    /// Parse the `period` query value; `custom` needs both bounds.
    pub fn parse(
        period: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> DomainResult<Self> {
        match period.unwrap_or("month") {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            "custom" => match (from, to) {
                (Some(from), Some(to)) => Ok(Period::Custom { from, to }),
                _ => Err(DomainError::validation("a custom period needs `from` and `to`")),
            },
            other => Err(DomainError::validation(format!("unknown period: {other}"))),
        }
    }

    /// The calendar day/week/month/year containing `now`, or the custom range.
    ///
    /// Weeks start on Monday.
    pub fn resolve(self, now: DateTime<Utc>) -> DomainResult<DateRange> {
        let today = now.date_naive();
        let (start, end) = match self {
            Period::Custom { from, to } => return DateRange::new(from, to),
            Period::Day => (today, today.checked_add_days(Days::new(1))),
            Period::Week => {
                let start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                (start, start.checked_add_days(Days::new(7)))
            }
            Period::Month => {
                let start = today.with_day(1).unwrap_or(today);
                (start, start.checked_add_months(Months::new(1)))
            }
            Period::Year => {
                let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
                (start, start.checked_add_months(Months::new(12)))
            }
        };
        let end = end.ok_or_else(|| DomainError::validation("period end is out of range"))?;
        DateRange::new(midnight(start), midnight(end))
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Half-open `[from, to)` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Longest range a daily trend is built for.
pub const MAX_TREND_DAYS: i64 = 366;

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> DomainResult<Self> {
        if from >= to {
            return Err(DomainError::validation(format!(
                "empty period: {from} is not before {to}"
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.to
    }

    /// Days of the range for a daily trend, refusing spans over
    /// [`MAX_TREND_DAYS`].
    fn trend_days(&self) -> DomainResult<Vec<NaiveDate>> {
        if self.to - self.from > Duration::days(MAX_TREND_DAYS) {
            return Err(DomainError::validation(format!(
                "a revenue trend covers at most {MAX_TREND_DAYS} days"
            )));
        }
        Ok(self.days().collect())
    }

    fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let last = (self.to - Duration::nanoseconds(1)).date_naive();
        self.from
            .date_naive()
            .iter_days()
            .take_while(move |day| *day <= last)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub range: DateRange,
    pub sales_count: u64,
    /// Total of non-cancelled sales dated in the range.
    pub revenue: Decimal,
    /// Paid amount of those sales.
    pub collected: Decimal,
    pub supplies_received: u64,
    pub supplies_received_value: Decimal,
    /// Remaining amount over all open sales.
    pub receivables: Decimal,
    /// Remaining amount over all received supplies (negative when overpaid).
    pub payables: Decimal,
    pub low_stock_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    /// Sold minus returned.
    pub quantity_sold: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenuePoint {
    pub day: NaiveDate,
    pub sales_count: u64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartyOutstanding {
    pub party_id: PartyId,
    pub kind: PartyKind,
    pub name: String,
    pub account_id: AccountId,
    pub account_balance: Decimal,
    /// Remaining amount over the party's open sales or received supplies.
    pub open_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutstandingBalances {
    /// Sum of current balances per account type.
    pub by_account_type: BTreeMap<String, Decimal>,
    pub parties: Vec<PartyOutstanding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub stock_levels_checked: u64,
    pub accounts_checked: u64,
    pub entries_checked: u64,
    pub documents_checked: u64,
    pub violations: Vec<Violation>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    fn record(&mut self, subject: impl Into<String>, result: DomainResult<()>) {
        if let Err(err) = result {
            self.violations.push(Violation {
                subject: subject.into(),
                message: err.to_string(),
            });
        }
    }
}

#[derive(Clone)]
pub struct Reports {
    store: Arc<dyn LedgerStore>,
    low_stock_threshold: Decimal,
}

impl Reports {
    pub fn new(store: Arc<dyn LedgerStore>, low_stock_threshold: Decimal) -> Self {
        Self {
            store,
            low_stock_threshold,
        }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, period: Period, now: DateTime<Utc>) -> EngineResult<Dashboard> {
        let range = period.resolve(now)?;
        let sales: Vec<Sale> = self.all_documents().await?;
        let supplies: Vec<Supply> = self.all_documents().await?;

        let mut dashboard = Dashboard {
            range,
            sales_count: 0,
            revenue: Decimal::ZERO,
            collected: Decimal::ZERO,
            supplies_received: 0,
            supplies_received_value: Decimal::ZERO,
            receivables: Decimal::ZERO,
            payables: Decimal::ZERO,
            low_stock_count: self.low_stock(None, None).await?.len() as u64,
        };
        for sale in sales.iter().filter(|s| s.status() != SaleStatus::Cancelled) {
            dashboard.receivables += sale.payment().remaining_amount();
            if range.contains(sale.date()) {
                dashboard.sales_count += 1;
                dashboard.revenue += sale.payment().total_amount();
                dashboard.collected += sale.payment().paid_amount();
            }
        }
        for supply in supplies.iter().filter(|s| s.status() == SupplyStatus::Received) {
            dashboard.payables += supply.payment().remaining_amount();
            if range.contains(supply.date()) {
                dashboard.supplies_received += 1;
                dashboard.supplies_received_value += supply.payment().total_amount();
            }
        }
        Ok(dashboard)
    }

    /// Levels at or below `threshold` (the configured default when `None`).
    #[instrument(skip(self))]
    pub async fn low_stock(
        &self,
        threshold: Option<Decimal>,
        zone_id: Option<ZoneId>,
    ) -> EngineResult<Vec<StockLevel>> {
        let threshold = threshold.unwrap_or(self.low_stock_threshold);
        let filter = StockLevelFilter {
            product_id: None,
            zone_id,
        };
        let mut levels: Vec<StockLevel> = self
            .store
            .stock_levels(&filter)
            .await?
            .into_iter()
            .filter(|level| level.quantity <= threshold)
            .collect();
        levels.sort_by(|a, b| a.quantity.cmp(&b.quantity).then(a.product_id.cmp(&b.product_id)));
        Ok(levels)
    }

    /// Products by net quantity sold in the period.
    #[instrument(skip(self))]
    pub async fn top_products(
        &self,
        period: Period,
        limit: usize,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<TopProduct>> {
        let range = period.resolve(now)?;
        let mut sold: BTreeMap<ProductId, Decimal> = BTreeMap::new();
        for transaction_type in [StockMovementType::Sale, StockMovementType::Return] {
            let filter = StockMovementFilter {
                transaction_type: Some(transaction_type),
                from: Some(range.from),
                to: Some(range.to),
                ..Default::default()
            };
            let page = self.store.stock_movements(&filter, Pagination::all()).await?;
            for movement in page.items {
                *sold.entry(movement.product_id).or_insert(Decimal::ZERO) -= movement.net();
            }
        }

        let mut top: Vec<TopProduct> = sold
            .into_iter()
            .filter(|(_, quantity)| *quantity > Decimal::ZERO)
            .map(|(product_id, quantity_sold)| TopProduct {
                product_id,
                quantity_sold,
            })
            .collect();
        top.sort_by(|a, b| b.quantity_sold.cmp(&a.quantity_sold));
        top.truncate(limit);
        Ok(top)
    }

    /// Revenue of non-cancelled sales per day, zero-filled.
    #[instrument(skip(self))]
    pub async fn revenue_trend(
        &self,
        period: Period,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<RevenuePoint>> {
        let range = period.resolve(now)?;
        let mut buckets: BTreeMap<NaiveDate, RevenuePoint> = range
            .trend_days()?
            .into_iter()
            .map(|day| {
                (
                    day,
                    RevenuePoint {
                        day,
                        sales_count: 0,
                        revenue: Decimal::ZERO,
                    },
                )
            })
            .collect();

        let sales: Vec<Sale> = self.all_documents().await?;
        for sale in sales
            .iter()
            .filter(|s| s.status() != SaleStatus::Cancelled && range.contains(s.date()))
        {
            if let Some(point) = buckets.get_mut(&sale.date().date_naive()) {
                point.sales_count += 1;
                point.revenue += sale.payment().total_amount();
            }
        }
        Ok(buckets.into_values().collect())
    }

    #[instrument(skip(self))]
    pub async fn outstanding_balances(&self) -> EngineResult<OutstandingBalances> {
        let accounts = self.store.accounts().await?;
        let mut by_account_type: BTreeMap<String, Decimal> = BTreeMap::new();
        for account in &accounts {
            *by_account_type
                .entry(account.account_type.as_str().to_string())
                .or_insert(Decimal::ZERO) += account.current_balance;
        }

        let mut open: BTreeMap<PartyId, Decimal> = BTreeMap::new();
        let sales: Vec<Sale> = self.all_documents().await?;
        for sale in sales.iter().filter(|s| s.status() != SaleStatus::Cancelled) {
            *open.entry(sale.client_id()).or_insert(Decimal::ZERO) +=
                sale.payment().remaining_amount();
        }
        let supplies: Vec<Supply> = self.all_documents().await?;
        for supply in supplies.iter().filter(|s| s.status() == SupplyStatus::Received) {
            *open.entry(supply.supplier_id()).or_insert(Decimal::ZERO) +=
                supply.payment().remaining_amount();
        }

        let balances: BTreeMap<AccountId, Decimal> = accounts
            .iter()
            .map(|a| (a.id, a.current_balance))
            .collect();
        let parties = self
            .store
            .parties(None)
            .await?
            .into_iter()
            .map(|party| PartyOutstanding {
                account_balance: balances.get(&party.account_id).copied().unwrap_or_default(),
                open_amount: open.get(&party.id).copied().unwrap_or_default(),
                party_id: party.id,
                kind: party.kind,
                name: party.name,
                account_id: party.account_id,
            })
            .collect();

        Ok(OutstandingBalances {
            by_account_type,
            parties,
        })
    }

    /// Re-check every ledger/balance and document invariant. Violations are
    /// reported, never repaired.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> EngineResult<ReconciliationReport> {
        let mut report = ReconciliationReport::default();

        let movements = self
            .store
            .stock_movements(&StockMovementFilter::default(), Pagination::all())
            .await?
            .items;
        for level in self.store.stock_levels(&StockLevelFilter::default()).await? {
            report.stock_levels_checked += 1;
            report.record(
                format!("stock level {}/{}", level.product_id, level.zone_id),
                verify_stock_card(&level, &movements),
            );
        }

        let rows = self
            .store
            .account_movements(&AccountMovementFilter::default(), Pagination::all())
            .await?
            .items;
        for account in self.store.accounts().await? {
            report.accounts_checked += 1;
            report.record(
                format!("account {}", account.id),
                verify_account_statement(&account, &rows),
            );
        }
        let mut entries: BTreeMap<EntryId, Vec<AccountMovement>> = BTreeMap::new();
        for row in &rows {
            entries.entry(row.entry_id).or_default().push(row.clone());
        }
        for (entry_id, legs) in &entries {
            report.entries_checked += 1;
            let legs_ok = if legs.len() == 2 {
                verify_entries_balanced(legs)
            } else {
                Err(DomainError::consistency(format!(
                    "posting entry has {} legs",
                    legs.len()
                )))
            };
            report.record(format!("entry {entry_id}"), legs_ok);
        }

        // Cached payment projections must equal what the ledger says now.
        let probe = ActorContext::new(UserId::new(), Utc::now());
        let sales: Vec<Sale> = self.all_documents().await?;
        for sale in &sales {
            report.documents_checked += 1;
            let mut recomputed = sale.clone();
            let result = sale.verify().and_then(|_| {
                recomputed.refresh_payments(&rows, &probe)?;
                same_payment(sale.id(), sale.payment(), recomputed.payment())
            });
            report.record(format!("sale {}", sale.reference()), result);
        }
        let supplies: Vec<Supply> = self.all_documents().await?;
        for supply in &supplies {
            report.documents_checked += 1;
            let mut recomputed = supply.clone();
            let result = supply.verify().and_then(|_| {
                recomputed.refresh_payments(&rows, &probe)?;
                same_payment(supply.id(), supply.payment(), recomputed.payment())
            });
            report.record(format!("supply {}", supply.reference()), result);
        }

        if report.is_consistent() {
            info!(
                stock_levels = report.stock_levels_checked,
                accounts = report.accounts_checked,
                entries = report.entries_checked,
                documents = report.documents_checked,
                "reconciliation passed"
            );
        } else {
            warn!(violations = report.violations.len(), "reconciliation found violations");
        }
        Ok(report)
    }

    async fn all_documents<D>(&self) -> EngineResult<Vec<D>>
    where
        D: Document + DeserializeOwned,
    {
        let page = self.store.documents(D::KIND, Pagination::all()).await?;
        let mut documents = Vec::with_capacity(page.items.len());
        for stored in &page.items {
            documents.push(stored.decode::<D>()?);
        }
        Ok(documents)
    }
}

fn same_payment(
    id: DocumentId,
    stored: &PaymentSummary,
    ledger: &PaymentSummary,
) -> DomainResult<()> {
    if stored != ledger {
        return Err(DomainError::consistency(format!(
            "document {id} caches paid {} but the ledger says {}",
            stored.paid_amount(),
            ledger.paid_amount()
        )));
    }
    Ok(())
}
