use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{AccountId, Document, DomainResult, ProductId, ZoneId};
use stockbook_infra::engine::Applied;
use stockbook_infra::reporting::Period;
use stockbook_infra::store::{
    AccountMovementFilter, Pagination, StockLevelFilter, StockMovementFilter,
};
use stockbook_ledger::{AccountTransactionType, PartyKind, StockMovementType};

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StockCardQuery {
    pub product_id: Option<ProductId>,
    pub zone_id: Option<ZoneId>,
    pub transaction_type: Option<StockMovementType>,
    pub reference: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl StockCardQuery {
    pub fn filter(&self) -> StockMovementFilter {
        StockMovementFilter {
            product_id: self.product_id,
            zone_id: self.zone_id,
            transaction_type: self.transaction_type,
            reference: self.reference.clone(),
            from: self.from,
            to: self.to,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountStatementQuery {
    pub account_id: Option<AccountId>,
    pub transaction_type: Option<AccountTransactionType>,
    pub reference: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AccountStatementQuery {
    pub fn filter(&self) -> AccountMovementFilter {
        AccountMovementFilter {
            account_id: self.account_id,
            transaction_type: self.transaction_type,
            reference: self.reference.clone(),
            from: self.from,
            to: self.to,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StockLevelQuery {
    pub product_id: Option<ProductId>,
    pub zone_id: Option<ZoneId>,
}

impl StockLevelQuery {
    pub fn filter(&self) -> StockLevelFilter {
        StockLevelFilter {
            product_id: self.product_id,
            zone_id: self.zone_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PartiesQuery {
    pub kind: Option<PartyKind>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl PeriodQuery {
    pub fn period(&self) -> DomainResult<Period> {
        Period::parse(self.period.as_deref(), self.from, self.to)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopProductsQuery {
    pub period: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl TopProductsQuery {
    pub fn period(&self) -> DomainResult<Period> {
        Period::parse(self.period.as_deref(), self.from, self.to)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(10).min(100)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<Decimal>,
    pub zone_id: Option<ZoneId>,
}

// -------------------------
// Response DTOs
// -------------------------

/// A document plus the ledger rows its last operation wrote.
#[derive(Debug, Serialize)]
pub struct DocumentResponse<D> {
    pub id: String,
    pub reference: String,
    pub status: &'static str,
    pub version: u64,
    pub document: D,
    pub stock_movements: usize,
    pub account_movements: usize,
}

pub fn applied_to_json<D: Document + Serialize>(applied: Applied<D>) -> DocumentResponse<D> {
    DocumentResponse {
        id: applied.document.id().to_string(),
        reference: applied.document.reference().to_string(),
        status: applied.document.status_label(),
        version: applied.document.version(),
        stock_movements: applied.effects.stock_movements.len(),
        account_movements: applied.effects.account_movements.len(),
        document: applied.document,
    }
}
