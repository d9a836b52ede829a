//! Derived payment aggregates shared by sales and supplies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Payment status, a pure function of `(paid, total)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Overpaid,
}

impl PaymentStatus {
    /// Derive the status.
    ///
    /// `allow_overpaid` is set for supply-side documents only; sales report any
    /// `paid >= total` as `Paid`.
    pub fn derive(paid: Decimal, total: Decimal, allow_overpaid: bool) -> Self {
        if paid <= Decimal::ZERO {
            PaymentStatus::Unpaid
        } else if paid < total {
            PaymentStatus::PartiallyPaid
        } else if allow_overpaid && paid > total {
            PaymentStatus::Overpaid
        } else {
            PaymentStatus::Paid
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Overpaid => "overpaid",
        }
    }
}

/// Cached projection of a document's payment position.
///
/// Never settable field by field: the only constructor is [`PaymentSummary::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSummary {
    total_amount: Decimal,
    paid_amount: Decimal,
    remaining_amount: Decimal,
    payment_status: PaymentStatus,
}

impl PaymentSummary {
    pub fn compute(total: Decimal, paid: Decimal, allow_overpaid: bool) -> DomainResult<Self> {
        if total < Decimal::ZERO {
            return Err(DomainError::consistency(format!(
                "total amount is negative: {total}"
            )));
        }
        if paid < Decimal::ZERO {
            return Err(DomainError::consistency(format!(
                "paid amount recomputed from the ledger is negative: {paid}"
            )));
        }
        Ok(Self {
            total_amount: total,
            paid_amount: paid,
            remaining_amount: total - paid,
            payment_status: PaymentStatus::derive(paid, total, allow_overpaid),
        })
    }

    /// Summary of a document with no payments.
    pub fn unpaid(total: Decimal) -> DomainResult<Self> {
        Self::compute(total, Decimal::ZERO, false)
    }

    /// Re-check the derived fields, e.g. after deserializing a stored document.
    pub fn verify(&self, allow_overpaid: bool) -> DomainResult<()> {
        if self.remaining_amount != self.total_amount - self.paid_amount {
            return Err(DomainError::consistency(format!(
                "remaining {} != total {} - paid {}",
                self.remaining_amount, self.total_amount, self.paid_amount
            )));
        }
        let expected = PaymentStatus::derive(self.paid_amount, self.total_amount, allow_overpaid);
        if self.payment_status != expected {
            return Err(DomainError::consistency(format!(
                "payment status {} does not match derived {}",
                self.payment_status.as_str(),
                expected.as_str()
            )));
        }
        Ok(())
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn paid_amount(&self) -> Decimal {
        self.paid_amount
    }

    pub fn remaining_amount(&self) -> Decimal {
        self.remaining_amount
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }
}
