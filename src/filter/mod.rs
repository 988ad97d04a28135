//! Query-string schema for transaction listings.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Transaction, TransactionType};

pub const DEFAULT_LIMIT: i64 = 50;

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

/// Filters accepted by `GET /budgets/{budgetId}/transactions`.
///
/// `envelope_id` matches either side of a movement (`from_envelope_id` OR
/// `to_envelope_id`); every other field is an equality or bound check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cleared: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reconciled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

/// Resolved pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl TransactionFilter {
    pub fn validate(&self) -> Result<(), FilterError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(FilterError::InvalidRange(
                    "startDate must not be after endDate".to_string(),
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(FilterError::InvalidRange(
                    "minAmount must not exceed maxAmount".to_string(),
                ));
            }
        }
        if matches!(self.limit, Some(limit) if limit < 0) {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if matches!(self.offset, Some(offset) if offset < 0) {
            return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
        }
        Ok(())
    }

    /// Validate and resolve the page, capping the limit at `max_limit`.
    pub fn page(&self, default_limit: i64, max_limit: i64) -> Result<Page, FilterError> {
        self.validate()?;

        let requested = self.limit.unwrap_or(default_limit);
        let limit = if requested > max_limit {
            tracing::debug!("Limit {} exceeds max {}, capping to max", requested, max_limit);
            max_limit
        } else {
            requested
        };

        Ok(Page { limit, offset: self.offset.unwrap_or(0) })
    }

    /// Whether a row satisfies every predicate. Soft-deleted rows never match.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if tx.is_deleted {
            return false;
        }
        if matches!(self.start_date, Some(start) if tx.transaction_date < start) {
            return false;
        }
        if matches!(self.end_date, Some(end) if tx.transaction_date > end) {
            return false;
        }
        if matches!(self.transaction_type, Some(kind) if tx.transaction_type != kind) {
            return false;
        }
        if let Some(envelope_id) = &self.envelope_id {
            let touches = tx.from_envelope_id.as_ref() == Some(envelope_id)
                || tx.to_envelope_id.as_ref() == Some(envelope_id);
            if !touches {
                return false;
            }
        }
        if self.payee_id.is_some() && tx.payee_id != self.payee_id {
            return false;
        }
        if self.income_source_id.is_some() && tx.income_source_id != self.income_source_id {
            return false;
        }
        if self.category_id.is_some() && tx.category_id != self.category_id {
            return false;
        }
        if matches!(self.is_cleared, Some(cleared) if tx.is_cleared != cleared) {
            return false;
        }
        if matches!(self.is_reconciled, Some(reconciled) if tx.is_reconciled != reconciled) {
            return false;
        }
        if matches!(self.min_amount, Some(min) if tx.amount < min) {
            return false;
        }
        if matches!(self.max_amount, Some(max) if tx.amount > max) {
            return false;
        }
        true
    }
}
