use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Allocation,
    Expense,
    Transfer,
    DebtPayment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Allocation => "allocation",
            TransactionType::Expense => "expense",
            TransactionType::Transfer => "transfer",
            TransactionType::DebtPayment => "debt_payment",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "allocation" => Ok(TransactionType::Allocation),
            "expense" => Ok(TransactionType::Expense),
            "transfer" => Ok(TransactionType::Transfer),
            "debt_payment" => Ok(TransactionType::DebtPayment),
            other => Err(UnknownVariant { kind: "transaction type", value: other.to_string() }),
        }
    }
}

/// A ledger row. History is immutable apart from the cleared/reconciled flags and
/// soft deletion through `is_deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub budget_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: Option<String>,
    pub transaction_date: NaiveDate,
    pub from_envelope_id: Option<String>,
    pub to_envelope_id: Option<String>,
    pub payee_id: Option<String>,
    pub income_source_id: Option<String>,
    pub category_id: Option<String>,
    pub is_cleared: bool,
    pub is_reconciled: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type FieldErrors = HashMap<String, String>;

/// Body of `POST /transactions-simple`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTransactionRequest {
    pub budget_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub transaction_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_envelope_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_envelope_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cleared: Option<bool>,
}

impl CreateTransactionRequest {
    pub fn new(
        budget_id: impl Into<String>,
        transaction_type: TransactionType,
        amount: Decimal,
        transaction_date: NaiveDate,
    ) -> Self {
        Self {
            budget_id: budget_id.into(),
            transaction_type,
            amount,
            transaction_date,
            description: None,
            from_envelope_id: None,
            to_envelope_id: None,
            payee_id: None,
            income_source_id: None,
            category_id: None,
            is_cleared: None,
        }
    }

    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.budget_id.trim().is_empty() {
            errors.insert("budget_id".to_string(), "This field is required".to_string());
        }
        if self.amount <= Decimal::ZERO {
            errors.insert("amount".to_string(), "Amount must be greater than zero".to_string());
        }
        if let (Some(from), Some(to)) = (&self.from_envelope_id, &self.to_envelope_id) {
            if from == to {
                errors.insert(
                    "to_envelope_id".to_string(),
                    "Source and destination envelopes must differ".to_string(),
                );
            }
        }
        if let Some(description) = &self.description {
            if description.chars().count() > 500 {
                errors.insert(
                    "description".to_string(),
                    "Description must be at most 500 characters".to_string(),
                );
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Body of `PATCH /transactions/{id}`. Amounts, dates and envelopes are not editable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cleared: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_reconciled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl UpdateTransactionRequest {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.is_cleared.is_none()
            && self.is_reconciled.is_none()
            && self.payee_id.is_none()
            && self.category_id.is_none()
    }

    pub fn apply_to(&self, transaction: &mut Transaction) {
        if let Some(description) = &self.description {
            transaction.description = Some(description.clone());
        }
        if let Some(cleared) = self.is_cleared {
            transaction.is_cleared = cleared;
        }
        if let Some(reconciled) = self.is_reconciled {
            transaction.is_reconciled = reconciled;
        }
        if let Some(payee_id) = &self.payee_id {
            transaction.payee_id = Some(payee_id.clone());
        }
        if let Some(category_id) = &self.category_id {
            transaction.category_id = Some(category_id.clone());
        }
        transaction.updated_at = Utc::now();
    }
}
