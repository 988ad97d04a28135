use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    Regular,
    Savings,
    Debt,
}

impl EnvelopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeType::Regular => "regular",
            EnvelopeType::Savings => "savings",
            EnvelopeType::Debt => "debt",
        }
    }
}

impl FromStr for EnvelopeType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(EnvelopeType::Regular),
            "savings" => Ok(EnvelopeType::Savings),
            "debt" => Ok(EnvelopeType::Debt),
            other => Err(UnknownVariant { kind: "envelope type", value: other.to_string() }),
        }
    }
}

/// Balances are written only by backend transaction logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub budget_id: String,
    pub name: String,
    pub description: Option<String>,
    pub envelope_type: EnvelopeType,
    pub category_id: Option<String>,
    pub current_balance: Decimal,
    pub target_amount: Option<Decimal>,
    pub debt_balance: Decimal,
    pub minimum_payment: Option<Decimal>,
    pub notify_on_low_balance: bool,
    pub low_balance_threshold: Option<Decimal>,
    pub notify_above_amount: Option<Decimal>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Envelope {
    pub fn is_below_threshold(&self) -> bool {
        match self.low_balance_threshold {
            Some(threshold) if self.notify_on_low_balance => self.current_balance < threshold,
            _ => false,
        }
    }
}

/// Aggregate view of a budget's active envelopes, computed for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopesSummary {
    pub total_envelopes: usize,
    pub regular_count: usize,
    pub savings_count: usize,
    pub debt_count: usize,
    pub total_balance: Decimal,
    pub total_debt: Decimal,
    pub negative_balance_count: usize,
    pub low_balance_count: usize,
}

impl EnvelopesSummary {
    pub fn from_envelopes<'a>(envelopes: impl IntoIterator<Item = &'a Envelope>) -> Self {
        let mut summary = Self::default();
        for envelope in envelopes.into_iter().filter(|e| e.is_active) {
            summary.total_envelopes += 1;
            match envelope.envelope_type {
                EnvelopeType::Regular => summary.regular_count += 1,
                EnvelopeType::Savings => summary.savings_count += 1,
                EnvelopeType::Debt => summary.debt_count += 1,
            }
            summary.total_balance += envelope.current_balance;
            summary.total_debt += envelope.debt_balance;
            if envelope.current_balance.is_sign_negative() && !envelope.current_balance.is_zero() {
                summary.negative_balance_count += 1;
            }
            if envelope.is_below_threshold() {
                summary.low_balance_count += 1;
            }
        }
        summary
    }
}
