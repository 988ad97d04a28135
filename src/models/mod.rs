//! Data-transfer records shared by the server, the client library and the CLI.
//!
//! These mirror the backend schema. Invariants such as envelope balances are owned
//! by the backend, so the types here carry shape only.

pub mod auth;
pub mod budget;
pub mod cleanup;
pub mod device;
pub mod envelope;
pub mod notification;
pub mod transaction;

pub use auth::{AuthState, PersistedAuthData, User};
pub use budget::{Budget, Category, CategoryType, Payee};
pub use cleanup::{CleanupResult, CleanupSummary};
pub use device::{Device, RegisterDeviceRequest};
pub use envelope::{Envelope, EnvelopeType, EnvelopesSummary};
pub use notification::{AuditEvent, NotificationData};
pub use transaction::{
    CreateTransactionRequest, Transaction, TransactionType, UpdateTransactionRequest,
};

use std::fmt;

/// Returned by `FromStr` impls on the string-backed enums in this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}
