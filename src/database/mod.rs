//! The backend's documented query and RPC surface.
//!
//! Handlers depend on [`Backend`] only. [`PgBackend`] talks to the managed Postgres
//! instance; [`MemoryBackend`] keeps everything in process for tests and local runs.

pub mod manager;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::filter::{Page, TransactionFilter};
use crate::models::{
    AuditEvent, Budget, CleanupResult, CreateTransactionRequest, Device, Envelope,
    NotificationData, RegisterDeviceRequest, Transaction, UpdateTransactionRequest,
};

pub use manager::DatabaseManager;
pub use memory::MemoryBackend;
pub use postgres::PgBackend;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("RPC {function} failed: {message}")]
    Rpc { function: &'static str, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Outcome of registering a device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRegistration {
    pub device: Device,
    pub created: bool,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    // Budgets and envelopes
    async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>, DatabaseError>;

    /// Budget lookup filtered on both id and owner; `None` covers "missing" and
    /// "someone else's".
    async fn find_owned_budget(
        &self,
        budget_id: &str,
        user_id: &str,
    ) -> Result<Option<Budget>, DatabaseError>;

    async fn list_envelopes(&self, budget_id: &str) -> Result<Vec<Envelope>, DatabaseError>;

    // Transactions
    async fn list_transactions(
        &self,
        budget_id: &str,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, DatabaseError>;

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, DatabaseError>;

    async fn insert_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<Transaction, DatabaseError>;

    async fn update_transaction(
        &self,
        id: &str,
        changes: &UpdateTransactionRequest,
    ) -> Result<Transaction, DatabaseError>;

    async fn soft_delete_transaction(&self, id: &str) -> Result<(), DatabaseError>;

    // Devices
    async fn find_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, DatabaseError>;

    async fn register_device(
        &self,
        user_id: &str,
        device_id: &str,
        request: &RegisterDeviceRequest,
    ) -> Result<DeviceRegistration, DatabaseError>;

    async fn list_devices(&self, user_id: &str) -> Result<Vec<Device>, DatabaseError>;

    /// Revoke a device and invalidate its session. `None` when the user has no such device.
    async fn revoke_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, DatabaseError>;

    async fn revoke_other_devices(
        &self,
        user_id: &str,
        keep_device_id: &str,
    ) -> Result<u64, DatabaseError>;

    // Read-only feeds
    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<NotificationData>, DatabaseError>;

    async fn list_audit_events(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, DatabaseError>;

    // RPC
    async fn is_session_invalidated(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<bool, DatabaseError>;

    async fn get_cleanup_stats(&self, days_back: i32) -> Result<Value, DatabaseError>;

    async fn run_all_cleanup_jobs(&self) -> Result<Vec<CleanupResult>, DatabaseError>;
}
