use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Instant;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Backend, DatabaseError, DeviceRegistration};
use crate::filter::{Page, TransactionFilter};
use crate::models::{
    AuditEvent, Budget, CleanupResult, CreateTransactionRequest, Device, Envelope,
    NotificationData, RegisterDeviceRequest, Transaction, UpdateTransactionRequest,
};

/// Rows older than this are eligible for the cleanup jobs.
pub const RETENTION_DAYS: i64 = 30;

#[derive(Default)]
struct State {
    budgets: Vec<Budget>,
    envelopes: Vec<Envelope>,
    transactions: Vec<Transaction>,
    devices: Vec<Device>,
    notifications: Vec<NotificationData>,
    audit_events: Vec<AuditEvent>,
    invalidated_sessions: HashSet<(String, String)>,
    failing_rpcs: HashSet<String>,
}

/// In-process [`Backend`] for tests and offline runs. Mirrors the Postgres
/// behaviour: soft deletes, terminal device revocation, owner-filtered lookups.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_budget(&self, budget: Budget) {
        self.state.write().await.budgets.push(budget);
    }

    pub async fn insert_envelope(&self, envelope: Envelope) {
        self.state.write().await.envelopes.push(envelope);
    }

    /// Seed a transaction exactly as given, bypassing request validation.
    pub async fn insert_transaction_row(&self, transaction: Transaction) {
        self.state.write().await.transactions.push(transaction);
    }

    pub async fn insert_device(&self, device: Device) {
        self.state.write().await.devices.push(device);
    }

    pub async fn insert_notification(&self, notification: NotificationData) {
        self.state.write().await.notifications.push(notification);
    }

    pub async fn insert_audit_event(&self, event: AuditEvent) {
        self.state.write().await.audit_events.push(event);
    }

    pub async fn invalidate_session(&self, user_id: &str, device_id: &str) {
        self.state
            .write()
            .await
            .invalidated_sessions
            .insert((user_id.to_string(), device_id.to_string()));
    }

    /// Make every later call to the named RPC fail.
    pub async fn fail_rpc(&self, function: &str) {
        self.state.write().await.failing_rpcs.insert(function.to_string());
    }

    async fn check_rpc(&self, function: &'static str) -> Result<(), DatabaseError> {
        if self.state.read().await.failing_rpcs.contains(function) {
            return Err(DatabaseError::Rpc {
                function,
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

fn transaction_not_found() -> DatabaseError {
    DatabaseError::NotFound("Transaction not found".to_string())
}

impl State {
    fn cleanup_counts(&self, days_back: i64) -> [(&'static str, usize); 3] {
        // Out-of-range windows reach back to the earliest representable instant.
        let cutoff = Duration::try_days(days_back)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        [
            (
                "transactions",
                self.transactions.iter().filter(|t| t.is_deleted && t.updated_at < cutoff).count(),
            ),
            (
                "user_devices",
                self.devices.iter().filter(|d| d.is_revoked && d.last_seen < cutoff).count(),
            ),
            (
                "notifications",
                self.notifications.iter().filter(|n| n.is_read && n.created_at < cutoff).count(),
            ),
        ]
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>, DatabaseError> {
        let state = self.state.read().await;
        let mut budgets: Vec<Budget> =
            state.budgets.iter().filter(|b| b.user_id == user_id).cloned().collect();
        budgets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(budgets)
    }

    async fn find_owned_budget(
        &self,
        budget_id: &str,
        user_id: &str,
    ) -> Result<Option<Budget>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .budgets
            .iter()
            .find(|b| b.id == budget_id && b.user_id == user_id)
            .cloned())
    }

    async fn list_envelopes(&self, budget_id: &str) -> Result<Vec<Envelope>, DatabaseError> {
        let state = self.state.read().await;
        let mut envelopes: Vec<Envelope> =
            state.envelopes.iter().filter(|e| e.budget_id == budget_id).cloned().collect();
        envelopes.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        Ok(envelopes)
    }

    async fn list_transactions(
        &self,
        budget_id: &str,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let state = self.state.read().await;
        let mut rows: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.budget_id == budget_id && filter.matches(t))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            b.transaction_date
                .cmp(&a.transaction_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        Ok(rows
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect())
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state.transactions.iter().find(|t| t.id == id && !t.is_deleted).cloned())
    }

    async fn insert_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<Transaction, DatabaseError> {
        let now = Utc::now();
        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            budget_id: request.budget_id.clone(),
            transaction_type: request.transaction_type,
            amount: request.amount,
            description: request.description.clone(),
            transaction_date: request.transaction_date,
            from_envelope_id: request.from_envelope_id.clone(),
            to_envelope_id: request.to_envelope_id.clone(),
            payee_id: request.payee_id.clone(),
            income_source_id: request.income_source_id.clone(),
            category_id: request.category_id.clone(),
            is_cleared: request.is_cleared.unwrap_or(false),
            is_reconciled: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn update_transaction(
        &self,
        id: &str,
        changes: &UpdateTransactionRequest,
    ) -> Result<Transaction, DatabaseError> {
        let mut state = self.state.write().await;
        let row = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id && !t.is_deleted)
            .ok_or_else(transaction_not_found)?;
        changes.apply_to(row);
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn soft_delete_transaction(&self, id: &str) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        let row = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id && !t.is_deleted)
            .ok_or_else(transaction_not_found)?;
        row.is_deleted = true;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn find_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, DatabaseError> {
        let state = self.state.read().await;
        Ok(state
            .devices
            .iter()
            .find(|d| d.user_id == user_id && d.device_id == device_id)
            .cloned())
    }

    async fn register_device(
        &self,
        user_id: &str,
        device_id: &str,
        request: &RegisterDeviceRequest,
    ) -> Result<DeviceRegistration, DatabaseError> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        if let Some(device) = state
            .devices
            .iter_mut()
            .find(|d| d.user_id == user_id && d.device_id == device_id)
        {
            if device.is_revoked {
                return Err(DatabaseError::InvalidInput("Device has been revoked".to_string()));
            }
            device.device_name = request.device_name.clone();
            if request.device_type.is_some() {
                device.device_type = request.device_type.clone();
            }
            if request.push_token.is_some() {
                device.push_token = request.push_token.clone();
            }
            if request.app_version.is_some() {
                device.app_version = request.app_version.clone();
            }
            if request.last_location.is_some() {
                device.last_location = request.last_location.clone();
            }
            device.last_seen = now;
            return Ok(DeviceRegistration { device: device.clone(), created: false });
        }

        let device = Device {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            device_id: device_id.to_string(),
            device_name: request.device_name.clone(),
            device_type: request.device_type.clone(),
            push_token: request.push_token.clone(),
            app_version: request.app_version.clone(),
            last_location: request.last_location.clone(),
            is_revoked: false,
            last_seen: now,
            created_at: now,
        };
        state.devices.push(device.clone());
        Ok(DeviceRegistration { device, created: true })
    }

    async fn list_devices(&self, user_id: &str) -> Result<Vec<Device>, DatabaseError> {
        let state = self.state.read().await;
        let mut devices: Vec<Device> =
            state.devices.iter().filter(|d| d.user_id == user_id).cloned().collect();
        devices.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        Ok(devices)
    }

    async fn revoke_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, DatabaseError> {
        let mut state = self.state.write().await;
        let Some(device) = state
            .devices
            .iter_mut()
            .find(|d| d.user_id == user_id && d.device_id == device_id)
        else {
            return Ok(None);
        };
        device.is_revoked = true;
        let device = device.clone();
        state
            .invalidated_sessions
            .insert((user_id.to_string(), device_id.to_string()));
        Ok(Some(device))
    }

    async fn revoke_other_devices(
        &self,
        user_id: &str,
        keep_device_id: &str,
    ) -> Result<u64, DatabaseError> {
        let mut state = self.state.write().await;
        let mut revoked = Vec::new();
        for device in state.devices.iter_mut() {
            if device.user_id == user_id && device.device_id != keep_device_id && !device.is_revoked {
                device.is_revoked = true;
                revoked.push(device.device_id.clone());
            }
        }
        let count = revoked.len() as u64;
        for device_id in revoked {
            state.invalidated_sessions.insert((user_id.to_string(), device_id));
        }
        Ok(count)
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<NotificationData>, DatabaseError> {
        let state = self.state.read().await;
        let mut rows: Vec<NotificationData> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(100);
        Ok(rows)
    }

    async fn list_audit_events(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, DatabaseError> {
        let state = self.state.read().await;
        let mut rows: Vec<AuditEvent> =
            state.audit_events.iter().filter(|e| e.user_id == user_id).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn is_session_invalidated(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<bool, DatabaseError> {
        self.check_rpc("is_session_invalidated").await?;
        let state = self.state.read().await;
        Ok(state
            .invalidated_sessions
            .contains(&(user_id.to_string(), device_id.to_string())))
    }

    async fn get_cleanup_stats(&self, days_back: i32) -> Result<Value, DatabaseError> {
        self.check_rpc("get_cleanup_stats").await?;
        let state = self.state.read().await;
        let stats: Vec<Value> = state
            .cleanup_counts(days_back as i64)
            .iter()
            .map(|(table, count)| json!({ "table_name": table, "records_to_clean": count }))
            .collect();
        Ok(Value::Array(stats))
    }

    async fn run_all_cleanup_jobs(&self) -> Result<Vec<CleanupResult>, DatabaseError> {
        self.check_rpc("run_all_cleanup_jobs").await?;
        let mut state = self.state.write().await;
        let cutoff = Utc::now() - Duration::days(RETENTION_DAYS);
        let mut results = Vec::new();

        let started = Instant::now();
        let before = state.transactions.len();
        state.transactions.retain(|t| !(t.is_deleted && t.updated_at < cutoff));
        results.push(job_result("cleanup_deleted_transactions", before - state.transactions.len(), started));

        let started = Instant::now();
        let before = state.devices.len();
        state.devices.retain(|d| !(d.is_revoked && d.last_seen < cutoff));
        results.push(job_result("cleanup_revoked_devices", before - state.devices.len(), started));

        let started = Instant::now();
        let before = state.notifications.len();
        state.notifications.retain(|n| !(n.is_read && n.created_at < cutoff));
        results.push(job_result("cleanup_read_notifications", before - state.notifications.len(), started));

        Ok(results)
    }
}

fn job_result(name: &str, cleaned: usize, started: Instant) -> CleanupResult {
    CleanupResult {
        job_name: name.to_string(),
        records_cleaned: cleaned as i64,
        execution_time_ms: started.elapsed().as_millis() as i64,
        status: "success".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionType;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn request(budget: &str, day: u32) -> CreateTransactionRequest {
        CreateTransactionRequest::new(
            budget,
            TransactionType::Expense,
            Decimal::new(1000, 2),
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
        )
    }

    fn device_request(name: &str) -> RegisterDeviceRequest {
        RegisterDeviceRequest {
            device_name: name.to_string(),
            device_type: None,
            push_token: None,
            app_version: None,
            last_location: None,
        }
    }

    #[tokio::test]
    async fn listing_orders_newest_first_and_pages() {
        let backend = MemoryBackend::new();
        for day in [3, 1, 2] {
            backend.insert_transaction(&request("b1", day)).await.unwrap();
        }
        backend.insert_transaction(&request("b2", 9)).await.unwrap();

        let page = Page { limit: 2, offset: 0 };
        let rows = backend.list_transactions("b1", &TransactionFilter::default(), page).await.unwrap();
        let days: Vec<_> = rows.iter().map(|t| t.transaction_date.format("%d").to_string()).collect();
        assert_eq!(days, vec!["03", "02"]);

        let page = Page { limit: 2, offset: 2 };
        let rows = backend.list_transactions("b1", &TransactionFilter::default(), page).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn soft_deleted_rows_disappear() {
        let backend = MemoryBackend::new();
        let tx = backend.insert_transaction(&request("b1", 1)).await.unwrap();
        assert!(!tx.is_reconciled);
        assert!(!tx.is_cleared);

        backend.soft_delete_transaction(&tx.id).await.unwrap();
        assert!(backend.get_transaction(&tx.id).await.unwrap().is_none());
        assert!(matches!(
            backend.soft_delete_transaction(&tx.id).await,
            Err(DatabaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn revoked_device_cannot_re_register() {
        let backend = MemoryBackend::new();
        let first = backend.register_device("u1", "d1", &device_request("Phone")).await.unwrap();
        assert!(first.created);
        let again = backend.register_device("u1", "d1", &device_request("Phone 2")).await.unwrap();
        assert!(!again.created);
        assert_eq!(again.device.device_name, "Phone 2");

        backend.revoke_device("u1", "d1").await.unwrap();
        assert!(backend.is_session_invalidated("u1", "d1").await.unwrap());
        assert!(matches!(
            backend.register_device("u1", "d1", &device_request("Phone")).await,
            Err(DatabaseError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn revoke_others_keeps_current_device() {
        let backend = MemoryBackend::new();
        for id in ["d1", "d2", "d3"] {
            backend.register_device("u1", id, &device_request(id)).await.unwrap();
        }
        assert_eq!(backend.revoke_other_devices("u1", "d1").await.unwrap(), 2);
        assert!(!backend.is_session_invalidated("u1", "d1").await.unwrap());
        assert!(backend.is_session_invalidated("u1", "d3").await.unwrap());
        assert_eq!(backend.revoke_other_devices("u1", "d1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleanup_purges_old_soft_deleted_rows() {
        let backend = MemoryBackend::new();
        let mut old = backend.insert_transaction(&request("b1", 1)).await.unwrap();
        old.id = "old".to_string();
        old.is_deleted = true;
        old.updated_at = Utc::now() - Duration::days(60);
        backend.insert_transaction_row(old).await;

        let stats = backend.get_cleanup_stats(30).await.unwrap();
        assert_eq!(stats[0]["table_name"], "transactions");
        assert_eq!(stats[0]["records_to_clean"], 1);

        let results = backend.run_all_cleanup_jobs().await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].records_cleaned, 1);
        assert!(results.iter().all(CleanupResult::succeeded));
    }

    #[tokio::test]
    async fn huge_cleanup_window_does_not_overflow() {
        let backend = MemoryBackend::new();
        let stats = backend.get_cleanup_stats(i32::MAX).await.unwrap();
        assert_eq!(stats[0]["records_to_clean"], 0);
    }
}
