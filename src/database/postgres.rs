use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Backend, DatabaseError, DeviceRegistration};
use crate::filter::{Page, TransactionFilter};
use crate::models::{
    AuditEvent, Budget, CleanupResult, CreateTransactionRequest, Device, Envelope,
    NotificationData, RegisterDeviceRequest, Transaction, UpdateTransactionRequest,
};

const BUDGET_COLUMNS: &str =
    "id::text AS id, user_id::text AS user_id, name, description, is_active, created_at, updated_at";

const ENVELOPE_COLUMNS: &str = "id::text AS id, budget_id::text AS budget_id, name, description, \
     envelope_type::text AS envelope_type, category_id::text AS category_id, current_balance, \
     target_amount, debt_balance, minimum_payment, notify_on_low_balance, low_balance_threshold, \
     notify_above_amount, is_active, sort_order, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id::text AS id, budget_id::text AS budget_id, \
     transaction_type::text AS transaction_type, amount, description, transaction_date, \
     from_envelope_id::text AS from_envelope_id, to_envelope_id::text AS to_envelope_id, \
     payee_id::text AS payee_id, income_source_id::text AS income_source_id, \
     category_id::text AS category_id, is_cleared, is_reconciled, is_deleted, created_at, updated_at";

const DEVICE_COLUMNS: &str = "id::text AS id, user_id::text AS user_id, device_id, device_name, \
     device_type, push_token, app_version, last_location, is_revoked, last_seen, created_at";

/// Backend over the managed Postgres instance. Connects with service-role
/// privileges, so every user-facing lookup carries its own `user_id` filter.
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct EnvelopeRow {
    id: String,
    budget_id: String,
    name: String,
    description: Option<String>,
    envelope_type: String,
    category_id: Option<String>,
    current_balance: Decimal,
    target_amount: Option<Decimal>,
    debt_balance: Decimal,
    minimum_payment: Option<Decimal>,
    notify_on_low_balance: bool,
    low_balance_threshold: Option<Decimal>,
    notify_above_amount: Option<Decimal>,
    is_active: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EnvelopeRow> for Envelope {
    type Error = DatabaseError;

    fn try_from(row: EnvelopeRow) -> Result<Self, Self::Error> {
        Ok(Envelope {
            envelope_type: row
                .envelope_type
                .parse()
                .map_err(|e: crate::models::UnknownVariant| DatabaseError::Decode(e.to_string()))?,
            id: row.id,
            budget_id: row.budget_id,
            name: row.name,
            description: row.description,
            category_id: row.category_id,
            current_balance: row.current_balance,
            target_amount: row.target_amount,
            debt_balance: row.debt_balance,
            minimum_payment: row.minimum_payment,
            notify_on_low_balance: row.notify_on_low_balance,
            low_balance_threshold: row.low_balance_threshold,
            notify_above_amount: row.notify_above_amount,
            is_active: row.is_active,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct TransactionRow {
    id: String,
    budget_id: String,
    transaction_type: String,
    amount: Decimal,
    description: Option<String>,
    transaction_date: NaiveDate,
    from_envelope_id: Option<String>,
    to_envelope_id: Option<String>,
    payee_id: Option<String>,
    income_source_id: Option<String>,
    category_id: Option<String>,
    is_cleared: bool,
    is_reconciled: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = DatabaseError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            transaction_type: row
                .transaction_type
                .parse()
                .map_err(|e: crate::models::UnknownVariant| DatabaseError::Decode(e.to_string()))?,
            id: row.id,
            budget_id: row.budget_id,
            amount: row.amount,
            description: row.description,
            transaction_date: row.transaction_date,
            from_envelope_id: row.from_envelope_id,
            to_envelope_id: row.to_envelope_id,
            payee_id: row.payee_id,
            income_source_id: row.income_source_id,
            category_id: row.category_id,
            is_cleared: row.is_cleared,
            is_reconciled: row.is_reconciled,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DeviceRegistrationRow {
    #[sqlx(flatten)]
    device: Device,
    inserted: bool,
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn parse_optional_id(field: &str, raw: &Option<String>) -> Result<Option<Uuid>, DatabaseError> {
    match raw {
        None => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(|_| DatabaseError::InvalidInput(format!("{} is not a valid id", field))),
    }
}

fn rpc_error(function: &'static str) -> impl FnOnce(sqlx::Error) -> DatabaseError {
    move |e| DatabaseError::Rpc { function, message: e.to_string() }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
    if let Some(start) = filter.start_date {
        qb.push(" AND transaction_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND transaction_date <= ").push_bind(end);
    }
    if let Some(kind) = filter.transaction_type {
        qb.push(" AND transaction_type::text = ").push_bind(kind.as_str());
    }
    if let Some(envelope_id) = &filter.envelope_id {
        qb.push(" AND (from_envelope_id::text = ")
            .push_bind(envelope_id.clone())
            .push(" OR to_envelope_id::text = ")
            .push_bind(envelope_id.clone())
            .push(")");
    }
    if let Some(payee_id) = &filter.payee_id {
        qb.push(" AND payee_id::text = ").push_bind(payee_id.clone());
    }
    if let Some(income_source_id) = &filter.income_source_id {
        qb.push(" AND income_source_id::text = ").push_bind(income_source_id.clone());
    }
    if let Some(category_id) = &filter.category_id {
        qb.push(" AND category_id::text = ").push_bind(category_id.clone());
    }
    if let Some(cleared) = filter.is_cleared {
        qb.push(" AND is_cleared = ").push_bind(cleared);
    }
    if let Some(reconciled) = filter.is_reconciled {
        qb.push(" AND is_reconciled = ").push_bind(reconciled);
    }
    if let Some(min) = filter.min_amount {
        qb.push(" AND amount >= ").push_bind(min);
    }
    if let Some(max) = filter.max_amount {
        qb.push(" AND amount <= ").push_bind(max);
    }
}

#[async_trait]
impl Backend for PgBackend {
    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>, DatabaseError> {
        let Some(user_id) = parse_id(user_id) else {
            return Ok(vec![]);
        };
        let sql = format!(
            "SELECT {} FROM budgets WHERE user_id = $1 ORDER BY name",
            BUDGET_COLUMNS
        );
        let budgets = sqlx::query_as::<_, Budget>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(budgets)
    }

    async fn find_owned_budget(
        &self,
        budget_id: &str,
        user_id: &str,
    ) -> Result<Option<Budget>, DatabaseError> {
        let (Some(budget_id), Some(user_id)) = (parse_id(budget_id), parse_id(user_id)) else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT {} FROM budgets WHERE id = $1 AND user_id = $2",
            BUDGET_COLUMNS
        );
        let budget = sqlx::query_as::<_, Budget>(&sql)
            .bind(budget_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(budget)
    }

    async fn list_envelopes(&self, budget_id: &str) -> Result<Vec<Envelope>, DatabaseError> {
        let Some(budget_id) = parse_id(budget_id) else {
            return Ok(vec![]);
        };
        let sql = format!(
            "SELECT {} FROM envelopes WHERE budget_id = $1 ORDER BY sort_order, name",
            ENVELOPE_COLUMNS
        );
        let rows = sqlx::query_as::<_, EnvelopeRow>(&sql)
            .bind(budget_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Envelope::try_from).collect()
    }

    async fn list_transactions(
        &self,
        budget_id: &str,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let Some(budget_id) = parse_id(budget_id) else {
            return Ok(vec![]);
        };

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM transactions WHERE is_deleted = false AND budget_id = ",
            TRANSACTION_COLUMNS
        ));
        qb.push_bind(budget_id);
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY transaction_date DESC, created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows: Vec<TransactionRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, DatabaseError> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT {} FROM transactions WHERE id = $1 AND is_deleted = false",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Transaction::try_from).transpose()
    }

    async fn insert_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<Transaction, DatabaseError> {
        let budget_id = parse_id(&request.budget_id)
            .ok_or_else(|| DatabaseError::InvalidInput("budget_id is not a valid id".to_string()))?;
        let from_envelope_id = parse_optional_id("from_envelope_id", &request.from_envelope_id)?;
        let to_envelope_id = parse_optional_id("to_envelope_id", &request.to_envelope_id)?;
        let payee_id = parse_optional_id("payee_id", &request.payee_id)?;
        let income_source_id = parse_optional_id("income_source_id", &request.income_source_id)?;
        let category_id = parse_optional_id("category_id", &request.category_id)?;

        let sql = format!(
            "INSERT INTO transactions (budget_id, transaction_type, amount, description, \
             transaction_date, from_envelope_id, to_envelope_id, payee_id, income_source_id, \
             category_id, is_cleared, is_reconciled) \
             VALUES ($1, $2::transaction_type, $3, $4, $5, $6, $7, $8, $9, $10, $11, false) \
             RETURNING {}",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(budget_id)
            .bind(request.transaction_type.as_str())
            .bind(request.amount)
            .bind(&request.description)
            .bind(request.transaction_date)
            .bind(from_envelope_id)
            .bind(to_envelope_id)
            .bind(payee_id)
            .bind(income_source_id)
            .bind(category_id)
            .bind(request.is_cleared.unwrap_or(false))
            .fetch_one(&self.pool)
            .await?;
        Transaction::try_from(row)
    }

    async fn update_transaction(
        &self,
        id: &str,
        changes: &UpdateTransactionRequest,
    ) -> Result<Transaction, DatabaseError> {
        let not_found = || DatabaseError::NotFound("Transaction not found".to_string());
        let id = parse_id(id).ok_or_else(not_found)?;
        let payee_id = parse_optional_id("payee_id", &changes.payee_id)?;
        let category_id = parse_optional_id("category_id", &changes.category_id)?;

        let sql = format!(
            "UPDATE transactions SET \
             description = COALESCE($2, description), \
             is_cleared = COALESCE($3, is_cleared), \
             is_reconciled = COALESCE($4, is_reconciled), \
             payee_id = COALESCE($5, payee_id), \
             category_id = COALESCE($6, category_id), \
             updated_at = now() \
             WHERE id = $1 AND is_deleted = false RETURNING {}",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .bind(&changes.description)
            .bind(changes.is_cleared)
            .bind(changes.is_reconciled)
            .bind(payee_id)
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(not_found)?;
        Transaction::try_from(row)
    }

    async fn soft_delete_transaction(&self, id: &str) -> Result<(), DatabaseError> {
        let not_found = || DatabaseError::NotFound("Transaction not found".to_string());
        let id = parse_id(id).ok_or_else(not_found)?;

        let result = sqlx::query(
            "UPDATE transactions SET is_deleted = true, deleted_at = now(), updated_at = now() \
             WHERE id = $1 AND is_deleted = false",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    async fn find_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, DatabaseError> {
        let Some(user_id) = parse_id(user_id) else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT {} FROM user_devices WHERE user_id = $1 AND device_id = $2",
            DEVICE_COLUMNS
        );
        let device = sqlx::query_as::<_, Device>(&sql)
            .bind(user_id)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(device)
    }

    async fn register_device(
        &self,
        user_id: &str,
        device_id: &str,
        request: &RegisterDeviceRequest,
    ) -> Result<DeviceRegistration, DatabaseError> {
        let user_id = parse_id(user_id)
            .ok_or_else(|| DatabaseError::InvalidInput("user id is not a valid id".to_string()))?;

        // xmax is zero only for freshly inserted tuples
        let sql = format!(
            "INSERT INTO user_devices (user_id, device_id, device_name, device_type, push_token, \
             app_version, last_location, last_seen) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
             ON CONFLICT (user_id, device_id) DO UPDATE SET \
             device_name = EXCLUDED.device_name, \
             device_type = COALESCE(EXCLUDED.device_type, user_devices.device_type), \
             push_token = COALESCE(EXCLUDED.push_token, user_devices.push_token), \
             app_version = COALESCE(EXCLUDED.app_version, user_devices.app_version), \
             last_location = COALESCE(EXCLUDED.last_location, user_devices.last_location), \
             last_seen = now() \
             WHERE user_devices.is_revoked = false \
             RETURNING {}, (xmax = 0) AS inserted",
            DEVICE_COLUMNS
        );
        let row = sqlx::query_as::<_, DeviceRegistrationRow>(&sql)
            .bind(user_id)
            .bind(device_id)
            .bind(&request.device_name)
            .bind(&request.device_type)
            .bind(&request.push_token)
            .bind(&request.app_version)
            .bind(&request.last_location)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::InvalidInput("Device has been revoked".to_string()))?;

        Ok(DeviceRegistration { device: row.device, created: row.inserted })
    }

    async fn list_devices(&self, user_id: &str) -> Result<Vec<Device>, DatabaseError> {
        let Some(user_id) = parse_id(user_id) else {
            return Ok(vec![]);
        };
        let sql = format!(
            "SELECT {} FROM user_devices WHERE user_id = $1 ORDER BY last_seen DESC",
            DEVICE_COLUMNS
        );
        let devices = sqlx::query_as::<_, Device>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(devices)
    }

    async fn revoke_device(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<Device>, DatabaseError> {
        let Some(user_id) = parse_id(user_id) else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE user_devices SET is_revoked = true, revoked_at = now() \
             WHERE user_id = $1 AND device_id = $2 RETURNING {}",
            DEVICE_COLUMNS
        );
        let device = sqlx::query_as::<_, Device>(&sql)
            .bind(user_id)
            .bind(device_id)
            .fetch_optional(&mut *tx)
            .await?;

        if device.is_some() {
            sqlx::query(
                "INSERT INTO invalidated_sessions (user_id, device_id, reason) \
                 VALUES ($1, $2, 'device_revoked')",
            )
            .bind(user_id)
            .bind(device_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(device)
    }

    async fn revoke_other_devices(
        &self,
        user_id: &str,
        keep_device_id: &str,
    ) -> Result<u64, DatabaseError> {
        let Some(user_id) = parse_id(user_id) else {
            return Ok(0);
        };

        let mut tx = self.pool.begin().await?;
        let revoked: Vec<String> = sqlx::query_scalar(
            "UPDATE user_devices SET is_revoked = true, revoked_at = now() \
             WHERE user_id = $1 AND device_id <> $2 AND is_revoked = false \
             RETURNING device_id",
        )
        .bind(user_id)
        .bind(keep_device_id)
        .fetch_all(&mut *tx)
        .await?;

        if !revoked.is_empty() {
            sqlx::query(
                "INSERT INTO invalidated_sessions (user_id, device_id, reason) \
                 SELECT $1, unnest($2::text[]), 'signout_all'",
            )
            .bind(user_id)
            .bind(&revoked)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(revoked.len() as u64)
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<NotificationData>, DatabaseError> {
        let Some(user_id) = parse_id(user_id) else {
            return Ok(vec![]);
        };
        let notifications = sqlx::query_as::<_, NotificationData>(
            "SELECT id::text AS id, user_id::text AS user_id, budget_id::text AS budget_id, \
             envelope_id::text AS envelope_id, notification_type, title, message, is_read, created_at \
             FROM notifications WHERE user_id = $1 AND ($2 = false OR is_read = false) \
             ORDER BY created_at DESC LIMIT 100",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn list_audit_events(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditEvent>, DatabaseError> {
        let Some(user_id) = parse_id(user_id) else {
            return Ok(vec![]);
        };
        let events = sqlx::query_as::<_, AuditEvent>(
            "SELECT id::text AS id, user_id::text AS user_id, event_type, table_name, \
             record_id::text AS record_id, details, created_at \
             FROM audit_events WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn is_session_invalidated(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<bool, DatabaseError> {
        const FUNCTION: &str = "is_session_invalidated";
        let user_id = parse_id(user_id).ok_or_else(|| DatabaseError::Rpc {
            function: FUNCTION,
            message: "user id is not a valid id".to_string(),
        })?;

        let invalidated: Option<bool> =
            sqlx::query_scalar("SELECT is_session_invalidated($1, $2)")
                .bind(user_id)
                .bind(device_id)
                .fetch_one(&self.pool)
                .await
                .map_err(rpc_error(FUNCTION))?;
        Ok(invalidated.unwrap_or(false))
    }

    async fn get_cleanup_stats(&self, days_back: i32) -> Result<Value, DatabaseError> {
        // Works whether the function returns a row, a set of rows or a scalar.
        let stats: Value = sqlx::query_scalar(
            "SELECT COALESCE(jsonb_agg(to_jsonb(s)), '[]'::jsonb) FROM get_cleanup_stats($1) AS s",
        )
        .bind(days_back)
        .fetch_one(&self.pool)
        .await
        .map_err(rpc_error("get_cleanup_stats"))?;
        Ok(stats)
    }

    async fn run_all_cleanup_jobs(&self) -> Result<Vec<CleanupResult>, DatabaseError> {
        let results = sqlx::query_as::<_, CleanupResult>(
            "SELECT job_name, records_cleaned::bigint AS records_cleaned, \
             execution_time_ms::bigint AS execution_time_ms, status \
             FROM run_all_cleanup_jobs()",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(rpc_error("run_all_cleanup_jobs"))?;
        Ok(results)
    }
}
