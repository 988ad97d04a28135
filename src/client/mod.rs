//! HTTP client for the NVLP API and the auth provider.
//!
//! Every API call carries `Authorization: Bearer <token>` and `X-Device-ID`. Access
//! tokens close to expiry are refreshed first; concurrent callers share one refresh.

use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::filter::TransactionFilter;
use crate::models::{
    AuthState, Budget, CreateTransactionRequest, Device, EnvelopesSummary, PersistedAuthData,
    RegisterDeviceRequest, Transaction, UpdateTransactionRequest, User,
};
use crate::session::DEVICE_ID_HEADER;
use crate::token::{TokenManager, TokenStorage};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} (HTTP {status})")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
    },

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API server, without a trailing slash.
    pub api_url: String,
    /// Base URL of the auth provider; `/auth/v1/...` is appended.
    pub auth_url: String,
    pub anon_key: String,
    pub device_id: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: &str, auth_url: &str, anon_key: &str, device_id: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            auth_url: auth_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            device_id: device_id.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Auth provider token grant response.
#[derive(Debug, Clone, Deserialize)]
struct TokenGrant {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: i64,
    user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub transactions: Vec<Transaction>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub budget: Budget,
    pub envelopes_summary: EnvelopesSummary,
    pub recent_transactions: Vec<Transaction>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceListing {
    #[serde(flatten)]
    pub device: Device,
    pub is_current: bool,
}

#[derive(Deserialize)]
struct BudgetList {
    budgets: Vec<Budget>,
}

#[derive(Deserialize)]
struct DeviceList {
    devices: Vec<DeviceListing>,
}

#[derive(Deserialize)]
struct SignoutAll {
    revoked: u64,
}

pub struct NvlpClient<S: TokenStorage> {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: TokenManager<S>,
    refresh_lock: Mutex<()>,
}

impl<S: TokenStorage> NvlpClient<S> {
    pub fn new(config: ClientConfig, tokens: TokenManager<S>) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config, tokens, refresh_lock: Mutex::new(()) })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &TokenManager<S> {
        &self.tokens
    }

    pub fn auth_state(&self) -> AuthState {
        self.tokens.auth_state()
    }

    // ---- auth provider ----

    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.auth_url, path)
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> ClientResult<PersistedAuthData> {
        let response = self
            .http
            .post(self.auth_endpoint("token?grant_type=password"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let grant: TokenGrant = read_json(response).await.map_err(|e| match e {
            ClientError::Api { message, .. } => ClientError::Auth(message),
            other => other,
        })?;
        let user = grant
            .user
            .ok_or_else(|| ClientError::Auth("token response did not include a user".to_string()))?;

        tracing::info!("Signed in as {}", user.id);
        Ok(self.tokens.save_tokens(&grant.access_token, &grant.refresh_token, grant.expires_in, user))
    }

    /// Exchange the stored refresh token for a new access token.
    pub async fn refresh_session(&self) -> ClientResult<PersistedAuthData> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> ClientResult<PersistedAuthData> {
        let current = self.tokens.load_tokens().ok_or(ClientError::NotAuthenticated)?;

        let response = self
            .http
            .post(self.auth_endpoint("token?grant_type=refresh_token"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "refresh_token": current.refresh_token }))
            .send()
            .await?;

        let grant: TokenGrant = match read_json(response).await {
            Ok(grant) => grant,
            Err(ClientError::Api { status, message, .. }) if status == 400 || status == 401 => {
                tracing::warn!("Refresh token rejected, clearing stored session: {}", message);
                self.tokens.clear_tokens();
                return Err(ClientError::Auth(message));
            }
            Err(e) => return Err(e),
        };

        tracing::debug!("Access token refreshed");
        self.tokens
            .update_access_token(&grant.access_token, &grant.refresh_token, grant.expires_in)
            .ok_or(ClientError::NotAuthenticated)
    }

    /// Refresh if the token is about to expire. Callers that lose the race find fresh
    /// tokens once they get the lock and skip the network call.
    async fn ensure_fresh_token(&self) -> ClientResult<String> {
        if self.tokens.needs_refresh() {
            let _guard = self.refresh_lock.lock().await;
            if self.tokens.needs_refresh() {
                self.refresh_locked().await?;
            }
        }
        self.tokens.access_token().ok_or(ClientError::NotAuthenticated)
    }

    /// Revoke the provider session and forget local tokens. Local state is cleared even
    /// when the provider call fails.
    pub async fn sign_out(&self) -> ClientResult<()> {
        let Some(token) = self.tokens.access_token() else {
            return Ok(());
        };

        let result = self
            .http
            .post(self.auth_endpoint("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&token)
            .send()
            .await;
        self.tokens.clear_tokens();

        let response = result?;
        if !response.status().is_success() && response.status() != StatusCode::UNAUTHORIZED {
            tracing::warn!("Auth provider logout returned {}", response.status());
        }
        Ok(())
    }

    // ---- API ----

    async fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = self.ensure_fresh_token().await?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.config.api_url, path))
            .bearer_auth(token)
            .header(DEVICE_ID_HEADER, &self.config.device_id))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let response = builder.send().await?;
        match read_json(response).await {
            Err(ClientError::Api { status: 401, message, code })
                if code.as_deref() == Some("SESSION_INVALIDATED") =>
            {
                tracing::warn!("Session invalidated by the server, clearing stored tokens");
                self.tokens.clear_tokens();
                Err(ClientError::Api { status: 401, message, code })
            }
            other => other,
        }
    }

    pub async fn health(&self) -> ClientResult<Value> {
        let response = self
            .http
            .get(format!("{}/health", self.config.api_url))
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn current_user(&self) -> ClientResult<Value> {
        let builder = self.request(Method::GET, "/auth/user").await?;
        self.send(builder).await
    }

    pub async fn list_budgets(&self) -> ClientResult<Vec<Budget>> {
        let builder = self.request(Method::GET, "/budgets").await?;
        let list: BudgetList = self.send(builder).await?;
        Ok(list.budgets)
    }

    pub async fn list_transactions(
        &self,
        budget_id: &str,
        filter: &TransactionFilter,
    ) -> ClientResult<TransactionPage> {
        let builder = self
            .request(Method::GET, &format!("/budgets/{}/transactions", budget_id))
            .await?
            .query(filter);
        self.send(builder).await
    }

    pub async fn get_transaction(&self, id: &str) -> ClientResult<Transaction> {
        let builder = self.request(Method::GET, &format!("/transactions/{}", id)).await?;
        self.send(builder).await
    }

    pub async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> ClientResult<Transaction> {
        let builder = self.request(Method::POST, "/transactions-simple").await?.json(request);
        self.send(builder).await
    }

    pub async fn update_transaction(
        &self,
        id: &str,
        changes: &UpdateTransactionRequest,
    ) -> ClientResult<Transaction> {
        let builder = self
            .request(Method::PATCH, &format!("/transactions/{}", id))
            .await?
            .json(changes);
        self.send(builder).await
    }

    pub async fn delete_transaction(&self, id: &str) -> ClientResult<()> {
        let builder = self.request(Method::DELETE, &format!("/transactions/{}", id)).await?;
        let _: Value = self.send(builder).await?;
        Ok(())
    }

    pub async fn dashboard(&self, budget_id: &str) -> ClientResult<Dashboard> {
        let builder = self
            .request(Method::GET, &format!("/budgets/{}/dashboard", budget_id))
            .await?;
        self.send(builder).await
    }

    pub async fn register_device(&self, request: &RegisterDeviceRequest) -> ClientResult<Device> {
        let builder = self.request(Method::POST, "/devices/register").await?.json(request);
        self.send(builder).await
    }

    pub async fn list_devices(&self) -> ClientResult<Vec<DeviceListing>> {
        let builder = self.request(Method::GET, "/devices").await?;
        let list: DeviceList = self.send(builder).await?;
        Ok(list.devices)
    }

    pub async fn revoke_device(&self, device_id: &str) -> ClientResult<()> {
        let builder = self.request(Method::DELETE, &format!("/devices/{}", device_id)).await?;
        let _: Value = self.send(builder).await?;
        Ok(())
    }

    pub async fn sign_out_other_devices(&self) -> ClientResult<u64> {
        let builder = self.request(Method::POST, "/devices/signout-all").await?;
        let result: SignoutAll = self.send(builder).await?;
        Ok(result.revoked)
    }
}

/// Decode a success body, or turn an error body (`{error, code}` from the API or
/// `{error_description}`/`{msg}` from the auth provider) into [`ClientError::Api`].
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = ["error_description", "error", "msg", "message"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
    let code = body.get("code").and_then(Value::as_str).map(str::to_string);

    Err(ClientError::Api { status: status.as_u16(), message, code })
}
