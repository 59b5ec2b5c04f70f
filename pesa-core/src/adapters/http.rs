//! HTTP backend client
//!
//! Talks to the managed backend over two surfaces:
//! - the identity REST API (`accounts:*` endpoints keyed with the project API key)
//!   and its secure-token endpoint, which swaps a refresh token for a new id token
//! - callable functions: `POST {functions_url}/{name}` with `{"data": ...}`,
//!   answered with `{"result": ...}` or `{"error": {...}}`
//!
//! The id token from the last sign-in (or restored session) is sent as a
//! bearer token on every callable.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};
use url::Url;

use crate::domain::result::{Error, Result};
use crate::domain::{
    ApiError, KycStatus, Notification, Session, Transaction, TransactionStatus, TransactionType,
    User, Wallet, WalletLookup,
};
use crate::ports::{
    AuthBackend, CurrencyBackend, FederatedSignIn, IdentityProvider, KycBackend, KycSubmission,
    NotificationBackend, ProfileUpdate, SendMoneyRequest, TransactionBackend, UserBackend,
    WalletBackend,
};

/// Default identity REST endpoint
pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";
/// Default secure-token endpoint (refresh token exchange)
pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

/// Where and how to reach the backend
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub auth_url: String,
    pub token_url: String,
    pub functions_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Backend reached over HTTPS
#[derive(Debug)]
pub struct HttpBackend {
    client: Client,
    auth_url: Url,
    token_url: Url,
    functions_url: Url,
    api_key: String,
    session: RwLock<Option<Session>>,
}

// =============================================================================
// Wire models
// =============================================================================

/// Deserialize amount that can be number or string
fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: JsonValue = Deserialize::deserialize(deserializer)?;
    parse_amount(&value).map_err(D::Error::custom)
}

/// Deserialize optional amount that can be number, string or null
fn deserialize_optional_amount<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(v) => parse_amount(&v).map(Some).map_err(D::Error::custom),
    }
}

fn parse_amount(value: &JsonValue) -> std::result::Result<Decimal, String> {
    match value {
        JsonValue::Number(n) => n
            .to_string()
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(|e| format!("invalid decimal: {}", e)),
        JsonValue::String(s) => s
            .trim()
            .parse::<Decimal>()
            .map_err(|e| format!("invalid decimal: {}", e)),
        _ => Err("expected number or string for amount".to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireWallet {
    id: String,
    user_id: String,
    #[serde(deserialize_with = "deserialize_amount")]
    balance: Decimal,
    currency: String,
    #[serde(deserialize_with = "deserialize_amount")]
    daily_limit: Decimal,
    #[serde(deserialize_with = "deserialize_amount")]
    monthly_limit: Decimal,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    daily_spent: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    monthly_spent: Option<Decimal>,
    #[serde(default = "default_true")]
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    last_transaction_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl From<WireWallet> for Wallet {
    fn from(w: WireWallet) -> Self {
        Wallet {
            id: w.id,
            user_id: w.user_id,
            balance: w.balance,
            currency: Wallet::normalize_currency(&w.currency),
            daily_limit: w.daily_limit,
            monthly_limit: w.monthly_limit,
            daily_spent: w.daily_spent.unwrap_or_default(),
            monthly_spent: w.monthly_spent.unwrap_or_default(),
            is_active: w.is_active,
            created_at: w.created_at,
            updated_at: w.updated_at,
            last_transaction_at: w.last_transaction_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTransaction {
    id: String,
    #[serde(default)]
    reference: Option<String>,
    sender_wallet_id: String,
    receiver_wallet_id: String,
    #[serde(default)]
    sender_name: Option<String>,
    #[serde(default)]
    receiver_name: Option<String>,
    #[serde(deserialize_with = "deserialize_amount")]
    amount: Decimal,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    fee: Option<Decimal>,
    currency: String,
    #[serde(alias = "type")]
    transaction_type: TransactionType,
    status: TransactionStatus,
    #[serde(default)]
    description: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    converted_amount: Option<Decimal>,
    #[serde(default)]
    converted_currency: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    exchange_rate: Option<Decimal>,
}

impl From<WireTransaction> for Transaction {
    fn from(t: WireTransaction) -> Self {
        Transaction {
            reference: t
                .reference
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| Transaction::reference_for(&t.id)),
            id: t.id,
            sender_wallet_id: t.sender_wallet_id,
            receiver_wallet_id: t.receiver_wallet_id,
            sender_name: t.sender_name,
            receiver_name: t.receiver_name,
            amount: t.amount,
            fee: t.fee.unwrap_or_default(),
            currency: t.currency.trim().to_uppercase(),
            transaction_type: t.transaction_type,
            status: t.status,
            description: t.description,
            created_at: t.created_at,
            completed_at: t.completed_at,
            converted_amount: t.converted_amount,
            converted_currency: t.converted_currency.map(|c| c.trim().to_uppercase()),
            exchange_rate: t.exchange_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurrencyResponse {
    currency: String,
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    #[serde(deserialize_with = "deserialize_amount")]
    rate: Decimal,
}

#[derive(Debug, Deserialize)]
struct KycStatusResponse {
    status: KycStatus,
}

/// Identity REST sign-in / sign-up response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    /// Seconds, sent as a string
    #[serde(default)]
    expires_in: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    is_new_user: bool,
}

impl IdentityResponse {
    fn session(&self) -> Session {
        let expires_at = self
            .expires_in
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));
        Session {
            user_id: self.local_id.clone(),
            id_token: self.id_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at,
        }
    }
}

/// Secure-token exchange response (snake_case, unlike the identity API)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    /// Seconds, sent as a string
    #[serde(default)]
    expires_in: Option<String>,
}

impl TokenResponse {
    fn session(&self) -> Session {
        let expires_at = self
            .expires_in
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs));
        Session {
            user_id: self.user_id.clone(),
            id_token: self.id_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

// =============================================================================
// Error decoding
// =============================================================================

/// Decode a callable error envelope into an `ApiError`
///
/// `details.code` wins; otherwise the canonical status is mapped to a code.
pub(crate) fn decode_callable_error(status: StatusCode, body: &str) -> ApiError {
    let parsed: Option<JsonValue> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let Some(error) = error else {
        let code = status_code_fallback(status);
        return ApiError::new(code, format!("HTTP {}", status.as_u16()))
            .retryable(status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS);
    };

    let canonical = error.get("status").and_then(|s| s.as_str()).unwrap_or("");
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("request failed")
        .to_string();
    let details = error.get("details").cloned();

    let code = details
        .as_ref()
        .and_then(|d| d.get("code"))
        .and_then(|c| c.as_str())
        .map(|c| c.to_string())
        .unwrap_or_else(|| canonical_status_code(canonical, status).to_string());
    let retryable = details
        .as_ref()
        .and_then(|d| d.get("retryable"))
        .and_then(|r| r.as_bool())
        .unwrap_or(matches!(canonical, "UNAVAILABLE" | "DEADLINE_EXCEEDED"));

    let mut api = ApiError::new(code, message).retryable(retryable);
    if let Some(details) = details {
        api = api.with_details(details);
    }
    api
}

fn canonical_status_code(canonical: &str, status: StatusCode) -> &'static str {
    match canonical {
        "UNAUTHENTICATED" => "AUTH_UNAUTHENTICATED",
        "PERMISSION_DENIED" => "AUTH_PERMISSION_DENIED",
        "RESOURCE_EXHAUSTED" => "RATE_LIMITED",
        "UNAVAILABLE" => "SERVICE_UNAVAILABLE",
        "DEADLINE_EXCEEDED" => "SERVICE_TIMEOUT",
        "INVALID_ARGUMENT" => "SYSTEM_INVALID_ARGUMENT",
        "NOT_FOUND" => "SYSTEM_NOT_FOUND",
        "INTERNAL" => "SYSTEM_INTERNAL",
        _ => status_code_fallback(status),
    }
}

fn status_code_fallback(status: StatusCode) -> &'static str {
    match status.as_u16() {
        401 => "AUTH_UNAUTHENTICATED",
        403 => "AUTH_PERMISSION_DENIED",
        404 => "SYSTEM_NOT_FOUND",
        429 => "RATE_LIMITED",
        503 => "SERVICE_UNAVAILABLE",
        504 => "SERVICE_TIMEOUT",
        _ => "SYSTEM_UNKNOWN",
    }
}

/// Identity REST errors carry an upper-case reason in `error.message`
fn decode_identity_error(status: StatusCode, body: &str) -> ApiError {
    let reason = serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
        })
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    // Reasons may carry a suffix: "WEAK_PASSWORD : Password should be ..."
    let head = reason.split(':').next().unwrap_or("").trim();
    let code = match head {
        "EMAIL_EXISTS" => "AUTH_EMAIL_IN_USE",
        "EMAIL_NOT_FOUND" => "AUTH_USER_NOT_FOUND",
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_IDP_RESPONSE" => {
            "AUTH_INVALID_CREDENTIALS"
        }
        "WEAK_PASSWORD" => "AUTH_WEAK_PASSWORD",
        "USER_DISABLED" => "AUTH_USER_DISABLED",
        "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "INVALID_REFRESH_TOKEN" => "AUTH_SESSION_EXPIRED",
        "USER_NOT_FOUND" => "AUTH_USER_NOT_FOUND",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "RATE_LIMITED",
        "INVALID_EMAIL" => "AUTH_INVALID_EMAIL",
        "API_KEY_INVALID" => "CONFIG_INVALID_API_KEY",
        _ => status_code_fallback(status),
    };
    ApiError::new(code, reason)
}

// =============================================================================
// Client
// =============================================================================

fn parse_base(raw: &str, what: &str) -> Result<Url> {
    // Trailing slash so `join` appends instead of replacing the last segment
    let normalized = format!("{}/", raw.trim().trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| Error::Config(format!("invalid {} '{}': {}", what, raw, e)))
}

impl HttpBackend {
    pub fn new(config: &HttpBackendConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("backend API key cannot be empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            auth_url: parse_base(&config.auth_url, "auth URL")?,
            token_url: parse_base(&config.token_url, "token URL")?,
            functions_url: parse_base(&config.functions_url, "functions URL")?,
            api_key: config.api_key.clone(),
            session: RwLock::new(None),
        })
    }

    fn set_session(&self, session: Option<Session>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    fn bearer(&self) -> Option<String> {
        self.session
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.id_token.clone()))
    }

    /// POST to an identity endpoint such as `accounts:signUp`
    async fn identity<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        // "./" keeps `accounts:` from parsing as a URL scheme
        let mut url = self
            .auth_url
            .join(&format!("./{}", endpoint))
            .map_err(|e| Error::Config(format!("invalid identity endpoint: {}", e)))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);

        debug!(endpoint, "identity request");
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let err = decode_identity_error(status, &text);
            warn!(endpoint, code = %err.code, "identity request failed");
            return Err(err.into());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Swap a refresh token for a fresh id token
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut url = self
            .token_url
            .join("token")
            .map_err(|e| Error::Config(format!("invalid token endpoint: {}", e)))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token)
            .finish();

        debug!("token refresh request");
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let err = decode_identity_error(status, &text);
            warn!(code = %err.code, "token refresh failed");
            return Err(err.into());
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Invoke a callable function and decode its `result`
    async fn call<T: DeserializeOwned>(&self, name: &str, data: JsonValue) -> Result<T> {
        let url = self
            .functions_url
            .join(name)
            .map_err(|e| Error::Config(format!("invalid callable name '{}': {}", name, e)))?;

        let mut request = self.client.post(url).json(&json!({ "data": data }));
        if let Some(token) = self.bearer() {
            request = request.bearer_auth(token);
        }

        debug!(callable = name, "callable request");
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body: Option<JsonValue> = serde_json::from_str(&text).ok();
        let has_error = body.as_ref().map(|b| b.get("error").is_some()).unwrap_or(false);
        if !status.is_success() || has_error {
            let err = decode_callable_error(status, &text);
            warn!(callable = name, code = %err.code, retryable = err.retryable, "callable failed");
            return Err(err.into());
        }

        let result = body
            .and_then(|mut b| b.get_mut("result").map(JsonValue::take))
            .unwrap_or(JsonValue::Null);
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        let body = PasswordCredentials {
            email,
            password,
            return_secure_token: true,
        };
        let response: IdentityResponse = self.identity("accounts:signUp", &body).await?;
        let session = response.session();
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let body = PasswordCredentials {
            email,
            password,
            return_secure_token: true,
        };
        let response: IdentityResponse =
            self.identity("accounts:signInWithPassword", &body).await?;
        let session = response.session();
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_idp(
        &self,
        provider: IdentityProvider,
        id_token: &str,
    ) -> Result<FederatedSignIn> {
        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", id_token)
            .append_pair("providerId", provider.provider_id())
            .finish();
        let body = json!({
            "postBody": post_body,
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });
        let response: IdentityResponse = self.identity("accounts:signInWithIdp", &body).await?;
        let session = response.session();
        self.set_session(Some(session.clone()));
        Ok(FederatedSignIn {
            session,
            email: response.email,
            display_name: response.display_name,
            is_new_user: response.is_new_user,
        })
    }

    async fn restore(&self, session: &Session) -> Result<()> {
        if session.is_expired() {
            return Err(ApiError::new("AUTH_SESSION_EXPIRED", "session expired").into());
        }
        self.set_session(Some(session.clone()));
        Ok(())
    }

    async fn refresh_session(&self, session: &Session) -> Result<Session> {
        if session.refresh_token.is_empty() {
            return Err(ApiError::new("AUTH_SESSION_EXPIRED", "no refresh token").into());
        }
        let fresh = self.exchange_refresh_token(&session.refresh_token).await?.session();
        if fresh.user_id != session.user_id {
            return Err(ApiError::new("AUTH_SESSION_EXPIRED", "refreshed token belongs to another user").into());
        }
        self.set_session(Some(fresh.clone()));
        Ok(fresh)
    }

    async fn sign_out(&self) -> Result<()> {
        self.set_session(None);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        let body = json!({ "requestType": "PASSWORD_RESET", "email": email });
        let _: JsonValue = self.identity("accounts:sendOobCode", &body).await?;
        Ok(())
    }
}

#[async_trait]
impl UserBackend for HttpBackend {
    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>> {
        self.call("getUserProfile", json!({ "userId": user_id })).await
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        self.call("createUserProfile", json!({ "user": user })).await
    }

    async fn update_user(&self, user_id: &str, update: &ProfileUpdate) -> Result<User> {
        self.call(
            "updateUserProfile",
            json!({ "userId": user_id, "update": update }),
        )
        .await
    }
}

#[async_trait]
impl WalletBackend for HttpBackend {
    async fn fetch_wallet(&self, user_id: &str) -> Result<Option<Wallet>> {
        let wallet: Option<WireWallet> = self.call("getWallet", json!({ "userId": user_id })).await?;
        Ok(wallet.map(Wallet::from))
    }

    async fn lookup_wallet(&self, wallet_id: &str) -> Result<Option<WalletLookup>> {
        self.call("lookupWallet", json!({ "walletId": wallet_id })).await
    }
}

#[async_trait]
impl TransactionBackend for HttpBackend {
    async fn fetch_transactions(&self, wallet_id: &str, limit: usize) -> Result<Vec<Transaction>> {
        let txs: Option<Vec<WireTransaction>> = self
            .call(
                "getTransactions",
                json!({ "walletId": wallet_id, "limit": limit }),
            )
            .await?;
        Ok(txs
            .unwrap_or_default()
            .into_iter()
            .map(Transaction::from)
            .collect())
    }

    async fn send_money(&self, request: &SendMoneyRequest) -> Result<Transaction> {
        let tx: WireTransaction = self.call("sendMoney", serde_json::to_value(request)?).await?;
        Ok(tx.into())
    }
}

#[async_trait]
impl CurrencyBackend for HttpBackend {
    async fn preferred_currency(&self, user_id: &str) -> Result<String> {
        let response: CurrencyResponse = self
            .call("getPreferredCurrency", json!({ "userId": user_id }))
            .await?;
        Ok(response.currency.trim().to_uppercase())
    }

    async fn set_preferred_currency(&self, user_id: &str, code: &str) -> Result<()> {
        let _: JsonValue = self
            .call(
                "setPreferredCurrency",
                json!({ "userId": user_id, "currency": code }),
            )
            .await?;
        Ok(())
    }

    async fn exchange_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        let response: RateResponse = self
            .call("getExchangeRate", json!({ "from": from, "to": to }))
            .await?;
        Ok(response.rate)
    }
}

#[async_trait]
impl NotificationBackend for HttpBackend {
    async fn fetch_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let list: Option<Vec<Notification>> = self
            .call("getNotifications", json!({ "userId": user_id }))
            .await?;
        Ok(list.unwrap_or_default())
    }

    async fn mark_read(&self, notification_id: &str) -> Result<()> {
        let _: JsonValue = self
            .call(
                "markNotificationRead",
                json!({ "notificationId": notification_id }),
            )
            .await?;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<()> {
        let _: JsonValue = self
            .call("markAllNotificationsRead", json!({ "userId": user_id }))
            .await?;
        Ok(())
    }

    async fn delete_notification(&self, notification_id: &str) -> Result<()> {
        let _: JsonValue = self
            .call(
                "deleteNotification",
                json!({ "notificationId": notification_id }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl KycBackend for HttpBackend {
    async fn upload_kyc_documents(&self, submission: &KycSubmission) -> Result<KycStatus> {
        let response: KycStatusResponse = self
            .call("uploadKycDocuments", serde_json::to_value(submission)?)
            .await?;
        Ok(response.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http_mock::{MockBackendServer, MockResponse};
    use crate::domain::ErrorCategory;

    fn backend(server: &MockBackendServer) -> HttpBackend {
        HttpBackend::new(&HttpBackendConfig {
            auth_url: server.base_url(),
            token_url: server.base_url(),
            functions_url: format!("{}/functions", server.base_url()),
            api_key: "test_key".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    const WALLET_JSON: &str = r#"{"result":{
        "id":"w-1","userId":"u-1","balance":1234.5,"currency":"ngn",
        "dailyLimit":"500000","monthlyLimit":5000000,"dailySpent":0,
        "isActive":true,"createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-02T00:00:00Z"
    }}"#;

    #[test]
    fn test_empty_api_key_rejected() {
        let result = HttpBackend::new(&HttpBackendConfig {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            functions_url: "https://example.com".to_string(),
            api_key: " ".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_callable_error_envelope_decodes() {
        let body = r#"{"error":{"status":"FAILED_PRECONDITION","message":"limit hit",
            "details":{"code":"TXN_DAILY_LIMIT_EXCEEDED","retryable":false,"remaining":"1500"}}}"#;
        let err = decode_callable_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.code, "TXN_DAILY_LIMIT_EXCEEDED");
        assert_eq!(err.message, "limit hit");
        assert_eq!(err.category(), ErrorCategory::Transaction);
        assert!(!err.is_retryable());
        assert_eq!(err.details.as_ref().unwrap()["remaining"], "1500");
    }

    #[test]
    fn test_callable_error_without_details_uses_status() {
        let body = r#"{"error":{"status":"UNAVAILABLE","message":"try later"}}"#;
        let err = decode_callable_error(StatusCode::SERVICE_UNAVAILABLE, body);
        assert_eq!(err.code, "SERVICE_UNAVAILABLE");
        assert!(err.is_retryable());

        let err = decode_callable_error(StatusCode::TOO_MANY_REQUESTS, "<html>");
        assert_eq!(err.code, "RATE_LIMITED");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_identity_error_reasons() {
        let body = r#"{"error":{"code":400,"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}"#;
        assert_eq!(decode_identity_error(StatusCode::BAD_REQUEST, body).code, "AUTH_WEAK_PASSWORD");
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS"}}"#;
        assert_eq!(decode_identity_error(StatusCode::BAD_REQUEST, body).code, "AUTH_EMAIL_IN_USE");
    }

    #[test]
    fn test_wire_transaction_accepts_string_and_number_amounts() {
        let json = r#"{"id":"abc123xyz","senderWalletId":"w-1","receiverWalletId":"w-2",
            "amount":"2500.75","fee":10,"currency":"ngn","type":"send","status":"pending",
            "createdAt":"2024-03-01T10:00:00Z"}"#;
        let tx: Transaction = serde_json::from_str::<WireTransaction>(json).unwrap().into();
        assert_eq!(tx.amount, Decimal::new(250075, 2));
        assert_eq!(tx.fee, Decimal::from(10));
        assert_eq!(tx.currency, "NGN");
        assert_eq!(tx.reference, "TXN-ABC123XY");
        assert_eq!(tx.transaction_type, TransactionType::Send);
    }

    #[tokio::test]
    async fn test_sign_in_then_callable_carries_bearer() {
        let server = MockBackendServer::start(vec![
            (
                "/accounts:signInWithPassword",
                MockResponse::ok(
                    r#"{"localId":"u-1","idToken":"tok-123","refreshToken":"r","expiresIn":"3600"}"#,
                ),
            ),
            ("/functions/getWallet", MockResponse::ok(WALLET_JSON)),
        ])
        .unwrap();
        let backend = backend(&server);

        let session = backend.sign_in("ada@example.com", "secret-pass").await.unwrap();
        assert_eq!(session.user_id, "u-1");
        assert!(session.expires_at.is_some());

        let wallet = backend.fetch_wallet("u-1").await.unwrap().unwrap();
        assert_eq!(wallet.balance, Decimal::new(12345, 1));
        assert_eq!(wallet.daily_limit, Decimal::from(500_000));
        assert_eq!(wallet.currency, "NGN");
        assert_eq!(wallet.monthly_spent, Decimal::ZERO);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].path.contains("key=test_key"));
        assert_eq!(requests[1].header("authorization").as_deref(), Some("Bearer tok-123"));
        let body: JsonValue = serde_json::from_str(&requests[1].body).unwrap();
        assert_eq!(body["data"]["userId"], "u-1");
    }

    #[tokio::test]
    async fn test_callable_error_surfaces_as_api_error() {
        let server = MockBackendServer::start(vec![(
            "/functions/sendMoney",
            MockResponse::status(
                400,
                r#"{"error":{"status":"FAILED_PRECONDITION","message":"nope","details":{"code":"WALLET_INSUFFICIENT_FUNDS"}}}"#,
            ),
        )])
        .unwrap();
        let backend = backend(&server);
        let request = SendMoneyRequest {
            sender_wallet_id: "w-1".into(),
            receiver_wallet_id: "w-2".into(),
            amount: Decimal::from(10),
            currency: "NGN".into(),
            description: None,
            idempotency_key: "k".into(),
        };
        let err = backend.send_money(&request).await.unwrap_err();
        assert_eq!(err.code(), Some("WALLET_INSUFFICIENT_FUNDS"));
    }

    #[tokio::test]
    async fn test_null_result_is_none() {
        let server = MockBackendServer::start(vec![(
            "/functions/lookupWallet",
            MockResponse::ok(r#"{"result":null}"#),
        )])
        .unwrap();
        let backend = backend(&server);
        assert!(backend.lookup_wallet("w-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let backend = HttpBackend::new(&HttpBackendConfig {
            auth_url: "http://127.0.0.1:1".to_string(),
            token_url: "http://127.0.0.1:1".to_string(),
            functions_url: "http://127.0.0.1:1".to_string(),
            api_key: "test_key".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let err = backend.fetch_wallet("u-1").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    fn expired_session() -> Session {
        Session {
            user_id: "u-1".to_string(),
            id_token: "tok-old".to_string(),
            refresh_token: "r-1".to_string(),
            expires_at: Some(Utc::now() - ChronoDuration::minutes(5)),
        }
    }

    #[tokio::test]
    async fn test_refresh_session_exchanges_refresh_token() {
        let server = MockBackendServer::start(vec![
            (
                "/token",
                MockResponse::ok(
                    r#"{"id_token":"tok-new","refresh_token":"r-2","user_id":"u-1","expires_in":"3600","token_type":"Bearer"}"#,
                ),
            ),
            ("/functions/getWallet", MockResponse::ok(WALLET_JSON)),
        ])
        .unwrap();
        let backend = backend(&server);
        let expired = expired_session();
        assert!(backend.restore(&expired).await.is_err());

        let fresh = backend.refresh_session(&expired).await.unwrap();
        assert_eq!(fresh.user_id, "u-1");
        assert_eq!(fresh.id_token, "tok-new");
        assert_eq!(fresh.refresh_token, "r-2");
        assert!(!fresh.is_expired());

        backend.fetch_wallet("u-1").await.unwrap();
        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].path.starts_with("/token?key=test_key"));
        assert!(requests[0].body.contains("grant_type=refresh_token"));
        assert!(requests[0].body.contains("refresh_token=r-1"));
        assert_eq!(requests[1].header("authorization").as_deref(), Some("Bearer tok-new"));
    }

    #[tokio::test]
    async fn test_rejected_refresh_token_is_session_expired() {
        let server = MockBackendServer::start(vec![(
            "/token",
            MockResponse::status(400, r#"{"error":{"code":400,"message":"INVALID_REFRESH_TOKEN"}}"#),
        )])
        .unwrap();
        let backend = backend(&server);
        let err = backend.refresh_session(&expired_session()).await.unwrap_err();
        assert_eq!(err.code(), Some("AUTH_SESSION_EXPIRED"));
    }

    #[tokio::test]
    async fn test_mark_all_read_uses_bulk_callable() {
        let server = MockBackendServer::start(vec![(
            "/functions/markAllNotificationsRead",
            MockResponse::ok(r#"{"result":{"updated":2}}"#),
        )])
        .unwrap();
        let backend = backend(&server);
        backend.mark_all_read("u-1").await.unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/functions/markAllNotificationsRead");
        let body: JsonValue = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["data"]["userId"], "u-1");
    }
}
