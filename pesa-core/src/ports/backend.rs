//! Backend ports - the managed services the wallet talks to
//!
//! The backend (auth, callable functions, document store) is an opaque
//! external collaborator. Each trait covers one area so services only
//! depend on what they use.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::result::Result;
use crate::domain::{KycStatus, Notification, Session, Transaction, User, Wallet, WalletLookup};

/// Event from the identity service's auth-state stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: String },
    SignedOut,
}

/// Federated identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    Google,
    Apple,
}

impl IdentityProvider {
    pub fn provider_id(&self) -> &'static str {
        match self {
            Self::Google => "google.com",
            Self::Apple => "apple.com",
        }
    }
}

/// Result of a federated sign-in
#[derive(Debug, Clone)]
pub struct FederatedSignIn {
    pub session: Session,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_new_user: bool,
}

/// Editable profile fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub profile_image_url: Option<String>,
}

impl ProfileUpdate {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(v) = &self.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &self.phone_number {
            user.phone_number = Some(User::normalize_phone(v));
        }
        if let Some(v) = &self.profile_image_url {
            user.profile_image_url = Some(v.clone());
        }
        user.updated_at = chrono::Utc::now();
    }
}

/// `sendMoney` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMoneyRequest {
    pub sender_wallet_id: String,
    pub receiver_wallet_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
    /// Lets the backend drop a resubmitted transfer
    pub idempotency_key: String,
}

/// `uploadKycDocuments` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSubmission {
    pub user_id: String,
    pub job_id: String,
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    /// Storage URLs of already-uploaded document images
    pub document_urls: Vec<String>,
    /// Raw result string from the SDK flow
    pub sdk_result: Option<String>,
}

/// Identity service
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Exchange a provider id token for a session
    async fn sign_in_with_idp(
        &self,
        provider: IdentityProvider,
        id_token: &str,
    ) -> Result<FederatedSignIn>;

    /// Reuse a persisted session for subsequent calls
    async fn restore(&self, session: &Session) -> Result<()>;

    /// Exchange the refresh token of an expired session for a fresh session
    async fn refresh_session(&self, session: &Session) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    async fn send_password_reset(&self, email: &str) -> Result<()>;

    /// Live auth-state stream, if the backend pushes one
    fn auth_events(&self) -> Option<broadcast::Receiver<AuthEvent>> {
        None
    }
}

/// User profile records
#[async_trait]
pub trait UserBackend: Send + Sync {
    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn create_user(&self, user: &User) -> Result<User>;

    async fn update_user(&self, user_id: &str, update: &ProfileUpdate) -> Result<User>;
}

/// Wallet records
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// The wallet owned by `user_id`
    async fn fetch_wallet(&self, user_id: &str) -> Result<Option<Wallet>>;

    /// Public view of any wallet, for recipient preview
    async fn lookup_wallet(&self, wallet_id: &str) -> Result<Option<WalletLookup>>;

    /// Live wallet snapshots, if the backend pushes them
    fn subscribe_wallet(&self, _user_id: &str) -> Option<broadcast::Receiver<Wallet>> {
        None
    }
}

/// Transaction listing and transfers
#[async_trait]
pub trait TransactionBackend: Send + Sync {
    /// Newest-first, at most `limit` records
    async fn fetch_transactions(&self, wallet_id: &str, limit: usize) -> Result<Vec<Transaction>>;

    /// Submit a transfer; returns the created (usually pending) record
    async fn send_money(&self, request: &SendMoneyRequest) -> Result<Transaction>;
}

/// Currency preference and rates
#[async_trait]
pub trait CurrencyBackend: Send + Sync {
    async fn preferred_currency(&self, user_id: &str) -> Result<String>;

    async fn set_preferred_currency(&self, user_id: &str, code: &str) -> Result<()>;

    /// Units of `to` per one unit of `from`
    async fn exchange_rate(&self, from: &str, to: &str) -> Result<Decimal>;
}

/// Inbox
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    async fn fetch_notifications(&self, user_id: &str) -> Result<Vec<Notification>>;

    async fn mark_read(&self, notification_id: &str) -> Result<()>;

    async fn mark_all_read(&self, user_id: &str) -> Result<()>;

    async fn delete_notification(&self, notification_id: &str) -> Result<()>;

    fn subscribe_notifications(
        &self,
        _user_id: &str,
    ) -> Option<broadcast::Receiver<Vec<Notification>>> {
        None
    }
}

/// KYC document intake
#[async_trait]
pub trait KycBackend: Send + Sync {
    async fn upload_kyc_documents(&self, submission: &KycSubmission) -> Result<KycStatus>;
}
