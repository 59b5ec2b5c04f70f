//! In-process backend
//!
//! Implements every backend port against in-memory maps. It plays the
//! server's role faithfully enough for demo mode and tests: it checks
//! credentials, enforces spend limits authoritatively, moves balances on
//! transfer, and pushes auth, wallet and notification events the way the
//! managed backend's live listeners do.
//!
//! A backend opened with `open_demo` keeps its accounts, balances, history
//! and inbox in a JSON snapshot file, rewritten after every change, so demo
//! activity carries over from one process to the next.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    ApiError, KycStatus, Notification, NotificationType, Session, Transaction, TransactionStatus,
    TransactionType, User, Wallet, WalletLookup,
};
use crate::ports::{
    AuthBackend, AuthEvent, CurrencyBackend, FederatedSignIn, IdentityProvider, KycBackend,
    KycSubmission, NotificationBackend, ProfileUpdate, SendMoneyRequest, TransactionBackend,
    UserBackend, WalletBackend,
};

pub const DEMO_EMAIL: &str = "demo@pesa.app";
pub const DEMO_PASSWORD: &str = "demo-password";
pub const DEMO_WALLET_ID: &str = "wallet-demo-0001";
pub const DEMO_PEER_WALLET_ID: &str = "wallet-kwame-0002";
/// Snapshot file for the demo backend, relative to the data directory
pub const DEMO_STATE_FILE: &str = "demo-backend.json";

const DEFAULT_DAILY_LIMIT: i64 = 500_000;
const DEFAULT_MONTHLY_LIMIT: i64 = 5_000_000;
const CHANNEL_CAPACITY: usize = 32;

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct MemoryState {
    users: HashMap<String, User>,
    /// email -> (password, user id)
    credentials: HashMap<String, (String, String)>,
    wallets: HashMap<String, Wallet>,
    /// newest last
    transactions: Vec<Transaction>,
    notifications: Vec<Notification>,
    #[serde(skip)]
    rates: HashMap<(String, String), Decimal>,
    #[serde(skip)]
    current_user: Option<String>,
    kyc_submissions: Vec<KycSubmission>,
    processed_keys: HashMap<String, String>,
}

/// Backend living entirely in memory
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    auth_tx: broadcast::Sender<AuthEvent>,
    wallet_tx: Mutex<HashMap<String, broadcast::Sender<Wallet>>>,
    notification_tx: Mutex<HashMap<String, broadcast::Sender<Vec<Notification>>>>,
    offline: Mutex<bool>,
    fail_next: Mutex<Option<ApiError>>,
    latency: Mutex<Duration>,
    transfer_fee: Mutex<Decimal>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Empty backend: no users, no wallets
    pub fn new() -> Self {
        let (auth_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(MemoryState::default()),
            auth_tx,
            wallet_tx: Mutex::new(HashMap::new()),
            notification_tx: Mutex::new(HashMap::new()),
            offline: Mutex::new(false),
            fail_next: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
            transfer_fee: Mutex::new(Decimal::ZERO),
            snapshot_path: None,
        }
    }

    /// Backend seeded with a demo user, a peer, history and an inbox
    pub fn with_demo_data() -> Self {
        let backend = Self::new();
        {
            let mut state = backend.lock_state();
            let now = Utc::now();

            let mut ada = User::new("user-demo", DEMO_EMAIL, "Ada", "Obi", "NG", "NGN");
            ada.kyc_status = KycStatus::Verified;
            ada.kyc_completed_at = Some(now - ChronoDuration::days(30));
            ada.wallet_id = Some(DEMO_WALLET_ID.to_string());
            let mut ada_wallet = Wallet::new(
                DEMO_WALLET_ID,
                &ada.id,
                "NGN",
                Decimal::from(DEFAULT_DAILY_LIMIT),
                Decimal::from(DEFAULT_MONTHLY_LIMIT),
            );
            ada_wallet.balance = Decimal::from(250_000);
            ada_wallet.daily_spent = Decimal::from(12_500);
            ada_wallet.monthly_spent = Decimal::from(182_000);

            let mut kwame = User::new("user-kwame", "kwame@pesa.app", "Kwame", "Mensah", "GH", "GHS");
            kwame.kyc_status = KycStatus::Verified;
            kwame.wallet_id = Some(DEMO_PEER_WALLET_ID.to_string());
            let mut kwame_wallet = Wallet::new(
                DEMO_PEER_WALLET_ID,
                &kwame.id,
                "GHS",
                Decimal::from(20_000),
                Decimal::from(200_000),
            );
            kwame_wallet.balance = Decimal::from(3_400);

            let history = [
                (DEMO_PEER_WALLET_ID, DEMO_WALLET_ID, 40_000, "School fees refund", 9),
                (DEMO_WALLET_ID, DEMO_PEER_WALLET_ID, 12_500, "Market run", 3),
                (DEMO_WALLET_ID, DEMO_PEER_WALLET_ID, 7_800, "Airtime", 1),
            ];
            for (i, (from, to, amount, desc, days_ago)) in history.into_iter().enumerate() {
                let mut tx = Transaction::new(
                    format!("txn-demo-{:04}", i + 1),
                    from,
                    to,
                    Decimal::from(amount),
                    "NGN",
                    TransactionType::Send,
                );
                tx.sender_name = Some(if from == DEMO_WALLET_ID { "Ada Obi" } else { "Kwame Mensah" }.to_string());
                tx.receiver_name = Some(if to == DEMO_WALLET_ID { "Ada Obi" } else { "Kwame Mensah" }.to_string());
                tx.description = Some(desc.to_string());
                tx.status = TransactionStatus::Completed;
                tx.created_at = now - ChronoDuration::days(days_ago);
                tx.completed_at = Some(tx.created_at);
                state.transactions.push(tx);
            }

            state.notifications.push(
                Notification::new(
                    "notif-demo-1",
                    &ada.id,
                    "Money received",
                    "Kwame Mensah sent you ₦40,000.00",
                    NotificationType::Transaction,
                )
                .with_data("transactionId", "txn-demo-0001"),
            );
            state.notifications.push(Notification::new(
                "notif-demo-2",
                &ada.id,
                "Identity verified",
                "Your account is fully verified.",
                NotificationType::Kyc,
            ));

            seed_rates(&mut state);
            state.credentials.insert(DEMO_EMAIL.to_string(), (DEMO_PASSWORD.to_string(), ada.id.clone()));
            state.wallets.insert(ada_wallet.id.clone(), ada_wallet);
            state.wallets.insert(kwame_wallet.id.clone(), kwame_wallet);
            state.users.insert(ada.id.clone(), ada);
            state.users.insert(kwame.id.clone(), kwame);
        }
        backend
    }

    /// Demo backend persisted at `path`
    ///
    /// Restores the snapshot when one exists; otherwise seeds the demo data
    /// and writes the first snapshot. An unreadable snapshot is reseeded.
    pub fn open_demo(path: &Path) -> Result<Self> {
        let restored = match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<MemoryState>(&bytes) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "demo backend state unreadable; reseeding");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let mut backend = match restored {
            Some(mut state) => {
                seed_rates(&mut state);
                let backend = Self::new();
                *backend.lock_state() = state;
                debug!(path = %path.display(), "restored demo backend state");
                backend
            }
            None => Self::with_demo_data(),
        };
        backend.snapshot_path = Some(path.to_path_buf());
        if let Some(path) = &backend.snapshot_path {
            write_snapshot(path, &backend.lock_state())?;
        }
        Ok(backend)
    }

    // === Test controls ===

    /// Make every call fail with a network error until switched back
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut guard) = self.offline.lock() {
            *guard = offline;
        }
    }

    /// Fail the next call (of any kind) with `error`
    pub fn fail_next_call(&self, error: ApiError) {
        if let Ok(mut guard) = self.fail_next.lock() {
            *guard = Some(error);
        }
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut guard) = self.latency.lock() {
            *guard = latency;
        }
    }

    /// Flat fee charged on every transfer
    pub fn set_transfer_fee(&self, fee: Decimal) {
        if let Ok(mut guard) = self.transfer_fee.lock() {
            *guard = fee;
        }
    }

    /// Register a wallet directly (server-side seeding)
    pub fn insert_wallet(&self, wallet: Wallet) {
        let mut state = self.lock_state();
        state.wallets.insert(wallet.id.clone(), wallet);
        self.persist(&state);
    }

    /// Register a user and their password directly
    pub fn insert_user(&self, user: User, password: &str) {
        let mut state = self.lock_state();
        state
            .credentials
            .insert(user.email.clone(), (password.to_string(), user.id.clone()));
        state.users.insert(user.id.clone(), user);
        self.persist(&state);
    }

    /// Change a wallet server-side and push the new snapshot
    pub fn update_wallet_remote(&self, wallet_id: &str, f: impl FnOnce(&mut Wallet)) {
        let snapshot = {
            let mut state = self.lock_state();
            let snapshot = state.wallets.get_mut(wallet_id).map(|w| {
                f(w);
                w.updated_at = Utc::now();
                w.clone()
            });
            self.persist(&state);
            snapshot
        };
        if let Some(wallet) = snapshot {
            self.push_wallet(&wallet);
        }
    }

    /// Deliver a notification server-side and push the inbox snapshot
    pub fn push_notification(&self, notification: Notification) {
        let user_id = notification.user_id.clone();
        {
            let mut state = self.lock_state();
            state.notifications.push(notification);
            self.persist(&state);
        }
        self.push_inbox(&user_id);
    }

    /// Emit an auth-state event, as the identity service would
    pub fn emit_auth_event(&self, event: AuthEvent) {
        let _ = self.auth_tx.send(event);
    }

    pub fn kyc_submissions(&self) -> Vec<KycSubmission> {
        self.lock_state().kyc_submissions.clone()
    }

    pub fn wallet(&self, wallet_id: &str) -> Option<Wallet> {
        self.lock_state().wallets.get(wallet_id).cloned()
    }

    pub fn has_user(&self, user_id: &str) -> bool {
        self.lock_state().users.contains_key(user_id)
    }

    // === Internals ===

    fn persist(&self, state: &MemoryState) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        if let Err(e) = write_snapshot(path, state) {
            warn!(path = %path.display(), error = %e, "failed to save demo backend state");
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves maps consistent enough for a fake
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> Result<()> {
        let latency = self.latency.lock().map(|g| *g).unwrap_or_default();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.offline.lock().map(|g| *g).unwrap_or(false) {
            return Err(Error::network("connection refused: backend unreachable"));
        }
        if let Some(err) = self.fail_next.lock().ok().and_then(|mut g| g.take()) {
            return Err(err.into());
        }
        Ok(())
    }

    fn new_session(user_id: &str) -> Session {
        Session {
            user_id: user_id.to_string(),
            id_token: format!("mem-id-{}", Uuid::new_v4()),
            refresh_token: format!("mem-refresh-{}", Uuid::new_v4()),
            expires_at: Some(Utc::now() + ChronoDuration::hours(1)),
        }
    }

    fn push_wallet(&self, wallet: &Wallet) {
        if let Ok(senders) = self.wallet_tx.lock() {
            if let Some(tx) = senders.get(&wallet.user_id) {
                let _ = tx.send(wallet.clone());
            }
        }
    }

    fn push_inbox(&self, user_id: &str) {
        let inbox = self.inbox(user_id);
        if let Ok(senders) = self.notification_tx.lock() {
            if let Some(tx) = senders.get(user_id) {
                let _ = tx.send(inbox);
            }
        }
    }

    fn inbox(&self, user_id: &str) -> Vec<Notification> {
        let state = self.lock_state();
        let mut inbox: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        inbox.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        inbox
    }

    fn sign_in_user(&self, user_id: &str) -> Session {
        self.lock_state().current_user = Some(user_id.to_string());
        let _ = self.auth_tx.send(AuthEvent::SignedIn {
            user_id: user_id.to_string(),
        });
        Self::new_session(user_id)
    }
}

fn seed_rates(state: &mut MemoryState) {
    state.rates.insert(("NGN".into(), "GHS".into()), Decimal::new(95, 4));
    state.rates.insert(("GHS".into(), "NGN".into()), Decimal::new(10526, 2));
    state.rates.insert(("NGN".into(), "KES".into()), Decimal::new(83, 3));
    state.rates.insert(("USD".into(), "NGN".into()), Decimal::from(1_550));
}

fn write_snapshot(path: &Path, state: &MemoryState) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_vec_pretty(state)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.persist(path)
        .map_err(|e| Error::cache(format!("failed to persist {}: {}", path.display(), e)))?;
    Ok(())
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        self.enter().await?;
        let email = email.trim().to_lowercase();
        if password.len() < 8 {
            return Err(ApiError::new("AUTH_WEAK_PASSWORD", "password must be at least 8 characters").into());
        }
        let user_id = {
            let mut state = self.lock_state();
            if state.credentials.contains_key(&email) {
                return Err(ApiError::new("AUTH_EMAIL_IN_USE", "email already registered").into());
            }
            let user_id = format!("user-{}", Uuid::new_v4());
            state
                .credentials
                .insert(email, (password.to_string(), user_id.clone()));
            self.persist(&state);
            user_id
        };
        Ok(self.sign_in_user(&user_id))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.enter().await?;
        let email = email.trim().to_lowercase();
        let user_id = {
            let state = self.lock_state();
            match state.credentials.get(&email) {
                Some((stored, user_id)) if stored == password => user_id.clone(),
                _ => {
                    return Err(ApiError::new("AUTH_INVALID_CREDENTIALS", "invalid email or password").into())
                }
            }
        };
        Ok(self.sign_in_user(&user_id))
    }

    /// The id token is taken to be the account email
    async fn sign_in_with_idp(
        &self,
        provider: IdentityProvider,
        id_token: &str,
    ) -> Result<FederatedSignIn> {
        self.enter().await?;
        let email = id_token.trim().to_lowercase();
        if !email.contains('@') {
            return Err(ApiError::new(
                "AUTH_INVALID_CREDENTIALS",
                format!("{} token rejected", provider.provider_id()),
            )
            .into());
        }
        let (user_id, is_new_user) = {
            let mut state = self.lock_state();
            match state.credentials.get(&email) {
                Some((_, user_id)) => (user_id.clone(), false),
                None => {
                    let user_id = format!("user-{}", Uuid::new_v4());
                    state
                        .credentials
                        .insert(email.clone(), (Uuid::new_v4().to_string(), user_id.clone()));
                    self.persist(&state);
                    (user_id, true)
                }
            }
        };
        let display_name = email.split('@').next().map(|s| s.to_string());
        Ok(FederatedSignIn {
            session: self.sign_in_user(&user_id),
            email: Some(email),
            display_name,
            is_new_user,
        })
    }

    async fn restore(&self, session: &Session) -> Result<()> {
        self.enter().await?;
        if session.is_expired() {
            return Err(ApiError::new("AUTH_SESSION_EXPIRED", "session expired").into());
        }
        let mut state = self.lock_state();
        if !state.credentials.values().any(|(_, id)| *id == session.user_id) {
            return Err(ApiError::new("AUTH_USER_NOT_FOUND", "unknown user").into());
        }
        state.current_user = Some(session.user_id.clone());
        Ok(())
    }

    async fn refresh_session(&self, session: &Session) -> Result<Session> {
        self.enter().await?;
        let mut state = self.lock_state();
        let known = state.credentials.values().any(|(_, id)| *id == session.user_id);
        if !known || session.refresh_token.is_empty() {
            return Err(ApiError::new("AUTH_SESSION_EXPIRED", "refresh token rejected").into());
        }
        state.current_user = Some(session.user_id.clone());
        Ok(Self::new_session(&session.user_id))
    }

    async fn sign_out(&self) -> Result<()> {
        self.lock_state().current_user = None;
        let _ = self.auth_tx.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        self.enter().await?;
        let known = self
            .lock_state()
            .credentials
            .contains_key(&email.trim().to_lowercase());
        if !known {
            return Err(ApiError::new("AUTH_USER_NOT_FOUND", "no account for email").into());
        }
        Ok(())
    }

    fn auth_events(&self) -> Option<broadcast::Receiver<AuthEvent>> {
        Some(self.auth_tx.subscribe())
    }
}

#[async_trait]
impl UserBackend for MemoryBackend {
    async fn fetch_user(&self, user_id: &str) -> Result<Option<User>> {
        self.enter().await?;
        Ok(self.lock_state().users.get(user_id).cloned())
    }

    /// Also provisions the user's wallet, as the server-side trigger does
    async fn create_user(&self, user: &User) -> Result<User> {
        self.enter().await?;
        let mut state = self.lock_state();
        if state.users.contains_key(&user.id) {
            return Err(ApiError::new("AUTH_PROFILE_EXISTS", "profile already created").into());
        }
        let mut created = user.clone();
        let wallet_id = format!("wallet-{}", Uuid::new_v4());
        let wallet = Wallet::new(
            &wallet_id,
            &user.id,
            &user.preferred_currency,
            Decimal::from(DEFAULT_DAILY_LIMIT),
            Decimal::from(DEFAULT_MONTHLY_LIMIT),
        );
        created.wallet_id = Some(wallet_id.clone());
        state.wallets.insert(wallet_id, wallet);
        state.users.insert(created.id.clone(), created.clone());
        self.persist(&state);
        Ok(created)
    }

    async fn update_user(&self, user_id: &str, update: &ProfileUpdate) -> Result<User> {
        self.enter().await?;
        let mut state = self.lock_state();
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| Error::from(ApiError::new("AUTH_USER_NOT_FOUND", "unknown user")))?;
        update.apply_to(user);
        let updated = user.clone();
        self.persist(&state);
        Ok(updated)
    }
}

#[async_trait]
impl WalletBackend for MemoryBackend {
    async fn fetch_wallet(&self, user_id: &str) -> Result<Option<Wallet>> {
        self.enter().await?;
        let state = self.lock_state();
        Ok(state.wallets.values().find(|w| w.user_id == user_id).cloned())
    }

    async fn lookup_wallet(&self, wallet_id: &str) -> Result<Option<WalletLookup>> {
        self.enter().await?;
        let state = self.lock_state();
        Ok(state.wallets.get(wallet_id).map(|w| WalletLookup {
            wallet_id: w.id.clone(),
            owner_name: state
                .users
                .get(&w.user_id)
                .map(|u| u.full_name())
                .unwrap_or_default(),
            currency: w.currency.clone(),
            is_active: w.is_active,
        }))
    }

    fn subscribe_wallet(&self, user_id: &str) -> Option<broadcast::Receiver<Wallet>> {
        let mut senders = self.wallet_tx.lock().ok()?;
        let tx = senders
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Some(tx.subscribe())
    }
}

#[async_trait]
impl TransactionBackend for MemoryBackend {
    async fn fetch_transactions(&self, wallet_id: &str, limit: usize) -> Result<Vec<Transaction>> {
        self.enter().await?;
        let state = self.lock_state();
        let mut txs: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.sender_wallet_id == wallet_id || t.receiver_wallet_id == wallet_id)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        txs.truncate(limit);
        Ok(txs)
    }

    async fn send_money(&self, request: &SendMoneyRequest) -> Result<Transaction> {
        self.enter().await?;
        let fee = self.transfer_fee.lock().map(|g| *g).unwrap_or_default();

        let (tx, sender_wallet, receiver_wallet) = {
            let mut state = self.lock_state();
            if let Some(existing) = state.processed_keys.get(&request.idempotency_key) {
                let existing = existing.clone();
                return state
                    .transactions
                    .iter()
                    .find(|t| t.id == existing)
                    .cloned()
                    .ok_or_else(|| ApiError::new("TXN_DUPLICATE", "transfer already submitted").into());
            }
            if request.amount <= Decimal::ZERO {
                return Err(ApiError::new("TXN_INVALID_AMOUNT", "amount must be positive").into());
            }
            if request.sender_wallet_id == request.receiver_wallet_id {
                return Err(ApiError::new("TXN_SELF_TRANSFER", "cannot send to own wallet").into());
            }

            let sender = state
                .wallets
                .get(&request.sender_wallet_id)
                .cloned()
                .ok_or_else(|| Error::from(ApiError::new("WALLET_NOT_FOUND", "sender wallet not found")))?;
            let receiver = state
                .wallets
                .get(&request.receiver_wallet_id)
                .cloned()
                .ok_or_else(|| Error::from(ApiError::new("WALLET_NOT_FOUND", "receiver wallet not found")))?;
            if !receiver.is_active {
                return Err(ApiError::new("WALLET_INACTIVE", "receiver wallet inactive").into());
            }

            let debit = request.amount + fee;
            match sender.check_transfer(debit) {
                Ok(()) => {}
                Err(crate::domain::LimitViolation::Inactive) => {
                    return Err(ApiError::new("WALLET_INACTIVE", "sender wallet inactive").into())
                }
                Err(crate::domain::LimitViolation::InsufficientBalance) => {
                    return Err(ApiError::new("WALLET_INSUFFICIENT_FUNDS", "insufficient funds").into())
                }
                Err(crate::domain::LimitViolation::DailyLimitExceeded) => {
                    return Err(ApiError::new("TXN_DAILY_LIMIT_EXCEEDED", "daily limit exceeded").into())
                }
                Err(crate::domain::LimitViolation::MonthlyLimitExceeded) => {
                    return Err(ApiError::new("TXN_MONTHLY_LIMIT_EXCEEDED", "monthly limit exceeded").into())
                }
            }

            let credited = if receiver.currency == sender.currency {
                request.amount
            } else {
                let rate = state
                    .rates
                    .get(&(sender.currency.clone(), receiver.currency.clone()))
                    .copied()
                    .ok_or_else(|| {
                        Error::from(ApiError::new("TXN_CURRENCY_UNSUPPORTED", "no rate for currency pair"))
                    })?;
                (request.amount * rate).round_dp(2)
            };

            let now = Utc::now();
            let mut tx = Transaction::new(
                format!("txn-{}", Uuid::new_v4()),
                &sender.id,
                &receiver.id,
                request.amount,
                &sender.currency,
                TransactionType::Send,
            );
            tx.fee = fee;
            tx.description = request.description.clone();
            tx.sender_name = state.users.get(&sender.user_id).map(|u| u.full_name());
            tx.receiver_name = state.users.get(&receiver.user_id).map(|u| u.full_name());
            tx.status = TransactionStatus::Completed;
            tx.completed_at = Some(now);
            if receiver.currency != sender.currency {
                tx.converted_amount = Some(credited);
                tx.converted_currency = Some(receiver.currency.clone());
                tx.exchange_rate = state
                    .rates
                    .get(&(sender.currency.clone(), receiver.currency.clone()))
                    .copied();
            }

            let sender_wallet = state.wallets.get_mut(&sender.id).map(|w| {
                w.apply_optimistic_delta(-debit);
                w.clone()
            });
            let receiver_wallet = state.wallets.get_mut(&receiver.id).map(|w| {
                w.balance += credited;
                w.updated_at = now;
                w.last_transaction_at = Some(now);
                w.clone()
            });

            state.transactions.push(tx.clone());
            state
                .processed_keys
                .insert(request.idempotency_key.clone(), tx.id.clone());
            self.persist(&state);
            (tx, sender_wallet, receiver_wallet)
        };

        if let Some(receiver) = &receiver_wallet {
            let body = format!(
                "{} sent you {}",
                tx.sender_name.as_deref().unwrap_or("Someone"),
                crate::domain::format_amount(tx.converted_amount.unwrap_or(tx.amount), &receiver.currency),
            );
            self.push_notification(
                Notification::new(
                    format!("notif-{}", Uuid::new_v4()),
                    &receiver.user_id,
                    "Money received",
                    body,
                    NotificationType::Transaction,
                )
                .with_data("transactionId", &tx.id),
            );
        }
        for wallet in sender_wallet.iter().chain(receiver_wallet.iter()) {
            self.push_wallet(wallet);
        }
        Ok(tx)
    }
}

#[async_trait]
impl CurrencyBackend for MemoryBackend {
    async fn preferred_currency(&self, user_id: &str) -> Result<String> {
        self.enter().await?;
        self.lock_state()
            .users
            .get(user_id)
            .map(|u| u.preferred_currency.clone())
            .ok_or_else(|| ApiError::new("AUTH_USER_NOT_FOUND", "unknown user").into())
    }

    async fn set_preferred_currency(&self, user_id: &str, code: &str) -> Result<()> {
        self.enter().await?;
        let mut state = self.lock_state();
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| Error::from(ApiError::new("AUTH_USER_NOT_FOUND", "unknown user")))?;
        user.preferred_currency = code.trim().to_uppercase();
        user.updated_at = Utc::now();
        self.persist(&state);
        Ok(())
    }

    async fn exchange_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        self.enter().await?;
        let key = (from.trim().to_uppercase(), to.trim().to_uppercase());
        if key.0 == key.1 {
            return Ok(Decimal::ONE);
        }
        self.lock_state()
            .rates
            .get(&key)
            .copied()
            .ok_or_else(|| ApiError::new("TXN_CURRENCY_UNSUPPORTED", "no rate for currency pair").into())
    }
}

#[async_trait]
impl NotificationBackend for MemoryBackend {
    async fn fetch_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.enter().await?;
        Ok(self.inbox(user_id))
    }

    async fn mark_read(&self, notification_id: &str) -> Result<()> {
        self.enter().await?;
        let mut state = self.lock_state();
        let notification = state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| Error::not_found(format!("notification {}", notification_id)))?;
        notification.is_read = true;
        self.persist(&state);
        Ok(())
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<()> {
        self.enter().await?;
        let mut state = self.lock_state();
        for n in state.notifications.iter_mut().filter(|n| n.user_id == user_id) {
            n.is_read = true;
        }
        self.persist(&state);
        Ok(())
    }

    async fn delete_notification(&self, notification_id: &str) -> Result<()> {
        self.enter().await?;
        let mut state = self.lock_state();
        state.notifications.retain(|n| n.id != notification_id);
        self.persist(&state);
        Ok(())
    }

    fn subscribe_notifications(
        &self,
        user_id: &str,
    ) -> Option<broadcast::Receiver<Vec<Notification>>> {
        let mut senders = self.notification_tx.lock().ok()?;
        let tx = senders
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Some(tx.subscribe())
    }
}

#[async_trait]
impl KycBackend for MemoryBackend {
    async fn upload_kyc_documents(&self, submission: &KycSubmission) -> Result<KycStatus> {
        self.enter().await?;
        if submission.document_urls.is_empty() && submission.sdk_result.is_none() {
            return Err(ApiError::new("KYC_DOCUMENT_INVALID", "no documents or SDK result supplied").into());
        }
        let mut state = self.lock_state();
        let user = state
            .users
            .get_mut(&submission.user_id)
            .ok_or_else(|| Error::from(ApiError::new("AUTH_USER_NOT_FOUND", "unknown user")))?;
        user.kyc_status = KycStatus::Submitted;
        user.updated_at = Utc::now();
        state.kyc_submissions.push(submission.clone());
        self.persist(&state);
        Ok(KycStatus::Submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: i64, key: &str) -> SendMoneyRequest {
        SendMoneyRequest {
            sender_wallet_id: DEMO_WALLET_ID.to_string(),
            receiver_wallet_id: DEMO_PEER_WALLET_ID.to_string(),
            amount: Decimal::from(amount),
            currency: "NGN".to_string(),
            description: None,
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_demo_sign_in() {
        let backend = MemoryBackend::with_demo_data();
        let session = backend.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        assert_eq!(session.user_id, "user-demo");

        let err = backend.sign_in(DEMO_EMAIL, "wrong").await.unwrap_err();
        assert_eq!(err.code(), Some("AUTH_INVALID_CREDENTIALS"));
    }

    #[tokio::test]
    async fn test_cross_currency_transfer_moves_balances() {
        let backend = MemoryBackend::with_demo_data();
        backend.set_transfer_fee(Decimal::from(50));

        let tx = backend.send_money(&request(10_000, "k-1")).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.fee, Decimal::from(50));
        assert_eq!(tx.converted_currency.as_deref(), Some("GHS"));
        assert_eq!(tx.converted_amount, Some(Decimal::from(95)));

        let sender = backend.wallet(DEMO_WALLET_ID).unwrap();
        assert_eq!(sender.balance, Decimal::from(250_000 - 10_050));
        let receiver = backend.wallet(DEMO_PEER_WALLET_ID).unwrap();
        assert_eq!(receiver.balance, Decimal::from(3_495));
    }

    #[tokio::test]
    async fn test_idempotent_resubmission() {
        let backend = MemoryBackend::with_demo_data();
        let first = backend.send_money(&request(1_000, "same")).await.unwrap();
        let second = backend.send_money(&request(1_000, "same")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            backend.wallet(DEMO_WALLET_ID).unwrap().balance,
            Decimal::from(249_000)
        );
    }

    #[tokio::test]
    async fn test_server_enforces_limits() {
        let backend = MemoryBackend::with_demo_data();
        let err = backend.send_money(&request(490_000, "k")).await.unwrap_err();
        assert_eq!(err.code(), Some("WALLET_INSUFFICIENT_FUNDS"));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MemoryBackend::with_demo_data();
        backend.fail_next_call(ApiError::new("SERVICE_UNAVAILABLE", "down").retryable(true));
        let err = backend.fetch_wallet("user-demo").await.unwrap_err();
        assert_eq!(err.code(), Some("SERVICE_UNAVAILABLE"));
        assert!(backend.fetch_wallet("user-demo").await.unwrap().is_some());

        backend.set_offline(true);
        assert!(matches!(
            backend.fetch_wallet("user-demo").await,
            Err(Error::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_demo_state_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DEMO_STATE_FILE);

        let backend = MemoryBackend::open_demo(&path).unwrap();
        backend.send_money(&request(5_000, "k-1")).await.unwrap();
        let session = backend.sign_up("new@pesa.app", "long-password").await.unwrap();
        drop(backend);

        let reopened = MemoryBackend::open_demo(&path).unwrap();
        assert_eq!(
            reopened.wallet(DEMO_WALLET_ID).unwrap().balance,
            Decimal::from(245_000)
        );
        reopened.restore(&session).await.unwrap();
        assert_eq!(
            reopened.exchange_rate("NGN", "GHS").await.unwrap(),
            Decimal::new(95, 4)
        );

        // A resubmitted transfer is still recognised after the restart
        reopened.send_money(&request(5_000, "k-1")).await.unwrap();
        assert_eq!(
            reopened.wallet(DEMO_WALLET_ID).unwrap().balance,
            Decimal::from(245_000)
        );
    }

    #[test]
    fn test_unreadable_snapshot_is_reseeded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(DEMO_STATE_FILE);
        std::fs::write(&path, b"{ not json").unwrap();

        let backend = MemoryBackend::open_demo(&path).unwrap();
        assert_eq!(
            backend.wallet(DEMO_WALLET_ID).unwrap().balance,
            Decimal::from(250_000)
        );
        let saved: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(saved["wallets"].get(DEMO_WALLET_ID).is_some());
    }
}
