//! Transactions service - history, filtering and transfers

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{user_message, Transaction, TransactionStatus};
use crate::ports::{LocalCache, SendMoneyRequest, TransactionBackend};

use super::sequencer::RefreshSequencer;
use super::wallet::WalletService;

/// Default number of records fetched per refresh
pub const DEFAULT_TRANSACTION_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionFilter {
    #[default]
    All,
    Sent,
    Received,
    Pending,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction, wallet_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Sent => !tx.is_credit(wallet_id),
            Self::Received => tx.is_credit(wallet_id),
            Self::Pending => tx.is_pending(),
        }
    }
}

impl fmt::Display for TransactionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::All => "all",
            Self::Sent => "sent",
            Self::Received => "received",
            Self::Pending => "pending",
        };
        f.write_str(s)
    }
}

impl FromStr for TransactionFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "sent" => Ok(Self::Sent),
            "received" => Ok(Self::Received),
            "pending" => Ok(Self::Pending),
            other => Err(Error::validation(format!(
                "unknown filter '{}' (expected all, sent, received or pending)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsState {
    /// Newest first
    pub transactions: Vec<Transaction>,
    pub filter: TransactionFilter,
    pub search: String,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Dashboard figures over the loaded list
///
/// Totals count completed transfers only; pending ones are counted apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub total_sent: Decimal,
    pub total_received: Decimal,
    pub pending_count: usize,
}

/// What the send form collects
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub receiver_wallet_id: String,
    pub amount: Decimal,
    pub description: Option<String>,
}

pub struct TransactionService {
    backend: Arc<dyn TransactionBackend>,
    cache: Arc<dyn LocalCache>,
    wallet: Arc<WalletService>,
    state: watch::Sender<TransactionsState>,
    sequencer: RefreshSequencer,
    limit: usize,
}

impl TransactionService {
    pub fn new(
        backend: Arc<dyn TransactionBackend>,
        cache: Arc<dyn LocalCache>,
        wallet: Arc<WalletService>,
        limit: usize,
    ) -> Self {
        let (state, _) = watch::channel(TransactionsState::default());
        Self {
            backend,
            cache,
            wallet,
            state,
            sequencer: RefreshSequencer::new(),
            limit: limit.max(1),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionsState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TransactionsState {
        self.state.borrow().clone()
    }

    fn wallet_id(&self) -> Result<String> {
        self.wallet
            .wallet()
            .map(|w| w.id)
            .ok_or_else(|| Error::not_found("no wallet loaded"))
    }

    pub fn load_cached(&self) -> Result<()> {
        let cached = self.cache.load_transactions()?;
        self.state.send_modify(|s| s.transactions = cached);
        Ok(())
    }

    /// Fetch the newest records for the current wallet; replaces list and cache
    pub async fn refresh_transactions(&self) -> Result<Vec<Transaction>> {
        let wallet_id = self.wallet_id()?;
        let ticket = self.sequencer.begin();
        self.state.send_modify(|s| s.is_loading = true);

        let result = self.backend.fetch_transactions(&wallet_id, self.limit).await;
        if !self.sequencer.is_current(ticket) {
            debug!(wallet_id = %wallet_id, "discarding stale transaction refresh");
            return result.map(|_| self.state.borrow().transactions.clone());
        }

        match result {
            Ok(mut transactions) => {
                transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                if let Err(e) = self.cache.store_transactions(&transactions) {
                    warn!(error = %e, "failed to cache transactions");
                }
                debug!(wallet_id = %wallet_id, count = transactions.len(), "transactions refreshed");
                self.state.send_modify(|s| {
                    s.transactions = transactions.clone();
                    s.is_loading = false;
                    s.error = None;
                });
                Ok(transactions)
            }
            Err(e) => {
                warn!(wallet_id = %wallet_id, error = %e, "transaction refresh failed");
                let message = user_message(&e);
                self.state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(message);
                });
                Err(e)
            }
        }
    }

    pub fn set_filter(&self, filter: TransactionFilter) {
        self.state.send_modify(|s| s.filter = filter);
    }

    pub fn set_search(&self, query: &str) {
        let query = query.trim().to_string();
        self.state.send_modify(|s| s.search = query);
    }

    /// The loaded list after filter and search
    pub fn visible(&self) -> Vec<Transaction> {
        let wallet_id = self.wallet.wallet().map(|w| w.id).unwrap_or_default();
        let state = self.state.borrow();
        state
            .transactions
            .iter()
            .filter(|tx| state.filter.matches(tx, &wallet_id))
            .filter(|tx| tx.matches_search(&state.search, &wallet_id))
            .cloned()
            .collect()
    }

    /// Insert at the head until the next refresh replaces the list
    pub fn add_transaction(&self, tx: Transaction) {
        let mut snapshot = Vec::new();
        self.state.send_modify(|s| {
            s.transactions.retain(|t| t.id != tx.id);
            s.transactions.insert(0, tx);
            snapshot = s.transactions.clone();
        });
        if let Err(e) = self.cache.store_transactions(&snapshot) {
            warn!(error = %e, "failed to cache optimistic transaction");
        }
    }

    /// Validate, pre-check limits, submit, then patch list and balance
    pub async fn send_money(&self, request: TransferRequest) -> Result<Transaction> {
        let wallet = self
            .wallet
            .wallet()
            .ok_or_else(|| Error::not_found("no wallet loaded"))?;

        let receiver = request.receiver_wallet_id.trim();
        if receiver.is_empty() {
            return Err(Error::validation("recipient wallet ID is required"));
        }
        if receiver == wallet.id {
            return Err(Error::validation("you cannot send money to your own wallet"));
        }
        if request.amount <= Decimal::ZERO {
            return Err(Error::validation("amount must be greater than zero"));
        }
        wallet.check_transfer(request.amount)?;

        let submit = SendMoneyRequest {
            sender_wallet_id: wallet.id.clone(),
            receiver_wallet_id: receiver.to_string(),
            amount: request.amount,
            currency: wallet.currency.clone(),
            description: request
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            idempotency_key: Uuid::new_v4().to_string(),
        };

        let tx = match self.backend.send_money(&submit).await {
            Ok(tx) => tx,
            Err(e) => {
                warn!(wallet_id = %wallet.id, error = %e, "transfer rejected");
                let message = user_message(&e);
                self.state.send_modify(|s| s.error = Some(message));
                return Err(e);
            }
        };
        info!(transaction_id = %tx.id, status = %tx.status, "transfer submitted");

        self.wallet.update_balance(-tx.total_debit());
        self.add_transaction(tx.clone());
        Ok(tx)
    }

    pub fn summary(&self) -> TransactionSummary {
        let wallet_id = self.wallet.wallet().map(|w| w.id).unwrap_or_default();
        let state = self.state.borrow();
        state
            .transactions
            .iter()
            .fold(TransactionSummary::default(), |mut acc, tx| {
                match tx.status {
                    TransactionStatus::Pending => acc.pending_count += 1,
                    TransactionStatus::Completed if tx.is_credit(&wallet_id) => {
                        acc.total_received += tx.converted_amount.unwrap_or(tx.amount)
                    }
                    TransactionStatus::Completed => acc.total_sent += tx.total_debit(),
                    TransactionStatus::Failed | TransactionStatus::Cancelled => {}
                }
                acc
            })
    }

    pub fn reset(&self) {
        self.sequencer.invalidate();
        self.state.send_replace(TransactionsState::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_cache::FileCache;
    use crate::adapters::memory::{
        MemoryBackend, DEMO_EMAIL, DEMO_PASSWORD, DEMO_PEER_WALLET_ID, DEMO_WALLET_ID,
    };
    use crate::domain::{ApiError, LimitViolation};
    use crate::services::AuthService;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        backend: Arc<MemoryBackend>,
        wallet: Arc<WalletService>,
        service: TransactionService,
    }

    async fn loaded() -> Fixture {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(FileCache::open(dir.path()).unwrap());
        let backend = Arc::new(MemoryBackend::with_demo_data());
        let auth = Arc::new(AuthService::new(backend.clone(), backend.clone(), cache.clone()));
        auth.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        let wallet = Arc::new(WalletService::new(backend.clone(), cache.clone(), auth));
        wallet.refresh_wallet().await.unwrap();
        let service = TransactionService::new(
            backend.clone(),
            cache.clone(),
            wallet.clone(),
            DEFAULT_TRANSACTION_LIMIT,
        );
        service.refresh_transactions().await.unwrap();
        Fixture {
            _dir: dir,
            backend,
            wallet,
            service,
        }
    }

    fn transfer(amount: i64) -> TransferRequest {
        TransferRequest {
            receiver_wallet_id: DEMO_PEER_WALLET_ID.to_string(),
            amount: Decimal::from(amount),
            description: Some("  Lunch  ".to_string()),
        }
    }

    #[tokio::test]
    async fn test_refresh_is_newest_first() {
        let f = loaded().await;
        let txs = f.service.state().transactions;
        assert_eq!(txs.len(), 3);
        assert!(txs.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn test_filters_and_search() {
        let f = loaded().await;
        f.service.set_filter(TransactionFilter::Received);
        let received = f.service.visible();
        assert_eq!(received.len(), 1);
        assert!(received[0].is_credit(DEMO_WALLET_ID));

        f.service.set_filter(TransactionFilter::Sent);
        assert_eq!(f.service.visible().len(), 2);

        f.service.set_filter(TransactionFilter::Pending);
        assert!(f.service.visible().is_empty());

        f.service.set_filter(TransactionFilter::All);
        f.service.set_search("AIRTIME");
        let hits = f.service.visible();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].description.as_deref(), Some("Airtime"));

        f.service.set_search("kwame");
        assert_eq!(f.service.visible().len(), 3);
    }

    #[tokio::test]
    async fn test_send_money_patches_list_and_balance() {
        let f = loaded().await;
        f.backend.set_transfer_fee(Decimal::from(25));

        let tx = f.service.send_money(transfer(5_000)).await.unwrap();
        assert_eq!(tx.description.as_deref(), Some("Lunch"));
        assert_eq!(f.service.state().transactions[0].id, tx.id);

        let wallet = f.wallet.wallet().unwrap();
        assert_eq!(wallet.balance, Decimal::from(250_000 - 5_025));
        assert_eq!(wallet.daily_spent, Decimal::from(12_500 + 5_025));
    }

    #[tokio::test]
    async fn test_send_money_validation() {
        let f = loaded().await;
        let mut req = transfer(100);
        req.receiver_wallet_id = DEMO_WALLET_ID.to_string();
        assert!(matches!(f.service.send_money(req).await, Err(Error::Validation(_))));

        let mut req = transfer(0);
        req.receiver_wallet_id = DEMO_PEER_WALLET_ID.to_string();
        assert!(matches!(f.service.send_money(req).await, Err(Error::Validation(_))));

        let mut req = transfer(100);
        req.receiver_wallet_id = "   ".to_string();
        assert!(matches!(f.service.send_money(req).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_send_money_limit_precheck_skips_backend() {
        let f = loaded().await;
        // Remaining daily limit is 487,500 but balance is 250,000
        let err = f.service.send_money(transfer(300_000)).await.unwrap_err();
        assert!(matches!(err, Error::Limit(LimitViolation::InsufficientBalance)));
        assert_eq!(f.backend.wallet(DEMO_WALLET_ID).unwrap().balance, Decimal::from(250_000));
    }

    #[tokio::test]
    async fn test_backend_rejection_leaves_state_untouched() {
        let f = loaded().await;
        f.backend
            .fail_next_call(ApiError::new("TXN_DAILY_LIMIT_EXCEEDED", "server says no"));
        let before = f.service.state().transactions.len();
        let err = f.service.send_money(transfer(1_000)).await.unwrap_err();
        assert_eq!(err.code(), Some("TXN_DAILY_LIMIT_EXCEEDED"));
        assert_eq!(f.service.state().transactions.len(), before);
        assert_eq!(f.wallet.wallet().unwrap().balance, Decimal::from(250_000));
        assert_eq!(
            f.service.state().error.as_deref(),
            Some("This transfer exceeds your daily limit.")
        );
    }

    #[tokio::test]
    async fn test_summary() {
        let f = loaded().await;
        let summary = f.service.summary();
        assert_eq!(summary.total_sent, Decimal::from(12_500 + 7_800));
        assert_eq!(summary.total_received, Decimal::from(40_000));
        assert_eq!(summary.pending_count, 0);
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("Sent".parse::<TransactionFilter>().unwrap(), TransactionFilter::Sent);
        assert!("weekly".parse::<TransactionFilter>().is_err());
    }
}
