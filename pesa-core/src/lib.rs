//! Pesa Core - client-side state for the Pesa mobile wallet
//!
//! This crate implements the wallet app's state layer following hexagonal
//! architecture:
//!
//! - **domain**: Core entities (User, Wallet, Transaction, etc.) and error types
//! - **ports**: Trait definitions for external dependencies (backend, cache, KYC SDK)
//! - **services**: Observable state containers for each feature area
//! - **adapters**: Concrete implementations (file cache, HTTP backend, in-memory demo backend)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use adapters::file_cache::FileCache;
use adapters::http::HttpBackend;
use adapters::kyc::ScriptedKycProvider;
use adapters::memory::{MemoryBackend, DEMO_STATE_FILE};
use config::Config;
use ports::{
    AuthBackend, CurrencyBackend, KycBackend, KycProvider, LocalCache, NotificationBackend,
    TransactionBackend, UserBackend, WalletBackend,
};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult, Result as CoreResult};
pub use domain::{
    ApiError, Currency, KycStatus, Notification, NotificationType, Session, Settings,
    Transaction, TransactionStatus, TransactionType, User, Wallet, WalletLookup,
};

/// Every backend port, possibly served by one object
#[derive(Clone)]
pub struct Backends {
    pub auth: Arc<dyn AuthBackend>,
    pub users: Arc<dyn UserBackend>,
    pub wallets: Arc<dyn WalletBackend>,
    pub transactions: Arc<dyn TransactionBackend>,
    pub currency: Arc<dyn CurrencyBackend>,
    pub notifications: Arc<dyn NotificationBackend>,
    pub kyc: Arc<dyn KycBackend>,
}

impl Backends {
    /// All ports backed by the same implementation
    pub fn shared<B>(backend: Arc<B>) -> Self
    where
        B: AuthBackend
            + UserBackend
            + WalletBackend
            + TransactionBackend
            + CurrencyBackend
            + NotificationBackend
            + KycBackend
            + 'static,
    {
        Self {
            auth: backend.clone(),
            users: backend.clone(),
            wallets: backend.clone(),
            transactions: backend.clone(),
            currency: backend.clone(),
            notifications: backend.clone(),
            kyc: backend,
        }
    }
}

/// Main context for Pesa operations
///
/// This is the primary entry point for the app's state. It holds the
/// configuration, the local cache, and every service.
pub struct PesaContext {
    pub config: Config,
    pub cache: Arc<dyn LocalCache>,
    pub auth: Arc<AuthService>,
    pub wallet: Arc<WalletService>,
    pub transactions: Arc<TransactionService>,
    pub currency: Arc<CurrencyService>,
    pub notifications: Arc<NotificationService>,
    pub kyc: Arc<KycService>,
}

impl PesaContext {
    /// Create a context from the data directory
    ///
    /// Demo mode runs against the in-memory backend, persisted under the
    /// data directory, with its own cache directory; otherwise the HTTP
    /// backend from the config is used.
    pub fn new(pesa_dir: &Path) -> Result<Self> {
        let config = Config::load(pesa_dir)?;

        let cache_dir = if config.demo_mode {
            pesa_dir.join("demo-cache")
        } else {
            pesa_dir.join("cache")
        };
        let cache: Arc<dyn LocalCache> = Arc::new(FileCache::open(&cache_dir)?);

        let backends = if config.demo_mode {
            debug!("using demo backend");
            let demo = MemoryBackend::open_demo(&pesa_dir.join(DEMO_STATE_FILE))?;
            Backends::shared(Arc::new(demo))
        } else {
            let http = HttpBackend::new(&config.http_backend_config()?)?;
            Backends::shared(Arc::new(http))
        };

        Ok(Self::with_parts(
            config,
            cache,
            backends,
            Arc::new(ScriptedKycProvider::new()),
        ))
    }

    /// Assemble a context from explicit parts
    pub fn with_parts(
        config: Config,
        cache: Arc<dyn LocalCache>,
        backends: Backends,
        kyc_provider: Arc<dyn KycProvider>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(
            backends.auth,
            backends.users,
            Arc::clone(&cache),
        ));
        let wallet = Arc::new(WalletService::new(
            backends.wallets,
            Arc::clone(&cache),
            Arc::clone(&auth),
        ));
        let transactions = Arc::new(TransactionService::new(
            backends.transactions,
            Arc::clone(&cache),
            Arc::clone(&wallet),
            config.transaction_limit,
        ));
        let currency = Arc::new(CurrencyService::new(backends.currency, Arc::clone(&auth)));
        let notifications = Arc::new(NotificationService::new(
            backends.notifications,
            Arc::clone(&auth),
        ));
        let kyc = Arc::new(KycService::new(kyc_provider, backends.kyc, Arc::clone(&auth)));

        Self {
            config,
            cache,
            auth,
            wallet,
            transactions,
            currency,
            notifications,
            kyc,
        }
    }

    /// Restore the saved session and load cached state
    ///
    /// Cached wallet and transactions are shown even when offline.
    pub async fn bootstrap(&self) -> CoreResult<Option<User>> {
        let user = self.auth.restore_session().await?;
        if user.is_some() {
            if let Err(e) = self.wallet.load_cached() {
                warn!(error = %e, "failed to load cached wallet");
            }
            if let Err(e) = self.transactions.load_cached() {
                warn!(error = %e, "failed to load cached transactions");
            }
        }
        Ok(user)
    }

    /// Fetch fresh wallet, history, currency and inbox for the signed-in user
    ///
    /// The wallet refresh decides the outcome; the rest are best effort.
    pub async fn refresh_all(&self) -> CoreResult<Wallet> {
        let wallet = self.wallet.refresh_wallet().await?;
        let (transactions, currency, notifications) = tokio::join!(
            self.transactions.refresh_transactions(),
            self.currency.load(),
            self.notifications.refresh(),
        );
        if let Err(e) = transactions {
            warn!(error = %e, "transaction refresh failed");
        }
        if let Err(e) = currency {
            warn!(error = %e, "currency load failed");
        }
        if let Err(e) = notifications {
            warn!(error = %e, "inbox refresh failed");
        }
        Ok(wallet)
    }

    /// Start live listeners for auth events, wallet and inbox pushes
    ///
    /// Also starts a watcher that drops per-user state whenever auth reaches
    /// `Unauthenticated`, including sign-outs pushed by the backend.
    pub fn listen(&self) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<JoinHandle<()>> = [
            self.auth.listen(),
            self.wallet.listen(),
            self.notifications.listen(),
        ]
        .into_iter()
        .flatten()
        .collect();
        handles.push(self.reset_on_sign_out());
        handles
    }

    fn reset_on_sign_out(&self) -> JoinHandle<()> {
        let mut auth = self.auth.subscribe();
        let wallet = Arc::clone(&self.wallet);
        let transactions = Arc::clone(&self.transactions);
        let notifications = Arc::clone(&self.notifications);
        tokio::spawn(async move {
            while auth.changed().await.is_ok() {
                let signed_out = matches!(*auth.borrow_and_update(), AuthState::Unauthenticated);
                if signed_out {
                    debug!("auth state is unauthenticated; dropping user state");
                    wallet.reset();
                    transactions.reset();
                    notifications.reset();
                }
            }
        })
    }

    /// Sign out and drop all per-user state
    pub async fn sign_out(&self) -> CoreResult<()> {
        self.auth.sign_out().await?;
        self.wallet.reset();
        self.transactions.reset();
        self.notifications.reset();
        info!("signed out");
        Ok(())
    }
}
