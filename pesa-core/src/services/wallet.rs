//! Wallet service - the signed-in user's wallet and balance display

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{format_amount, user_message, Wallet, WalletLookup};
use crate::ports::{LocalCache, WalletBackend};

use super::auth::AuthService;
use super::sequencer::RefreshSequencer;

/// Shown instead of the balance while it is hidden
pub const BALANCE_MASK: &str = "••••••";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub wallet: Option<Wallet>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub balance_hidden: bool,
}

pub struct WalletService {
    backend: Arc<dyn WalletBackend>,
    cache: Arc<dyn LocalCache>,
    auth: Arc<AuthService>,
    state: watch::Sender<WalletState>,
    sequencer: RefreshSequencer,
}

impl WalletService {
    pub fn new(
        backend: Arc<dyn WalletBackend>,
        cache: Arc<dyn LocalCache>,
        auth: Arc<AuthService>,
    ) -> Self {
        let (state, _) = watch::channel(WalletState::default());
        Self {
            backend,
            cache,
            auth,
            state,
            sequencer: RefreshSequencer::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> WalletState {
        self.state.borrow().clone()
    }

    pub fn wallet(&self) -> Option<Wallet> {
        self.state.borrow().wallet.clone()
    }

    /// Seed state from the cache (wallet and balance-hidden flag)
    pub fn load_cached(&self) -> Result<()> {
        let wallet = self.cache.load_wallet()?;
        let settings = self.cache.load_settings()?;
        self.state.send_modify(|s| {
            s.wallet = wallet;
            s.balance_hidden = settings.balance_hidden;
        });
        Ok(())
    }

    /// Fetch the wallet from the backend and replace state and cache
    ///
    /// On failure the last-good wallet stays in state next to the error.
    pub async fn refresh_wallet(&self) -> Result<Wallet> {
        let user = self.auth.require_user()?;
        let ticket = self.sequencer.begin();
        self.state.send_modify(|s| s.is_loading = true);

        let result = match self.backend.fetch_wallet(&user.id).await {
            Ok(Some(wallet)) => Ok(wallet),
            Ok(None) => Err(Error::not_found(format!("wallet for user {}", user.id))),
            Err(e) => Err(e),
        };

        if !self.sequencer.is_current(ticket) {
            debug!(user_id = %user.id, "discarding stale wallet refresh");
            return match result {
                Ok(_) => self
                    .wallet()
                    .ok_or_else(|| Error::not_found("wallet")),
                Err(e) => Err(e),
            };
        }

        match result {
            Ok(wallet) => {
                if let Err(e) = self.cache.store_wallet(&wallet) {
                    warn!(error = %e, "failed to cache wallet");
                }
                debug!(wallet_id = %wallet.id, "wallet refreshed");
                self.state.send_modify(|s| {
                    s.wallet = Some(wallet.clone());
                    s.is_loading = false;
                    s.error = None;
                });
                Ok(wallet)
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "wallet refresh failed");
                let message = user_message(&e);
                self.state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(message);
                });
                Err(e)
            }
        }
    }

    /// Flip and persist the balance-hidden flag; returns the new value
    pub fn toggle_balance_visibility(&self) -> Result<bool> {
        let mut settings = self.cache.load_settings()?;
        settings.balance_hidden = !self.state.borrow().balance_hidden;
        self.cache.store_settings(&settings)?;
        self.state.send_modify(|s| s.balance_hidden = settings.balance_hidden);
        Ok(settings.balance_hidden)
    }

    /// Public view of a wallet, used to preview a transfer recipient
    pub async fn lookup_wallet(&self, wallet_id: &str) -> Result<Option<WalletLookup>> {
        let wallet_id = wallet_id.trim();
        if wallet_id.is_empty() {
            return Err(Error::validation("wallet ID is required"));
        }
        self.backend.lookup_wallet(wallet_id).await
    }

    /// Apply a local balance change until the next refresh replaces it
    pub fn update_balance(&self, delta: Decimal) {
        let mut patched = None;
        self.state.send_modify(|s| {
            if let Some(wallet) = s.wallet.as_mut() {
                wallet.apply_optimistic_delta(delta);
                patched = Some(wallet.clone());
            }
        });
        match patched {
            Some(wallet) => {
                if let Err(e) = self.cache.store_wallet(&wallet) {
                    warn!(error = %e, "failed to cache optimistic wallet");
                }
            }
            None => debug!("no wallet loaded; optimistic balance update skipped"),
        }
    }

    /// Formatted balance, or a mask while hidden
    pub fn display_balance(&self) -> String {
        let state = self.state.borrow();
        match (&state.wallet, state.balance_hidden) {
            (_, true) => BALANCE_MASK.to_string(),
            (Some(wallet), false) => format_amount(wallet.balance, &wallet.currency),
            (None, false) => "--".to_string(),
        }
    }

    /// Apply a snapshot pushed by the backend
    pub fn apply_remote(&self, wallet: Wallet) {
        let Some(user) = self.auth.current_user() else {
            return;
        };
        if wallet.user_id != user.id {
            return;
        }
        // A push is newer than anything still in flight
        self.sequencer.invalidate();
        if let Err(e) = self.cache.store_wallet(&wallet) {
            warn!(error = %e, "failed to cache pushed wallet");
        }
        self.state.send_modify(|s| {
            s.wallet = Some(wallet);
            s.is_loading = false;
            s.error = None;
        });
    }

    /// Follow live wallet snapshots for the signed-in user, if the backend pushes them
    pub fn listen(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let user = self.auth.current_user()?;
        let mut updates = self.backend.subscribe_wallet(&user.id)?;
        let service = Arc::clone(self);
        info!(user_id = %user.id, "listening for wallet updates");
        Some(tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(wallet) => service.apply_remote(wallet),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "wallet stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    /// Drop the wallet on sign-out; the hidden flag is a device setting and stays
    pub fn reset(&self) {
        self.sequencer.invalidate();
        self.state.send_modify(|s| {
            s.wallet = None;
            s.is_loading = false;
            s.error = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_cache::FileCache;
    use crate::adapters::memory::{MemoryBackend, DEMO_EMAIL, DEMO_PASSWORD, DEMO_WALLET_ID};
    use crate::domain::ApiError;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        backend: Arc<MemoryBackend>,
        cache: Arc<FileCache>,
        service: Arc<WalletService>,
    }

    async fn signed_in() -> Fixture {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(FileCache::open(dir.path()).unwrap());
        let backend = Arc::new(MemoryBackend::with_demo_data());
        let auth = Arc::new(AuthService::new(backend.clone(), backend.clone(), cache.clone()));
        auth.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        let service = Arc::new(WalletService::new(backend.clone(), cache.clone(), auth));
        Fixture {
            _dir: dir,
            backend,
            cache,
            service,
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_state_and_cache() {
        let f = signed_in().await;
        let wallet = f.service.refresh_wallet().await.unwrap();
        assert_eq!(wallet.id, DEMO_WALLET_ID);
        assert_eq!(f.service.wallet(), Some(wallet.clone()));
        assert_eq!(f.cache.load_wallet().unwrap(), Some(wallet));
        assert!(!f.service.state().is_loading);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_good_wallet() {
        let f = signed_in().await;
        let good = f.service.refresh_wallet().await.unwrap();

        f.backend
            .fail_next_call(ApiError::new("SERVICE_UNAVAILABLE", "maintenance").retryable(true));
        let err = f.service.refresh_wallet().await.unwrap_err();
        assert_eq!(err.code(), Some("SERVICE_UNAVAILABLE"));

        let state = f.service.state();
        assert_eq!(state.wallet, Some(good));
        assert_eq!(state.error.as_deref(), Some("The service is temporarily unavailable."));
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_and_persists() {
        let f = signed_in().await;
        f.service.refresh_wallet().await.unwrap();
        let shown = f.service.display_balance();
        assert_eq!(shown, "₦250,000.00");

        assert!(f.service.toggle_balance_visibility().unwrap());
        assert_eq!(f.service.display_balance(), BALANCE_MASK);
        assert!(!f.service.toggle_balance_visibility().unwrap());
        assert_eq!(f.service.display_balance(), shown);

        f.service.toggle_balance_visibility().unwrap();
        f.service.reset();
        f.service.load_cached().unwrap();
        assert!(f.service.state().balance_hidden);
    }

    #[tokio::test]
    async fn test_optimistic_update_then_refresh_wins() {
        let f = signed_in().await;
        f.service.refresh_wallet().await.unwrap();
        f.service.update_balance(Decimal::from(-1_000));
        assert_eq!(f.service.wallet().unwrap().balance, Decimal::from(249_000));

        let server = f.service.refresh_wallet().await.unwrap();
        assert_eq!(server.balance, Decimal::from(250_000));
        assert_eq!(f.service.wallet().unwrap().balance, Decimal::from(250_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_refresh_is_discarded() {
        let f = signed_in().await;
        f.service.refresh_wallet().await.unwrap();

        f.backend.set_latency(Duration::from_secs(5));
        let slow = {
            let service = f.service.clone();
            tokio::spawn(async move { service.refresh_wallet().await })
        };
        tokio::task::yield_now().await;

        // The server moves on and a faster refresh lands first
        f.backend.set_latency(Duration::ZERO);
        f.backend
            .update_wallet_remote(DEMO_WALLET_ID, |w| w.balance = Decimal::from(999));
        let fresh = f.service.refresh_wallet().await.unwrap();
        assert_eq!(fresh.balance, Decimal::from(999));

        f.backend
            .update_wallet_remote(DEMO_WALLET_ID, |w| w.balance = Decimal::from(1));
        slow.await.unwrap().unwrap();
        assert_eq!(f.service.wallet().unwrap().balance, Decimal::from(999));
    }

    #[tokio::test]
    async fn test_live_push_applies() {
        let f = signed_in().await;
        f.service.refresh_wallet().await.unwrap();
        let _listener = f.service.listen().unwrap();
        let mut rx = f.service.subscribe();

        f.backend
            .update_wallet_remote(DEMO_WALLET_ID, |w| w.balance = Decimal::from(7));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().wallet.as_ref().unwrap().balance, Decimal::from(7));
    }

    #[tokio::test]
    async fn test_lookup_requires_id() {
        let f = signed_in().await;
        assert!(matches!(
            f.service.lookup_wallet("  ").await,
            Err(Error::Validation(_))
        ));
        let peer = f.service.lookup_wallet("wallet-kwame-0002").await.unwrap().unwrap();
        assert_eq!(peer.owner_name, "Kwame Mensah");
    }
}
