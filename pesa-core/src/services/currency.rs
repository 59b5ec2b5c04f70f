//! Currency service - preferred display currency and conversion

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{compact_amount, format_amount, user_message, Currency, DEFAULT_CURRENCY};
use crate::ports::CurrencyBackend;

use super::auth::AuthService;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyState {
    pub code: String,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl Default for CurrencyState {
    fn default() -> Self {
        Self {
            code: DEFAULT_CURRENCY.to_string(),
            is_loading: false,
            error: None,
        }
    }
}

pub struct CurrencyService {
    backend: Arc<dyn CurrencyBackend>,
    auth: Arc<AuthService>,
    state: watch::Sender<CurrencyState>,
}

impl CurrencyService {
    pub fn new(backend: Arc<dyn CurrencyBackend>, auth: Arc<AuthService>) -> Self {
        let initial = CurrencyState {
            code: auth
                .current_user()
                .map(|u| u.preferred_currency)
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            ..CurrencyState::default()
        };
        let (state, _) = watch::channel(initial);
        Self {
            backend,
            auth,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CurrencyState> {
        self.state.subscribe()
    }

    /// Preferred currency code currently in state
    pub fn code(&self) -> String {
        self.state.borrow().code.clone()
    }

    /// Fetch the signed-in user's preferred currency
    pub async fn load(&self) -> Result<String> {
        let user = self.auth.require_user()?;
        self.state.send_modify(|s| s.is_loading = true);
        match self.backend.preferred_currency(&user.id).await {
            Ok(code) => {
                let code = code.trim().to_uppercase();
                self.state.send_modify(|s| {
                    s.code = code.clone();
                    s.is_loading = false;
                    s.error = None;
                });
                Ok(code)
            }
            Err(e) => {
                warn!(error = %e, "failed to load preferred currency");
                let message = user_message(&e);
                self.state.send_modify(|s| {
                    s.is_loading = false;
                    s.error = Some(message);
                });
                Err(e)
            }
        }
    }

    /// Change the preferred currency server-side, then in state and the cached user
    pub async fn set_currency(&self, code: &str) -> Result<()> {
        let code = code.trim().to_uppercase();
        if !Currency::is_supported(&code) {
            return Err(Error::validation(format!("unsupported currency '{}'", code)));
        }
        let user = self.auth.require_user()?;
        if let Err(e) = self.backend.set_preferred_currency(&user.id, &code).await {
            let message = user_message(&e);
            self.state.send_modify(|s| s.error = Some(message));
            return Err(e);
        }
        self.state.send_modify(|s| {
            s.code = code.clone();
            s.error = None;
        });
        self.auth.patch_user(|u| u.preferred_currency = code.clone())?;
        debug!(currency = %code, "preferred currency updated");
        Ok(())
    }

    pub fn format_amount(&self, amount: Decimal, code: &str) -> String {
        format_amount(amount, code)
    }

    pub fn compact_amount(&self, amount: Decimal, code: &str) -> String {
        compact_amount(amount, code)
    }

    /// `amount` in `from` expressed in `to`, rounded to `to`'s minor units
    pub async fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal> {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from == to {
            return Ok(amount);
        }
        let rate = self.backend.exchange_rate(&from, &to).await?;
        let decimals = Currency::find(&to).map(|c| c.decimals).unwrap_or(2);
        Ok((amount * rate).round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_cache::FileCache;
    use crate::adapters::memory::{MemoryBackend, DEMO_EMAIL, DEMO_PASSWORD};
    use crate::ports::LocalCache;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Arc<MemoryBackend>, Arc<FileCache>, CurrencyService) {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(FileCache::open(dir.path()).unwrap());
        let backend = Arc::new(MemoryBackend::with_demo_data());
        let auth = Arc::new(AuthService::new(backend.clone(), backend.clone(), cache.clone()));
        auth.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        let service = CurrencyService::new(backend.clone(), auth);
        (dir, backend, cache, service)
    }

    #[tokio::test]
    async fn test_set_currency_updates_cached_user() {
        let (_dir, backend, cache, service) = setup().await;
        assert_eq!(service.code(), "NGN");

        service.set_currency("kes").await.unwrap();
        assert_eq!(service.code(), "KES");
        assert_eq!(cache.load_user().unwrap().unwrap().preferred_currency, "KES");
        assert_eq!(backend.preferred_currency("user-demo").await.unwrap(), "KES");
        assert_eq!(service.load().await.unwrap(), "KES");
    }

    #[tokio::test]
    async fn test_unsupported_currency_rejected() {
        let (_dir, _backend, _cache, service) = setup().await;
        assert!(matches!(service.set_currency("XYZ").await, Err(Error::Validation(_))));
        assert_eq!(service.code(), "NGN");
    }

    #[tokio::test]
    async fn test_convert() {
        let (_dir, backend, _cache, service) = setup().await;
        backend.set_offline(true);
        // Same currency never touches the backend
        assert_eq!(
            service.convert(Decimal::from(10), "ngn", "NGN").await.unwrap(),
            Decimal::from(10)
        );
        backend.set_offline(false);
        assert_eq!(
            service.convert(Decimal::from(10_000), "NGN", "GHS").await.unwrap(),
            Decimal::from(95)
        );
        assert!(service.convert(Decimal::ONE, "NGN", "EUR").await.is_err());
    }
}
