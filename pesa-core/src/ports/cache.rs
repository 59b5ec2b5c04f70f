//! Local cache port - last-known state persisted on the device

use crate::domain::result::Result;
use crate::domain::{Session, Settings, Transaction, User, Wallet};

/// Key-value store for the last-known user, wallet, transactions,
/// UI settings and auth session
///
/// Implementations must make a failed or partial write invisible to readers:
/// a record either reads back whole or not at all.
pub trait LocalCache: Send + Sync {
    // === User ===

    fn load_user(&self) -> Result<Option<User>>;

    fn store_user(&self, user: &User) -> Result<()>;

    // === Wallet ===

    fn load_wallet(&self) -> Result<Option<Wallet>>;

    fn store_wallet(&self, wallet: &Wallet) -> Result<()>;

    // === Transactions ===

    /// Cached transaction list, newest first (empty if none)
    fn load_transactions(&self) -> Result<Vec<Transaction>>;

    fn store_transactions(&self, transactions: &[Transaction]) -> Result<()>;

    // === Settings ===

    /// Settings, or defaults if none were saved
    fn load_settings(&self) -> Result<Settings>;

    fn store_settings(&self, settings: &Settings) -> Result<()>;

    // === Session ===

    fn load_session(&self) -> Result<Option<Session>>;

    fn store_session(&self, session: &Session) -> Result<()>;

    fn clear_session(&self) -> Result<()>;

    // === Maintenance ===

    /// Remove everything except settings (used on sign-out)
    fn clear(&self) -> Result<()>;
}
