//! Service layer - client-side state containers
//!
//! Each service owns one slice of app state, publishes immutable snapshots
//! through a `watch` channel, and coordinates the cache and backend ports
//! for its feature area.

mod auth;
mod currency;
mod kyc;
mod notifications;
mod sequencer;
mod transactions;
mod wallet;

pub use auth::{AuthEffect, AuthService, AuthState, SignUpRequest, DEFAULT_COUNTRY};
pub use currency::{CurrencyService, CurrencyState};
pub use kyc::{KycOutcome, KycService};
pub use notifications::{NotificationService, NotificationsState};
pub use sequencer::{RefreshSequencer, RefreshTicket};
pub use transactions::{
    TransactionFilter, TransactionService, TransactionSummary, TransactionsState, TransferRequest,
    DEFAULT_TRANSACTION_LIMIT,
};
pub use wallet::{WalletService, WalletState, BALANCE_MASK};
