//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod backend;
mod cache;
mod kyc;

pub use backend::{
    AuthBackend, AuthEvent, CurrencyBackend, FederatedSignIn, IdentityProvider, KycBackend,
    KycSubmission, NotificationBackend, ProfileUpdate, SendMoneyRequest, TransactionBackend,
    UserBackend, WalletBackend,
};
pub use cache::LocalCache;
pub use kyc::{KycJobType, KycPayload, KycProvider, KycRequest};
