//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

pub mod api_error;
pub mod currency;
pub mod messages;
mod notification;
pub mod result;
mod settings;
mod transaction;
mod user;
mod wallet;

pub use api_error::{ApiError, ErrorCategory};
pub use currency::{compact_amount, format_amount, Currency, DEFAULT_CURRENCY};
pub use messages::user_message;
pub use notification::{Notification, NotificationType};
pub use settings::{Session, Settings, ThemeMode};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use user::{KycStatus, User};
pub use wallet::{LimitViolation, Wallet, WalletLookup};
