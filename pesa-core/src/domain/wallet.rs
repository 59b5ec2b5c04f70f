//! Wallet domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user's wallet as last reported by the server
///
/// The client never computes an authoritative balance. It mirrors the
/// server and may apply optimistic patches until the next refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    pub balance: Decimal,
    /// ISO 4217 currency code, normalized to uppercase
    pub currency: String,
    pub daily_limit: Decimal,
    pub monthly_limit: Decimal,
    pub daily_spent: Decimal,
    pub monthly_spent: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_transaction_at: Option<DateTime<Utc>>,
}

/// Why a transfer would be refused by the pre-flight check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimitViolation {
    #[error("wallet is inactive")]
    Inactive,
    #[error("amount exceeds available balance")]
    InsufficientBalance,
    #[error("amount exceeds remaining daily limit")]
    DailyLimitExceeded,
    #[error("amount exceeds remaining monthly limit")]
    MonthlyLimitExceeded,
}

impl Wallet {
    /// Create an active wallet with zero balance and spend counters
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        currency: &str,
        daily_limit: Decimal,
        monthly_limit: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            balance: Decimal::ZERO,
            currency: Self::normalize_currency(currency),
            daily_limit,
            monthly_limit,
            daily_spent: Decimal::ZERO,
            monthly_spent: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_transaction_at: None,
        }
    }

    /// Normalize currency code to uppercase
    pub fn normalize_currency(currency: &str) -> String {
        currency.trim().to_uppercase()
    }

    /// First rule a transfer of `amount` would break, if any
    ///
    /// Advisory only: the server performs the authoritative check.
    pub fn check_transfer(&self, amount: Decimal) -> Result<(), LimitViolation> {
        if !self.is_active {
            return Err(LimitViolation::Inactive);
        }
        if amount > self.balance {
            return Err(LimitViolation::InsufficientBalance);
        }
        if self.daily_spent + amount > self.daily_limit {
            return Err(LimitViolation::DailyLimitExceeded);
        }
        if self.monthly_spent + amount > self.monthly_limit {
            return Err(LimitViolation::MonthlyLimitExceeded);
        }
        Ok(())
    }

    /// Whether a transfer of `amount` passes the pre-flight check
    pub fn can_transact(&self, amount: Decimal) -> bool {
        self.check_transfer(amount).is_ok()
    }

    pub fn remaining_daily_limit(&self) -> Decimal {
        (self.daily_limit - self.daily_spent).max(Decimal::ZERO)
    }

    pub fn remaining_monthly_limit(&self) -> Decimal {
        (self.monthly_limit - self.monthly_spent).max(Decimal::ZERO)
    }

    /// Largest amount that currently passes `can_transact` (zero if inactive)
    pub fn available_to_spend(&self) -> Decimal {
        if !self.is_active {
            return Decimal::ZERO;
        }
        self.balance
            .max(Decimal::ZERO)
            .min(self.remaining_daily_limit())
            .min(self.remaining_monthly_limit())
    }

    /// Apply a local balance change ahead of server confirmation
    ///
    /// Debits (negative deltas) also count against both spend counters.
    pub fn apply_optimistic_delta(&mut self, delta: Decimal) {
        self.balance += delta;
        if delta.is_sign_negative() {
            let spent = delta.abs();
            self.daily_spent += spent;
            self.monthly_spent += spent;
            self.last_transaction_at = Some(Utc::now());
        }
        self.updated_at = Utc::now();
    }
}

/// Public view of another user's wallet, used to preview a recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletLookup {
    pub wallet_id: String,
    pub owner_name: String,
    pub currency: String,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(balance: i64, daily_limit: i64, daily_spent: i64) -> Wallet {
        let mut w = Wallet::new("w-1", "u-1", "ngn", Decimal::from(daily_limit), Decimal::from(5_000_000));
        w.balance = Decimal::from(balance);
        w.daily_spent = Decimal::from(daily_spent);
        w.monthly_spent = Decimal::from(daily_spent);
        w
    }

    #[test]
    fn test_daily_limit_example() {
        let w = wallet(1_000_000, 500_000, 480_000);
        assert!(!w.can_transact(Decimal::from(25_000)));
        assert_eq!(w.check_transfer(Decimal::from(25_000)), Err(LimitViolation::DailyLimitExceeded));
        assert!(w.can_transact(Decimal::from(15_000)));
        assert!(w.can_transact(Decimal::from(20_000)));
    }

    #[test]
    fn test_inactive_wallet_rejects_everything() {
        let mut w = wallet(1_000, 500_000, 0);
        w.is_active = false;
        assert_eq!(w.check_transfer(Decimal::ONE), Err(LimitViolation::Inactive));
        assert_eq!(w.available_to_spend(), Decimal::ZERO);
    }

    #[test]
    fn test_balance_checked_before_limits() {
        let w = wallet(100, 50, 0);
        assert_eq!(w.check_transfer(Decimal::from(150)), Err(LimitViolation::InsufficientBalance));
    }

    #[test]
    fn test_monthly_limit() {
        let mut w = wallet(10_000, 10_000, 0);
        w.monthly_limit = Decimal::from(1_000);
        w.monthly_spent = Decimal::from(900);
        assert_eq!(w.check_transfer(Decimal::from(101)), Err(LimitViolation::MonthlyLimitExceeded));
        assert!(w.can_transact(Decimal::from(100)));
    }

    #[test]
    fn test_can_transact_is_monotone() {
        let w = wallet(70_000, 500_000, 480_000);
        let threshold = w.available_to_spend();
        assert_eq!(threshold, Decimal::from(20_000));

        let mut seen_false = false;
        for step in 0..200 {
            let amount = Decimal::from(step * 250);
            let ok = w.can_transact(amount);
            if seen_false {
                assert!(!ok, "can_transact flipped back to true at {}", amount);
            }
            if !ok {
                seen_false = true;
                assert!(amount > threshold);
            } else {
                assert!(amount <= threshold);
            }
        }
        assert!(seen_false);
    }

    #[test]
    fn test_optimistic_debit_updates_counters() {
        let mut w = wallet(10_000, 500_000, 0);
        w.apply_optimistic_delta(Decimal::from(-2_500));
        assert_eq!(w.balance, Decimal::from(7_500));
        assert_eq!(w.daily_spent, Decimal::from(2_500));
        assert_eq!(w.monthly_spent, Decimal::from(2_500));
        assert!(w.last_transaction_at.is_some());

        w.apply_optimistic_delta(Decimal::from(1_000));
        assert_eq!(w.balance, Decimal::from(8_500));
        assert_eq!(w.daily_spent, Decimal::from(2_500));
    }

    #[test]
    fn test_json_round_trip_with_and_without_optionals() {
        let mut w = wallet(1_234, 500_000, 10);
        w.balance = Decimal::new(123_450, 2);
        let json = serde_json::to_string(&w).unwrap();
        let back: Wallet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);

        w.last_transaction_at = Some(Utc::now());
        w.is_active = false;
        let json = serde_json::to_string(&w).unwrap();
        let back: Wallet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn test_currency_normalized() {
        let w = Wallet::new("w", "u", " kes ", Decimal::ONE, Decimal::ONE);
        assert_eq!(w.currency, "KES");
    }
}
