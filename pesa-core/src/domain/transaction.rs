//! Transaction domain model

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Send,
    Receive,
    Deposit,
    Withdraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    /// Completed, failed and cancelled records never change again
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Send => "send",
            Self::Receive => "receive",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
        };
        f.write_str(s)
    }
}

/// A transfer record, created server-side and immutable on the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// Human-facing reference shown on receipts
    pub reference: String,
    pub sender_wallet_id: String,
    pub receiver_wallet_id: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub receiver_name: Option<String>,
    pub amount: Decimal,
    pub fee: Decimal,
    pub currency: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    // =========================================================================
    // Cross-currency transfers
    // =========================================================================
    /// Amount credited to the receiver in their currency
    #[serde(default)]
    pub converted_amount: Option<Decimal>,
    #[serde(default)]
    pub converted_currency: Option<String>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
}

impl Transaction {
    /// Create a pending transfer with required fields
    pub fn new(
        id: impl Into<String>,
        sender_wallet_id: impl Into<String>,
        receiver_wallet_id: impl Into<String>,
        amount: Decimal,
        currency: &str,
        transaction_type: TransactionType,
    ) -> Self {
        let id = id.into();
        Self {
            reference: Self::reference_for(&id),
            id,
            sender_wallet_id: sender_wallet_id.into(),
            receiver_wallet_id: receiver_wallet_id.into(),
            sender_name: None,
            receiver_name: None,
            amount,
            fee: Decimal::ZERO,
            currency: currency.trim().to_uppercase(),
            transaction_type,
            status: TransactionStatus::Pending,
            description: None,
            created_at: Utc::now(),
            completed_at: None,
            converted_amount: None,
            converted_currency: None,
            exchange_rate: None,
        }
    }

    /// Default receipt reference: `TXN-` plus the first 8 id characters
    pub fn reference_for(id: &str) -> String {
        let short: String = id.chars().filter(|c| c.is_ascii_alphanumeric()).take(8).collect();
        format!("TXN-{}", short.to_uppercase())
    }

    /// True iff money flowed into `wallet_id`
    ///
    /// A self-transfer (sender == receiver) counts as a credit.
    pub fn is_credit(&self, wallet_id: &str) -> bool {
        self.receiver_wallet_id == wallet_id
    }

    /// Amount from the point of view of `wallet_id`: positive for credits
    pub fn signed_amount(&self, wallet_id: &str) -> Decimal {
        if self.is_credit(wallet_id) {
            self.amount
        } else {
            -self.total_debit()
        }
    }

    /// What the sender pays: amount plus fee
    pub fn total_debit(&self) -> Decimal {
        self.amount + self.fee
    }

    /// Name of the other party, if the server supplied it
    pub fn counterparty_name(&self, wallet_id: &str) -> Option<&str> {
        if self.is_credit(wallet_id) {
            self.sender_name.as_deref()
        } else {
            self.receiver_name.as_deref()
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    pub fn is_cross_currency(&self) -> bool {
        match &self.converted_currency {
            Some(c) => !c.eq_ignore_ascii_case(&self.currency),
            None => false,
        }
    }

    /// Case-insensitive match on description, reference and counterparty
    pub fn matches_search(&self, query: &str, wallet_id: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let fields = [
            self.description.as_deref(),
            Some(self.reference.as_str()),
            self.counterparty_name(wallet_id),
        ];
        fields
            .iter()
            .flatten()
            .any(|f| f.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(sender: &str, receiver: &str) -> Transaction {
        let mut tx = Transaction::new(
            "a1b2c3d4-e5f6",
            sender,
            receiver,
            Decimal::from(1_000),
            "ngn",
            TransactionType::Send,
        );
        tx.fee = Decimal::from(15);
        tx.sender_name = Some("Ada Obi".to_string());
        tx.receiver_name = Some("Kwame Mensah".to_string());
        tx
    }

    #[test]
    fn test_is_credit() {
        let tx = transfer("w-a", "w-b");
        assert!(tx.is_credit("w-b"));
        assert!(!tx.is_credit("w-a"));
        assert!(!tx.is_credit("w-c"));
    }

    #[test]
    fn test_self_transfer_is_credit() {
        let tx = transfer("w-a", "w-a");
        assert!(tx.is_credit("w-a"));
        assert_eq!(tx.signed_amount("w-a"), Decimal::from(1_000));
    }

    #[test]
    fn test_signed_amount_includes_fee_for_debits() {
        let tx = transfer("w-a", "w-b");
        assert_eq!(tx.signed_amount("w-a"), Decimal::from(-1_015));
        assert_eq!(tx.signed_amount("w-b"), Decimal::from(1_000));
    }

    #[test]
    fn test_counterparty_name() {
        let tx = transfer("w-a", "w-b");
        assert_eq!(tx.counterparty_name("w-a"), Some("Kwame Mensah"));
        assert_eq!(tx.counterparty_name("w-b"), Some("Ada Obi"));
    }

    #[test]
    fn test_reference_and_currency() {
        let tx = transfer("w-a", "w-b");
        assert_eq!(tx.reference, "TXN-A1B2C3D4");
        assert_eq!(tx.currency, "NGN");
        assert!(tx.is_pending());
        assert!(!tx.status.is_final());
    }

    #[test]
    fn test_search() {
        let mut tx = transfer("w-a", "w-b");
        tx.description = Some("Rent for March".to_string());
        assert!(tx.matches_search("rent", "w-a"));
        assert!(tx.matches_search("KWAME", "w-a"));
        assert!(!tx.matches_search("kwame", "w-b"));
        assert!(tx.matches_search("txn-a1b2", "w-b"));
        assert!(tx.matches_search("   ", "w-b"));
    }

    #[test]
    fn test_cross_currency() {
        let mut tx = transfer("w-a", "w-b");
        assert!(!tx.is_cross_currency());
        tx.converted_currency = Some("GHS".to_string());
        tx.converted_amount = Some(Decimal::new(1050, 2));
        tx.exchange_rate = Some(Decimal::new(105, 4));
        assert!(tx.is_cross_currency());
    }

    #[test]
    fn test_wire_names() {
        let tx = transfer("w-a", "w-b");
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["transactionType"], "send");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["senderWalletId"], "w-a");
    }
}
