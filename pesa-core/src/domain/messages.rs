//! User-facing error messages
//!
//! Exact backend codes win, then the code's category, then keyword
//! heuristics on the error text for failures that never reached the backend.

use super::api_error::{ApiError, ErrorCategory};
use super::result::Error;
use super::wallet::LimitViolation;

const GENERIC: &str = "Something went wrong. Please try again.";

fn message_for_code(code: &str) -> Option<&'static str> {
    let msg = match code {
        "AUTH_INVALID_CREDENTIALS" => "Incorrect email or password.",
        "AUTH_USER_NOT_FOUND" => "No account exists for this email.",
        "AUTH_EMAIL_IN_USE" => "An account already exists for this email.",
        "AUTH_WEAK_PASSWORD" => "Choose a stronger password (at least 8 characters).",
        "AUTH_SESSION_EXPIRED" => "Your session has expired. Please sign in again.",
        "AUTH_UNAUTHENTICATED" => "Please sign in to continue.",
        "KYC_REQUIRED" => "Verify your identity to use this feature.",
        "KYC_PENDING" => "Your identity verification is still being reviewed.",
        "KYC_REJECTED" => "Identity verification failed. Please contact support.",
        "KYC_DOCUMENT_INVALID" => "The document could not be read. Please try another photo.",
        "WALLET_NOT_FOUND" => "Wallet not found. Check the wallet ID and try again.",
        "WALLET_INACTIVE" => "This wallet is not active.",
        "WALLET_INSUFFICIENT_FUNDS" => "Insufficient balance for this transfer.",
        "WALLET_FROZEN" => "This wallet has been frozen. Please contact support.",
        "TXN_DAILY_LIMIT_EXCEEDED" => "This transfer exceeds your daily limit.",
        "TXN_MONTHLY_LIMIT_EXCEEDED" => "This transfer exceeds your monthly limit.",
        "TXN_INVALID_AMOUNT" => "Enter a valid amount.",
        "TXN_SELF_TRANSFER" => "You cannot send money to your own wallet.",
        "TXN_DUPLICATE" => "This transfer was already submitted.",
        "TXN_CURRENCY_UNSUPPORTED" => "This currency is not supported for transfers.",
        _ => return None,
    };
    Some(msg)
}

fn message_for_category(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Auth => "Authentication failed. Please sign in again.",
        ErrorCategory::Kyc => "Identity verification could not be completed.",
        ErrorCategory::Wallet => "There was a problem with your wallet.",
        ErrorCategory::Transaction => "The transfer could not be completed.",
        ErrorCategory::RateLimit => "Too many attempts. Please wait a moment and try again.",
        ErrorCategory::Service => "The service is temporarily unavailable.",
        ErrorCategory::Config => "The app is misconfigured. Please update to the latest version.",
        ErrorCategory::System | ErrorCategory::Unknown => GENERIC,
    }
}

fn message_for_text(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let rules: &[(&[&str], &str)] = &[
        (&["timed out", "timeout"], "The request timed out. Check your connection and try again."),
        (
            &["network", "connection", "dns", "unreachable", "socket"],
            "No internet connection. Check your network and try again.",
        ),
        (&["permission", "denied", "forbidden"], "You don't have permission to do that."),
        (&["password"], "Incorrect email or password."),
        (&["email"], "Enter a valid email address."),
        (&["insufficient"], "Insufficient balance for this transfer."),
        (&["not found"], "The requested item was not found."),
    ];
    rules
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, msg)| *msg)
}

fn api_message(err: &ApiError) -> String {
    message_for_code(&err.code)
        .unwrap_or_else(|| message_for_category(err.category()))
        .to_string()
}

fn limit_message(violation: LimitViolation) -> &'static str {
    match violation {
        LimitViolation::Inactive => "This wallet is not active.",
        LimitViolation::InsufficientBalance => "Insufficient balance for this transfer.",
        LimitViolation::DailyLimitExceeded => "This transfer exceeds your daily limit.",
        LimitViolation::MonthlyLimitExceeded => "This transfer exceeds your monthly limit.",
    }
}

/// Convert any core error into a string suitable for display
pub fn user_message(err: &Error) -> String {
    match err {
        Error::Api(api) => api_message(api),
        Error::Limit(violation) => limit_message(*violation).to_string(),
        Error::Validation(msg) => msg.clone(),
        Error::Auth(msg) => message_for_text(msg)
            .unwrap_or("Please sign in to continue.")
            .to_string(),
        other => message_for_text(&other.to_string())
            .unwrap_or(GENERIC)
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_code_wins() {
        let err = Error::from(ApiError::new("WALLET_INSUFFICIENT_FUNDS", "balance too low"));
        assert_eq!(user_message(&err), "Insufficient balance for this transfer.");
    }

    #[test]
    fn test_category_fallback() {
        let err = Error::from(ApiError::new("RATE_SEND_MONEY", "slow down"));
        assert_eq!(user_message(&err), "Too many attempts. Please wait a moment and try again.");

        let err = Error::from(ApiError::new("internal", "boom"));
        assert_eq!(user_message(&err), GENERIC);
    }

    #[test]
    fn test_keyword_heuristics() {
        let err = Error::network("error sending request: connection refused");
        assert_eq!(user_message(&err), "No internet connection. Check your network and try again.");

        let err = Error::network("request timed out after 30s");
        assert!(user_message(&err).contains("timed out"));

        let err = Error::cache("disk full");
        assert_eq!(user_message(&err), GENERIC);
    }

    #[test]
    fn test_validation_passes_through() {
        let err = Error::validation("Amount must be greater than zero");
        assert_eq!(user_message(&err), "Amount must be greater than zero");
    }

    #[test]
    fn test_limit_violation() {
        let err = Error::from(LimitViolation::DailyLimitExceeded);
        assert_eq!(user_message(&err), "This transfer exceeds your daily limit.");
    }
}
