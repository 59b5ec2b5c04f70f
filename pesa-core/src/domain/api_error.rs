//! Backend error taxonomy
//!
//! Callables report failures as a code string (`WALLET_INSUFFICIENT_FUNDS`,
//! `AUTH_SESSION_EXPIRED`, ...). The prefix names the category.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Category derived from the error code prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Auth,
    Kyc,
    Wallet,
    Transaction,
    RateLimit,
    Service,
    Config,
    System,
    Unknown,
}

impl ErrorCategory {
    /// Classify a backend error code
    pub fn from_code(code: &str) -> Self {
        let prefix = code.split('_').next().unwrap_or("");
        match prefix.to_ascii_uppercase().as_str() {
            "AUTH" => Self::Auth,
            "KYC" => Self::Kyc,
            "WALLET" => Self::Wallet,
            "TXN" => Self::Transaction,
            "RATE" => Self::RateLimit,
            "SERVICE" => Self::Service,
            "CONFIG" => Self::Config,
            "SYSTEM" => Self::System,
            _ => Self::Unknown,
        }
    }
}

/// Structured error returned by a backend callable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<JsonValue>,
    /// Set by the backend. Exposed to callers; no retry policy reads it.
    #[serde(default)]
    pub retryable: bool,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(&self.code)
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_prefix() {
        assert_eq!(ErrorCategory::from_code("AUTH_INVALID_CREDENTIALS"), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_code("TXN_LIMIT_EXCEEDED"), ErrorCategory::Transaction);
        assert_eq!(ErrorCategory::from_code("RATE_LIMITED"), ErrorCategory::RateLimit);
        assert_eq!(ErrorCategory::from_code("kyc_failed"), ErrorCategory::Kyc);
        assert_eq!(ErrorCategory::from_code("internal"), ErrorCategory::Unknown);
        assert_eq!(ErrorCategory::from_code(""), ErrorCategory::Unknown);
    }

    #[test]
    fn test_display_includes_code() {
        let err = ApiError::new("WALLET_NOT_FOUND", "no wallet").retryable(true);
        assert_eq!(err.to_string(), "WALLET_NOT_FOUND: no wallet");
        assert!(err.is_retryable());
    }
}
