//! User domain model

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Identity verification progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    #[default]
    Pending,
    Submitted,
    Verified,
    Rejected,
}

/// The signed-in wallet holder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// ISO 3166-1 alpha-2
    pub country_code: String,
    #[serde(default)]
    pub kyc_status: KycStatus,
    #[serde(default)]
    pub kyc_completed_at: Option<DateTime<Utc>>,
    pub preferred_currency: String,
    #[serde(default)]
    pub wallet_id: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("phone pattern is valid"))
}

impl User {
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        country_code: &str,
        preferred_currency: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into().trim().to_lowercase(),
            phone_number: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            country_code: country_code.trim().to_uppercase(),
            kyc_status: KycStatus::Pending,
            kyc_completed_at: None,
            preferred_currency: preferred_currency.trim().to_uppercase(),
            wallet_id: None,
            profile_image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    pub fn is_kyc_verified(&self) -> bool {
        self.kyc_status == KycStatus::Verified
    }

    /// Strip spaces, dashes and parentheses from a phone number
    pub fn normalize_phone(phone: &str) -> String {
        phone
            .chars()
            .enumerate()
            .filter(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '+'))
            .map(|(_, c)| c)
            .collect()
    }

    /// Validate user data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err("first and last name are required");
        }
        if !email_regex().is_match(&self.email) {
            return Err("email address is not valid");
        }
        if let Some(phone) = &self.phone_number {
            if !phone_regex().is_match(&Self::normalize_phone(phone)) {
                return Err("phone number is not valid");
            }
        }
        if self.country_code.len() != 2 {
            return Err("country code must be two letters");
        }
        Ok(())
    }
}
