//! Identity verification SDK port

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the SDK flow is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycJobType {
    /// Selfie enrollment only
    BiometricEnrollment,
    /// ID document capture plus selfie
    DocumentVerification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycRequest {
    pub user_id: String,
    pub job_id: String,
    pub job_type: KycJobType,
    pub country_code: String,
    /// e.g. `NATIONAL_ID`, `PASSPORT`; ignored for biometric enrollment
    pub id_type: Option<String>,
}

/// Success payload returned by the SDK's full-screen flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycPayload {
    pub job_id: String,
    /// Opaque result string from the SDK (usually JSON)
    pub result: String,
}

/// Third-party biometric / document SDK
///
/// The flow either returns a payload or a human-readable error string;
/// the SDK exposes no structured error codes.
#[async_trait]
pub trait KycProvider: Send + Sync {
    async fn enroll(&self, request: &KycRequest) -> std::result::Result<KycPayload, String>;
}
