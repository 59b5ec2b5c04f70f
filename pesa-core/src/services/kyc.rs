//! KYC service - identity verification through the SDK and document intake

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{ApiError, KycStatus};
use crate::ports::{KycBackend, KycJobType, KycPayload, KycProvider, KycRequest, KycSubmission};

use super::auth::AuthService;

/// SDK error text meaning the user's biometrics are already on file
const ALREADY_ENROLLED: &str = "already enrolled";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KycOutcome {
    Completed(KycPayload),
    /// The SDK refused because this user enrolled before; treated as success
    AlreadyEnrolled,
}

pub struct KycService {
    provider: Arc<dyn KycProvider>,
    backend: Arc<dyn KycBackend>,
    auth: Arc<AuthService>,
}

impl KycService {
    pub fn new(
        provider: Arc<dyn KycProvider>,
        backend: Arc<dyn KycBackend>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            provider,
            backend,
            auth,
        }
    }

    /// Build an SDK request for the signed-in user with a fresh job id
    pub fn new_request(&self, job_type: KycJobType, id_type: Option<String>) -> Result<KycRequest> {
        let user = self.auth.require_user()?;
        Ok(KycRequest {
            user_id: user.id,
            job_id: format!("job-{}", Uuid::new_v4()),
            job_type,
            country_code: user.country_code,
            id_type,
        })
    }

    /// Run the SDK flow
    pub async fn verify_identity(&self, request: &KycRequest) -> Result<KycOutcome> {
        match self.provider.enroll(request).await {
            Ok(payload) => {
                info!(job_id = %payload.job_id, "identity verification completed");
                Ok(KycOutcome::Completed(payload))
            }
            Err(message) if message.to_lowercase().contains(ALREADY_ENROLLED) => {
                info!(job_id = %request.job_id, "user already enrolled");
                Ok(KycOutcome::AlreadyEnrolled)
            }
            Err(message) => {
                warn!(job_id = %request.job_id, "identity verification failed");
                Err(ApiError::new("KYC_VERIFICATION_FAILED", message).into())
            }
        }
    }

    /// Send documents for review; marks the user `submitted` in state and cache
    ///
    /// Review runs server-side, so the status the upload call echoes back is
    /// only logged.
    pub async fn submit_documents(&self, submission: &KycSubmission) -> Result<KycStatus> {
        let reported = self.backend.upload_kyc_documents(submission).await?;
        if reported != KycStatus::Submitted {
            debug!(job_id = %submission.job_id, ?reported, "backend reported a different KYC status");
        }
        self.auth.patch_user(|u| u.kyc_status = KycStatus::Submitted)?;
        info!(job_id = %submission.job_id, "KYC documents submitted");
        Ok(KycStatus::Submitted)
    }

    /// SDK flow followed by submission of its result
    pub async fn verify_and_submit(
        &self,
        job_type: KycJobType,
        id_type: Option<String>,
    ) -> Result<KycStatus> {
        let request = self.new_request(job_type, id_type.clone())?;
        let sdk_result = match self.verify_identity(&request).await? {
            KycOutcome::Completed(payload) => Some(payload.result),
            KycOutcome::AlreadyEnrolled => None,
        };
        let submission = KycSubmission {
            user_id: request.user_id.clone(),
            job_id: request.job_id.clone(),
            id_type,
            id_number: None,
            document_urls: Vec::new(),
            sdk_result: sdk_result.or_else(|| Some(r#"{"alreadyEnrolled":true}"#.to_string())),
        };
        self.submit_documents(&submission).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_cache::FileCache;
    use crate::adapters::kyc::ScriptedKycProvider;
    use crate::adapters::memory::{MemoryBackend, DEMO_EMAIL, DEMO_PASSWORD};
    use crate::domain::result::Error;
    use crate::ports::LocalCache;
    use tempfile::TempDir;

    async fn setup(provider: ScriptedKycProvider) -> (TempDir, Arc<MemoryBackend>, Arc<FileCache>, KycService) {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(FileCache::open(dir.path()).unwrap());
        let backend = Arc::new(MemoryBackend::with_demo_data());
        let auth = Arc::new(AuthService::new(backend.clone(), backend.clone(), cache.clone()));
        auth.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        let service = KycService::new(Arc::new(provider), backend.clone(), auth);
        (dir, backend, cache, service)
    }

    #[tokio::test]
    async fn test_already_enrolled_is_success() {
        let provider = ScriptedKycProvider::new().then_fail("User is Already Enrolled (code 2215)");
        let (_dir, _backend, _cache, service) = setup(provider).await;
        let request = service.new_request(KycJobType::BiometricEnrollment, None).unwrap();
        assert_eq!(service.verify_identity(&request).await.unwrap(), KycOutcome::AlreadyEnrolled);
    }

    #[tokio::test]
    async fn test_sdk_failure_is_kyc_error() {
        let provider = ScriptedKycProvider::new().then_fail("face not detected");
        let (_dir, _backend, _cache, service) = setup(provider).await;
        let request = service.new_request(KycJobType::BiometricEnrollment, None).unwrap();
        let err = service.verify_identity(&request).await.unwrap_err();
        assert_eq!(err.code(), Some("KYC_VERIFICATION_FAILED"));
        match err {
            Error::Api(api) => assert_eq!(api.message, "face not detected"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_verify_and_submit_marks_user_submitted() {
        let (_dir, backend, cache, service) = setup(ScriptedKycProvider::new()).await;
        let status = service
            .verify_and_submit(KycJobType::DocumentVerification, Some("NATIONAL_ID".into()))
            .await
            .unwrap();
        assert_eq!(status, KycStatus::Submitted);
        assert_eq!(cache.load_user().unwrap().unwrap().kyc_status, KycStatus::Submitted);

        let submissions = backend.kyc_submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].id_type.as_deref(), Some("NATIONAL_ID"));
        assert!(submissions[0].sdk_result.is_some());
    }

    struct EchoingKycBackend(KycStatus);

    #[async_trait::async_trait]
    impl KycBackend for EchoingKycBackend {
        async fn upload_kyc_documents(&self, _submission: &KycSubmission) -> Result<KycStatus> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_submit_documents_always_marks_submitted() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(FileCache::open(dir.path()).unwrap());
        let backend = Arc::new(MemoryBackend::with_demo_data());
        let auth = Arc::new(AuthService::new(backend.clone(), backend.clone(), cache.clone()));
        auth.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
        let service = KycService::new(
            Arc::new(ScriptedKycProvider::new()),
            Arc::new(EchoingKycBackend(KycStatus::Pending)),
            auth.clone(),
        );

        let submission = KycSubmission {
            user_id: "user-demo".into(),
            job_id: "job-1".into(),
            id_type: Some("PASSPORT".into()),
            id_number: Some("A1234567".into()),
            document_urls: vec!["https://files.example/passport.jpg".into()],
            sdk_result: None,
        };
        let status = service.submit_documents(&submission).await.unwrap();
        assert_eq!(status, KycStatus::Submitted);
        assert_eq!(auth.current_user().unwrap().kyc_status, KycStatus::Submitted);
        assert_eq!(cache.load_user().unwrap().unwrap().kyc_status, KycStatus::Submitted);
    }
}
