//! Scripted identity-verification flow
//!
//! Stands in for the third-party SDK where no camera UI exists (CLI, tests).
//! Each call pops the next scripted outcome; once the script runs out every
//! enrollment succeeds with a synthetic result.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::ports::{KycPayload, KycProvider, KycRequest};

#[derive(Debug, Default)]
pub struct ScriptedKycProvider {
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<KycRequest>>,
}

impl ScriptedKycProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful run returning `result`
    pub fn then_succeed(self, result: impl Into<String>) -> Self {
        self.push(Ok(result.into()));
        self
    }

    /// Queue a failed run with the SDK's error text
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()));
        self
    }

    fn push(&self, outcome: Result<String, String>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
    }

    /// Requests seen so far
    pub fn calls(&self) -> Vec<KycRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl KycProvider for ScriptedKycProvider {
    async fn enroll(&self, request: &KycRequest) -> Result<KycPayload, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(result)) => Ok(KycPayload {
                job_id: request.job_id.clone(),
                result,
            }),
            Some(Err(message)) => Err(message),
            None => Ok(KycPayload {
                job_id: request.job_id.clone(),
                result: json!({
                    "jobId": request.job_id,
                    "jobType": request.job_type,
                    "resultCode": "0810",
                    "resultText": "Enroll User",
                })
                .to_string(),
            }),
        }
    }
}
