//! KYC command - identity verification

use anyhow::Result;
use clap::Subcommand;

use pesa_core::ports::KycJobType;
use pesa_core::KycStatus;

use super::signed_in_context;
use crate::output;

#[derive(Subcommand)]
pub enum KycCommands {
    /// Show verification status
    Status,
    /// Run the verification flow and submit the result
    Verify {
        /// Verify an ID document (e.g. NATIONAL_ID, PASSPORT) instead of a selfie only
        #[arg(long)]
        document: Option<String>,
    },
}

pub async fn run(command: KycCommands) -> Result<()> {
    let ctx = signed_in_context().await?;
    match command {
        KycCommands::Status => {
            let user = ctx.auth.require_user()?;
            println!("Identity: {}", format!("{:?}", user.kyc_status).to_lowercase());
        }
        KycCommands::Verify { document } => {
            if ctx.auth.require_user()?.kyc_status == KycStatus::Verified {
                output::info("Your identity is already verified.");
                return Ok(());
            }
            let job_type = match document {
                Some(_) => KycJobType::DocumentVerification,
                None => KycJobType::BiometricEnrollment,
            };
            let pb = output::spinner("Verifying...");
            let result = ctx.kyc.verify_and_submit(job_type, document).await;
            pb.finish_and_clear();
            let status = result?;
            output::success(&format!(
                "Verification {}. We'll notify you when it has been reviewed.",
                format!("{:?}", status).to_lowercase()
            ));
        }
    }
    Ok(())
}
