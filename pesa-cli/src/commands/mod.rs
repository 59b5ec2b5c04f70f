//! CLI command implementations

pub mod auth;
pub mod balance;
pub mod currency;
pub mod demo;
pub mod history;
pub mod kyc;
pub mod lookup;
pub mod notifications;
pub mod profile;
pub mod send;
pub mod status;
pub mod wallet;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::debug;

use pesa_core::PesaContext;

use crate::output;

/// Get the pesa directory from environment or default
pub fn get_pesa_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PESA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".pesa"))
        .context("Could not find home directory (set PESA_DIR)")
}

/// Get or create pesa context
pub fn get_context() -> Result<PesaContext> {
    let pesa_dir = get_pesa_dir()?;
    std::fs::create_dir_all(&pesa_dir)
        .with_context(|| format!("Failed to create pesa directory: {:?}", pesa_dir))?;
    PesaContext::new(&pesa_dir).context("Failed to initialize pesa context")
}

/// Context with a restored session and fresh (or cached) state
///
/// A failed refresh is reported and the cached state used instead.
pub async fn signed_in_context() -> Result<PesaContext> {
    let ctx = get_context()?;
    if ctx.bootstrap().await?.is_none() {
        anyhow::bail!("Not signed in. Run 'pesa login' first.");
    }
    let pb = output::spinner("Refreshing...");
    let refreshed = ctx.refresh_all().await;
    pb.finish_and_clear();
    if let Err(e) = refreshed {
        debug!(error = %e, "refresh failed; using cached state");
        if ctx.wallet.wallet().is_none() {
            return Err(e.into());
        }
        output::warning("Showing saved data; could not reach the server.");
    }
    Ok(ctx)
}

/// Parse a user-entered amount ("1,500.50" is accepted)
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    let amount = Decimal::from_str(&cleaned)
        .with_context(|| format!("'{}' is not a valid amount", raw))?;
    if amount <= Decimal::ZERO {
        anyhow::bail!("Amount must be greater than zero");
    }
    Ok(amount)
}
