//! Lookup command - preview a transfer recipient

use anyhow::Result;
use colored::Colorize;

use super::signed_in_context;
use crate::output;

pub async fn run(wallet_id: &str, json: bool) -> Result<()> {
    let ctx = signed_in_context().await?;
    let found = ctx.wallet.lookup_wallet(wallet_id).await?;

    if json {
        return output::json(&found);
    }
    match found {
        Some(lookup) => {
            println!("{} {}", lookup.owner_name.bold(), lookup.currency);
            if !lookup.is_active {
                output::warning("This wallet is not active and cannot receive money.");
            }
        }
        None => output::warning(&format!("No wallet with ID {}", wallet_id)),
    }
    Ok(())
}
