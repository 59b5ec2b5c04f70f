//! Balance command - show the balance or toggle its visibility

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{get_context, signed_in_context};
use crate::output;

#[derive(Subcommand)]
pub enum BalanceCommands {
    /// Show the balance
    Show,
    /// Hide the balance if shown, show it if hidden
    Toggle,
}

pub async fn run(command: Option<BalanceCommands>) -> Result<()> {
    match command {
        Some(BalanceCommands::Toggle) => {
            let ctx = get_context()?;
            ctx.wallet.load_cached()?;
            if ctx.wallet.toggle_balance_visibility()? {
                output::info("Balance hidden");
            } else {
                output::info("Balance visible");
            }
            Ok(())
        }
        Some(BalanceCommands::Show) | None => {
            let ctx = signed_in_context().await?;
            println!("{}", ctx.wallet.display_balance().bold());
            if let Some(wallet) = ctx.wallet.wallet() {
                let available = ctx.currency.compact_amount(wallet.available_to_spend(), &wallet.currency);
                println!("Available to send: {}", available);
            }
            Ok(())
        }
    }
}
