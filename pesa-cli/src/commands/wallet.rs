//! Wallet command - wallet details and spending limits

use anyhow::Result;
use colored::Colorize;

use pesa_core::domain::format_amount;

use super::signed_in_context;
use crate::output;

pub async fn run(json: bool) -> Result<()> {
    let ctx = signed_in_context().await?;
    let wallet = ctx
        .wallet
        .wallet()
        .ok_or_else(|| anyhow::anyhow!("No wallet found for this account"))?;

    if json {
        return output::json(&wallet);
    }

    let code = wallet.currency.as_str();
    println!("{} {}", "Wallet".bold(), wallet.id);
    let mut table = output::create_table();
    table.set_header(vec!["", "Limit", "Spent", "Remaining"]);
    table.add_row(vec![
        "Daily".to_string(),
        format_amount(wallet.daily_limit, code),
        format_amount(wallet.daily_spent, code),
        format_amount(wallet.remaining_daily_limit(), code),
    ]);
    table.add_row(vec![
        "Monthly".to_string(),
        format_amount(wallet.monthly_limit, code),
        format_amount(wallet.monthly_spent, code),
        format_amount(wallet.remaining_monthly_limit(), code),
    ]);
    println!("Balance: {}", ctx.wallet.display_balance());
    println!("{}", table);

    if !wallet.is_active {
        output::warning("This wallet is inactive; transfers are disabled.");
    } else if let Some(at) = wallet.last_transaction_at {
        println!("Last transfer: {}", at.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}
