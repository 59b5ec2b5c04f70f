//! Status command - show account, wallet and inbox summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use serde_json::json;

use pesa_core::domain::format_amount;

use super::signed_in_context;
use crate::output;

pub async fn run(json: bool) -> Result<()> {
    let ctx = signed_in_context().await?;
    let user = ctx.auth.require_user()?;
    let wallet_state = ctx.wallet.state();
    let summary = ctx.transactions.summary();
    let unread = ctx.notifications.unread_count();

    if json {
        return output::json(json!({
            "user": user,
            "wallet": wallet_state.wallet,
            "balanceHidden": wallet_state.balance_hidden,
            "summary": summary,
            "unreadNotifications": unread,
        }));
    }

    println!("{}", format!("Hello, {}", user.first_name).bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Balance".to_string(), ctx.wallet.display_balance()]);

    if let Some(wallet) = &wallet_state.wallet {
        let code = wallet.currency.as_str();
        table.add_row(vec!["Wallet".to_string(), wallet.id.clone()]);
        table.add_row(vec![
            "Daily limit left".to_string(),
            format_amount(wallet.remaining_daily_limit(), code),
        ]);
        table.add_row(vec![
            "Monthly limit left".to_string(),
            format_amount(wallet.remaining_monthly_limit(), code),
        ]);
        table.add_row(vec!["Sent".to_string(), format_amount(summary.total_sent, code)]);
        table.add_row(vec![
            "Received".to_string(),
            format_amount(summary.total_received, code),
        ]);
        if !wallet.is_active {
            table.add_row(vec!["State".to_string(), "inactive".red().to_string()]);
        }
    }
    table.add_row(vec![
        "Identity".to_string(),
        format!("{:?}", user.kyc_status).to_lowercase(),
    ]);
    table.add_row(vec!["Currency".to_string(), ctx.currency.code()]);
    println!("{}", table);

    if summary.pending_count > 0 {
        println!("{} pending transfer(s)", summary.pending_count);
    }
    if unread > 0 {
        println!();
        println!("{} Run 'pesa notifications' to read them.", format!("{} unread notification(s).", unread).cyan());
    }
    Ok(())
}
